//! Destinations of published sensor values.

use serde::Serialize;
use std::io::Write;
use tracing::{info, warn};

/// Unit of the rate sensor.
pub const UNIT_PULSES_PER_MINUTE: &str = "pulses/min";

/// Unit of the total sensor.
pub const UNIT_PULSES: &str = "pulses";

/// Receiver of published sensor values.
pub trait SensorSink: Send {
    /// Publish one value.
    fn publish(&mut self, value: f32);
}

/// One published reading as written on a JSON line.
#[derive(Debug, Serialize)]
struct Reading<'a> {
    sensor: &'a str,
    unit: &'a str,
    value: f32,
}

/// Writes every value as a JSON object on its own line and logs it.
pub struct JsonLineSink<W: Write + Send> {
    sensor: String,
    unit: &'static str,
    writer: W,
}

impl<W: Write + Send> JsonLineSink<W> {
    /// Sink for `sensor`, values in `unit`.
    pub fn new(sensor: impl Into<String>, unit: &'static str, writer: W) -> Self {
        Self {
            sensor: sensor.into(),
            unit,
            writer,
        }
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, value: f32) -> std::io::Result<()> {
        let reading = Reading {
            sensor: &self.sensor,
            unit: self.unit,
            value,
        };
        serde_json::to_writer(&mut self.writer, &reading)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write + Send> SensorSink for JsonLineSink<W> {
    fn publish(&mut self, value: f32) {
        info!(sensor = %self.sensor, unit = self.unit, value, "Publishing reading");
        if let Err(e) = self.write_line(value) {
            warn!("Failed to write reading of '{}': {}", self.sensor, e);
        }
    }
}
