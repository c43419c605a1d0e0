//! Shared helpers for pulse_ulp integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use pulse_common::counter::config::{CounterConfig, SensorConfig};
use pulse_common::counter::mode::CountMode;
use pulse_ulp::sink::SensorSink;
use std::sync::Arc;
use std::time::Duration;

/// GPIO33, RTC IO 8.
pub const PIN: u8 = 33;

/// Sink recording every published value.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<f32>>>);

impl Recorder {
    pub fn values(&self) -> Vec<f32> {
        self.0.lock().clone()
    }

    pub fn boxed(&self) -> Box<dyn SensorSink> {
        Box::new(self.clone())
    }
}

impl SensorSink for Recorder {
    fn publish(&mut self, value: f32) {
        self.0.lock().push(value);
    }
}

/// Counter on GPIO33 sampling every 20 ms with debounce 3.
pub fn counter_config(rising: CountMode, falling: CountMode) -> CounterConfig {
    CounterConfig {
        pin: PIN,
        rising_edge_mode: rising,
        falling_edge_mode: falling,
        debounce_threshold: 3,
        sample_period: Duration::from_millis(20),
    }
}

/// Sensor named "meter", updating every 60 s.
pub fn sensor_config(counter: CounterConfig) -> SensorConfig {
    SensorConfig {
        name: "meter".to_string(),
        counter,
        update_interval: Duration::from_secs(60),
    }
}

pub fn assert_close(actual: f32, expected: f32, tolerance: f32) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}
