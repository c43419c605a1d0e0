//! Deep sleep tests: time reconstruction after a wake and full
//! awake/sleep cycles of `DeviceCore`.

mod common;

use common::{assert_close, counter_config, sensor_config, Recorder, PIN};
use proptest::prelude::*;
use pulse_common::config::ConfigLoader;
use pulse_common::counter::config::{PulseUlpConfig, SensorConfig};
use pulse_common::counter::error::StartupError;
use pulse_common::counter::mode::CountMode;
use pulse_common::time::{ManualClock, Timestamp};
use pulse_common::ulp::driver::{UlpDriver, UlpError, WakeupCause};
use pulse_ulp::core::{CoreError, DeviceCore, Sinks};
use pulse_ulp::drivers::simulation::{PulseTrain, SimulatedUlp};
use pulse_ulp::sensor::{PulseCounterUlpSensor, SamplingState};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

fn meter() -> PulseTrain {
    PulseTrain::new(0.75, Duration::from_millis(250))
}

/// Cold boot, one update interval awake, then deep sleep for `sleep`.
/// Returns the coprocessor as left at wakeup.
fn boot_and_sleep(sleep: Duration, rates: &Recorder) -> SimulatedUlp {
    let mut ulp = SimulatedUlp::new(PIN, Box::new(meter()));
    let clock = ManualClock::new();
    let mut sensor = PulseCounterUlpSensor::new(
        sensor_config(counter_config(CountMode::Increment, CountMode::Disable)),
        clock.clone(),
        rates.boxed(),
    );
    sensor.setup(&mut ulp).expect("setup");
    sensor.update();
    ulp.advance(MINUTE);
    clock.advance(MINUTE);
    sensor.update();

    ulp.deep_sleep();
    ulp.advance(sleep);
    ulp
}

fn wake_sensor(rates: &Recorder) -> (PulseCounterUlpSensor<ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    let sensor = PulseCounterUlpSensor::new(
        sensor_config(counter_config(CountMode::Increment, CountMode::Disable)),
        clock.clone(),
        rates.boxed(),
    );
    (sensor, clock)
}

#[test]
fn test_wake_reconstructs_last_sample_time() {
    let rates = Recorder::default();
    let mut ulp = boot_and_sleep(Duration::from_secs(300), &rates);
    assert_eq!(ulp.wakeup_cause(), WakeupCause::Timer);

    let (mut sensor, clock) = wake_sensor(&rates);
    sensor.setup(&mut ulp).expect("resume");

    let state = sensor.program().expect("program").peek_state();
    assert_eq!(state.run_count, 15_000);
    assert_eq!(state.elapsed_estimate(), Duration::from_secs(300));
    assert_eq!(
        sensor.sampling_state(),
        SamplingState::Running {
            last_sample_time: Timestamp::from_micros(-300_000_000)
        }
    );

    // First awake tick covers the whole sleep plus the awake minute.
    ulp.advance(MINUTE);
    clock.advance(MINUTE);
    sensor.update();
    assert_eq!(rates.values(), vec![45.0, 45.0]);
}

#[test]
fn test_wake_does_not_reinitialize() {
    let rates = Recorder::default();
    let mut ulp = boot_and_sleep(Duration::from_secs(10), &rates);
    let before = ulp.rtc_memory().variables().dump();

    let (mut sensor, _clock) = wake_sensor(&rates);
    sensor.setup(&mut ulp).expect("resume");
    assert_eq!(ulp.rtc_memory().variables().dump(), before);
}

#[test]
fn test_software_reset_restarts_counting() {
    let rates = Recorder::default();
    let mut ulp = boot_and_sleep(Duration::from_secs(10), &rates);
    ulp.software_reset();

    let (mut sensor, clock) = wake_sensor(&rates);
    sensor.setup(&mut ulp).expect("start");
    assert_eq!(sensor.sampling_state(), SamplingState::Uninitialized);
    assert_eq!(sensor.program().expect("program").peek_state().run_count, 0);

    sensor.update();
    ulp.advance(MINUTE);
    clock.advance(MINUTE);
    sensor.update();
    assert_eq!(rates.values().len(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The reconstructed snapshot time is off by less than one sample period.
    #[test]
    fn reconstruction_within_one_period(sleep_ms in 1_000u64..600_000) {
        let rates = Recorder::default();
        let mut ulp = boot_and_sleep(Duration::from_millis(sleep_ms), &rates);
        let (mut sensor, _clock) = wake_sensor(&rates);
        sensor.setup(&mut ulp).expect("resume");

        let SamplingState::Running { last_sample_time } = sensor.sampling_state() else {
            panic!("sensor must be running after a wake");
        };
        let true_micros = -(sleep_ms as i64) * 1000;
        let error = (last_sample_time.as_micros() - true_micros).abs();
        prop_assert!(error < 20_000, "reconstruction off by {} µs", error);
    }
}

fn device_config(extra: &str) -> PulseUlpConfig {
    let body = format!(
        r#"
[shared]
service_name = "meter"

[counter]
name = "water"
pin = 33
total = true

[simulation]
pulse_frequency_hz = 0.75
pulse_width_ms = 250
awake_ticks = 1
sleep_ms = 300000
cycles = 3
{extra}
"#
    );
    PulseUlpConfig::from_toml(&body).expect("config")
}

fn recording_sinks(rates: &Recorder, totals: &Recorder) -> impl FnMut(&SensorConfig) -> Sinks {
    let rates = rates.clone();
    let totals = totals.clone();
    move |_: &SensorConfig| Sinks {
        rate: rates.boxed(),
        total: Some(totals.boxed()),
    }
}

#[test]
fn test_device_cycles_keep_rate_and_total() {
    let rates = Recorder::default();
    let totals = Recorder::default();
    let mut device = DeviceCore::new(device_config(""), false).expect("device");

    let stats = device.run(recording_sinks(&rates, &totals)).expect("run");
    assert_eq!(stats.boots, 3);
    assert_eq!(stats.ticks, 6);
    assert_eq!(stats.sleeps, 3);
    assert_eq!(stats.consistency_faults, 0);

    // One rate per minute awake, one per sleep after each wake.
    let values = rates.values();
    assert_eq!(values.len(), 5);
    for rate in values {
        assert_close(rate, 45.0, 0.01);
    }

    // Total survives deep sleep and matches every pulse until the last tick.
    let end = Duration::from_secs(2 * 360 + 60);
    let expected = meter().rising_edges_until(end) as f32;
    assert_eq!(totals.values().last().copied(), Some(expected));
}

#[test]
fn test_device_calibrates_drifting_oscillator() {
    let rates = Recorder::default();
    let totals = Recorder::default();
    let mut device = DeviceCore::new(device_config("clock_drift_ppm = 50000"), false)
        .expect("device");

    device.run(recording_sinks(&rates, &totals)).expect("run");
    for rate in rates.values() {
        assert_close(rate, 45.0, 0.2);
    }
}

#[test]
fn test_device_stops_on_running_flag() {
    let mut device = DeviceCore::new(device_config(""), false).expect("device");
    let flag = device.running_flag();

    struct StopOnPublish(Arc<AtomicBool>);
    impl pulse_ulp::sink::SensorSink for StopOnPublish {
        fn publish(&mut self, _value: f32) {
            self.0.store(false, Ordering::SeqCst);
        }
    }

    let stats = device
        .run(move |_| Sinks {
            rate: Box::new(StopOnPublish(Arc::clone(&flag))),
            total: None,
        })
        .expect("run");
    assert_eq!(stats.boots, 1);
    assert_eq!(stats.sleeps, 0);
}

#[test]
fn test_device_reports_startup_failure() {
    let mut device = DeviceCore::new(device_config(""), false).expect("device");
    device.ulp_mut().fail_next_load(UlpError::InvalidMagic);

    let result = device.run(|_| Sinks {
        rate: Recorder::default().boxed(),
        total: None,
    });
    assert!(matches!(
        result,
        Err(CoreError::Startup(StartupError::LoadFailed(_)))
    ));
}

#[test]
fn test_device_logs_setup_warnings_on_cold_boot() {
    let mut config = device_config("");
    config.counter.pin = 5;
    let mut device = DeviceCore::new(config, false).expect("device");

    let stats = device
        .run(|_| Sinks {
            rate: Recorder::default().boxed(),
            total: None,
        })
        .expect("run");
    assert_eq!(stats.config_warnings, 1);
    assert_eq!(stats.boots, 3);
}

#[test]
fn test_device_without_warnings_logs_none() {
    let mut device = DeviceCore::new(device_config(""), false).expect("device");
    let stats = device
        .run(|_| Sinks {
            rate: Recorder::default().boxed(),
            total: None,
        })
        .expect("run");
    assert_eq!(stats.config_warnings, 0);
}

#[test]
fn test_device_rejects_invalid_config() {
    let mut config = device_config("");
    config.counter.count_mode.rising_edge = CountMode::Disable;
    assert!(matches!(
        DeviceCore::new(config, false),
        Err(CoreError::Config(_))
    ));
}

#[test]
fn test_shipped_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/pulse_ulp.toml");
    let config = PulseUlpConfig::load_validated(&path).expect("shipped config");
    assert!(config.counter.total);
    assert_eq!(config.line_gpio(), 33);
}
