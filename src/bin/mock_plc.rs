//! Mock PLC transmitter.
//!
//! Emits wire-format telemetry lines (`TEMPERATURE:25.5,PRESSURE:101.3,SPEED:150\n`)
//! on a serial port so the reader can be exercised without hardware. Sensor
//! ranges, precision and the transmit interval come from the `[mock]` section
//! of the config file.

use libplc::{AppConfig, MockSensor, PlcError};
use log::{error, info};
use rand::Rng;
use std::env;
use std::io::Write;
use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

fn sample_value(rng: &mut impl Rng, sensor: &MockSensor) -> f64 {
    let value = rng.gen_range(sensor.min_value..=sensor.max_value);
    let factor = 10f64.powi(sensor.precision as i32);
    (value * factor).round() / factor
}

fn format_value(value: f64, precision: u8) -> String {
    if precision == 0 {
        format!("{}", value.round() as i64)
    } else {
        format!("{:.*}", precision as usize, value)
    }
}

fn format_message(rng: &mut impl Rng, sensors: &[MockSensor]) -> String {
    let fields: Vec<String> = sensors
        .iter()
        .map(|sensor| {
            let value = sample_value(rng, sensor);
            format!(
                "{}:{}",
                sensor.name.to_ascii_uppercase(),
                format_value(value, sensor.precision)
            )
        })
        .collect();
    format!("{}\n", fields.join(","))
}

fn main() -> Result<(), PlcError> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    let args: Vec<String> = env::args().collect();
    let config_path = args.get(1).map(String::as_str).unwrap_or("config.toml");
    let config = AppConfig::load(Path::new(config_path))?;
    let mock = config.mock;

    if mock.sensors.is_empty() {
        return Err(PlcError::Config("no mock sensors configured".into()));
    }

    info!(
        "Opening {} at {} baud, transmitting every {:.1}s",
        mock.port, mock.baud_rate, mock.interval_secs
    );
    let mut port = serialport::new(&mock.port, mock.baud_rate)
        .timeout(Duration::from_secs(1))
        .open()?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| PlcError::ThreadComm(e.to_string()))?;
    println!("Press Ctrl+C to stop transmitting.");

    let mut rng = rand::thread_rng();
    while running.load(Ordering::SeqCst) {
        let message = format_message(&mut rng, &mock.sensors);
        print!("Sending: {}", message);
        if let Err(e) = port.write_all(message.as_bytes()).and_then(|()| port.flush()) {
            error!("Write failed: {}", e);
            return Err(PlcError::Io(e));
        }
        std::thread::sleep(mock.interval());
    }

    info!("Mock PLC stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libplc::MockConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn precision_zero_emits_integers() {
        assert_eq!(format_value(150.4, 0), "150");
        assert_eq!(format_value(25.55, 1), "25.6");
        assert_eq!(format_value(101.0, 2), "101.00");
    }

    #[test]
    fn sampled_values_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let sensor = MockSensor {
            name: "SPEED".into(),
            min_value: 0.0,
            max_value: 3000.0,
            precision: 0,
        };
        for _ in 0..100 {
            let value = sample_value(&mut rng, &sensor);
            assert!((0.0..=3000.0).contains(&value));
            assert_eq!(value, value.round());
        }
    }

    #[test]
    fn default_message_matches_wire_format() {
        let mut rng = StdRng::seed_from_u64(7);
        let message = format_message(&mut rng, &MockConfig::default().sensors);
        assert!(message.ends_with('\n'));
        assert!(message.starts_with("TEMPERATURE:"));
        // The reader's own parser must accept what the mock emits.
        let reading = libplc::parser::parse_line(message.trim_end()).unwrap();
        assert!((15.0..=35.0).contains(&reading.temperature));
        assert!((95.0..=110.0).contains(&reading.pressure));
        assert!((0.0..=3000.0).contains(&reading.speed));
    }
}
