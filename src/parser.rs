//! Line-protocol parser.
//!
//! One telemetry line looks like `TEMPERATURE:25.5,PRESSURE:101.3,SPEED:150`.
//! Keys are matched case-insensitively and fields may arrive in any order;
//! whitespace around fields is tolerated. All three required keys must be
//! present, every field must be `KEY:number`, and unknown keys are ignored.

use crate::reading::SensorReading;
use crate::PlcError;
use chrono::Utc;

/// Parses a single line (without its terminator) into a [`SensorReading`].
///
/// The reading's timestamp is the moment of the successful parse; the wire
/// format carries no timestamp.
///
/// # Errors
/// Returns [`PlcError::Parse`] on a missing required field, a field without a
/// colon, or a value that is not a base-10 number.
pub fn parse_line(line: &str) -> Result<SensorReading, PlcError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(PlcError::Parse("empty line".to_string()));
    }

    let mut temperature = None;
    let mut pressure = None;
    let mut speed = None;

    for field in line.split(',') {
        let field = field.trim();
        let Some((key, value)) = field.split_once(':') else {
            return Err(PlcError::Parse(format!("missing ':' in field '{field}'")));
        };

        let key = key.trim().to_ascii_lowercase();
        let value: f64 = value.trim().parse().map_err(|_| {
            PlcError::Parse(format!("invalid number '{}' for key '{key}'", value.trim()))
        })?;

        match key.as_str() {
            "temperature" => temperature = Some(value),
            "pressure" => pressure = Some(value),
            "speed" => speed = Some(value),
            // Unknown keys are tolerated as long as they are well-formed.
            _ => {}
        }
    }

    let (Some(temperature), Some(pressure), Some(speed)) = (temperature, pressure, speed) else {
        let mut missing = Vec::new();
        if temperature.is_none() {
            missing.push("TEMPERATURE");
        }
        if pressure.is_none() {
            missing.push("PRESSURE");
        }
        if speed.is_none() {
            missing.push("SPEED");
        }
        return Err(PlcError::Parse(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )));
    };

    Ok(SensorReading {
        temperature,
        pressure,
        speed,
        timestamp: Utc::now(),
        raw: line.to_string(),
    })
}
