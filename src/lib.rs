//! # libplc
//!
//! This crate provides communication with a PLC that streams ASCII sensor telemetry
//! (`TEMPERATURE:<n>,PRESSURE:<n>,SPEED:<n>\n`) over a serial port.
//! It handles line buffering, parsing, connection health monitoring with automatic
//! reconnects, and exposes a thread-safe API for querying the latest reading and a
//! bounded history of recent readings.
//!

use std::io;
use thiserror::Error;

pub mod config;
pub mod health;
pub mod link;
pub mod parser;
pub mod reader;
pub mod reading;

pub use config::{AppConfig, MockConfig, MockSensor, ReaderConfig};
pub use health::ConnectionStatus;
pub use link::LinkManager;
pub use reader::PlcReader;
pub use reading::{ReadingStore, SensorReading};

#[derive(Error, Debug)]
/// Errors that can occur when communicating with the PLC.
pub enum PlcError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Thread communication error: {0}")]
    ThreadComm(String),
}
