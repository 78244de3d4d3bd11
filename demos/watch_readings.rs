use libplc::{PlcReader, ReaderConfig};
use std::{
    env,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init()
        .unwrap();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <serial_port_path> [baud_rate]", args[0]);
        eprintln!("Example: {} /dev/ttyUSB0 9600", args[0]);
        return Ok(());
    }

    let config = ReaderConfig {
        port: args[1].clone(),
        baud_rate: args
            .get(2)
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(9600),
        ..Default::default()
    };

    let mut reader = PlcReader::new(config);
    reader.start();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;
    println!("Press Ctrl+C to stop.");

    let mut last_printed = None;
    while running.load(Ordering::SeqCst) {
        match reader.latest() {
            Some(reading) if last_printed != Some(reading.timestamp) => {
                println!(
                    "[{}] temperature={} pressure={} speed={}",
                    reading.timestamp.format("%H:%M:%S%.3f"),
                    reading.temperature,
                    reading.pressure,
                    reading.speed
                );
                last_printed = Some(reading.timestamp);
            }
            _ => {
                let status = reader.status();
                if !status.is_healthy {
                    println!(
                        "Waiting for data... connected={} data_age={:?}",
                        status.is_connected, status.data_age_seconds
                    );
                }
                thread::sleep(Duration::from_millis(500));
            }
        }
        thread::sleep(Duration::from_millis(10));
    }

    reader.stop()?;
    println!("Program finished.");
    Ok(())
}
