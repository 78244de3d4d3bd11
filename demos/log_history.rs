use chrono::Local;
use libplc::{PlcReader, ReaderConfig, SensorReading};
use std::{
    env,
    fs::File,
    io::{self, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

fn write_csv_record(
    wtr: &mut csv::Writer<File>,
    reading: &SensorReading,
) -> Result<(), csv::Error> {
    wtr.write_record(&[
        reading.timestamp.to_rfc3339(),
        reading.temperature.to_string(),
        reading.pressure.to_string(),
        reading.speed.to_string(),
        reading.raw.clone(),
    ])
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init()
        .unwrap();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <serial_port_path> [baud_rate]", args[0]);
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

    // --- CSV Setup ---
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let csv_filename = format!("plc_data_{}.csv", timestamp);
    let mut wtr = csv::Writer::from_path(&csv_filename)?;
    println!("Writing data to {}", csv_filename);
    wtr.write_record(["timestamp", "temperature", "pressure", "speed", "raw"])?;

    let mut reader = PlcReader::new(config);
    reader.start();

    // --- Graceful Shutdown Setup ---
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;
    println!("Press Ctrl+C to stop recording.");

    // --- Status & Loop Setup ---
    let mut reading_count = 0u64;
    let mut last_written = None;
    let mut last_status_time = Instant::now();
    let status_interval = Duration::from_millis(500);

    while running.load(Ordering::SeqCst) {
        match reader.latest() {
            Some(reading) if last_written != Some(reading.timestamp) => {
                last_written = Some(reading.timestamp);
                reading_count += 1;
                write_csv_record(&mut wtr, &reading)?;
            }
            _ => {
                std::thread::sleep(Duration::from_millis(10));
            }
        }

        // --- Status Update ---
        let now = Instant::now();
        if now.duration_since(last_status_time) >= status_interval {
            let status = reader.status();
            let file_size_mb = wtr.get_ref().metadata()?.len() as f64 / (1024.0 * 1024.0);

            print!(
                "\rStatus | Healthy: {:>5} | Readings: {:>8} | Rejected: {:>5} | File Size: {:>8.2} MB",
                status.is_healthy,
                reading_count,
                reader.rejected(),
                file_size_mb
            );
            io::stdout().flush()?;

            last_status_time = now;
        }
    }

    // --- Finalization ---
    wtr.flush()?;
    let final_file_size = File::open(&csv_filename)?.metadata()?.len();

    println!("\n\nFinished recording.");
    println!("Wrote {} readings to {}", reading_count, csv_filename);
    println!(
        "Final file size: {:.2} MB",
        final_file_size as f64 / (1024.0 * 1024.0)
    );
    println!("Total lines rejected: {}", reader.rejected());

    reader.stop()?;
    Ok(())
}
