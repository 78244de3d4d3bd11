//! Connection health monitoring.
//!
//! Health is a derived predicate, never stored state:
//! `healthy = connected && data_age <= max_silence`, with "no reading yet"
//! always unhealthy. The monitor loop recomputes it every tick and owns the
//! reconnect policy, including the back-off after a failed reopen.

use crate::config::ReaderConfig;
use crate::link::LinkManager;
use crate::reading::ReadingStore;
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use serde::Serialize;

/// Snapshot of the connection state, as exposed to external consumers
/// (e.g. an HTTP status endpoint built on top of this crate).
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub is_healthy: bool,
    pub last_data_received: Option<DateTime<Utc>>,
    pub data_age_seconds: Option<f64>,
    pub max_silence_seconds: f64,
    pub history_size: usize,
}

/// Seconds elapsed since `last`, or `None` if nothing was ever received.
pub fn data_age_secs(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<f64> {
    last.map(|last| (now - last).num_milliseconds() as f64 / 1000.0)
}

/// The health predicate. `data_age` of `None` means no reading ever arrived,
/// which is unhealthy regardless of the connection flag.
pub fn healthy(connected: bool, data_age: Option<f64>, max_silence_secs: f64) -> bool {
    connected && matches!(data_age, Some(age) if age <= max_silence_secs)
}

/// Builds the current [`ConnectionStatus`] from live state.
pub fn status(link: &LinkManager, store: &ReadingStore, config: &ReaderConfig) -> ConnectionStatus {
    let is_connected = link.is_open();
    let last_data_received = store.last_received();
    let data_age_seconds = data_age_secs(last_data_received, Utc::now());

    ConnectionStatus {
        is_connected,
        is_healthy: healthy(is_connected, data_age_seconds, config.max_silence_secs),
        last_data_received,
        data_age_seconds,
        max_silence_seconds: config.max_silence_secs,
        history_size: store.len(),
    }
}

/// Health monitor loop. Runs until the stop channel is signalled or dropped.
///
/// Every tick: if the connection is unhealthy, close the link and try to
/// reopen it. A successful reopen does not make the connection healthy by
/// itself — only a newly recorded reading does. A failed reopen waits the
/// retry interval before the next attempt instead of hammering the endpoint.
pub fn run(
    link: &LinkManager,
    store: &ReadingStore,
    config: &ReaderConfig,
    stop_rx: &Receiver<()>,
) {
    info!(
        "Health monitor started (check every {:.1}s, max silence {:.1}s)",
        config.health_check_interval_secs, config.max_silence_secs
    );

    loop {
        let connected = link.is_open();
        let age = data_age_secs(store.last_received(), Utc::now());

        let mut wait = config.health_check_interval();
        if !healthy(connected, age, config.max_silence_secs) {
            match (connected, age) {
                (true, None) => warn!("Connected but no data ever received, recycling link"),
                (_, Some(age)) if age > config.max_silence_secs => warn!(
                    "No data for {:.1}s (max silence {:.1}s), reconnecting",
                    age, config.max_silence_secs
                ),
                _ => warn!("Link {} is not open, reconnecting", link.port_name()),
            }
            if let Some(last_ok) = link.last_ok() {
                debug!("Link last verified {:.1}s ago", last_ok.elapsed().as_secs_f64());
            }

            link.close();
            match link.open() {
                Ok(()) => info!("Reconnected to {}, awaiting data", link.port_name()),
                Err(e) => {
                    warn!(
                        "Reconnect failed: {}. Retrying in {:.1}s",
                        e, config.retry_interval_secs
                    );
                    wait = config.retry_interval();
                }
            }
        }

        match stop_rx.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }

    info!("Health monitor stopped.");
}
