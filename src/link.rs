//! Serial link management.
//!
//! [`LinkManager`] owns the one live serial handle. Opening, closing and
//! liveness probing happen here; retry policy does not — the health monitor
//! decides when to reconnect.

use crate::config::ReaderConfig;
use crate::PlcError;
use log::{debug, info};
use serialport::SerialPort;
use std::io::Read;
use std::sync::Mutex;
use std::time::Instant;

/// Owns the serial connection to the PLC.
///
/// At most one underlying handle is live at a time; both the ingestion and
/// the health thread share one `LinkManager` behind an `Arc`.
pub struct LinkManager {
    port_name: String,
    baud_rate: u32,
    timeout: std::time::Duration,
    port: Mutex<Option<Box<dyn SerialPort>>>,
    last_ok: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for LinkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkManager")
            .field("port_name", &self.port_name)
            .field("baud_rate", &self.baud_rate)
            .field("timeout", &self.timeout)
            .field(
                "open",
                &self.port.try_lock().map(|g| g.is_some()).unwrap_or(false),
            )
            .finish()
    }
}

impl LinkManager {
    pub fn new(config: &ReaderConfig) -> Self {
        Self {
            port_name: config.port.clone(),
            baud_rate: config.baud_rate,
            timeout: config.timeout(),
            port: Mutex::new(None),
            last_ok: Mutex::new(None),
        }
    }

    /// Opens the serial port, closing any previously open handle first.
    ///
    /// # Errors
    /// Returns [`PlcError::Serial`] if the port cannot be acquired. No retry
    /// happens here.
    pub fn open(&self) -> Result<(), PlcError> {
        let mut guard = self.port.lock().unwrap();
        if guard.take().is_some() {
            debug!("Closing stale handle before reopening {}", self.port_name);
        }

        info!(
            "Opening serial port {} at {} baud",
            self.port_name, self.baud_rate
        );
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(self.timeout)
            .open()?;
        *guard = Some(port);
        *self.last_ok.lock().unwrap() = Some(Instant::now());
        info!("Serial port {} opened", self.port_name);
        Ok(())
    }

    /// Releases the handle. Calling this on an already-closed link is a no-op.
    pub fn close(&self) {
        if self.port.lock().unwrap().take().is_some() {
            info!("Serial port {} closed", self.port_name);
        }
    }

    /// Reports liveness by probing the handle itself, so an external
    /// disconnect (cable pulled) is observed, not a cached flag.
    pub fn is_open(&self) -> bool {
        match self.port.lock().unwrap().as_mut() {
            Some(port) => port.bytes_to_read().is_ok(),
            None => false,
        }
    }

    /// Reads up to `max_bytes` of whatever is pending on the link.
    ///
    /// Returns an empty vec (not an error) when nothing arrives within the
    /// configured per-read timeout.
    ///
    /// # Errors
    /// Returns [`PlcError::Io`] on a mid-stream fault; the caller is expected
    /// to close the link and let the health monitor repair it.
    pub fn read_available(&self, max_bytes: usize) -> Result<Vec<u8>, PlcError> {
        let mut guard = self.port.lock().unwrap();
        let Some(port) = guard.as_mut() else {
            return Ok(Vec::new());
        };

        let pending = port.bytes_to_read().map_err(std::io::Error::from)? as usize;
        if pending == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; pending.min(max_bytes)];
        match port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                *self.last_ok.lock().unwrap() = Some(Instant::now());
                Ok(buf)
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(PlcError::Io(e)),
        }
    }

    /// Instant of the last successful open or read, if any.
    pub fn last_ok(&self) -> Option<Instant> {
        *self.last_ok.lock().unwrap()
    }

    /// Configured port path, for diagnostics.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_link() -> LinkManager {
        LinkManager::new(&ReaderConfig {
            port: "/dev/nonexistent-plc-port".into(),
            ..Default::default()
        })
    }

    #[test]
    fn starts_closed() {
        let link = closed_link();
        assert!(!link.is_open());
        assert!(link.last_ok().is_none());
    }

    #[test]
    fn close_is_idempotent() {
        let link = closed_link();
        link.close();
        link.close();
        assert!(!link.is_open());
    }

    #[test]
    fn open_on_missing_endpoint_fails_without_retry() {
        let link = closed_link();
        assert!(matches!(link.open(), Err(PlcError::Serial(_))));
        assert!(!link.is_open());
    }

    #[test]
    fn read_on_closed_link_yields_nothing() {
        let link = closed_link();
        let bytes = link.read_available(4096).unwrap();
        assert!(bytes.is_empty());
    }
}
