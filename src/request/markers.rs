//! Per-request timing markers.

use std::fmt;
use std::time::{Duration, Instant};

/// One labelled point in a request's life.
#[derive(Debug, Clone)]
pub struct Marker {
    pub label: String,
    pub at: Instant,
    /// Name of the thread that recorded the marker, if it has one.
    pub thread: Option<String>,
}

/// Append-only marker list, sealed when the request finishes.
#[derive(Debug, Default)]
pub(crate) struct MarkerLog {
    markers: Vec<Marker>,
    sealed: bool,
}

impl MarkerLog {
    /// Returns false when the log is already sealed.
    pub(crate) fn add(&mut self, label: impl Into<String>) -> bool {
        if self.sealed {
            return false;
        }
        self.markers.push(Marker {
            label: label.into(),
            at: Instant::now(),
            thread: std::thread::current().name().map(str::to_owned),
        });
        true
    }

    /// Seal the log. Returns false if it was sealed before.
    pub(crate) fn seal(&mut self) -> bool {
        !std::mem::replace(&mut self.sealed, true)
    }

    pub(crate) fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub(crate) fn snapshot(&self) -> Vec<Marker> {
        self.markers.clone()
    }

    /// Time between the first and the last marker.
    pub(crate) fn total(&self) -> Duration {
        match (self.markers.first(), self.markers.last()) {
            (Some(first), Some(last)) => last.at.duration_since(first.at),
            _ => Duration::ZERO,
        }
    }
}

impl fmt::Display for MarkerLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(first) = self.markers.first() else { return Ok(()) };
        let mut prev = first.at;
        for (i, marker) in self.markers.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            let step = marker.at.duration_since(prev).as_millis();
            write!(f, "(+{step}ms) {}", marker.label)?;
            if let Some(thread) = &marker.thread {
                write!(f, " [{thread}]")?;
            }
            prev = marker.at;
        }
        Ok(())
    }
}
