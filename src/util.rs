//! Timing helpers for logging long running phases.

use std::time::Instant;

/// RAII timer that logs elapsed time on drop.
///
/// ```ignore
/// let _t = Timed::new("write particles", true);
/// // ... do work ...
/// // logs "write particles: 1.234s" when _t is dropped
/// ```
pub(crate) struct Timed {
    name: &'static str,
    start: Instant,
    level: log::Level,
}

impl Timed {
    /// Logs at INFO level when `verbose`, at DEBUG otherwise.
    pub(crate) fn new(name: &'static str, verbose: bool) -> Self {
        let level = if verbose { log::Level::Info } else { log::Level::Debug };
        log::log!(level, "{}...", name);
        Self {
            name,
            start: Instant::now(),
            level,
        }
    }
}

impl Drop for Timed {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        log::log!(self.level, "{}: {:.3?}", self.name, elapsed);
    }
}
