//! Server Metrics (spec.md §2 MET, §6 "Metrics", §7 "reported to metrics
//! as counters"). Fire-and-forget; must never fail in a way that blocks
//! the caller.
//!
//! Metrics reporting itself is out of scope (spec.md §1), but every
//! component that emits counters needs something to call. `NoopMetrics`
//! plays the same role as a stub backend: downstream code never needs a
//! `#[cfg]` guard to compile without a real one.

use crate::msgbus::SuspendReason;

/// Fire-and-forget counters/enums emitted by other components.
pub trait Metrics: Send {
    fn transient_device_error(&self, device: &str);
    fn suspend_scheduled(&self, device: &str, reason: SuspendReason);
    fn profile_switch(&self, device: &str);
    fn connection_watch_satisfied(&self, device: &str);
    fn connection_watch_timed_out(&self, device: &str);
}

/// Logs every counter at `debug` via the `log` facade.
pub struct LogMetrics;

impl Metrics for LogMetrics {
    fn transient_device_error(&self, device: &str) {
        log::debug!("metric: transient_device_error device={device}");
    }

    fn suspend_scheduled(&self, device: &str, reason: SuspendReason) {
        log::debug!(
            "metric: suspend_scheduled device={device} reason={}",
            reason.as_str()
        );
    }

    fn profile_switch(&self, device: &str) {
        log::debug!("metric: profile_switch device={device}");
    }

    fn connection_watch_satisfied(&self, device: &str) {
        log::debug!("metric: connection_watch_satisfied device={device}");
    }

    fn connection_watch_timed_out(&self, device: &str) {
        log::debug!("metric: connection_watch_timed_out device={device}");
    }
}

/// Drops every counter. Used in unit tests where emitting metrics would
/// just be noise.
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn transient_device_error(&self, _device: &str) {}
    fn suspend_scheduled(&self, _device: &str, _reason: SuspendReason) {}
    fn profile_switch(&self, _device: &str) {}
    fn connection_watch_satisfied(&self, _device: &str) {}
    fn connection_watch_timed_out(&self, _device: &str) {}
}
