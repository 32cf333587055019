//! Server-wide tunables.
//!
//! Loaded once at startup (YAML, via `serde_yaml`) and handed by reference
//! to every component that needs a constant from spec.md rather than having
//! each module hardcode it. Per-client wire configuration and the INI
//! blacklist parser are out of scope; this only covers the knobs the
//! components in this crate actually read.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bluetooth connection-watch FSM tuning (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnWatchConfig {
    /// Period between ticks.
    #[serde(with = "duration_millis")]
    pub tick_period: Duration,
    /// Ticks before giving up and scheduling a suspend.
    pub max_retries: u32,
}

impl Default for ConnWatchConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(2000),
            max_retries: 30,
        }
    }
}

/// Profile-switch FSM tuning (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileSwitchConfig {
    /// Delay before resuming the output direction after a switch.
    #[serde(with = "duration_millis")]
    pub output_resume_delay: Duration,
}

impl Default for ProfileSwitchConfig {
    fn default() -> Self {
        Self {
            output_resume_delay: Duration::from_millis(500),
        }
    }
}

/// Default ring buffer sizing for newly opened iodevs (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    pub ring_buffer_frames: u32,
    pub min_cb_level: u32,
    pub max_cb_level: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            ring_buffer_frames: 8192,
            min_cb_level: 240,
            max_cb_level: 8192,
        }
    }
}

/// Top-level configuration aggregating every component's tunables.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub conn_watch: ConnWatchConfig,
    pub profile_switch: ProfileSwitchConfig,
    pub buffers: BufferConfig,
}

/// `serde` helper: (de)serialize a `Duration` as whole milliseconds, so the
/// YAML file reads `tick_period_ms: 2000` instead of a nested struct.
mod duration_millis {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_literals() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.conn_watch.tick_period, Duration::from_millis(2000));
        assert_eq!(cfg.conn_watch.max_retries, 30);
        assert_eq!(
            cfg.profile_switch.output_resume_delay,
            Duration::from_millis(500)
        );
    }
}
