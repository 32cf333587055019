//! IONode (spec.md §3 "IONode", §4.1 "Node lifecycle").

use std::time::Instant;

use super::volume::SoftvolScalers;
use crate::ids::DeviceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IoNodeType {
    BuiltinMic,
    Speaker,
    Headphones,
    Hdmi,
    BluetoothA2dp,
    BluetoothHfp,
    Unknown,
}

impl IoNodeType {
    /// Lower is preferred, matching `cras_ionode_better`'s type-priority
    /// ordering (headsets generally outrank the built-in speaker/mic).
    fn priority(self) -> u8 {
        match self {
            IoNodeType::BluetoothHfp => 0,
            IoNodeType::BluetoothA2dp => 1,
            IoNodeType::Headphones => 2,
            IoNodeType::Hdmi => 3,
            IoNodeType::Speaker => 4,
            IoNodeType::BuiltinMic => 4,
            IoNodeType::Unknown => 5,
        }
    }
}

/// A selectable endpoint within a device (spec.md §3).
#[derive(Debug, Clone)]
pub struct IoNode {
    pub dev: DeviceId,
    pub index: u32,
    pub node_type: IoNodeType,
    pub name: String,
    pub stable_id: u64,
    pub plugged: bool,
    pub plugged_time: Option<Instant>,
    /// Output: 0-100.
    pub volume: u8,
    /// Input: hundredths of dBFS.
    pub capture_gain: i32,
    pub swap_channels: bool,
    pub software_volume_needed: bool,
    pub software_capture_gain_needed: bool,
    pub max_software_gain: i32,
    pub mic_position: Option<String>,
    pub softvol_scalers: Option<SoftvolScalers>,
}

impl IoNode {
    pub fn new(dev: DeviceId, index: u32, node_type: IoNodeType, name: impl Into<String>, stable_id: u64) -> Self {
        Self {
            dev,
            index,
            node_type,
            name: name.into(),
            stable_id,
            plugged: false,
            plugged_time: None,
            volume: 100,
            capture_gain: 0,
            swap_channels: false,
            software_volume_needed: false,
            software_capture_gain_needed: false,
            max_software_gain: 0,
            mic_position: None,
            softvol_scalers: None,
        }
    }

    /// Marks the node plugged and stamps the plug time, used as a
    /// tie-breaker in [`better`].
    pub fn plug(&mut self) {
        self.plugged = true;
        self.plugged_time = Some(Instant::now());
    }

    pub fn unplug(&mut self) {
        self.plugged = false;
        self.plugged_time = None;
    }
}

/// Ranks `a` against `b` by (type priority, most recently plugged,
/// highest stable_id), mirroring `cras_ionode_better`. Returns `true` if
/// `a` should be preferred over `b`.
pub fn better(a: &IoNode, b: &IoNode) -> bool {
    let pa = a.node_type.priority();
    let pb = b.node_type.priority();
    if pa != pb {
        return pa < pb;
    }
    match (a.plugged_time, b.plugged_time) {
        (Some(ta), Some(tb)) if ta != tb => return ta > tb,
        (Some(_), None) => return true,
        (None, Some(_)) => return false,
        _ => {}
    }
    a.stable_id > b.stable_id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(dev: u32, idx: u32, t: IoNodeType, stable_id: u64) -> IoNode {
        IoNode::new(DeviceId::new(dev), idx, t, "n", stable_id)
    }

    #[test]
    fn type_priority_dominates() {
        let hfp = node(0, 0, IoNodeType::BluetoothHfp, 1);
        let speaker = node(0, 1, IoNodeType::Speaker, 2);
        assert!(better(&hfp, &speaker));
        assert!(!better(&speaker, &hfp));
    }

    #[test]
    fn most_recently_plugged_wins_among_equal_priority() {
        let mut older = node(0, 0, IoNodeType::Headphones, 1);
        let mut newer = node(0, 1, IoNodeType::Headphones, 2);
        older.plug();
        std::thread::sleep(std::time::Duration::from_millis(2));
        newer.plug();
        assert!(better(&newer, &older));
    }

    #[test]
    fn stable_id_breaks_final_tie() {
        let a = node(0, 0, IoNodeType::Speaker, 5);
        let b = node(0, 1, IoNodeType::Speaker, 9);
        assert!(better(&b, &a));
    }
}
