//! Backend capability set (spec.md §4.1, §6 "Audio backend plugins").
//!
//! The backend set here is wide (ALSA-equivalent, BT A2DP, BT HFP-AG,
//! loopback, test stub) and every policy FSM needs to hold one opaquely,
//! so a trait object plays the "table of operations behind one handle"
//! role spec.md §9 asks for, rather than a closed enum of variants.

use super::format::StreamFormat;
use crate::iodev::error::IodevResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Alsa,
    BluetoothA2dp,
    BluetoothHfpAg,
    Loopback,
    Test,
}

/// Capability set every backend realizes (spec.md §4.1). Every method is
/// main-thread-only except `frames_queued`, `delay_frames`, `get_buffer`,
/// and `put_buffer`, which the audio thread calls under the discipline of
/// spec.md §5.
pub trait AudioBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Leaves the device ready to serve `frames_queued` >= the device's
    /// `min_cb_level`.
    fn open_dev(&mut self, format: StreamFormat) -> IodevResult<()>;
    fn close_dev(&mut self);
    fn is_open(&self) -> bool;

    /// Hardware formats this backend currently supports, used by format
    /// negotiation (spec.md §4.1).
    fn update_supported_formats(&mut self) -> Vec<StreamFormat>;

    /// Frames currently queued in hardware, audio-thread callable.
    fn frames_queued(&self) -> u32;
    /// Hardware delay in frames, audio-thread callable.
    fn delay_frames(&self) -> u32;

    /// Returns the number of frames available for writing/reading.
    /// Concurrent calls are not permitted (spec.md §6).
    fn get_buffer(&mut self, requested_frames: u32) -> IodevResult<u32>;
    /// Commits `n` frames; must not exceed what `get_buffer` returned.
    fn put_buffer(&mut self, n: u32) -> IodevResult<()>;
    fn flush_buffer(&mut self);

    /// 1 iff samples are actively being moved by hardware.
    fn dev_running(&self) -> bool;

    /// The only legal way the backend learns the node selection changed.
    fn update_active_node(&mut self, node_index: u32, enabled: bool);
    fn update_channel_layout(&mut self);

    fn set_volume(&mut self, effective_volume: u8);
    fn set_mute(&mut self, muted: bool);
    fn set_capture_gain(&mut self, effective_gain: i32);
    fn set_capture_mute(&mut self, muted: bool);
    fn set_swap_mode(&mut self, node_index: u32, swapped: bool);
}

/// In-memory stub used by unit tests and any context without real
/// hardware/BlueZ available.
#[derive(Debug)]
pub struct TestBackend {
    kind: BackendKind,
    open: bool,
    supported: Vec<StreamFormat>,
    queued_frames: u32,
    checked_out: Option<u32>,
    running: bool,
    pub last_active_node: Option<(u32, bool)>,
    pub last_volume: Option<u8>,
    pub last_mute: Option<bool>,
    pub last_capture_gain: Option<i32>,
    pub last_capture_mute: Option<bool>,
}

impl TestBackend {
    pub fn new(kind: BackendKind, supported: Vec<StreamFormat>) -> Self {
        Self {
            kind,
            open: false,
            supported,
            queued_frames: 0,
            checked_out: None,
            running: false,
            last_active_node: None,
            last_volume: None,
            last_mute: None,
            last_capture_gain: None,
            last_capture_mute: None,
        }
    }
}

impl AudioBackend for TestBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn open_dev(&mut self, _format: StreamFormat) -> IodevResult<()> {
        self.open = true;
        self.running = true;
        Ok(())
    }

    fn close_dev(&mut self) {
        self.open = false;
        self.running = false;
        self.queued_frames = 0;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn update_supported_formats(&mut self) -> Vec<StreamFormat> {
        self.supported.clone()
    }

    fn frames_queued(&self) -> u32 {
        self.queued_frames
    }

    fn delay_frames(&self) -> u32 {
        self.queued_frames
    }

    fn get_buffer(&mut self, requested_frames: u32) -> IodevResult<u32> {
        if self.checked_out.is_some() {
            return Err(super::error::IodevError::BufferAlreadyCheckedOut);
        }
        self.checked_out = Some(requested_frames);
        Ok(requested_frames)
    }

    fn put_buffer(&mut self, n: u32) -> IodevResult<()> {
        let available = self.checked_out.take().unwrap_or(0);
        if n > available {
            return Err(super::error::IodevError::PutBufferOverrun {
                requested: n,
                available,
            });
        }
        self.queued_frames += n;
        Ok(())
    }

    fn flush_buffer(&mut self) {
        self.queued_frames = 0;
        self.checked_out = None;
    }

    fn dev_running(&self) -> bool {
        self.running
    }

    fn update_active_node(&mut self, node_index: u32, enabled: bool) {
        self.last_active_node = Some((node_index, enabled));
    }

    fn update_channel_layout(&mut self) {}

    fn set_volume(&mut self, effective_volume: u8) {
        self.last_volume = Some(effective_volume);
    }

    fn set_mute(&mut self, muted: bool) {
        self.last_mute = Some(muted);
    }

    fn set_capture_gain(&mut self, effective_gain: i32) {
        self.last_capture_gain = Some(effective_gain);
    }

    fn set_capture_mute(&mut self, muted: bool) {
        self.last_capture_mute = Some(muted);
    }

    fn set_swap_mode(&mut self, _node_index: u32, _swapped: bool) {}
}
