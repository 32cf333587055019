//! I/O Device Core (spec.md §4.1, §2 IODEV).
//!
//! The polymorphic substrate every backend realizes: nodes, streams,
//! buffer accounting, volume/gain, DSP hooks, rate estimation, all
//! folded into one owning struct, since spec.md describes `IODevice` as
//! a single owning unit rather than separate description/dispatch types.

pub mod backend;
pub mod buffer;
#[cfg(feature = "cpal-backend")]
pub mod cpal_backend;
pub mod dsp;
pub mod error;
pub mod format;
pub mod node;
pub mod volume;

use crate::ids::DeviceId;
use crate::rate_estimate::RateEstimator;

pub use backend::{AudioBackend, BackendKind};
pub use error::{IodevError, IodevResult};
pub use format::{NegotiatedFormat, SampleType, StreamFormat};
pub use node::{IoNode, IoNodeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// One hardware playback or capture endpoint (spec.md §3 "IODevice").
pub struct IODevice {
    pub id: DeviceId,
    pub direction: Direction,
    pub name: String,
    backend: Box<dyn AudioBackend>,

    format: Option<NegotiatedFormat>,
    ring_buffer_frames: u32,
    min_cb_level: u32,
    max_cb_level: u32,

    nodes: Vec<IoNode>,
    active_node_index: Option<u32>,

    streams: buffer::BufferShare,
    rate_estimator: RateEstimator,
    dsp: Box<dyn dsp::DspContext>,
    hooks: dsp::LoopbackHooks,

    system_volume: u8,
    system_capture_gain: i32,
    muted: bool,
    capture_muted: bool,

    pub enabled: bool,
    pub idle_timeout_deadline: Option<std::time::Instant>,
}

impl IODevice {
    pub fn new(
        id: DeviceId,
        direction: Direction,
        name: impl Into<String>,
        backend: Box<dyn AudioBackend>,
        min_cb_level: u32,
        max_cb_level: u32,
    ) -> IodevResult<Self> {
        if min_cb_level > max_cb_level {
            return Err(IodevError::NoMatchingFormat);
        }
        Ok(Self {
            id,
            direction,
            name: name.into(),
            backend,
            format: None,
            ring_buffer_frames: max_cb_level,
            min_cb_level,
            max_cb_level,
            nodes: Vec::new(),
            active_node_index: None,
            streams: buffer::BufferShare::new(),
            rate_estimator: RateEstimator::new(48_000),
            dsp: Box::new(dsp::NoopDspContext),
            hooks: dsp::LoopbackHooks::default(),
            system_volume: 100,
            system_capture_gain: 0,
            muted: false,
            capture_muted: false,
            enabled: false,
            idle_timeout_deadline: None,
        })
    }

    // ---- node lifecycle (spec.md §4.1 "Node lifecycle") ----

    pub fn add_node(&mut self, node: IoNode) {
        self.nodes.push(node);
    }

    pub fn rm_node(&mut self, index: u32) {
        self.nodes.retain(|n| n.index != index);
        if self.active_node_index == Some(index) {
            self.active_node_index = None;
        }
    }

    pub fn nodes(&self) -> &[IoNode] {
        &self.nodes
    }

    pub fn node_mut(&mut self, index: u32) -> IodevResult<&mut IoNode> {
        self.nodes
            .iter_mut()
            .find(|n| n.index == index)
            .ok_or(IodevError::NodeNotFound(index))
    }

    pub fn active_node(&self) -> Option<&IoNode> {
        self.active_node_index
            .and_then(|idx| self.nodes.iter().find(|n| n.index == idx))
    }

    /// No-op if `index` is already active.
    pub fn set_active_node(&mut self, index: u32) -> IodevResult<()> {
        if self.active_node_index == Some(index) {
            return Ok(());
        }
        if !self.nodes.iter().any(|n| n.index == index) {
            return Err(IodevError::NodeNotFound(index));
        }
        self.active_node_index = Some(index);
        let enabled = self.enabled;
        self.backend.update_active_node(index, enabled);
        Ok(())
    }

    /// Picks the best-ranked plugged node via [`node::better`] and makes
    /// it active, as happens after a plug event.
    pub fn select_best_node(&mut self) -> IodevResult<()> {
        let best_index = self
            .nodes
            .iter()
            .filter(|n| n.plugged)
            .fold(None, |best: Option<&IoNode>, candidate| match best {
                None => Some(candidate),
                Some(b) if node::better(candidate, b) => Some(candidate),
                Some(b) => Some(b),
            })
            .map(|n| n.index);

        match best_index {
            Some(idx) => self.set_active_node(idx),
            None => Err(IodevError::NoActiveNode),
        }
    }

    // ---- open/close (spec.md §3 invariant, §4.1 "Format negotiation") ----

    pub fn is_open(&self) -> bool {
        self.backend.is_open()
    }

    pub fn open(&mut self, requested: StreamFormat) -> IodevResult<()> {
        if self.backend.is_open() {
            return Err(IodevError::AlreadyOpen);
        }
        if self.active_node().is_none() {
            return Err(IodevError::NoActiveNode);
        }
        let supported = self.backend.update_supported_formats();
        let negotiated = format::negotiate_format(requested, &supported)?;
        self.backend.open_dev(negotiated.hardware)?;
        self.backend.update_channel_layout();
        self.format = Some(negotiated);
        self.rate_estimator.reset(negotiated.hardware.rate);
        self.enabled = true;
        Ok(())
    }

    pub fn close(&mut self) -> IodevResult<()> {
        if !self.backend.is_open() {
            return Err(IodevError::NotOpen);
        }
        self.backend.close_dev();
        self.format = None;
        self.enabled = false;
        self.streams = buffer::BufferShare::new();
        Ok(())
    }

    pub fn format(&self) -> Option<NegotiatedFormat> {
        self.format
    }

    // ---- streams / buffer accounting ----

    pub fn add_stream(&mut self, stream_id: u32) {
        self.streams.add_stream(stream_id);
    }

    pub fn rm_stream(&mut self, stream_id: u32) {
        self.streams.rm_stream(stream_id);
    }

    pub fn stream_written(&mut self, stream_id: u32, n: u64) -> IodevResult<()> {
        self.streams.stream_written(stream_id, n)
    }

    pub fn all_streams_written(&mut self) -> u64 {
        self.streams.all_streams_written()
    }

    pub fn max_stream_offset(&self) -> u64 {
        self.streams.max_stream_offset()
    }

    pub fn stream_offset(&self, stream_id: u32) -> IodevResult<u64> {
        self.streams.stream_offset(stream_id)
    }

    // ---- rate / latency ----

    pub fn update_rate_observation(&mut self, frames: u32) {
        self.rate_estimator.update(frames);
    }

    pub fn get_est_rate_ratio(&self) -> f64 {
        self.rate_estimator.get_est_rate_ratio()
    }

    /// Backend hardware delay plus the DSP pipeline delay (spec.md §4.1
    /// "Latency").
    pub fn delay_frames(&self) -> u32 {
        self.backend.delay_frames() + self.dsp.pipeline_delay_frames()
    }

    // ---- volume / gain (spec.md §4.1 "Volume and gain") ----

    pub fn set_system_volume(&mut self, v: u8) {
        self.system_volume = v;
        self.apply_output_volume();
    }

    pub fn set_mute(&mut self, muted: bool) {
        self.muted = muted;
        self.backend.set_mute(muted);
    }

    pub fn set_system_capture_gain(&mut self, gain: i32) {
        self.system_capture_gain = gain;
        self.apply_capture_gain();
    }

    pub fn set_capture_mute(&mut self, muted: bool) {
        self.capture_muted = muted;
        self.backend.set_capture_mute(muted);
    }

    /// Software and hardware volume are mutually exclusive: when the
    /// active node needs software scaling, the backend is left alone and
    /// [`current_output_scaler`](Self::current_output_scaler) is what the
    /// mixer must consult instead (spec.md §4.1 "Volume and gain").
    fn apply_output_volume(&mut self) {
        let Some(node) = self.active_node() else {
            return;
        };
        if node.software_volume_needed {
            return;
        }
        let effective = volume::effective_output_volume(self.system_volume, node.volume);
        self.backend.set_volume(effective);
    }

    /// Scaler the mixer should apply to this device's output in lieu of
    /// hardware volume, or `None` when the backend handles volume itself.
    pub fn current_output_scaler(&self) -> Option<f32> {
        let node = self.active_node()?;
        if !node.software_volume_needed {
            return None;
        }
        let effective = volume::effective_output_volume(self.system_volume, node.volume);
        node.softvol_scalers.as_ref().map(|table| table.scaler_for(effective))
    }

    fn apply_capture_gain(&mut self) {
        let Some(node) = self.active_node() else {
            return;
        };
        if node.software_capture_gain_needed {
            return;
        }
        let effective = volume::effective_capture_gain(
            self.system_capture_gain,
            node.capture_gain,
            node.max_software_gain,
        );
        self.backend.set_capture_gain(effective);
    }

    /// Linear capture scaler the mixer should apply in lieu of hardware
    /// gain, or `None` when the backend handles capture gain itself.
    pub fn current_capture_scaler(&self) -> Option<f32> {
        let node = self.active_node()?;
        if !node.software_capture_gain_needed {
            return None;
        }
        let effective = volume::effective_capture_gain(
            self.system_capture_gain,
            node.capture_gain,
            node.max_software_gain,
        );
        Some(volume::capture_gain_to_linear(effective))
    }

    /// Marks every node on this device plugged (spec.md §4.3 Connection
    /// Watch "mark its nodes plugged").
    pub fn plug_all_nodes(&mut self) {
        for node in &mut self.nodes {
            node.plug();
        }
    }

    // ---- DSP hooks ----

    pub fn set_pre_dsp_hook(&mut self, hook: Option<dsp::LoopbackHook>) {
        self.hooks.set_pre_dsp(hook);
    }

    pub fn set_post_dsp_hook(&mut self, hook: Option<dsp::LoopbackHook>) {
        self.hooks.set_post_dsp(hook);
    }
}
