//! DSP hook points (spec.md §4.1 "DSP hooks", "Latency").
//!
//! No DSP algorithm is specified (spec.md §1 Non-goals); this only
//! carries the pipeline delay query and the two optional loopback taps.

/// Per-device signal-processing pipeline state. The iodev core only
/// needs the delay it contributes, to compose into `delay_frames`.
pub trait DspContext {
    /// Extra delay, in frames, the pipeline adds on top of hardware
    /// delay.
    fn pipeline_delay_frames(&self) -> u32;
}

/// A DSP context with no pipeline and therefore no added delay.
pub struct NoopDspContext;

impl DspContext for NoopDspContext {
    fn pipeline_delay_frames(&self) -> u32 {
        0
    }
}

/// A synchronous loopback tap. Runs on the audio thread between
/// `get_buffer`/`put_buffer`; must not block or call back into iodev
/// mutating operations (spec.md §4.1).
pub type LoopbackHook = Box<dyn FnMut(&[f32]) + Send>;

/// Holds the optional pre-DSP and post-DSP loopback hooks for one output
/// device. Setting a hook to `None` clears it.
#[derive(Default)]
pub struct LoopbackHooks {
    pre_dsp: Option<LoopbackHook>,
    post_dsp: Option<LoopbackHook>,
}

impl LoopbackHooks {
    pub fn set_pre_dsp(&mut self, hook: Option<LoopbackHook>) {
        self.pre_dsp = hook;
    }

    pub fn set_post_dsp(&mut self, hook: Option<LoopbackHook>) {
        self.post_dsp = hook;
    }

    /// Invoked with the mixed-but-unprocessed frames.
    pub fn run_pre_dsp(&mut self, frames: &[f32]) {
        if let Some(hook) = &mut self.pre_dsp {
            hook(frames);
        }
    }

    /// Invoked with the final frames sent to hardware.
    pub fn run_post_dsp(&mut self, frames: &[f32]) {
        if let Some(hook) = &mut self.post_dsp {
            hook(frames);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn clearing_a_hook_stops_further_invocations() {
        let mut hooks = LoopbackHooks::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        hooks.set_pre_dsp(Some(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })));

        hooks.run_pre_dsp(&[0.0; 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        hooks.set_pre_dsp(None);
        hooks.run_pre_dsp(&[0.0; 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pre_and_post_are_independent() {
        let mut hooks = LoopbackHooks::default();
        let pre_calls = Arc::new(AtomicUsize::new(0));
        let post_calls = Arc::new(AtomicUsize::new(0));
        let pc = pre_calls.clone();
        let qc = post_calls.clone();
        hooks.set_pre_dsp(Some(Box::new(move |_| {
            pc.fetch_add(1, Ordering::SeqCst);
        })));
        hooks.set_post_dsp(Some(Box::new(move |_| {
            qc.fetch_add(1, Ordering::SeqCst);
        })));

        hooks.run_post_dsp(&[0.0; 4]);
        assert_eq!(pre_calls.load(Ordering::SeqCst), 0);
        assert_eq!(post_calls.load(Ordering::SeqCst), 1);
    }
}
