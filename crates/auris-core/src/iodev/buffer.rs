//! Per-stream buffer accounting (spec.md §4.1 "Buffer accounting").
//!
//! Multiple streams attach to one device's ring buffer; each tracks its
//! own write offset. `all_streams_written` is the minimum across streams
//! — everything up to it is fully mixed and may be committed to
//! hardware — after which the shared origin rotates by that amount so
//! offsets stay small.

use std::collections::HashMap;

use super::error::{IodevError, IodevResult};

/// Write-offset tracking for every stream currently attached to a device.
#[derive(Debug, Default)]
pub struct BufferShare {
    offsets: HashMap<u32, u64>,
}

impl BufferShare {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stream(&mut self, stream_id: u32) {
        self.offsets.insert(stream_id, 0);
    }

    pub fn rm_stream(&mut self, stream_id: u32) {
        self.offsets.remove(&stream_id);
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Advances `stream_id`'s offset by `n` frames.
    pub fn stream_written(&mut self, stream_id: u32, n: u64) -> IodevResult<()> {
        let offset = self
            .offsets
            .get_mut(&stream_id)
            .ok_or(IodevError::StreamNotAttached(stream_id))?;
        *offset += n;
        Ok(())
    }

    /// The per-stream offset.
    pub fn stream_offset(&self, stream_id: u32) -> IodevResult<u64> {
        self.offsets
            .get(&stream_id)
            .copied()
            .ok_or(IodevError::StreamNotAttached(stream_id))
    }

    /// Highest offset across all streams, used for latency diagnostics.
    pub fn max_stream_offset(&self) -> u64 {
        self.offsets.values().copied().max().unwrap_or(0)
    }

    /// Minimum offset across all attached streams: frames fully mixed and
    /// committable to hardware. `None` when no stream is attached.
    pub fn min_stream_offset(&self) -> Option<u64> {
        self.offsets.values().copied().min()
    }

    /// Returns the commit amount (the minimum offset) and rotates every
    /// stream's offset down by it, preserving per-stream deltas.
    pub fn all_streams_written(&mut self) -> u64 {
        let Some(min) = self.min_stream_offset() else {
            return 0;
        };
        for offset in self.offsets.values_mut() {
            *offset -= min;
        }
        min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_streams_written_is_minimum_and_rotates_deltas() {
        let mut bs = BufferShare::new();
        bs.add_stream(1);
        bs.add_stream(2);
        bs.stream_written(1, 100).unwrap();
        bs.stream_written(2, 60).unwrap();

        let committed = bs.all_streams_written();
        assert_eq!(committed, 60);
        assert_eq!(bs.stream_offset(1).unwrap(), 40);
        assert_eq!(bs.stream_offset(2).unwrap(), 0);
    }

    #[test]
    fn max_stream_offset_tracks_the_laggard() {
        let mut bs = BufferShare::new();
        bs.add_stream(1);
        bs.add_stream(2);
        bs.stream_written(1, 100).unwrap();
        bs.stream_written(2, 60).unwrap();
        assert_eq!(bs.max_stream_offset(), 100);
    }

    #[test]
    fn removing_a_stream_does_not_disturb_others() {
        let mut bs = BufferShare::new();
        bs.add_stream(1);
        bs.add_stream(2);
        bs.stream_written(1, 50).unwrap();
        bs.stream_written(2, 70).unwrap();
        bs.rm_stream(1);
        assert_eq!(bs.stream_offset(2).unwrap(), 70);
        assert!(bs.stream_offset(1).is_err());
    }

    #[test]
    fn no_streams_attached_written_is_zero() {
        let mut bs = BufferShare::new();
        assert_eq!(bs.all_streams_written(), 0);
    }

    proptest::proptest! {
        #[test]
        fn commit_never_exceeds_any_individual_offset(
            writes in proptest::collection::vec((0u32..3, 1u64..500), 0..50)
        ) {
            let mut bs = BufferShare::new();
            bs.add_stream(0);
            bs.add_stream(1);
            bs.add_stream(2);
            for (stream, n) in writes {
                bs.stream_written(stream, n).unwrap();
            }
            let before = [
                bs.stream_offset(0).unwrap(),
                bs.stream_offset(1).unwrap(),
                bs.stream_offset(2).unwrap(),
            ];
            let min_before = *before.iter().min().unwrap();
            let committed = bs.all_streams_written();
            proptest::prop_assert_eq!(committed, min_before);
            for (id, prev) in before.into_iter().enumerate() {
                proptest::prop_assert_eq!(bs.stream_offset(id as u32).unwrap(), prev - committed);
            }
        }
    }
}
