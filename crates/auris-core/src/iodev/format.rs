//! Format negotiation (spec.md §4.1 "Format negotiation").

use super::error::{IodevError, IodevResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    S16Le,
    S24Le,
    S32Le,
    F32Le,
}

/// A concrete hardware or stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub rate: u32,
    pub channels: u8,
    pub sample_type: SampleType,
}

/// Hardware format plus the externally visible one, which may differ
/// after DSP (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub hardware: StreamFormat,
    pub external: StreamFormat,
}

/// Picks a hardware format compatible with `requested` out of
/// `supported`: the first entry whose rate, channel count, and sample
/// type all match. If nothing matches exactly, falls back to the
/// supported format with the closest rate and keeps `external` equal to
/// `requested`, so conversion happens in the per-stream mixer layer
/// (spec.md §4.1).
pub fn negotiate_format(
    requested: StreamFormat,
    supported: &[StreamFormat],
) -> IodevResult<NegotiatedFormat> {
    if supported.is_empty() {
        return Err(IodevError::NoMatchingFormat);
    }

    if let Some(exact) = supported.iter().find(|f| **f == requested) {
        return Ok(NegotiatedFormat {
            hardware: *exact,
            external: *exact,
        });
    }

    let closest = supported
        .iter()
        .min_by_key(|f| (f.rate as i64 - requested.rate as i64).unsigned_abs())
        .copied()
        .expect("supported is non-empty");

    Ok(NegotiatedFormat {
        hardware: closest,
        external: requested,
    })
}
