//! SCO refcount (spec.md §5 "SCO refcount", §8 scenario 6).
//!
//! `get_sco` / `put_sco` form a bounded-lifetime resource-acquisition
//! pair on a BT device: the first `get` establishes the socket, each
//! subsequent `get` increments the count, and only the matching last
//! `put` tears it down. A failed `get` returns an error without
//! incrementing.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoError {
    #[error("failed to open SCO socket")]
    SocketOpenFailed,
}

/// Codec negotiated on the SCO link (spec.md GLOSSARY: CVSD=1, mSBC=2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoCodec {
    Cvsd,
    Msbc,
}

#[derive(Debug, Default)]
pub struct ScoHandle {
    refcount: u32,
}

impl ScoHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    /// `establish` is called only on the first acquisition. If it fails
    /// the refcount is left untouched.
    pub fn get_sco(
        &mut self,
        establish: impl FnOnce() -> Result<(), ScoError>,
    ) -> Result<(), ScoError> {
        if self.refcount == 0 {
            establish()?;
        }
        self.refcount += 1;
        Ok(())
    }

    /// `teardown` is called only when the last outstanding reference is
    /// released. A `put` with no outstanding `get` is a no-op.
    pub fn put_sco(&mut self, teardown: impl FnOnce()) {
        if self.refcount == 0 {
            return;
        }
        self.refcount -= 1;
        if self.refcount == 0 {
            teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn two_gets_one_put_leaves_connection_up() {
        let mut handle = ScoHandle::new();
        let established = AtomicUsize::new(0);
        let torn_down = AtomicUsize::new(0);

        handle.get_sco(|| {
            established.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        handle.get_sco(|| {
            established.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert_eq!(established.load(Ordering::SeqCst), 1, "second get must not re-establish");
        assert_eq!(handle.refcount(), 2);

        handle.put_sco(|| {
            torn_down.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(torn_down.load(Ordering::SeqCst), 0, "connection remains up");
        assert_eq!(handle.refcount(), 1);
    }

    #[test]
    fn matching_last_put_tears_down() {
        let mut handle = ScoHandle::new();
        let torn_down = AtomicUsize::new(0);
        handle.get_sco(|| Ok(())).unwrap();
        handle.get_sco(|| Ok(())).unwrap();

        handle.put_sco(|| {
            torn_down.fetch_add(1, Ordering::SeqCst);
        });
        handle.put_sco(|| {
            torn_down.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(torn_down.load(Ordering::SeqCst), 1);
        assert_eq!(handle.refcount(), 0);
    }

    #[test]
    fn failed_get_does_not_increment_refcount() {
        let mut handle = ScoHandle::new();
        let result = handle.get_sco(|| Err(ScoError::SocketOpenFailed));
        assert!(result.is_err());
        assert_eq!(handle.refcount(), 0);
    }

    #[test]
    fn put_without_a_get_is_a_noop() {
        let mut handle = ScoHandle::new();
        handle.put_sco(|| panic!("teardown must not run"));
        assert_eq!(handle.refcount(), 0);
    }
}
