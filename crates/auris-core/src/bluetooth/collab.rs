//! A2DP and HFP-AG collaborators (spec.md §6 "A2DP and HFP-AG
//! collaborators"): `start` / `suspend_connected_device`, called by the
//! connection-watch and suspend FSMs. No Bluetooth stack is reimplemented
//! here (spec.md §1 Non-goals) — these traits are the narrow seam BTPOL
//! calls through.

use crate::ids::BtPath;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollabError {
    #[error("{0} start failed: {1}")]
    StartFailed(&'static str, String),
}

pub trait A2dpControl: Send {
    fn start(&self, device: &BtPath) -> Result<(), CollabError>;
    fn suspend_connected_device(&self, device: &BtPath) -> Result<(), CollabError>;
}

pub trait HfpAgControl: Send {
    fn start(&self, device: &BtPath) -> Result<(), CollabError>;
    fn suspend_connected_device(&self, device: &BtPath) -> Result<(), CollabError>;
}

/// Test/offline stand-in that records calls instead of touching real
/// transport state.
#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub struct FakeCollab {
        pub started: Arc<Mutex<Vec<BtPath>>>,
        pub suspended: Arc<Mutex<Vec<BtPath>>>,
    }

    impl A2dpControl for FakeCollab {
        fn start(&self, device: &BtPath) -> Result<(), CollabError> {
            self.started.lock().unwrap().push(device.clone());
            Ok(())
        }
        fn suspend_connected_device(&self, device: &BtPath) -> Result<(), CollabError> {
            self.suspended.lock().unwrap().push(device.clone());
            Ok(())
        }
    }

    impl HfpAgControl for FakeCollab {
        fn start(&self, device: &BtPath) -> Result<(), CollabError> {
            self.started.lock().unwrap().push(device.clone());
            Ok(())
        }
        fn suspend_connected_device(&self, device: &BtPath) -> Result<(), CollabError> {
            self.suspended.lock().unwrap().push(device.clone());
            Ok(())
        }
    }
}
