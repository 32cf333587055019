//! Device List (spec.md §4.2 referenced via §6 "DEVLIST", §2 DEVLIST).
//!
//! The set of enabled devices, keyed by [`DeviceId`]. `suspend_dev` /
//! `resume_dev` are the two operations the profile-switch FSM drives
//! (spec.md §4.3, §6); suspend remembers the format in use so resume can
//! reopen without the caller having to re-negotiate.

use std::collections::HashMap;

use crate::ids::DeviceId;
use crate::iodev::{IODevice, IodevError, IodevResult, StreamFormat};

pub struct DeviceList {
    devices: HashMap<DeviceId, IODevice>,
    last_format: HashMap<DeviceId, StreamFormat>,
}

impl Default for DeviceList {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceList {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
            last_format: HashMap::new(),
        }
    }

    pub fn insert(&mut self, device: IODevice) {
        self.devices.insert(device.id, device);
    }

    pub fn remove(&mut self, id: DeviceId) -> Option<IODevice> {
        self.last_format.remove(&id);
        self.devices.remove(&id)
    }

    pub fn get(&self, id: DeviceId) -> Option<&IODevice> {
        self.devices.get(&id)
    }

    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut IODevice> {
        self.devices.get_mut(&id)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.contains_key(&id)
    }

    /// Suspends `id` if open: closes the device, remembering its format
    /// so `resume_dev` can reopen without a fresh format negotiation.
    pub fn suspend_dev(&mut self, id: DeviceId) -> IodevResult<()> {
        let dev = self.devices.get_mut(&id).ok_or(IodevError::NotOpen)?;
        if let Some(format) = dev.format() {
            self.last_format.insert(id, format.external);
        }
        if dev.is_open() {
            dev.close()?;
        }
        Ok(())
    }

    /// Resumes `id` using the format it was suspended with. No-op if the
    /// device is already open.
    pub fn resume_dev(&mut self, id: DeviceId) -> IodevResult<()> {
        let format = self
            .last_format
            .get(&id)
            .copied()
            .ok_or(IodevError::NoMatchingFormat)?;
        let dev = self.devices.get_mut(&id).ok_or(IodevError::NotOpen)?;
        if dev.is_open() {
            return Ok(());
        }
        dev.open(format)
    }

    pub fn enabled_ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices.values().filter(|d| d.enabled).map(|d| d.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iodev::backend::{BackendKind, TestBackend};
    use crate::iodev::{Direction, IoNode, IoNodeType, SampleType};

    fn fmt() -> StreamFormat {
        StreamFormat {
            rate: 48_000,
            channels: 2,
            sample_type: SampleType::S16Le,
        }
    }

    fn device(id: u32) -> IODevice {
        let backend = TestBackend::new(BackendKind::Test, vec![fmt()]);
        let mut dev = IODevice::new(
            DeviceId::new(id),
            Direction::Output,
            "out",
            Box::new(backend),
            240,
            8192,
        )
        .unwrap();
        dev.add_node(IoNode::new(dev.id, 0, IoNodeType::Speaker, "Speaker", 1));
        dev.set_active_node(0).unwrap();
        dev.open(fmt()).unwrap();
        dev
    }

    #[test]
    fn suspend_then_resume_reopens_with_remembered_format() {
        let mut list = DeviceList::new();
        let id = DeviceId::new(1);
        list.insert(device(1));

        list.suspend_dev(id).unwrap();
        assert!(!list.get(id).unwrap().is_open());

        list.resume_dev(id).unwrap();
        assert!(list.get(id).unwrap().is_open());
    }

    #[test]
    fn resume_on_already_open_device_is_a_noop() {
        let mut list = DeviceList::new();
        let id = DeviceId::new(1);
        list.insert(device(1));
        list.suspend_dev(id).unwrap();
        list.resume_dev(id).unwrap();
        assert!(list.resume_dev(id).is_ok());
    }

    #[test]
    fn suspend_on_unknown_device_is_an_error() {
        let mut list = DeviceList::new();
        assert!(list.suspend_dev(DeviceId::new(99)).is_err());
    }
}
