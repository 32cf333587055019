//! BT Device Registry (spec.md §4.2, §2 BTREG).
//!
//! A process-wide table keyed by D-Bus object path. Deliberately knows
//! nothing about BTPOL's FSMs: [`BtRegistry::apply_event`] turns a raw
//! [`BusEvent`] into a small diff the policy engine interprets — detect
//! here, decide elsewhere.

use std::collections::HashMap;

use bitflags::bitflags;

use super::bus::{BusEvent, PropertyValue};
use super::collab::{A2dpControl, HfpAgControl};
use super::sco::ScoHandle;
use crate::ids::{BtPath, DeviceId};
use crate::iodev::Direction;

const A2DP_SINK_UUID: &str = "0000110b-0000-1000-8000-00805f9b34fb";
const HFP_HF_UUID: &str = "0000111e-0000-1000-8000-00805f9b34fb";

bitflags! {
    /// Supported/connected profile bitmask (spec.md §3 "two bitmasks").
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Profiles: u8 {
        const A2DP_SINK = 0b0000_0001;
        const HFP_HF    = 0b0000_0010;
    }
}

/// Remote Bluetooth endpoint (spec.md §3 "BTDevice").
pub struct BtDevice {
    pub path: BtPath,
    pub adapter: String,
    pub address: String,
    pub name: String,
    pub paired: bool,
    pub trusted: bool,
    pub connected: bool,
    pub supported_profiles: Profiles,
    pub connected_profiles: Profiles,
    pub active_profile: Profiles,
    pub use_hardware_volume: bool,
    /// Indexed by [`Direction`]: `iodevs[0]` is input, `iodevs[1]` output.
    iodevs: [Option<DeviceId>; 2],
    pub sco: ScoHandle,
}

impl BtDevice {
    fn new(path: BtPath, adapter: String) -> Self {
        Self {
            path,
            adapter,
            address: String::new(),
            name: String::new(),
            paired: false,
            trusted: false,
            connected: false,
            supported_profiles: Profiles::empty(),
            connected_profiles: Profiles::empty(),
            active_profile: Profiles::empty(),
            use_hardware_volume: false,
            iodevs: [None, None],
            sco: ScoHandle::new(),
        }
    }

    pub fn iodev(&self, direction: Direction) -> Option<DeviceId> {
        self.iodevs[direction as usize]
    }

    pub fn set_iodev(&mut self, direction: Direction, id: Option<DeviceId>) {
        self.iodevs[direction as usize] = id;
    }

    pub fn supports_profile(&self, profile: Profiles) -> bool {
        self.supported_profiles.contains(profile)
    }

    pub fn is_profile_connected(&self, profile: Profiles) -> bool {
        self.connected_profiles.contains(profile)
    }

    fn apply_properties(&mut self, changed: &HashMap<String, PropertyValue>, invalidated: &[String]) {
        for (key, value) in changed {
            match (key.as_str(), value) {
                ("Name", PropertyValue::Str(v)) => self.name = v.clone(),
                ("Address", PropertyValue::Str(v)) => self.address = v.clone(),
                ("Paired", PropertyValue::Bool(v)) => self.paired = *v,
                ("Trusted", PropertyValue::Bool(v)) => self.trusted = *v,
                ("Connected", PropertyValue::Bool(v)) => {
                    self.connected = *v;
                    if !*v {
                        self.connected_profiles = Profiles::empty();
                    }
                }
                ("UUIDs", PropertyValue::StrList(uuids)) => {
                    self.supported_profiles = uuids_to_profiles(uuids);
                }
                ("ConnectedProfiles", PropertyValue::StrList(uuids)) => {
                    self.connected_profiles = uuids_to_profiles(uuids);
                }
                _ => {}
            }
        }
        for key in invalidated {
            match key.as_str() {
                "ConnectedProfiles" => self.connected_profiles = Profiles::empty(),
                "Connected" => self.connected = false,
                _ => {}
            }
        }
    }
}

/// UUID string BTPOL should ask BlueZ to connect for a missing profile.
/// Prefers A2DP-Sink when both bits happen to be set.
pub(crate) fn profile_uuid(profile: Profiles) -> &'static str {
    if profile.contains(Profiles::A2DP_SINK) {
        A2DP_SINK_UUID
    } else {
        HFP_HF_UUID
    }
}

fn uuids_to_profiles(uuids: &[String]) -> Profiles {
    let mut profiles = Profiles::empty();
    for uuid in uuids {
        let lower = uuid.to_lowercase();
        if lower == A2DP_SINK_UUID {
            profiles |= Profiles::A2DP_SINK;
        } else if lower == HFP_HF_UUID {
            profiles |= Profiles::HFP_HF;
        }
    }
    profiles
}

/// What changed as the result of applying one [`BusEvent`], for BTPOL to
/// react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    Added(BtPath),
    Removed(BtPath),
    ProfilesChanged(BtPath),
}

pub struct BtRegistry {
    devices: HashMap<BtPath, BtDevice>,
}

impl Default for BtRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BtRegistry {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
        }
    }

    pub fn get(&self, path: &BtPath) -> Option<&BtDevice> {
        self.devices.get(path)
    }

    pub fn get_mut(&mut self, path: &BtPath) -> Option<&mut BtDevice> {
        self.devices.get_mut(path)
    }

    pub fn contains(&self, path: &BtPath) -> bool {
        self.devices.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &BtPath> {
        self.devices.keys()
    }

    pub fn supports_profile(&self, path: &BtPath, profile: Profiles) -> bool {
        self.devices
            .get(path)
            .map(|d| d.supports_profile(profile))
            .unwrap_or(false)
    }

    pub fn is_profile_connected(&self, path: &BtPath, profile: Profiles) -> bool {
        self.devices
            .get(path)
            .map(|d| d.is_profile_connected(profile))
            .unwrap_or(false)
    }

    /// Applies one bus notification, creating/updating/removing entries
    /// as needed (spec.md §4.2). Removal tears down any attached iodev
    /// by calling the A2DP/HFP-AG teardown collaborators before freeing
    /// the entry.
    pub fn apply_event(
        &mut self,
        event: BusEvent,
        a2dp: &dyn A2dpControl,
        hfp: &dyn HfpAgControl,
    ) -> Vec<RegistryChange> {
        match event {
            BusEvent::InterfaceAdded { path, properties } => {
                let bt_path = BtPath::new(path.as_str());
                let mut device = BtDevice::new(bt_path.clone(), String::new());
                device.apply_properties(&properties, &[]);
                self.devices.insert(bt_path.clone(), device);
                vec![RegistryChange::Added(bt_path)]
            }
            BusEvent::InterfacesRemoved { path } => {
                let bt_path = BtPath::new(path.as_str());
                self.remove(&bt_path, a2dp, hfp);
                vec![RegistryChange::Removed(bt_path)]
            }
            BusEvent::PropertiesChanged {
                path,
                changed,
                invalidated,
            } => {
                let bt_path = BtPath::new(path.as_str());
                let Some(device) = self.devices.get_mut(&bt_path) else {
                    return Vec::new();
                };
                let before = (device.supported_profiles, device.connected_profiles);
                device.apply_properties(&changed, &invalidated);
                let after = (device.supported_profiles, device.connected_profiles);
                if before != after {
                    vec![RegistryChange::ProfilesChanged(bt_path)]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Tears down `path`'s attached iodevs and removes it from the
    /// registry. A no-op if `path` is unknown (spec.md §9 open question
    /// (a): drop silently).
    pub fn remove(&mut self, path: &BtPath, a2dp: &dyn A2dpControl, hfp: &dyn HfpAgControl) {
        if self.devices.remove(path).is_some() {
            let _ = a2dp.suspend_connected_device(path);
            let _ = hfp.suspend_connected_device(path);
        }
    }
}
