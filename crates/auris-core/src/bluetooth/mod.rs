//! Bluetooth: host bus adapter, device registry, and policy engine
//! (spec.md §4.2-§4.3, §6).

pub mod bus;
#[cfg(feature = "bluez-backend")]
pub mod bluer_bus;
pub mod collab;
pub mod policy;
pub mod registry;
pub mod sco;

pub use bus::{BtBusError, BusEvent, BusWatcher, PropertyValue};
#[cfg(feature = "bluez-backend")]
pub use bluer_bus::BluerBus;
pub use collab::{A2dpControl, CollabError, HfpAgControl};
pub use policy::{BtPolicyEngine, PolicyAction};
pub use registry::{BtDevice, BtRegistry, Profiles, RegistryChange};
pub use sco::{ScoCodec, ScoError, ScoHandle};
