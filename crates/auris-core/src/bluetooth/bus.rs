//! Host bus adapter (spec.md §6 "Host bus (D-Bus or equivalent)").
//!
//! `BusWatcher` is the seam spec.md §1 draws around "a host-provided
//! object-manager on the system bus is assumed": BTREG never talks to
//! D-Bus directly, only to this trait, modeled on the object-manager
//! notifications BlueZ emits (interface added/removed, properties
//! changed): a background thread forwards host events into a channel
//! the main thread polls.

use std::collections::HashMap;
use std::sync::mpsc::Receiver;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Str(String),
    StrList(Vec<String>),
}

/// One notification from the object manager (spec.md §6).
#[derive(Debug, Clone)]
pub enum BusEvent {
    InterfaceAdded {
        path: String,
        properties: HashMap<String, PropertyValue>,
    },
    InterfacesRemoved {
        path: String,
    },
    PropertiesChanged {
        path: String,
        changed: HashMap<String, PropertyValue>,
        invalidated: Vec<String>,
    },
}

#[derive(Error, Debug)]
pub enum BtBusError {
    #[error("bus request failed: {0}")]
    RequestFailed(String),
}

/// Host-provided object-manager on the system bus. Connection requests
/// are fire-and-forget from the caller's point of view: no main-thread
/// operation may block on a bus round-trip (spec.md §5), so the actual
/// connect/disconnect result arrives later as a `PropertiesChanged`
/// event, not as this call's return value.
pub trait BusWatcher: Send {
    /// Drains every event queued since the last call.
    fn poll_events(&mut self) -> Vec<BusEvent>;
    fn connect_profile(&self, path: &str, uuid: &str) -> Result<(), BtBusError>;
    fn disconnect_device(&self, path: &str) -> Result<(), BtBusError>;
}

/// Drains a `Receiver<BusEvent>` without blocking — shared helper for any
/// `BusWatcher` backed by a plain channel.
pub(crate) fn drain(receiver: &Receiver<BusEvent>) -> Vec<BusEvent> {
    let mut out = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        out.push(event);
    }
    out
}
