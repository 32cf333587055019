//! `bluer`-backed [`BusWatcher`] (spec.md §6 "Host bus"), used when the
//! `bluez-backend` feature is enabled. `bluer` wraps BlueZ's D-Bus
//! object-manager API; this module runs the async BlueZ session on a
//! background `tokio` runtime and forwards its events into the same
//! plain channel shape as [`super::bus::FakeBus`], so BTREG never needs
//! to know which one it's driven by.
//!
//! Uses the modern `bluer` crate rather than the legacy
//! `blez`/`dbus-crossroads` stack, and runs the host's notification
//! stream on its own thread, forwarding a normalized event enum.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use bluer::AdapterEvent;
use futures::StreamExt;

use super::bus::{drain, BusEvent, BusWatcher, PropertyValue};
use super::BtBusError;

enum Command {
    ConnectProfile { path: String, uuid: String },
    DisconnectDevice { path: String },
}

/// Drives a real BlueZ session in a background thread.
pub struct BluerBus {
    events: Receiver<BusEvent>,
    commands: Sender<Command>,
}

impl BluerBus {
    /// Spawns the background runtime and starts watching the default
    /// adapter. Returns immediately; events arrive asynchronously.
    pub fn spawn() -> Result<Self, BtBusError> {
        let (event_tx, event_rx) = mpsc::channel();
        let (command_tx, command_rx) = mpsc::channel();

        thread::Builder::new()
            .name("bt-bus".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        log::error!("failed to start bt-bus runtime: {e}");
                        return;
                    }
                };
                runtime.block_on(run(event_tx, command_rx));
            })
            .map_err(|e| BtBusError::RequestFailed(e.to_string()))?;

        Ok(Self {
            events: event_rx,
            commands: command_tx,
        })
    }
}

impl BusWatcher for BluerBus {
    fn poll_events(&mut self) -> Vec<BusEvent> {
        drain(&self.events)
    }

    fn connect_profile(&self, path: &str, uuid: &str) -> Result<(), BtBusError> {
        self.commands
            .send(Command::ConnectProfile {
                path: path.to_string(),
                uuid: uuid.to_string(),
            })
            .map_err(|e| BtBusError::RequestFailed(e.to_string()))
    }

    fn disconnect_device(&self, path: &str) -> Result<(), BtBusError> {
        self.commands
            .send(Command::DisconnectDevice {
                path: path.to_string(),
            })
            .map_err(|e| BtBusError::RequestFailed(e.to_string()))
    }
}

async fn run(events: Sender<BusEvent>, commands: Receiver<Command>) {
    let session = match bluer::Session::new().await {
        Ok(s) => s,
        Err(e) => {
            log::error!("bt-bus: failed to open bluer session: {e}");
            return;
        }
    };
    let adapter = match session.default_adapter().await {
        Ok(a) => a,
        Err(e) => {
            log::error!("bt-bus: no default adapter: {e}");
            return;
        }
    };

    let mut adapter_events = match adapter.discover_devices().await {
        Ok(stream) => stream,
        Err(e) => {
            log::error!("bt-bus: failed to start discovery: {e}");
            return;
        }
    };

    loop {
        tokio::select! {
            Some(event) = adapter_events.next() => {
                match event {
                    AdapterEvent::DeviceAdded(addr) => {
                        let path = format!("/org/bluez/{addr}");
                        let props = describe_device(&adapter, addr).await;
                        let _ = events.send(BusEvent::InterfaceAdded { path, properties: props });
                    }
                    AdapterEvent::DeviceRemoved(addr) => {
                        let path = format!("/org/bluez/{addr}");
                        let _ = events.send(BusEvent::InterfacesRemoved { path });
                    }
                    AdapterEvent::PropertyChanged(_) => {}
                }
            }
            cmd = async { commands.try_recv() } => {
                match cmd {
                    Ok(Command::ConnectProfile { path, uuid }) => {
                        if let Some(addr) = parse_addr(&path) {
                            if let Ok(device) = adapter.device(addr) {
                                if let Err(e) = device.connect_profile(&uuid.parse().unwrap_or_default()).await {
                                    log::warn!("bt-bus: connect_profile({path}, {uuid}) failed: {e}");
                                }
                            }
                        }
                    }
                    Ok(Command::DisconnectDevice { path }) => {
                        if let Some(addr) = parse_addr(&path) {
                            if let Ok(device) = adapter.device(addr) {
                                if let Err(e) = device.disconnect().await {
                                    log::warn!("bt-bus: disconnect({path}) failed: {e}");
                                }
                            }
                        }
                    }
                    Err(_) => {
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    }
                }
            }
        }
    }
}

async fn describe_device(adapter: &bluer::Adapter, addr: bluer::Address) -> HashMap<String, PropertyValue> {
    let mut props = HashMap::new();
    let Ok(device) = adapter.device(addr) else {
        return props;
    };
    if let Ok(Some(name)) = device.name().await {
        props.insert("Name".to_string(), PropertyValue::Str(name));
    }
    if let Ok(connected) = device.is_connected().await {
        props.insert("Connected".to_string(), PropertyValue::Bool(connected));
    }
    if let Ok(paired) = device.is_paired().await {
        props.insert("Paired".to_string(), PropertyValue::Bool(paired));
    }
    if let Ok(uuids) = device.uuids().await {
        if let Some(uuids) = uuids {
            props.insert(
                "UUIDs".to_string(),
                PropertyValue::StrList(uuids.into_iter().map(|u| u.to_string()).collect()),
            );
        }
    }
    props
}

fn parse_addr(path: &str) -> Option<bluer::Address> {
    path.rsplit('/').next()?.parse().ok()
}
