//! `aurisd` — audio server daemon entry point.
//!
//! Wires the main-thread message bus, the Bluetooth policy engine, and
//! the device list together into one loop: a bounded wait sized by the
//! next pending timer deadline, followed by draining whatever arrived.
//! No daemonization, process supervision, or privilege separation is
//! handled here (spec.md §1 Non-goals) — this is a foreground process
//! meant to be supervised by the host's service manager.

mod config_io;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use auris_core::bluetooth::{
    A2dpControl, BtPolicyEngine, BusEvent, BusWatcher, CollabError, HfpAgControl, PolicyAction,
    Profiles, RegistryChange,
};
use auris_core::ids::BtPath;
use auris_core::metrics::LogMetrics;
use auris_core::msgbus::{MainMessage, MessageBus, MessageTag};
use auris_core::{DeviceList, ServerConfig};

/// Logs the request and returns success; the real BlueZ round-trip
/// already happened on the bus thread that produced the
/// `PropertiesChanged` event driving this call (spec.md §1: no
/// Bluetooth protocol stack is reimplemented in this crate).
struct LoggingA2dp;
impl A2dpControl for LoggingA2dp {
    fn start(&self, device: &BtPath) -> Result<(), CollabError> {
        log::info!("a2dp: start {device}");
        Ok(())
    }
    fn suspend_connected_device(&self, device: &BtPath) -> Result<(), CollabError> {
        log::info!("a2dp: suspend {device}");
        Ok(())
    }
}

struct LoggingHfpAg;
impl HfpAgControl for LoggingHfpAg {
    fn start(&self, device: &BtPath) -> Result<(), CollabError> {
        log::info!("hfp-ag: start {device}");
        Ok(())
    }
    fn suspend_connected_device(&self, device: &BtPath) -> Result<(), CollabError> {
        log::info!("hfp-ag: suspend {device}");
        Ok(())
    }
}

/// Stand-in bus that never produces events, used when built without the
/// `bluez-backend` feature so the rest of the daemon still runs.
struct NullBus;
impl BusWatcher for NullBus {
    fn poll_events(&mut self) -> Vec<BusEvent> {
        Vec::new()
    }
    fn connect_profile(&self, _path: &str, _uuid: &str) -> Result<(), auris_core::bluetooth::BtBusError> {
        Ok(())
    }
    fn disconnect_device(&self, _path: &str) -> Result<(), auris_core::bluetooth::BtBusError> {
        Ok(())
    }
}

#[cfg(feature = "bluez-backend")]
fn open_bus() -> Box<dyn BusWatcher> {
    match auris_core::bluetooth::BluerBus::spawn() {
        Ok(bus) => Box::new(bus),
        Err(e) => {
            log::error!("failed to start Bluetooth bus, running without it: {e}");
            Box::new(NullBus)
        }
    }
}

#[cfg(not(feature = "bluez-backend"))]
fn open_bus() -> Box<dyn BusWatcher> {
    Box::new(NullBus)
}

/// Ambient CLI surface (spec.md §1: the wire protocol and full CLI
/// surface remain out of scope; these two flags only pick the config
/// file and log verbosity).
#[derive(Parser)]
#[command(name = "aurisd", about = "Audio server daemon")]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level.as_str()))
        .format_timestamp_millis()
        .init();

    let config_path = cli.config.unwrap_or_else(config_io::default_config_path);
    let config: ServerConfig = config_io::load_config(&config_path);
    log::info!("aurisd starting, config={config_path:?}");

    let mut message_bus = MessageBus::new();
    let inbox: Rc<RefCell<VecDeque<MainMessage>>> = Rc::new(RefCell::new(VecDeque::new()));
    for tag in [
        MessageTag::SwitchProfile,
        MessageTag::ScheduleSuspend,
        MessageTag::CancelSuspend,
        MessageTag::ConnectionWatchStart,
    ] {
        let inbox = inbox.clone();
        message_bus.add_handler(tag, move |msg| inbox.borrow_mut().push_back(msg));
    }

    let mut policy = BtPolicyEngine::new(
        config.conn_watch,
        config.profile_switch,
        Box::new(LogMetrics),
    );
    let mut devlist = DeviceList::new();
    let mut bus = open_bus();
    let a2dp = LoggingA2dp;
    let hfp = LoggingHfpAg;

    log::info!("aurisd ready");
    loop {
        for event in bus.poll_events() {
            let changes = policy.handle_bus_event(event, &a2dp, &hfp);
            for change in changes {
                let path = match change {
                    RegistryChange::Added(path) | RegistryChange::ProfilesChanged(path) => path,
                    RegistryChange::Removed(_) => continue,
                };
                let advertises_audio = policy
                    .registry
                    .get(&path)
                    .map(|d| d.supported_profiles != Profiles::empty())
                    .unwrap_or(false);
                if advertises_audio {
                    policy.start_connection_watch(path);
                }
            }
        }

        message_bus.dispatch_pending();
        while let Some(msg) = inbox.borrow_mut().pop_front() {
            policy.handle_message(msg);
        }

        for action in policy.fire_due_timers() {
            apply_action(action, &mut devlist, bus.as_ref(), &a2dp, &hfp);
        }

        let wait = policy
            .next_deadline()
            .unwrap_or(Duration::from_millis(100))
            .min(Duration::from_millis(100));
        std::thread::sleep(wait);
    }
}

fn apply_action(
    action: PolicyAction,
    devlist: &mut DeviceList,
    bus: &dyn BusWatcher,
    a2dp: &dyn A2dpControl,
    hfp: &dyn HfpAgControl,
) {
    match action {
        PolicyAction::SuspendIodev(id) => {
            if let Err(e) = devlist.suspend_dev(id) {
                log::warn!("suspend_dev({id:?}) failed: {e}");
            }
        }
        PolicyAction::SelectBestNode(id) => {
            if let Err(e) = devlist.resume_dev(id) {
                log::warn!("resume_dev({id:?}) failed: {e}");
            }
            if let Some(dev) = devlist.get_mut(id) {
                if let Err(e) = dev.select_best_node() {
                    log::warn!("select_best_node({id:?}) failed: {e}");
                }
            }
        }
        PolicyAction::MarkPlugged(id) => {
            if let Some(dev) = devlist.get_mut(id) {
                dev.plug_all_nodes();
            }
        }
        PolicyAction::RequestConnectProfile { path, uuid } => {
            if let Err(e) = bus.connect_profile(path.as_str(), &uuid) {
                log::warn!("connect_profile({path}, {uuid}) failed: {e}");
            }
        }
        PolicyAction::StartBtProfile { path, profile } => {
            let result = if profile.contains(Profiles::A2DP_SINK) {
                a2dp.start(&path)
            } else {
                hfp.start(&path)
            };
            if let Err(e) = result {
                log::warn!("start profile for {path} failed: {e}");
            }
        }
        PolicyAction::SuspendBtTransport(path) => {
            if let Err(e) = a2dp.suspend_connected_device(&path) {
                log::warn!("a2dp suspend({path}) failed: {e}");
            }
            if let Err(e) = hfp.suspend_connected_device(&path) {
                log::warn!("hfp-ag suspend({path}) failed: {e}");
            }
            if let Err(e) = bus.disconnect_device(path.as_str()) {
                log::warn!("disconnect_device({path}) failed: {e}");
            }
        }
    }
}
