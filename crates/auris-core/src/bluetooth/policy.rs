//! BT Policy Engine (spec.md §4.3, §2 BTPOL).
//!
//! Three independent FSMs — connection watch, profile switch, suspend —
//! share one [`TimerManager<BtPolicyEngine>`](crate::timer::TimerManager)
//! and the same [`BtRegistry`]: a single owner struct holds both the
//! device table and the pending-work timers, and reacts to messages
//! instead of polling.
//!
//! The engine never touches [`DeviceList`](crate::devlist::DeviceList), the
//! host bus, or the A2DP/HFP-AG collaborators directly — a timer callback
//! only gets `&mut BtPolicyEngine` (see `timer.rs`), so each FSM records
//! the side effect it wants as a [`PolicyAction`] and the main loop applies
//! the batch after `fire_expired` returns. This keeps BTPOL decoupled from
//! DEVLIST the same way BTREG is decoupled from BTPOL.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::{ConnWatchConfig, ProfileSwitchConfig};
use crate::ids::{BtPath, DeviceId};
use crate::iodev::Direction;
use crate::metrics::Metrics;
use crate::msgbus::{Command, MainMessage, SuspendReason};
use crate::timer::{HasTimers, TimerId, TimerManager};

use super::bus::BusEvent;
use super::collab::{A2dpControl, HfpAgControl};
use super::registry::{self, BtRegistry, Profiles, RegistryChange};

/// A device-list, host-bus, or collaborator side effect an FSM wants
/// applied once the current batch of timer callbacks has finished
/// running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyAction {
    SuspendIodev(DeviceId),
    SelectBestNode(DeviceId),
    /// Mark a just-satisfied Bluetooth device's nodes plugged.
    MarkPlugged(DeviceId),
    /// Connection Watch asking the host bus to connect a missing profile.
    RequestConnectProfile { path: BtPath, uuid: String },
    /// Connection Watch's "Satisfied" action: start A2DP or HFP-AG for the
    /// surviving device.
    StartBtProfile { path: BtPath, profile: Profiles },
    /// Suspend A2DP, suspend HFP-AG, then force-disconnect this device.
    SuspendBtTransport(BtPath),
}

/// Suspend fires on the next tick rather than synchronously, preserving
/// "schedule" semantics (spec.md §5: no main-thread operation may block
/// on a bus round-trip) even though there is no extra settle time.
const SUSPEND_DELAY: Duration = Duration::from_millis(0);

struct ConnWatchRecord {
    timer: TimerId,
}

struct ProfileSwitchRecord {
    timer: TimerId,
}

struct SuspendRecord {
    timer: TimerId,
    reason: SuspendReason,
}

pub struct BtPolicyEngine {
    pub registry: BtRegistry,
    timers: TimerManager<BtPolicyEngine>,
    metrics: Box<dyn Metrics>,
    conn_watch_cfg: ConnWatchConfig,
    profile_switch_cfg: ProfileSwitchConfig,

    conn_watch: HashMap<BtPath, ConnWatchRecord>,
    profile_switch: HashMap<BtPath, ProfileSwitchRecord>,
    suspend: HashMap<BtPath, SuspendRecord>,

    pending_actions: Vec<PolicyAction>,
}

impl HasTimers for BtPolicyEngine {
    fn timers_mut(&mut self) -> &mut TimerManager<Self> {
        &mut self.timers
    }
}

impl BtPolicyEngine {
    pub fn new(
        conn_watch_cfg: ConnWatchConfig,
        profile_switch_cfg: ProfileSwitchConfig,
        metrics: Box<dyn Metrics>,
    ) -> Self {
        let mut timers = TimerManager::new();
        timers.start();
        Self {
            registry: BtRegistry::new(),
            timers,
            metrics,
            conn_watch_cfg,
            profile_switch_cfg,
            conn_watch: HashMap::new(),
            profile_switch: HashMap::new(),
            suspend: HashMap::new(),
            pending_actions: Vec::new(),
        }
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Runs due timer callbacks and returns the actions they produced.
    /// Callers apply the returned actions to DEVLIST/the host bus
    /// themselves; this method never blocks on either.
    pub fn fire_due_timers(&mut self) -> Vec<PolicyAction> {
        crate::timer::fire_expired(self);
        std::mem::take(&mut self.pending_actions)
    }

    /// Applies one host-bus notification to the registry. Returns the
    /// registry-level diff for callers that want to log it, or act on it —
    /// starting a Connection Watch on `Added`/`ProfilesChanged` is the
    /// caller's responsibility (spec.md §4.3: "started on the first
    /// connection notification of a device that advertises any audio
    /// profile"). BTPOL itself reacts to device removal by cancelling any
    /// FSM state for it.
    pub fn handle_bus_event(
        &mut self,
        event: BusEvent,
        a2dp: &dyn A2dpControl,
        hfp: &dyn HfpAgControl,
    ) -> Vec<RegistryChange> {
        let changes = self.registry.apply_event(event, a2dp, hfp);
        for change in &changes {
            if let RegistryChange::Removed(path) = change {
                self.cancel_all_for(path);
            }
        }
        changes
    }

    fn cancel_all_for(&mut self, path: &BtPath) {
        if let Some(r) = self.conn_watch.remove(path) {
            self.timers.cancel_timer(r.timer);
        }
        if let Some(r) = self.profile_switch.remove(path) {
            self.timers.cancel_timer(r.timer);
        }
        if let Some(r) = self.suspend.remove(path) {
            self.timers.cancel_timer(r.timer);
        }
    }

    /// Routes one main-message-bus message to the FSM it targets
    /// (spec.md §4.4, §3 `Command`).
    pub fn handle_message(&mut self, msg: MainMessage) {
        match msg.command {
            Command::SwitchProfile => self.schedule_profile_switch(msg.target),
            Command::ScheduleSuspend(reason) => {
                self.schedule_suspend(msg.target, msg.iodev, reason)
            }
            Command::CancelSuspend => self.cancel_suspend(&msg.target),
            Command::ConnectionWatchStart => self.start_connection_watch(msg.target),
        }
    }

    // ---- Suspend FSM (spec.md §4.3 "Suspend") ----

    /// Idempotent: a device with a suspend already pending is left alone
    /// (first reason wins). A device no longer in BTREG is a silent no-op
    /// (spec.md §9 open question (a)).
    fn schedule_suspend(&mut self, target: BtPath, iodev: Option<DeviceId>, reason: SuspendReason) {
        if !self.registry.contains(&target) {
            return;
        }
        if self.suspend.contains_key(&target) {
            return;
        }
        self.metrics.suspend_scheduled(target.as_str(), reason);
        let t = target.clone();
        let timer = self
            .timers
            .create_timer(SUSPEND_DELAY, move |engine| engine.fire_suspend(t, iodev));
        self.suspend.insert(target, SuspendRecord { timer, reason });
    }

    fn cancel_suspend(&mut self, target: &BtPath) {
        if let Some(record) = self.suspend.remove(target) {
            self.timers.cancel_timer(record.timer);
        }
    }

    /// On fire: log the reason, suspend A2DP, suspend HFP-AG, then
    /// force-disconnect via the registry (spec.md §4.3 "Suspend").
    fn fire_suspend(&mut self, target: BtPath, iodev: Option<DeviceId>) {
        let Some(record) = self.suspend.remove(&target) else {
            return;
        };
        if !self.registry.contains(&target) {
            return;
        }
        log::warn!("bt suspend fired for {target}: {}", record.reason.as_str());
        if let Some(id) = iodev {
            self.pending_actions.push(PolicyAction::SuspendIodev(id));
        }
        self.pending_actions.push(PolicyAction::SuspendBtTransport(target));
    }

    // ---- Profile Switch FSM (spec.md §4.3 "Profile switch") ----

    /// For each direction with an attached iodev, suspends it via DEVLIST
    /// right away. The input direction re-resumes immediately; the output
    /// direction re-resumes only after a coalescing delay (spec.md §4.3).
    fn schedule_profile_switch(&mut self, target: BtPath) {
        let Some(device) = self.registry.get(&target) else {
            return;
        };
        let input_id = device.iodev(Direction::Input);
        let output_id = device.iodev(Direction::Output);
        if input_id.is_none() && output_id.is_none() {
            return;
        }

        self.metrics.profile_switch(target.as_str());

        if let Some(id) = input_id {
            self.pending_actions.push(PolicyAction::SuspendIodev(id));
            self.pending_actions.push(PolicyAction::SelectBestNode(id));
        }

        if let Some(id) = output_id {
            self.pending_actions.push(PolicyAction::SuspendIodev(id));
            if let Some(existing) = self.profile_switch.remove(&target) {
                self.timers.cancel_timer(existing.timer);
            }
            let t = target.clone();
            let timer = self.timers.create_timer(self.profile_switch_cfg.output_resume_delay, move |engine| {
                engine.fire_profile_switch(t)
            });
            self.profile_switch.insert(target, ProfileSwitchRecord { timer });
        }
    }

    /// Re-checks both BTREG presence and the output iodev slot before
    /// acting (spec.md §9 open question (b)): a device removed, or an
    /// iodev detached, while the coalescing delay was pending makes this
    /// a silent no-op rather than an error.
    fn fire_profile_switch(&mut self, target: BtPath) {
        if self.profile_switch.remove(&target).is_none() {
            return;
        }
        let Some(device) = self.registry.get(&target) else {
            return;
        };
        let Some(output_id) = device.iodev(Direction::Output) else {
            return;
        };
        self.pending_actions.push(PolicyAction::SelectBestNode(output_id));
    }

    // ---- Connection Watch FSM (spec.md §4.3 "Connection watch") ----

    /// Started on the first connection notification of a device that
    /// advertises any audio profile. Starting a watch on a device already
    /// being watched replaces the prior record (last-wins), resetting the
    /// retry budget.
    pub fn start_connection_watch(&mut self, target: BtPath) {
        if let Some(existing) = self.conn_watch.remove(&target) {
            self.timers.cancel_timer(existing.timer);
        }
        self.schedule_conn_watch_tick(target, self.conn_watch_cfg.max_retries);
    }

    fn schedule_conn_watch_tick(&mut self, target: BtPath, retries_remaining: u32) {
        let t = target.clone();
        let timer = self.timers.create_timer(self.conn_watch_cfg.tick_period, move |engine| {
            engine.conn_watch_tick(t, retries_remaining)
        });
        self.conn_watch.insert(target, ConnWatchRecord { timer });
    }

    /// Compares `supports_profile` vs `is_profile_connected` for
    /// A2DP-Sink and HFP-HandsFree. *Idle*: nothing advertised, the watch
    /// simply ends. *Satisfied*: both advertised profiles (of whichever
    /// are supported) are connected. Otherwise, if exactly one of two
    /// supported profiles is connected, asks the registry to connect the
    /// missing one; either way retries decrement and the tick re-arms,
    /// scheduling a suspend with reason `CONN_WATCH_TIME_OUT` once they're
    /// exhausted.
    fn conn_watch_tick(&mut self, target: BtPath, retries_remaining: u32) {
        if !self.conn_watch.contains_key(&target) {
            return; // superseded or cancelled since this tick was scheduled
        }
        let Some(device) = self.registry.get(&target) else {
            self.conn_watch.remove(&target);
            return;
        };
        let supported = device.supported_profiles;
        if supported.is_empty() {
            self.conn_watch.remove(&target);
            return;
        }

        let a2dp_supported = supported.contains(Profiles::A2DP_SINK);
        let hfp_supported = supported.contains(Profiles::HFP_HF);
        let a2dp_connected = device.is_profile_connected(Profiles::A2DP_SINK);
        let hfp_connected = device.is_profile_connected(Profiles::HFP_HF);

        let satisfied = (!a2dp_supported || a2dp_connected) && (!hfp_supported || hfp_connected);
        if satisfied {
            self.conn_watch.remove(&target);
            self.metrics.connection_watch_satisfied(target.as_str());
            self.complete_connection_watch(target, supported);
            return;
        }

        if a2dp_supported && hfp_supported && a2dp_connected != hfp_connected {
            let missing = if a2dp_connected { Profiles::HFP_HF } else { Profiles::A2DP_SINK };
            let uuid = registry::profile_uuid(missing).to_string();
            self.pending_actions.push(PolicyAction::RequestConnectProfile {
                path: target.clone(),
                uuid,
            });
        }

        if retries_remaining == 0 {
            self.conn_watch.remove(&target);
            self.metrics.connection_watch_timed_out(target.as_str());
            self.schedule_suspend(target, None, SuspendReason::ConnWatchTimeOut);
            return;
        }
        self.schedule_conn_watch_tick(target, retries_remaining - 1);
    }

    /// The "Satisfied" action list: remove every other already-connected
    /// BT audio device (last-wins conflict removal), start A2DP and/or
    /// HFP-AG for the survivor, then mark its nodes plugged.
    fn complete_connection_watch(&mut self, target: BtPath, supported: Profiles) {
        let others: Vec<BtPath> = self
            .registry
            .paths()
            .filter(|p| p.as_str() != target.as_str())
            .filter(|p| self.registry.get(*p).map(|d| !d.connected_profiles.is_empty()).unwrap_or(false))
            .map(|p| p.clone())
            .collect();
        for other in others {
            self.pending_actions.push(PolicyAction::SuspendBtTransport(other));
        }

        if supported.contains(Profiles::A2DP_SINK) {
            self.pending_actions.push(PolicyAction::StartBtProfile {
                path: target.clone(),
                profile: Profiles::A2DP_SINK,
            });
        }
        if supported.contains(Profiles::HFP_HF) {
            self.pending_actions.push(PolicyAction::StartBtProfile {
                path: target.clone(),
                profile: Profiles::HFP_HF,
            });
        }

        if let Some(device) = self.registry.get(&target) {
            if let Some(id) = device.iodev(Direction::Input) {
                self.pending_actions.push(PolicyAction::MarkPlugged(id));
            }
            if let Some(id) = device.iodev(Direction::Output) {
                self.pending_actions.push(PolicyAction::MarkPlugged(id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::bus::PropertyValue;
    use crate::bluetooth::collab::fake::FakeCollab;
    use crate::metrics::NoopMetrics;
    use std::collections::HashMap as Map;
    use std::time::Duration as Dur;

    fn engine() -> BtPolicyEngine {
        BtPolicyEngine::new(
            ConnWatchConfig {
                tick_period: Dur::from_millis(5),
                max_retries: 2,
            },
            ProfileSwitchConfig {
                output_resume_delay: Dur::from_millis(5),
            },
            Box::new(NoopMetrics),
        )
    }

    fn added(path: &str, uuids: &[&str]) -> BusEvent {
        let mut properties = Map::new();
        properties.insert(
            "UUIDs".to_string(),
            PropertyValue::StrList(uuids.iter().map(|s| s.to_string()).collect()),
        );
        BusEvent::InterfaceAdded {
            path: path.to_string(),
            properties,
        }
    }

    const A2DP_SINK_UUID: &str = "0000110b-0000-1000-8000-00805f9b34fb";
    const HFP_HF_UUID: &str = "0000111e-0000-1000-8000-00805f9b34fb";

    fn connected(path: &str, uuids: &[&str]) -> BusEvent {
        let mut changed = Map::new();
        changed.insert(
            "ConnectedProfiles".to_string(),
            PropertyValue::StrList(uuids.iter().map(|s| s.to_string()).collect()),
        );
        BusEvent::PropertiesChanged {
            path: path.to_string(),
            changed,
            invalidated: vec![],
        }
    }

    #[test]
    fn schedule_suspend_on_unknown_device_is_a_noop() {
        let mut engine = engine();
        engine.handle_message(MainMessage::new(
            Command::ScheduleSuspend(SuspendReason::UnexpectedProfileDrop),
            BtPath::new("/bt/ghost"),
        ).with_iodev(DeviceId::new(1)));
        std::thread::sleep(Dur::from_millis(2));
        assert!(engine.fire_due_timers().is_empty());
    }

    #[test]
    fn repeated_schedule_suspend_is_idempotent() {
        let mut engine = engine();
        let collab = FakeCollab::default();
        engine.handle_bus_event(added("/bt/D1", &[]), &collab, &collab);

        let msg = || {
            MainMessage::new(
                Command::ScheduleSuspend(SuspendReason::UnexpectedProfileDrop),
                BtPath::new("/bt/D1"),
            )
            .with_iodev(DeviceId::new(7))
        };
        engine.handle_message(msg());
        engine.handle_message(msg());
        engine.handle_message(msg());

        std::thread::sleep(Dur::from_millis(2));
        let actions = engine.fire_due_timers();
        assert_eq!(
            actions,
            vec![
                PolicyAction::SuspendIodev(DeviceId::new(7)),
                PolicyAction::SuspendBtTransport(BtPath::new("/bt/D1")),
            ]
        );
    }

    #[test]
    fn cancel_suspend_before_it_fires_prevents_the_action() {
        let mut engine = engine();
        let collab = FakeCollab::default();
        engine.handle_bus_event(added("/bt/D1", &[]), &collab, &collab);

        engine.handle_message(
            MainMessage::new(
                Command::ScheduleSuspend(SuspendReason::HfpScoSocketError),
                BtPath::new("/bt/D1"),
            )
            .with_iodev(DeviceId::new(7)),
        );
        engine.handle_message(MainMessage::new(Command::CancelSuspend, BtPath::new("/bt/D1")));

        std::thread::sleep(Dur::from_millis(2));
        assert!(engine.fire_due_timers().is_empty());
    }

    #[test]
    fn device_removed_before_suspend_fires_cancels_it() {
        let mut engine = engine();
        let collab = FakeCollab::default();
        engine.handle_bus_event(added("/bt/D1", &[]), &collab, &collab);
        engine.handle_message(
            MainMessage::new(
                Command::ScheduleSuspend(SuspendReason::HfpAgStartFailure),
                BtPath::new("/bt/D1"),
            )
            .with_iodev(DeviceId::new(7)),
        );

        engine.handle_bus_event(
            BusEvent::InterfacesRemoved {
                path: "/bt/D1".to_string(),
            },
            &collab,
            &collab,
        );

        std::thread::sleep(Dur::from_millis(2));
        assert!(engine.fire_due_timers().is_empty());
    }

    #[test]
    fn profile_switch_coalesces_repeated_requests_into_one_action() {
        let mut engine = engine();
        let collab = FakeCollab::default();
        engine.handle_bus_event(added("/bt/D1", &[]), &collab, &collab);
        engine
            .registry
            .get_mut(&BtPath::new("/bt/D1"))
            .unwrap()
            .set_iodev(Direction::Output, Some(DeviceId::new(3)));

        for _ in 0..3 {
            engine.handle_message(MainMessage::new(Command::SwitchProfile, BtPath::new("/bt/D1")));
        }

        std::thread::sleep(Dur::from_millis(10));
        let actions = engine.fire_due_timers();
        assert_eq!(
            actions,
            vec![
                PolicyAction::SuspendIodev(DeviceId::new(3)),
                PolicyAction::SuspendIodev(DeviceId::new(3)),
                PolicyAction::SuspendIodev(DeviceId::new(3)),
                PolicyAction::SelectBestNode(DeviceId::new(3)),
            ]
        );
    }

    #[test]
    fn profile_switch_with_no_output_iodev_is_a_noop() {
        let mut engine = engine();
        let collab = FakeCollab::default();
        engine.handle_bus_event(added("/bt/D1", &[]), &collab, &collab);

        engine.handle_message(MainMessage::new(Command::SwitchProfile, BtPath::new("/bt/D1")));
        std::thread::sleep(Dur::from_millis(10));
        assert!(engine.fire_due_timers().is_empty());
    }

    #[test]
    fn profile_switch_resumes_input_immediately_without_waiting() {
        let mut engine = engine();
        let collab = FakeCollab::default();
        engine.handle_bus_event(added("/bt/D1", &[]), &collab, &collab);
        engine
            .registry
            .get_mut(&BtPath::new("/bt/D1"))
            .unwrap()
            .set_iodev(Direction::Input, Some(DeviceId::new(9)));

        engine.handle_message(MainMessage::new(Command::SwitchProfile, BtPath::new("/bt/D1")));

        let actions = engine.fire_due_timers();
        assert_eq!(
            actions,
            vec![
                PolicyAction::SuspendIodev(DeviceId::new(9)),
                PolicyAction::SelectBestNode(DeviceId::new(9)),
            ]
        );
    }

    #[test]
    fn connection_watch_succeeds_once_profile_connects() {
        let mut engine = engine();
        let collab = FakeCollab::default();
        engine.handle_bus_event(added("/bt/D1", &[A2DP_SINK_UUID]), &collab, &collab);

        engine.start_connection_watch(BtPath::new("/bt/D1"));
        std::thread::sleep(Dur::from_millis(10));
        assert!(engine.fire_due_timers().is_empty(), "not connected yet");

        engine.handle_bus_event(connected("/bt/D1", &[A2DP_SINK_UUID]), &collab, &collab);

        std::thread::sleep(Dur::from_millis(10));
        let actions = engine.fire_due_timers();
        assert_eq!(
            actions,
            vec![PolicyAction::StartBtProfile {
                path: BtPath::new("/bt/D1"),
                profile: Profiles::A2DP_SINK,
            }]
        );
    }

    #[test]
    fn connection_watch_on_device_with_no_profiles_terminates_without_suspend() {
        let mut engine = engine();
        let collab = FakeCollab::default();
        engine.handle_bus_event(added("/bt/D1", &[]), &collab, &collab);

        engine.start_connection_watch(BtPath::new("/bt/D1"));
        std::thread::sleep(Dur::from_millis(10));
        assert!(engine.fire_due_timers().is_empty());
        assert!(!engine.conn_watch.contains_key(&BtPath::new("/bt/D1")));
    }

    #[test]
    fn connection_watch_requests_missing_profile_when_partially_connected() {
        let mut engine = engine();
        let collab = FakeCollab::default();
        engine.handle_bus_event(added("/bt/D1", &[A2DP_SINK_UUID, HFP_HF_UUID]), &collab, &collab);

        engine.start_connection_watch(BtPath::new("/bt/D1"));
        engine.handle_bus_event(connected("/bt/D1", &[A2DP_SINK_UUID]), &collab, &collab);

        std::thread::sleep(Dur::from_millis(10));
        let actions = engine.fire_due_timers();
        assert_eq!(
            actions,
            vec![PolicyAction::RequestConnectProfile {
                path: BtPath::new("/bt/D1"),
                uuid: HFP_HF_UUID.to_string(),
            }]
        );
    }

    #[test]
    fn connection_watch_satisfied_starts_profiles_marks_nodes_and_removes_conflicts() {
        let mut engine = engine();
        let collab = FakeCollab::default();
        engine.handle_bus_event(added("/bt/other", &[A2DP_SINK_UUID]), &collab, &collab);
        engine.handle_bus_event(connected("/bt/other", &[A2DP_SINK_UUID]), &collab, &collab);

        engine.handle_bus_event(added("/bt/D1", &[A2DP_SINK_UUID, HFP_HF_UUID]), &collab, &collab);
        engine
            .registry
            .get_mut(&BtPath::new("/bt/D1"))
            .unwrap()
            .set_iodev(Direction::Output, Some(DeviceId::new(4)));

        engine.start_connection_watch(BtPath::new("/bt/D1"));
        engine.handle_bus_event(connected("/bt/D1", &[A2DP_SINK_UUID, HFP_HF_UUID]), &collab, &collab);

        std::thread::sleep(Dur::from_millis(10));
        let actions = engine.fire_due_timers();
        assert_eq!(
            actions,
            vec![
                PolicyAction::SuspendBtTransport(BtPath::new("/bt/other")),
                PolicyAction::StartBtProfile {
                    path: BtPath::new("/bt/D1"),
                    profile: Profiles::A2DP_SINK,
                },
                PolicyAction::StartBtProfile {
                    path: BtPath::new("/bt/D1"),
                    profile: Profiles::HFP_HF,
                },
                PolicyAction::MarkPlugged(DeviceId::new(4)),
            ]
        );
    }

    #[test]
    fn connection_watch_gives_up_after_max_retries_and_schedules_suspend() {
        let mut engine = engine();
        let collab = FakeCollab::default();
        engine.handle_bus_event(added("/bt/D1", &[A2DP_SINK_UUID]), &collab, &collab);

        engine.start_connection_watch(BtPath::new("/bt/D1"));
        // max_retries = 2: first tick schedules retry 2, second retry 1, third gives up
        // and schedules a suspend. A scheduled-from-callback timer is only
        // picked up on the next pass, never re-entrantly (timer.rs), so the
        // suspend itself fires one `fire_due_timers` call later.
        for _ in 0..3 {
            std::thread::sleep(Dur::from_millis(10));
            engine.fire_due_timers();
        }
        std::thread::sleep(Dur::from_millis(10));
        let actions = engine.fire_due_timers();
        assert_eq!(actions, vec![PolicyAction::SuspendBtTransport(BtPath::new("/bt/D1"))]);

        // No more ticks scheduled: a further wait produces nothing.
        std::thread::sleep(Dur::from_millis(10));
        assert!(engine.fire_due_timers().is_empty());
    }

    #[test]
    fn restarting_a_watch_resets_the_retry_budget() {
        let mut engine = engine();
        let collab = FakeCollab::default();
        engine.handle_bus_event(added("/bt/D1", &[A2DP_SINK_UUID]), &collab, &collab);

        engine.start_connection_watch(BtPath::new("/bt/D1"));
        std::thread::sleep(Dur::from_millis(2));
        engine.start_connection_watch(BtPath::new("/bt/D1")); // last-wins restart

        assert_eq!(engine.conn_watch.len(), 1);
    }
}
