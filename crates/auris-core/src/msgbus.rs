//! Main Message Bus (spec.md §4.4): the only channel a worker thread may
//! use to reach the main thread's policy state.
//!
//! An `mpsc::Sender` cloned out to every worker gives "in-order delivery
//! per sender" for free (that's what `mpsc` already guarantees), while a
//! single `Receiver` drained only by [`MessageBus::dispatch_pending`]
//! keeps the handler table a main-thread affair — a clean split between
//! "what a worker asks for" and "what the main side reacts to".

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::ids::{BtPath, DeviceId};

/// Reason a suspend was scheduled. Wire-visible in logs (spec.md §6): the
/// numeric order and names are part of the operator contract, so only
/// ever append a variant, never reorder or rename one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SuspendReason {
    A2dpLongTxFailure = 0,
    A2dpTxFatalError = 1,
    ConnWatchTimeOut = 2,
    HfpScoSocketError = 3,
    HfpAgStartFailure = 4,
    UnexpectedProfileDrop = 5,
}

impl SuspendReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SuspendReason::A2dpLongTxFailure => "A2DP_LONG_TX_FAILURE",
            SuspendReason::A2dpTxFatalError => "A2DP_TX_FATAL_ERROR",
            SuspendReason::ConnWatchTimeOut => "CONN_WATCH_TIME_OUT",
            SuspendReason::HfpScoSocketError => "HFP_SCO_SOCKET_ERROR",
            SuspendReason::HfpAgStartFailure => "HFP_AG_START_FAILURE",
            SuspendReason::UnexpectedProfileDrop => "UNEXPECTED_PROFILE_DROP",
        }
    }
}

/// Command carried by a [`MainMessage`] (spec.md §3).
#[derive(Debug, Clone)]
pub enum Command {
    SwitchProfile,
    ScheduleSuspend(SuspendReason),
    CancelSuspend,
    ConnectionWatchStart,
}

/// Key used by the handler table — the tag half of a self-describing
/// message, independent of its payload (spec.md §4.4 "header (type,
/// length) followed by a payload").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTag {
    SwitchProfile,
    ScheduleSuspend,
    CancelSuspend,
    ConnectionWatchStart,
}

impl Command {
    pub fn tag(&self) -> MessageTag {
        match self {
            Command::SwitchProfile => MessageTag::SwitchProfile,
            Command::ScheduleSuspend(_) => MessageTag::ScheduleSuspend,
            Command::CancelSuspend => MessageTag::CancelSuspend,
            Command::ConnectionWatchStart => MessageTag::ConnectionWatchStart,
        }
    }
}

/// Self-describing cross-thread message (spec.md §3): a command tag, the
/// BT device it targets, an optional iodev, and two scalar arguments
/// interpreted per command.
#[derive(Debug, Clone)]
pub struct MainMessage {
    pub command: Command,
    pub target: BtPath,
    pub iodev: Option<DeviceId>,
    pub args: [i64; 2],
}

impl MainMessage {
    pub fn new(command: Command, target: BtPath) -> Self {
        Self {
            command,
            target,
            iodev: None,
            args: [0, 0],
        }
    }

    pub fn with_iodev(mut self, iodev: DeviceId) -> Self {
        self.iodev = Some(iodev);
        self
    }

    pub fn with_args(mut self, args: [i64; 2]) -> Self {
        self.args = args;
        self
    }
}

/// Cloneable send half, handed out to worker threads. The bus itself
/// (handler table + receiver) never leaves the main thread.
#[derive(Clone)]
pub struct MessageSender(Sender<MainMessage>);

impl MessageSender {
    /// Enqueues `msg`. Fails only if the bus has been dropped.
    pub fn send(&self, msg: MainMessage) -> Result<(), MainMessage> {
        self.0.send(msg).map_err(|e| e.0)
    }
}

/// Fixed set of message tags mapped to in-process handlers, dispatched on
/// the main thread (spec.md §4.4).
pub struct MessageBus {
    sender: Sender<MainMessage>,
    receiver: Receiver<MainMessage>,
    handlers: HashMap<MessageTag, Box<dyn FnMut(MainMessage)>>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            handlers: HashMap::new(),
        }
    }

    /// A handle any thread may hold and send through.
    pub fn sender(&self) -> MessageSender {
        MessageSender(self.sender.clone())
    }

    /// Main-thread only. Replaces any existing handler for `tag`.
    pub fn add_handler<F>(&mut self, tag: MessageTag, handler: F)
    where
        F: FnMut(MainMessage) + 'static,
    {
        self.handlers.insert(tag, Box::new(handler));
    }

    /// Main-thread only.
    pub fn rm_handler(&mut self, tag: MessageTag) {
        self.handlers.remove(&tag);
    }

    /// Drains every message currently queued, dispatching each to its
    /// handler. A message whose tag has no registered handler is dropped
    /// silently (spec.md §8 scenario 5).
    pub fn dispatch_pending(&mut self) {
        while let Ok(msg) = self.receiver.try_recv() {
            let tag = msg.command.tag();
            if let Some(handler) = self.handlers.get_mut(&tag) {
                handler(msg);
            }
        }
    }

    /// Shutdown: remove every handler and drop anything still queued
    /// (spec.md §5 "removes all message-bus handlers before any component
    /// tears down its own state").
    pub fn shutdown(&mut self) {
        self.handlers.clear();
        while self.receiver.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn dispatch_invokes_registered_handler_with_exact_payload() {
        let mut bus = MessageBus::new();
        let seen: Arc<std::sync::Mutex<Vec<(BtPath, Option<DeviceId>)>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        bus.add_handler(MessageTag::SwitchProfile, move |msg| {
            seen2.lock().unwrap().push((msg.target, msg.iodev));
        });

        let tx = bus.sender();
        let dev = DeviceId::new(1);
        tx.send(
            MainMessage::new(Command::SwitchProfile, BtPath::new("/bt/D1")).with_iodev(dev),
        )
        .unwrap();

        bus.dispatch_pending();
        let got = seen.lock().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0.as_str(), "/bt/D1");
        assert_eq!(got[0].1, Some(dev));
    }

    #[test]
    fn removing_handler_before_dispatch_drops_message_silently() {
        let mut bus = MessageBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        bus.add_handler(MessageTag::SwitchProfile, move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });

        let tx = bus.sender();
        tx.send(MainMessage::new(Command::SwitchProfile, BtPath::new("/bt/D1")))
            .unwrap();

        bus.rm_handler(MessageTag::SwitchProfile);
        bus.dispatch_pending();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn messages_from_one_sender_dispatch_in_send_order() {
        let mut bus = MessageBus::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let order2 = order.clone();
        bus.add_handler(MessageTag::ScheduleSuspend, move |msg| {
            order2.lock().unwrap().push(msg.args[0]);
        });

        let tx = bus.sender();
        for i in 0..5 {
            tx.send(
                MainMessage::new(
                    Command::ScheduleSuspend(SuspendReason::HfpScoSocketError),
                    BtPath::new("/bt/D1"),
                )
                .with_args([i, 0]),
            )
            .unwrap();
        }

        bus.dispatch_pending();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn shutdown_clears_handlers_and_drops_queued_messages() {
        let mut bus = MessageBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        bus.add_handler(MessageTag::CancelSuspend, move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });
        let tx = bus.sender();
        tx.send(MainMessage::new(Command::CancelSuspend, BtPath::new("/bt/D1")))
            .unwrap();

        bus.shutdown();
        bus.dispatch_pending();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn sender_usable_from_another_thread() {
        let mut bus = MessageBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        bus.add_handler(MessageTag::SwitchProfile, move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });

        let tx = bus.sender();
        let handle = std::thread::spawn(move || {
            tx.send(MainMessage::new(Command::SwitchProfile, BtPath::new("/bt/D1")))
                .unwrap();
        });
        handle.join().unwrap();

        bus.dispatch_pending();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
