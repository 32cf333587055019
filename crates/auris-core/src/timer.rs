//! Single-threaded one-shot timer wheel (spec.md §4.5).
//!
//! Drives its work off a bounded wait instead of a dedicated sleep
//! thread: the main loop calls [`TimerManager::next_deadline`] to size
//! its own blocking wait, then [`fire_expired`] once it wakes.
//!
//! Timers never fire on any thread but the one that calls `fire_expired`,
//! and `cancel` is always safe — including after a timer has already
//! fired, in which case it is a no-op (spec.md §4.5, §5 Cancellation).
//!
//! `TimerManager<Owner>` is generic over the type its callbacks get to
//! mutate. A plain one-off user instantiates `TimerManager<()>` and gets
//! `&mut ()` in callbacks (nothing to reschedule against but itself, via
//! captured state). The Bluetooth policy engine (spec.md §4.3) instead
//! embeds a `TimerManager<BtPolicyEngine>` as one of its own fields and
//! implements [`HasTimers`], so a suspend/switch callback can mutate the
//! whole engine — registry, other FSM records, everything — not just the
//! timer wheel itself.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// Opaque handle returned by [`TimerManager::create_timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct Entry<Owner> {
    deadline: Instant,
    seq: u64,
    callback: Box<dyn FnOnce(&mut Owner)>,
}

/// Ordered by `(deadline, seq)` so ties break in registration order
/// (spec.md §5 Ordering).
#[derive(PartialEq, Eq)]
struct QueueKey {
    deadline: Instant,
    seq: u64,
    id: TimerId,
}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

/// One-shot timer wheel driven by the main loop.
pub struct TimerManager<Owner> {
    entries: Vec<Option<Entry<Owner>>>,
    queue: BinaryHeap<Reverse<QueueKey>>,
    next_seq: u64,
    started: bool,
}

impl<Owner> Default for TimerManager<Owner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Owner> TimerManager<Owner> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            queue: BinaryHeap::new(),
            next_seq: 0,
            started: false,
        }
    }

    /// Explicit lifecycle start. Idempotent: calling twice just logs.
    pub fn start(&mut self) {
        if self.started {
            log::warn!("TimerManager::start called while already started");
            return;
        }
        self.started = true;
    }

    /// Cancels every outstanding timer and resets lifecycle state.
    /// Safe to call without a prior `start` (stop-without-start).
    pub fn stop(&mut self) {
        self.entries.clear();
        self.queue.clear();
        self.started = false;
    }

    /// Schedules `callback` to run in `delay` from now.
    pub fn create_timer<F>(&mut self, delay: Duration, callback: F) -> TimerId
    where
        F: FnOnce(&mut Owner) + 'static,
    {
        let slot = self.entries.len();
        let id = TimerId(slot as u64);
        let seq = self.next_seq;
        self.next_seq += 1;
        let deadline = Instant::now() + delay;

        self.entries.push(Some(Entry {
            deadline,
            seq,
            callback: Box::new(callback),
        }));
        self.queue.push(Reverse(QueueKey { deadline, seq, id }));
        id
    }

    /// Cancels `id`. Always safe, including double-cancel or cancel after
    /// firing (no-op in both cases).
    pub fn cancel_timer(&mut self, id: TimerId) {
        if let Some(slot) = self.entries.get_mut(id.0 as usize) {
            *slot = None;
        }
    }

    /// How long the main loop should block before the next timer is due,
    /// or `None` if nothing is scheduled.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue
            .peek()
            .map(|Reverse(key)| key.deadline.saturating_duration_since(Instant::now()))
    }

    /// Number of timers currently armed (for tests / diagnostics).
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Removes and returns every timer whose deadline has passed, in
    /// firing order. Leaves callbacks unrun — see [`fire_expired`].
    fn take_expired(&mut self) -> Vec<Entry<Owner>> {
        let now = Instant::now();
        let mut due = Vec::new();
        while matches!(self.queue.peek(), Some(Reverse(key)) if key.deadline <= now) {
            let Reverse(key) = self.queue.pop().unwrap();
            if let Some(entry) = self.entries.get_mut(key.id.0 as usize).and_then(Option::take) {
                due.push(entry);
            }
        }
        due
    }
}

/// Implemented by a struct that embeds a `TimerManager<Self>` as one of
/// its own fields, so [`fire_expired`] can hand callbacks the whole owner.
pub trait HasTimers: Sized {
    fn timers_mut(&mut self) -> &mut TimerManager<Self>;
}

/// Runs every timer due as of now against `owner`, in `(deadline, seq)`
/// order. A callback may call `owner.timers_mut().create_timer(...)` to
/// reschedule itself or anything else; the new entry is only considered
/// on the *next* call to `fire_expired`, never re-entrantly within this one
/// (spec.md §4.5: "must tolerate a callback scheduling a new timer").
pub fn fire_expired<Owner: HasTimers>(owner: &mut Owner) {
    let due = owner.timers_mut().take_expired();
    for entry in due {
        (entry.callback)(owner);
    }
}

impl HasTimers for TimerManager<()> {
    fn timers_mut(&mut self) -> &mut TimerManager<Self> {
        // A bare TimerManager<()> has no richer owner to hand callbacks;
        // this impl exists only so the unit tests below can drive it
        // through the same `fire_expired` entry point BTPOL uses.
        unreachable!("TimerManager<()> callbacks never call timers_mut on themselves")
    }
}
