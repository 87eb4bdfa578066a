//! Clocks, the session deadline, and cancellable one-shot timers.
//!
//! Expiry is always decided by comparing the clock against a fixed
//! deadline, never by counting ticks, so a late or skipped tick cannot
//! make the countdown drift.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall-clock time derived from `tokio::time::Instant`.
///
/// Under a paused tokio runtime (`start_paused = true`) this clock moves with
/// the runtime's virtual time, which lets whole sessions run in tests
/// without waiting on real minutes.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    wall_anchor: DateTime<Utc>,
    instant_anchor: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Anchor the clock so that "now" reads `wall` at construction time.
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            wall_anchor: wall,
            instant_anchor: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.instant_anchor.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall_anchor + elapsed
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The fixed instant by which the session must be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: DateTime<Utc>,
}

impl Deadline {
    /// Computed once at session start: `start + minutes * 60_000ms`.
    pub fn after(start: DateTime<Utc>, minutes: u32) -> Self {
        Self {
            at: start + chrono::Duration::milliseconds(i64::from(minutes) * 60_000),
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// Time left, clamped at zero.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.at - now).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.at
    }
}

/// Render a remaining duration as `MM:SS`, flooring partial seconds.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Timers the session runner schedules on behalf of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Countdown refresh and deadline check.
    Tick,
    /// End of the feedback window after a choice is clicked.
    Advance,
}

#[derive(Debug, Clone, Copy)]
struct ScheduledTask {
    kind: TimerKind,
    due: DateTime<Utc>,
}

/// Cancellable one-shot timers, at most one pending per [`TimerKind`].
///
/// A task fires at most once: [`Scheduler::fire_due`] removes everything it
/// returns, and a cancelled task is gone for good.
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` at `due`, replacing any pending task of the same kind.
    pub fn schedule(&mut self, kind: TimerKind, due: DateTime<Utc>) {
        self.cancel(kind);
        self.tasks.push(ScheduledTask { kind, due });
    }

    /// Cancel the pending task of this kind. Returns whether one was pending.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.kind != kind);
        self.tasks.len() != before
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.tasks.iter().any(|t| t.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Earliest due instant among pending tasks.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.tasks.iter().map(|t| t.due).min()
    }

    /// Remove and return every task due at or before `now`, earliest first.
    pub fn fire_due(&mut self, now: DateTime<Utc>) -> Vec<TimerKind> {
        let mut due: Vec<ScheduledTask> =
            self.tasks.iter().filter(|t| t.due <= now).copied().collect();
        self.tasks.retain(|t| t.due > now);
        due.sort_by_key(|t| t.due);
        due.into_iter().map(|t| t.kind).collect()
    }
}
