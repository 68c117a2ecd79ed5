//! Frame clock and cancellable timed tasks.
//!
//! Hold-threshold watches, debounce windows and the end-of-frame reset
//! after a mode change all wait on either wall-clock time or a frame
//! count.  They live in a single scheduler polled once per frame so that
//! disabling the pipeline can drop every one of them at once.

use tracing::trace;

use super::gesture::GestureState;
use super::skeleton::{Finger, Hand};

// ── Clock ──────────────────────────────────────────────────

/// Frame counter and timestamp of the frame being processed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameClock {
    pub frame: u64,
    pub time_ms: f64,
}

impl FrameClock {
    /// Move to the next frame.  Timestamps never run backwards.
    pub fn advance(&mut self, time_ms: f64) {
        self.frame += 1;
        if time_ms > self.time_ms {
            self.time_ms = time_ms;
        }
    }
}

// ── Tasks ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// What a task does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Mark a finger held long if it is still pressed.
    HoldThreshold { hand: Hand, finger: Finger },
    /// Broadcast a committed state once it has persisted.
    Debounce {
        hand: Hand,
        state: GestureState,
        previous: GestureState,
    },
    /// Clear the drag lock and force Stop after a mode change.
    ModeChangeReset { hand: Hand },
}

impl TaskKind {
    pub fn hand(&self) -> Hand {
        match *self {
            Self::HoldThreshold { hand, .. }
            | Self::Debounce { hand, .. }
            | Self::ModeChangeReset { hand } => hand,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HoldThreshold { .. } => "hold-threshold",
            Self::Debounce { .. } => "debounce",
            Self::ModeChangeReset { .. } => "mode-change-reset",
        }
    }
}

/// When a task becomes due.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wake {
    /// Once strictly more than `threshold_ms` has passed since `start_ms`.
    AfterMs { start_ms: f64, threshold_ms: f64 },
    /// At the end of frame `frame` or any later frame.
    AtFrame(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimerTask {
    pub id: TaskId,
    pub kind: TaskKind,
    pub wake: Wake,
}

impl TimerTask {
    fn is_due(&self, clock: FrameClock) -> bool {
        match self.wake {
            Wake::AfterMs {
                start_ms,
                threshold_ms,
            } => clock.time_ms - start_ms > threshold_ms,
            Wake::AtFrame(frame) => clock.frame >= frame,
        }
    }
}

// ── Scheduler ──────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TaskScheduler {
    next_id: u64,
    tasks: Vec<TimerTask>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, kind: TaskKind, wake: Wake) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        trace!("scheduled {} task {:?} for {} hand", kind.as_str(), id, kind.hand().as_str());
        self.tasks.push(TimerTask { id, kind, wake });
        id
    }

    /// Cancel one task.  Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() < before
    }

    /// Cancel every task matching `pred`.  Returns how many were dropped.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&TimerTask) -> bool) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !pred(t));
        before - self.tasks.len()
    }

    pub fn cancel_hand(&mut self, hand: Hand) -> usize {
        self.cancel_where(|t| t.kind.hand() == hand)
    }

    pub fn cancel_all(&mut self) -> usize {
        let n = self.tasks.len();
        self.tasks.clear();
        n
    }

    /// Remove and return every task due at `clock`, in scheduling order.
    pub fn take_due(&mut self, clock: FrameClock) -> Vec<TimerTask> {
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|t| t.is_due(clock));
        self.tasks = pending;
        due
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks(&self) -> &[TimerTask] {
        &self.tasks
    }
}
