//! Per-hand gesture state machine.
//!
//! Converts the classifier's raw per-frame pose into a committed
//! `GestureState`, applying the drag-lock toggle and broadcasting
//! `(current, previous)` only when the committed value changes.

use tracing::debug;

use super::skeleton::Hand;
use crate::events::HandEvent;
use crate::tools::mode_dial::TransformMode;

// ── Gesture states ─────────────────────────────────────────

/// The discrete interaction a hand is performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GestureState {
    #[default]
    Neutral,
    Insert,
    Selection,
    NonPivotSelection,
    DragSelection,
    Click,
    SqueezeAll,
    Deselection,
    DeselectAll,
    Stop,
}

impl GestureState {
    pub const ALL: [GestureState; 10] = [
        Self::Neutral,
        Self::Insert,
        Self::Selection,
        Self::NonPivotSelection,
        Self::DragSelection,
        Self::Click,
        Self::SqueezeAll,
        Self::Deselection,
        Self::DeselectAll,
        Self::Stop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Insert => "insert",
            Self::Selection => "selection",
            Self::NonPivotSelection => "non-pivot-selection",
            Self::DragSelection => "drag-selection",
            Self::Click => "click",
            Self::SqueezeAll => "squeeze-all",
            Self::Deselection => "deselection",
            Self::DeselectAll => "deselect-all",
            Self::Stop => "stop",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|g| g.as_str() == s)
    }
}

// ── Debounce ───────────────────────────────────────────────

/// How long a committed state must persist before it is broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebouncePolicy {
    /// Broadcast on the frame the state is committed.
    #[default]
    Immediate,
    /// Broadcast only after the state survives `frames` frames
    /// (`frames * drag_multiplier` for DragSelection).
    Sustained { frames: u32, drag_multiplier: u32 },
}

impl DebouncePolicy {
    pub const DEFAULT_FRAMES: u32 = 5;
    pub const DEFAULT_DRAG_MULTIPLIER: u32 = 2;

    pub fn sustained() -> Self {
        Self::Sustained {
            frames: Self::DEFAULT_FRAMES,
            drag_multiplier: Self::DEFAULT_DRAG_MULTIPLIER,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Sustained { .. } => "sustained",
        }
    }

    /// Frames to wait before broadcasting `state`, or `None` to broadcast now.
    pub fn hold_frames(&self, state: GestureState) -> Option<u64> {
        match *self {
            Self::Immediate => None,
            Self::Sustained {
                frames,
                drag_multiplier,
            } => {
                let n = if state == GestureState::DragSelection {
                    frames.saturating_mul(drag_multiplier)
                } else {
                    frames
                };
                Some(u64::from(n))
            }
        }
    }
}

// ── Machine ────────────────────────────────────────────────

/// Per-frame context the transition function reads but does not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionContext {
    /// Active tool mode for this hand.
    pub tool_mode: TransformMode,
    /// Text entry has focus and the hand is inside its input bounds.
    pub text_drag_lock: bool,
}

/// Committed gesture state and drag-lock latch for one hand.
#[derive(Debug, Clone)]
pub struct HandGestureMachine {
    hand: Hand,
    current: GestureState,
    previous: GestureState,
    drag_lock: bool,
    mode_active: bool,
}

impl HandGestureMachine {
    pub fn new(hand: Hand) -> Self {
        Self {
            hand,
            current: GestureState::Neutral,
            previous: GestureState::Neutral,
            drag_lock: false,
            mode_active: false,
        }
    }

    pub fn hand(&self) -> Hand {
        self.hand
    }

    pub fn current(&self) -> GestureState {
        self.current
    }

    pub fn previous(&self) -> GestureState {
        self.previous
    }

    pub fn drag_lock(&self) -> bool {
        self.drag_lock
    }

    pub fn mode_active(&self) -> bool {
        self.mode_active
    }

    /// Feed one raw skeletal classification.
    pub fn apply(&mut self, raw: GestureState, ctx: TransitionContext) -> Vec<HandEvent> {
        let mut events = Vec::new();
        self.previous = self.current;
        let mut next = raw;

        let fresh_drag = next == GestureState::DragSelection
            && !matches!(
                self.previous,
                GestureState::DragSelection | GestureState::Stop
            );

        if fresh_drag {
            if self.drag_lock && !ctx.text_drag_lock {
                // Second drag pose while locked: toggle off through Stop.
                next = GestureState::Stop;
                self.current = GestureState::Stop;
                self.previous = GestureState::DragSelection;
            }
            self.drag_lock = !self.drag_lock;
            self.mode_active = self.drag_lock;
            debug!(
                "{} hand drag lock {}",
                self.hand.as_str(),
                if self.drag_lock { "on" } else { "off" }
            );
            events.push(HandEvent::ModeActiveChanged {
                hand: self.hand,
                active: self.mode_active,
            });
            self.commit(next, &mut events);
        } else if next == GestureState::Stop {
            self.drag_lock = false;
            self.commit(next, &mut events);
        } else if self.drag_lock {
            if next == GestureState::Insert || ctx.tool_mode == TransformMode::Scale {
                self.commit(next, &mut events);
            } else {
                self.current = next;
            }
        } else {
            self.commit(next, &mut events);
        }
        events
    }

    /// Commit a state from a secondary source.  Bypasses the drag lock.
    pub fn commit_external(&mut self, state: GestureState) -> Vec<HandEvent> {
        let mut events = Vec::new();
        self.previous = self.current;
        self.commit(state, &mut events);
        events
    }

    /// End-of-frame reset after the hand's tool mode changed.
    pub fn reset_for_mode_change(&mut self) -> Vec<HandEvent> {
        let mut events = Vec::new();
        self.drag_lock = false;
        if self.mode_active {
            events.push(HandEvent::ModeActiveChanged {
                hand: self.hand,
                active: false,
            });
        }
        self.mode_active = false;
        self.previous = self.current;
        self.commit(GestureState::Stop, &mut events);
        events
    }

    fn commit(&mut self, state: GestureState, events: &mut Vec<HandEvent>) {
        self.current = state;
        if self.current != self.previous {
            debug!(
                "{} hand {} -> {}",
                self.hand.as_str(),
                self.previous.as_str(),
                self.current.as_str()
            );
            events.push(HandEvent::GestureStateChanged {
                hand: self.hand,
                current: self.current,
                previous: self.previous,
            });
        }
    }

    /// Generate s-expression for IPC-style status.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:state :{} :previous :{} :drag-lock {} :mode-active {})",
            self.current.as_str(),
            self.previous.as_str(),
            if self.drag_lock { "t" } else { "nil" },
            if self.mode_active { "t" } else { "nil" },
        )
    }
}

#[cfg(test)]
fn feed(machine: &mut HandGestureMachine, states: &[GestureState]) -> Vec<HandEvent> {
    states
        .iter()
        .flat_map(|s| machine.apply(*s, TransitionContext::default()))
        .collect()
}

#[cfg(test)]
fn gesture_changes(events: &[HandEvent]) -> Vec<(GestureState, GestureState)> {
    events
        .iter()
        .filter_map(|e| match e {
            HandEvent::GestureStateChanged {
                current, previous, ..
            } => Some((*current, *previous)),
            _ => None,
        })
        .collect()
}
