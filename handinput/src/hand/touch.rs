//! Capacitive touch source.
//!
//! A held controller reports three touch bits (pointer, thumb, middle).
//! The rule table below maps them onto the same `GestureState` contract
//! the skeletal classifier feeds.  Rules run in order and each one sees
//! the state left by the rules before it.  The table runs once per finger
//! edge, never for bits that stayed put.

use super::gesture::GestureState;
use super::skeleton::{Finger, Hand, TouchBits};
use super::timers::TaskId;

// ── Held-long flags ────────────────────────────────────────

/// Per-finger record of presses that outlasted the hold threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeldLongFlags([bool; 3]);

impl HeldLongFlags {
    pub fn get(&self, finger: Finger) -> bool {
        self.0[finger.index()]
    }

    pub fn set(&mut self, finger: Finger, held: bool) {
        self.0[finger.index()] = held;
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|b| *b)
    }

    pub fn as_array(&self) -> [bool; 3] {
        self.0
    }

    pub fn to_sexp(&self) -> String {
        let parts: Vec<&str> = self.0.iter().map(|b| if *b { "t" } else { "nil" }).collect();
        format!("({})", parts.join(" "))
    }
}

// ── Rule table ─────────────────────────────────────────────

/// Result of running the rule table for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchOutcome {
    /// New state, if the rules moved away from the current one.
    pub state: Option<GestureState>,
    /// The Selection rule fired this frame.
    pub selection_started: bool,
}

/// Map touch bits to a gesture, starting from the hand's `current` state.
pub fn classify_touch(bits: TouchBits, current: GestureState) -> TouchOutcome {
    use GestureState::*;

    let (m, p, t) = (bits.middle, bits.pointer, bits.thumb);
    let mut state = current;
    let mut selection_started = false;

    if state != Selection && m && !p && !t {
        state = Selection;
        selection_started = true;
    }
    if !matches!(state, Neutral | Insert) && m && p && t {
        state = Insert;
    }
    if state == Neutral && m && p && t {
        state = SqueezeAll;
    }
    if state != DragSelection && m && !p && t {
        state = DragSelection;
    }
    if state != Neutral && !m && !p && !t {
        state = Neutral;
    }
    if state != Click && m && p && !t {
        state = Click;
    }

    TouchOutcome {
        state: (state != current).then_some(state),
        selection_started,
    }
}

/// Fingers in the order their edges are handled within one frame.
pub const EDGE_ORDER: [Finger; 3] = [Finger::Thumb, Finger::Pointer, Finger::Middle];

/// Walk from `from` to `to` one finger edge at a time and run the rule
/// table after each.  Bits held steady between frames produce nothing.
pub fn classify_touch_edges(
    from: TouchBits,
    to: TouchBits,
    current: GestureState,
) -> Vec<TouchOutcome> {
    let mut bits = from;
    let mut state = current;
    let mut outcomes = Vec::new();
    for finger in EDGE_ORDER {
        if bits.get(finger) == to.get(finger) {
            continue;
        }
        bits.set(finger, to.get(finger));
        let outcome = classify_touch(bits, state);
        if let Some(next) = outcome.state {
            state = next;
        }
        outcomes.push(outcome);
    }
    outcomes
}

// ── Press tracking ─────────────────────────────────────────

/// Fingers that went down or up between two frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchEdges {
    pub pressed: Vec<Finger>,
    pub released: Vec<Finger>,
}

/// Press/release edges, hold watches and held-long flags for one hand.
#[derive(Debug, Clone)]
pub struct TouchTracker {
    hand: Hand,
    bits: TouchBits,
    held_long: HeldLongFlags,
    hold_tasks: [Option<TaskId>; 3],
}

impl TouchTracker {
    pub fn new(hand: Hand) -> Self {
        Self {
            hand,
            bits: TouchBits::NONE,
            held_long: HeldLongFlags::default(),
            hold_tasks: [None; 3],
        }
    }

    pub fn hand(&self) -> Hand {
        self.hand
    }

    /// Bits seen on the last update.
    pub fn bits(&self) -> TouchBits {
        self.bits
    }

    pub fn held_long(&self) -> HeldLongFlags {
        self.held_long
    }

    /// Diff `bits` against the last frame and remember them.
    pub fn update(&mut self, bits: TouchBits) -> TouchEdges {
        let mut edges = TouchEdges::default();
        for finger in Finger::ALL {
            match (self.bits.get(finger), bits.get(finger)) {
                (false, true) => edges.pressed.push(finger),
                (true, false) => edges.released.push(finger),
                _ => {}
            }
        }
        self.bits = bits;
        edges
    }

    /// Remember the hold watch started for a press.
    pub fn watch(&mut self, finger: Finger, task: TaskId) {
        self.hold_tasks[finger.index()] = Some(task);
    }

    /// Clear the held-long flag and hand back the watch to cancel.
    pub fn release(&mut self, finger: Finger) -> Option<TaskId> {
        self.held_long.set(finger, false);
        self.hold_tasks[finger.index()].take()
    }

    /// Hold watch fired.  Only marks the finger if it is still down.
    pub fn mark_held(&mut self, finger: Finger) -> bool {
        self.hold_tasks[finger.index()] = None;
        if self.bits.get(finger) {
            self.held_long.set(finger, true);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.hand);
    }
}

#[cfg(test)]
fn bits(pointer: bool, thumb: bool, middle: bool) -> TouchBits {
    TouchBits::new(pointer, thumb, middle)
}
