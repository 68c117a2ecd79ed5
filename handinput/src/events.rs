//! Output events and the synchronous event bus.
//!
//! Subscribers run inline, on the same call stack as the transition that
//! produced the event, in subscription order.  Each subscription is
//! owned by the caller through its `SubscriptionId` and must be dropped
//! with `unsubscribe` when the subscriber goes away.

use std::fmt;

use tracing::trace;

use crate::hand::gesture::GestureState;
use crate::hand::shift_layer::RotationState;
use crate::hand::skeleton::{Finger, Hand, Vec3};
use crate::sexp::{bool_sexp, format_event};
use crate::tools::mode_dial::TransformMode;

// ── Events ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HandEvent {
    /// Committed gesture state changed.
    GestureStateChanged {
        hand: Hand,
        current: GestureState,
        previous: GestureState,
    },
    /// Shift layer changed.
    RotationStateChanged {
        hand: Hand,
        current: RotationState,
        previous: RotationState,
    },
    /// Drag lock toggled on or off.
    ModeActiveChanged { hand: Hand, active: bool },
    /// A touch press outlasted the hold threshold.
    HoldThresholdExceeded { hand: Hand, finger: Finger },
    /// Tool mode committed.  A dial close reports even an unchanged mode.
    TransformModeChanged {
        hand: Hand,
        current: TransformMode,
        previous: TransformMode,
    },
    /// Mode dial opened, closed, or its highlighted zone moved.
    ModeDialPreview {
        hand: Hand,
        open: bool,
        potential: TransformMode,
    },
    /// A drag tool started or stopped.
    ToolDragChanged {
        hand: Hand,
        tool: TransformMode,
        active: bool,
        anchor: Option<Vec3>,
    },
    /// A drag tool's gear engaged or released.
    GearChanged {
        hand: Hand,
        tool: TransformMode,
        engaged: bool,
    },
    /// DeselectAll emptied the selection.
    SelectionCleared { hand: Hand, count: usize },
}

impl HandEvent {
    pub fn hand(&self) -> Hand {
        match *self {
            Self::GestureStateChanged { hand, .. }
            | Self::RotationStateChanged { hand, .. }
            | Self::ModeActiveChanged { hand, .. }
            | Self::HoldThresholdExceeded { hand, .. }
            | Self::TransformModeChanged { hand, .. }
            | Self::ModeDialPreview { hand, .. }
            | Self::ToolDragChanged { hand, .. }
            | Self::GearChanged { hand, .. }
            | Self::SelectionCleared { hand, .. } => hand,
        }
    }

    /// Event name used in s-expression output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GestureStateChanged { .. } => "gesture-state-changed",
            Self::RotationStateChanged { .. } => "rotation-state-changed",
            Self::ModeActiveChanged { .. } => "mode-active-changed",
            Self::HoldThresholdExceeded { .. } => "hold-threshold-exceeded",
            Self::TransformModeChanged { .. } => "transform-mode-changed",
            Self::ModeDialPreview { .. } => "mode-dial-preview",
            Self::ToolDragChanged { .. } => "tool-drag-changed",
            Self::GearChanged { .. } => "gear-changed",
            Self::SelectionCleared { .. } => "selection-cleared",
        }
    }

    /// Render as `(:type :event :event :NAME :hand :left ...)`.
    pub fn to_sexp(&self) -> String {
        let hand = format!(":{}", self.hand().as_str());
        let kw = |s: &str| format!(":{}", s);
        let fields: Vec<(&str, String)> = match self {
            Self::GestureStateChanged {
                current, previous, ..
            } => vec![
                ("current", kw(current.as_str())),
                ("previous", kw(previous.as_str())),
            ],
            Self::RotationStateChanged {
                current, previous, ..
            } => vec![
                ("current", kw(current.as_str())),
                ("previous", kw(previous.as_str())),
            ],
            Self::ModeActiveChanged { active, .. } => {
                vec![("active", bool_sexp(*active).to_string())]
            }
            Self::HoldThresholdExceeded { finger, .. } => vec![("finger", kw(finger.as_str()))],
            Self::TransformModeChanged {
                current, previous, ..
            } => vec![
                ("current", kw(current.as_str())),
                ("previous", kw(previous.as_str())),
            ],
            Self::ModeDialPreview {
                open, potential, ..
            } => vec![
                ("open", bool_sexp(*open).to_string()),
                ("potential", kw(potential.as_str())),
            ],
            Self::ToolDragChanged {
                tool,
                active,
                anchor,
                ..
            } => vec![
                ("tool", kw(tool.as_str())),
                ("active", bool_sexp(*active).to_string()),
                (
                    "anchor",
                    anchor
                        .map(|a| format!("({:.3} {:.3} {:.3})", a[0], a[1], a[2]))
                        .unwrap_or_else(|| "nil".to_string()),
                ),
            ],
            Self::GearChanged { tool, engaged, .. } => vec![
                ("tool", kw(tool.as_str())),
                ("engaged", bool_sexp(*engaged).to_string()),
            ],
            Self::SelectionCleared { count, .. } => vec![("count", count.to_string())],
        };

        let mut all: Vec<(&str, &str)> = vec![("hand", hand.as_str())];
        all.extend(fields.iter().map(|(k, v)| (*k, v.as_str())));
        format_event(self.name(), &all)
    }
}

// ── Bus ────────────────────────────────────────────────────

pub type Subscriber = Box<dyn FnMut(&HandEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of subscribers notified synchronously on publish.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&HandEvent) + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() < before
    }

    pub fn publish(&mut self, event: &HandEvent) {
        trace!("publish {} to {} subscribers", event.name(), self.subscribers.len());
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}
