//! Radial mode dial.
//!
//! Squeezing all fingers opens the dial; while it is open the palm's
//! tilt picks a potential mode from fixed zones; leaving SqueezeAll
//! commits that mode.

use tracing::{debug, info};

use crate::events::HandEvent;
use crate::hand::gesture::GestureState;
use crate::hand::skeleton::Hand;

/// Tool mode gating which drag tools react to gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransformMode {
    Create,
    #[default]
    Translate,
    Rotate,
    Scale,
    Pivot,
    Text,
}

impl TransformMode {
    pub const ALL: [TransformMode; 6] = [
        Self::Create,
        Self::Translate,
        Self::Rotate,
        Self::Scale,
        Self::Pivot,
        Self::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Translate => "translate",
            Self::Rotate => "rotate",
            Self::Scale => "scale",
            Self::Pivot => "pivot",
            Self::Text => "text",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.as_str() == s)
    }
}

/// Lower bounds (exclusive) of each dial zone, top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct DialZones {
    pub create: f32,
    pub rotate: f32,
    pub translate: f32,
    pub scale: f32,
}

impl Default for DialZones {
    fn default() -> Self {
        Self {
            create: 0.7,
            rotate: 0.3,
            translate: -0.3,
            scale: -0.7,
        }
    }
}

impl DialZones {
    /// Mode for a palm-up alignment in [-1, 1].  Below every bound is Text.
    pub fn zone_for(&self, alignment: f32) -> TransformMode {
        if alignment > self.create {
            TransformMode::Create
        } else if alignment > self.rotate {
            TransformMode::Rotate
        } else if alignment > self.translate {
            TransformMode::Translate
        } else if alignment > self.scale {
            TransformMode::Scale
        } else {
            TransformMode::Text
        }
    }

    /// Bounds must descend strictly.
    pub fn is_ordered(&self) -> bool {
        self.create > self.rotate && self.rotate > self.translate && self.translate > self.scale
    }
}

/// Per-hand dial and committed transform mode.
#[derive(Debug, Clone)]
pub struct ModeDial {
    hand: Hand,
    pub zones: DialZones,
    open: bool,
    current: TransformMode,
    previous: TransformMode,
    potential: TransformMode,
}

impl ModeDial {
    pub fn new(hand: Hand, zones: DialZones) -> Self {
        Self {
            hand,
            zones,
            open: false,
            current: TransformMode::default(),
            previous: TransformMode::default(),
            potential: TransformMode::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn current(&self) -> TransformMode {
        self.current
    }

    pub fn previous(&self) -> TransformMode {
        self.previous
    }

    pub fn potential(&self) -> TransformMode {
        self.potential
    }

    /// React to a committed gesture transition.
    pub fn on_gesture(&mut self, state: GestureState) -> Vec<HandEvent> {
        let mut events = Vec::new();
        if state == GestureState::SqueezeAll && !self.open {
            self.open = true;
            self.potential = self.current;
            debug!("{} hand mode dial opened", self.hand.as_str());
            events.push(self.preview());
        } else if state != GestureState::SqueezeAll && self.open {
            self.open = false;
            events.push(self.preview());
            // Closing always reports, even when the mode stays the same.
            events.push(self.select(self.potential));
        }
        events
    }

    /// Track palm tilt while open.  Emits a preview when the zone changes.
    pub fn update(&mut self, alignment: f32) -> Option<HandEvent> {
        if !self.open {
            return None;
        }
        let zone = self.zones.zone_for(alignment);
        if zone == self.potential {
            return None;
        }
        self.potential = zone;
        Some(self.preview())
    }

    /// Set the mode directly, bypassing the dial.  Same mode is a no-op.
    pub fn commit(&mut self, mode: TransformMode) -> Option<HandEvent> {
        if mode == self.current {
            return None;
        }
        Some(self.select(mode))
    }

    fn select(&mut self, mode: TransformMode) -> HandEvent {
        self.previous = self.current;
        self.current = mode;
        info!(
            "{} hand mode {} -> {}",
            self.hand.as_str(),
            self.previous.as_str(),
            self.current.as_str()
        );
        HandEvent::TransformModeChanged {
            hand: self.hand,
            current: self.current,
            previous: self.previous,
        }
    }

    fn preview(&self) -> HandEvent {
        HandEvent::ModeDialPreview {
            hand: self.hand,
            open: self.open,
            potential: self.potential,
        }
    }
}
