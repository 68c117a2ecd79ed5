//! Drag tools and their gear-engagement latch.
//!
//! A drag tool anchors where the drag began.  Rotate and Scale then
//! watch the hand's distance from that anchor: moving past the radius
//! engages the gear, coming back inside disengages it.

use tracing::debug;

use super::mode_dial::TransformMode;
use crate::events::HandEvent;
use crate::hand::gesture::GestureState;
use crate::hand::skeleton::{distance, Hand, Vec3};

// ── Latch ──────────────────────────────────────────────────

/// Two-state latch on a distance.  Equal to the radius changes nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct GearLatch {
    pub radius_m: f32,
    engaged: bool,
}

impl GearLatch {
    pub fn new(radius_m: f32) -> Self {
        Self {
            radius_m,
            engaged: false,
        }
    }

    pub fn engaged(&self) -> bool {
        self.engaged
    }

    /// Returns the new state when it flips.
    pub fn update(&mut self, distance_m: f32) -> Option<bool> {
        if distance_m > self.radius_m && !self.engaged {
            self.engaged = true;
            Some(true)
        } else if distance_m < self.radius_m && self.engaged {
            self.engaged = false;
            Some(false)
        } else {
            None
        }
    }

    pub fn release(&mut self) -> bool {
        std::mem::replace(&mut self.engaged, false)
    }
}

// ── Tool ───────────────────────────────────────────────────

/// One mode's drag tool on one hand.
#[derive(Debug, Clone)]
pub struct DragTool {
    hand: Hand,
    mode: TransformMode,
    active: bool,
    anchor: Option<Vec3>,
    /// Translate has no gear.
    gear: Option<GearLatch>,
}

impl DragTool {
    pub fn new(hand: Hand, mode: TransformMode, gear_radius_m: f32) -> Self {
        let gear = match mode {
            TransformMode::Rotate | TransformMode::Scale => Some(GearLatch::new(gear_radius_m)),
            _ => None,
        };
        Self {
            hand,
            mode,
            active: false,
            anchor: None,
            gear,
        }
    }

    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn anchor(&self) -> Option<Vec3> {
        self.anchor
    }

    pub fn gear_engaged(&self) -> bool {
        self.gear.as_ref().is_some_and(GearLatch::engaged)
    }

    fn starts_drag(&self, current: GestureState, previous: GestureState) -> bool {
        if self.active || current != GestureState::DragSelection {
            return false;
        }
        match self.mode {
            TransformMode::Translate => true,
            _ => matches!(previous, GestureState::Selection | GestureState::Neutral),
        }
    }

    fn ends_drag(&self, current: GestureState, previous: GestureState) -> bool {
        if !self.active {
            return false;
        }
        match self.mode {
            TransformMode::Translate => {
                previous == GestureState::DragSelection && current != GestureState::DragSelection
            }
            _ => current == GestureState::Stop,
        }
    }

    /// React to a gesture transition while this tool's mode is selected.
    pub fn on_gesture(
        &mut self,
        current: GestureState,
        previous: GestureState,
        position: Option<Vec3>,
    ) -> Vec<HandEvent> {
        if self.starts_drag(current, previous) {
            self.active = true;
            self.anchor = position;
            debug!("{} hand {} drag started", self.hand.as_str(), self.mode.as_str());
            vec![self.drag_event()]
        } else if self.ends_drag(current, previous) {
            self.disengage()
        } else {
            Vec::new()
        }
    }

    /// Per-frame gear check against the anchor.
    pub fn update(&mut self, position: Option<Vec3>) -> Option<HandEvent> {
        if !self.active {
            return None;
        }
        let (anchor, pos) = (self.anchor?, position?);
        let engaged = self.gear.as_mut()?.update(distance(anchor, pos))?;
        debug!(
            "{} hand {} gear {}",
            self.hand.as_str(),
            self.mode.as_str(),
            if engaged { "engaged" } else { "released" }
        );
        Some(HandEvent::GearChanged {
            hand: self.hand,
            tool: self.mode,
            engaged,
        })
    }

    /// End any drag in progress.
    pub fn disengage(&mut self) -> Vec<HandEvent> {
        if !self.active {
            return Vec::new();
        }
        let mut events = Vec::new();
        if self.gear.as_mut().is_some_and(GearLatch::release) {
            events.push(HandEvent::GearChanged {
                hand: self.hand,
                tool: self.mode,
                engaged: false,
            });
        }
        self.active = false;
        debug!("{} hand {} drag ended", self.hand.as_str(), self.mode.as_str());
        events.push(self.drag_event());
        self.anchor = None;
        events
    }

    fn drag_event(&self) -> HandEvent {
        HandEvent::ToolDragChanged {
            hand: self.hand,
            tool: self.mode,
            active: self.active,
            anchor: self.anchor,
        }
    }
}

/// The drag tools available to one hand.
#[derive(Debug, Clone)]
pub struct ToolSet {
    tools: [DragTool; 3],
}

impl ToolSet {
    pub fn new(hand: Hand, gear_radius_m: f32) -> Self {
        Self {
            tools: [
                DragTool::new(hand, TransformMode::Translate, gear_radius_m),
                DragTool::new(hand, TransformMode::Rotate, gear_radius_m),
                DragTool::new(hand, TransformMode::Scale, gear_radius_m),
            ],
        }
    }

    pub fn tool(&self, mode: TransformMode) -> Option<&DragTool> {
        self.tools.iter().find(|t| t.mode == mode)
    }

    pub fn active_tool(&self) -> Option<&DragTool> {
        self.tools.iter().find(|t| t.active)
    }

    /// Route a transition to the tool for `mode`, if there is one.
    pub fn on_gesture(
        &mut self,
        mode: TransformMode,
        current: GestureState,
        previous: GestureState,
        position: Option<Vec3>,
    ) -> Vec<HandEvent> {
        self.tools
            .iter_mut()
            .find(|t| t.mode == mode)
            .map(|t| t.on_gesture(current, previous, position))
            .unwrap_or_default()
    }

    /// Disengage every tool whose mode is no longer selected.
    pub fn on_mode_change(&mut self, mode: TransformMode) -> Vec<HandEvent> {
        self.tools
            .iter_mut()
            .filter(|t| t.mode != mode)
            .flat_map(DragTool::disengage)
            .collect()
    }

    pub fn update(&mut self, position: Option<Vec3>) -> Vec<HandEvent> {
        self.tools
            .iter_mut()
            .filter_map(|t| t.update(position))
            .collect()
    }

    pub fn disengage_all(&mut self) -> Vec<HandEvent> {
        self.tools.iter_mut().flat_map(DragTool::disengage).collect()
    }
}
