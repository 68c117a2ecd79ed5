//! Shift layer (`RotationState`) derived from palm or controller tilt.
//!
//! While a hand drags, tilting it picks one of four character banks
//! for in-world text entry.  Changes are broadcast once; an unmatched
//! frame leaves the layer where it is.

use tracing::debug;

use super::classifier::PoseClassifier;
use super::skeleton::{dot, scale, ControllerPose, Hand, HandSample, Vec3, WORLD_DOWN, WORLD_UP};
use crate::events::HandEvent;

/// Character bank selected by hand tilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RotationState {
    #[default]
    LowerCase,
    UpperCase,
    SpecialCharacters,
    Numbers,
}

impl RotationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowerCase => "lower-case",
            Self::UpperCase => "upper-case",
            Self::SpecialCharacters => "special-characters",
            Self::Numbers => "numbers",
        }
    }
}

/// Controller right axis as seen from this hand; mirrored for the left.
fn outward_right(hand: Hand, pose: &ControllerPose) -> Vec3 {
    match hand {
        Hand::Right => pose.right,
        Hand::Left => scale(pose.right, -1.0),
    }
}

/// Per-hand shift layer tracker.
#[derive(Debug, Clone)]
pub struct ShiftLayer {
    hand: Hand,
    state: RotationState,
    /// Controller forward axis captured when touch Selection began.
    selection_forward: Option<Vec3>,
}

impl ShiftLayer {
    pub fn new(hand: Hand) -> Self {
        Self {
            hand,
            state: RotationState::LowerCase,
            selection_forward: None,
        }
    }

    pub fn state(&self) -> RotationState {
        self.state
    }

    pub fn mark_selection_start(&mut self, forward: Vec3) {
        self.selection_forward = Some(forward);
    }

    /// Layer implied by palm orientation, first matching rule wins.
    pub fn skeletal_target(
        sample: &HandSample,
        classifier: &PoseClassifier,
        threshold: f32,
    ) -> Option<RotationState> {
        let normal = sample.palm_normal();
        if dot(sample.lateral_inward(), normal) >= threshold {
            Some(RotationState::LowerCase)
        } else if dot(WORLD_DOWN, normal) >= threshold {
            Some(RotationState::UpperCase)
        } else if dot(WORLD_UP, normal) >= threshold {
            Some(RotationState::SpecialCharacters)
        } else if classifier.is_whole_hand_up(sample) {
            Some(RotationState::Numbers)
        } else {
            None
        }
    }

    pub fn update_skeletal(
        &mut self,
        sample: &HandSample,
        classifier: &PoseClassifier,
        threshold: f32,
    ) -> Option<HandEvent> {
        let target = Self::skeletal_target(sample, classifier, threshold)?;
        self.set(target)
    }

    fn controller_holds(
        &self,
        layer: RotationState,
        pose: &ControllerPose,
        middle: bool,
        threshold: f32,
    ) -> bool {
        let right = outward_right(self.hand, pose);
        match layer {
            RotationState::LowerCase => dot(WORLD_UP, pose.up) >= threshold,
            RotationState::UpperCase => dot(WORLD_UP, right) >= threshold,
            RotationState::SpecialCharacters => dot(WORLD_UP, scale(right, -1.0)) >= threshold,
            RotationState::Numbers => {
                middle
                    && self
                        .selection_forward
                        .is_some_and(|fwd| dot(right, fwd) > threshold)
            }
        }
    }

    /// Controller-driven layer.  Re-evaluated only once the current
    /// layer's own condition stops holding; later rules override earlier.
    pub fn update_controller(
        &mut self,
        pose: &ControllerPose,
        middle: bool,
        threshold: f32,
    ) -> Option<HandEvent> {
        if self.controller_holds(self.state, pose, middle, threshold) {
            return None;
        }
        let mut target = None;
        for layer in [
            RotationState::LowerCase,
            RotationState::UpperCase,
            RotationState::SpecialCharacters,
            RotationState::Numbers,
        ] {
            if self.controller_holds(layer, pose, middle, threshold) {
                target = Some(layer);
            }
        }
        self.set(target?)
    }

    fn set(&mut self, next: RotationState) -> Option<HandEvent> {
        if next == self.state {
            return None;
        }
        let previous = self.state;
        self.state = next;
        debug!(
            "{} hand shift layer {} -> {}",
            self.hand.as_str(),
            previous.as_str(),
            next.as_str()
        );
        Some(HandEvent::RotationStateChanged {
            hand: self.hand,
            current: next,
            previous,
        })
    }
}

/// Open hand with the palm turned `down`, `up` or to the `side`.
#[cfg(test)]
fn make_tilted(hand: Hand, palm: &str) -> HandSample {
    use super::skeleton::HandJoint;
    let mut s = super::classifier::make_open_hand(hand);
    s.pointer_forward = Some([0.0, 0.0, 1.0]);
    match palm {
        // Open hand fixture: knuckle line roughly -x, fingers +z.
        "down" => {}
        "up" => {
            s.set_joint(HandJoint::Index1, [0.02, 0.0, 0.08]);
            s.set_joint(HandJoint::Pinky1, [-0.04, 0.0, 0.07]);
        }
        "side" => {
            // Knuckle line vertical: palm faces the body midline.
            s.set_joint(HandJoint::Index1, [0.0, 0.03, 0.08]);
            s.set_joint(HandJoint::Pinky1, [0.0, -0.03, 0.08]);
        }
        _ => {}
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palm_down_selects_upper_case() {
        let c = PoseClassifier::default();
        let s = make_tilted(Hand::Right, "down");
        let n = s.palm_normal();
        assert!(dot(WORLD_DOWN, n) > 0.95, "normal {:?}", n);
        assert!(dot(s.lateral_inward(), n) < 0.75);

        let mut layer = ShiftLayer::new(Hand::Right);
        let event = layer.update_skeletal(&s, &c, 0.75);
        assert_eq!(
            event,
            Some(HandEvent::RotationStateChanged {
                hand: Hand::Right,
                current: RotationState::UpperCase,
                previous: RotationState::LowerCase,
            })
        );
        assert_eq!(layer.update_skeletal(&s, &c, 0.75), None);
    }

    #[test]
    fn test_palm_up_selects_special() {
        let c = PoseClassifier::default();
        let s = make_tilted(Hand::Right, "up");
        let mut layer = ShiftLayer::new(Hand::Right);
        layer.update_skeletal(&s, &c, 0.75);
        assert_eq!(layer.state(), RotationState::SpecialCharacters);
    }

    #[test]
    fn test_palm_facing_inward_selects_lower_case() {
        let c = PoseClassifier::default();
        let mut layer = ShiftLayer::new(Hand::Right);
        layer.update_skeletal(&make_tilted(Hand::Right, "down"), &c, 0.75);
        assert_eq!(layer.state(), RotationState::UpperCase);

        let side = make_tilted(Hand::Right, "side");
        assert!(dot(side.lateral_inward(), side.palm_normal()) >= 0.75);
        layer.update_skeletal(&side, &c, 0.75);
        assert_eq!(layer.state(), RotationState::LowerCase);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let c = PoseClassifier::default();
        let s = make_tilted(Hand::Right, "down");
        let exact = dot(WORLD_DOWN, s.palm_normal());
        assert_eq!(
            ShiftLayer::skeletal_target(&s, &c, exact),
            Some(RotationState::UpperCase)
        );
    }

    #[test]
    fn test_controller_layers() {
        let mut layer = ShiftLayer::new(Hand::Right);
        let upright = ControllerPose::default();
        assert_eq!(layer.update_controller(&upright, false, 0.75), None);

        // Rolled so the right axis points up.
        let rolled = ControllerPose {
            up: [-1.0, 0.0, 0.0],
            right: [0.0, 1.0, 0.0],
            ..ControllerPose::default()
        };
        layer.update_controller(&rolled, false, 0.75);
        assert_eq!(layer.state(), RotationState::UpperCase);

        // Left hand mirrors the right axis.
        let mut left = ShiftLayer::new(Hand::Left);
        left.update_controller(&rolled, false, 0.75);
        assert_eq!(left.state(), RotationState::SpecialCharacters);
    }

    #[test]
    fn test_controller_numbers_needs_selection_marker() {
        let mut layer = ShiftLayer::new(Hand::Right);
        let pose = ControllerPose {
            up: [0.0, 0.0, 1.0],
            right: [1.0, 0.0, 0.0],
            forward: [0.0, -1.0, 0.0],
            ..ControllerPose::default()
        };
        assert_eq!(layer.update_controller(&pose, true, 0.75), None);
        layer.mark_selection_start([1.0, 0.0, 0.0]);
        layer.update_controller(&pose, true, 0.75);
        assert_eq!(layer.state(), RotationState::Numbers);
        // Holds while its own condition holds.
        assert_eq!(layer.update_controller(&pose, true, 0.75), None);
    }
}
