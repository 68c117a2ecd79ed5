//! Stateless pose classification from skeletal joint positions.
//!
//! Each frame a hand sample is mapped to exactly one raw `GestureState`
//! by a fixed priority chain of threshold tests.  The first rule that
//! matches wins; anything unmatched is `Neutral`.

use tracing::trace;

use super::gesture::GestureState;
use super::skeleton::{distance, dot, HandJoint, HandSample, Vec3, WORLD_UP};

// ── Config ─────────────────────────────────────────────────

/// Where pinch signals come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinchSource {
    /// Use the runtime's pinch flags; fall back to geometry when absent.
    Runtime,
    /// Always measure thumb-tip distance.
    Geometric,
}

impl PinchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::Geometric => "geometric",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "runtime" => Some(Self::Runtime),
            "geometric" => Some(Self::Geometric),
            _ => None,
        }
    }
}

/// Calibration constants for pose classification.
///
/// Lengths are meters.  Dot cutoffs compare unit vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierThresholds {
    /// Wrist-to-index-tip distance below which the index counts as curled.
    pub index_curl_m: f32,
    pub middle_curl_m: f32,
    pub ring_curl_m: f32,
    pub pinky_curl_m: f32,
    /// Thumb-tip to index second joint: above is thumb out, below is tucked.
    pub thumb_out_m: f32,
    /// Index/middle alignment below which the fingers count as split.
    pub finger_split_dot: f32,
    /// Index alignment with world up for pointing upward.
    pub pointing_up_dot: f32,
    /// Index/middle alignment above which the hand counts as flat.
    pub palm_flat_dot: f32,
    /// Knuckle line to world up distance outside which the palm is level.
    pub palm_level_distance: f32,
    /// Middle and ring alignment with world up for whole hand up.
    pub whole_hand_up_dot: f32,
    /// Thumb-tip to fingertip distance for a geometric pinch.
    pub pinch_distance_m: f32,
    pub pinch_source: PinchSource,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            index_curl_m: 0.11,
            middle_curl_m: 0.11,
            ring_curl_m: 0.08,
            pinky_curl_m: 0.08,
            thumb_out_m: 0.05,
            finger_split_dot: 0.0,
            pointing_up_dot: 0.7,
            palm_flat_dot: 0.7,
            palm_level_distance: 0.5,
            whole_hand_up_dot: 0.7,
            pinch_distance_m: 0.02,
            pinch_source: PinchSource::Runtime,
        }
    }
}

// ── Classifier ─────────────────────────────────────────────

/// Maps a single hand sample to a raw gesture classification.
#[derive(Debug, Clone, Default)]
pub struct PoseClassifier {
    pub thresholds: ClassifierThresholds,
}

impl PoseClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    /// Classify a sample.  Never fails; unmatched poses are `Neutral`.
    pub fn classify(&self, sample: &HandSample) -> GestureState {
        let (rule, state) = self.match_rule(sample);
        trace!("{} hand matched {} -> {}", sample.hand.as_str(), rule, state.as_str());
        state
    }

    fn match_rule(&self, sample: &HandSample) -> (&'static str, GestureState) {
        if !sample.tracked {
            return ("untracked", GestureState::Neutral);
        }
        if self.is_fist_closed_thumb_out(sample) {
            return ("fist-thumb-out", GestureState::Stop);
        }
        if self.is_fist_closed(sample) {
            return ("fist-closed", GestureState::SqueezeAll);
        }
        if self.is_index_pinching(sample) {
            return ("index-pinch", GestureState::Insert);
        }
        if self.is_middle_pinching(sample) {
            return ("middle-pinch", GestureState::DragSelection);
        }
        if self.is_pointing_upward(sample) {
            return ("pointing-up", GestureState::DeselectAll);
        }
        if self.is_pointing_palm_down(sample) {
            return ("pointing-palm-down", GestureState::Deselection);
        }
        if self.is_palm_flat_thumb_out(sample) {
            return ("palm-flat", GestureState::Selection);
        }
        ("none", GestureState::Neutral)
    }

    // ── Predicates ─────────────────────────────────────────

    /// All four fingertips within their curl radius of the wrist.
    pub fn fingers_curled(&self, sample: &HandSample) -> bool {
        let t = &self.thresholds;
        let wrist = HandJoint::WristRoot;
        sample.joint_distance(wrist, HandJoint::IndexTip) < t.index_curl_m
            && sample.joint_distance(wrist, HandJoint::MiddleTip) < t.middle_curl_m
            && sample.joint_distance(wrist, HandJoint::RingTip) < t.ring_curl_m
            && sample.joint_distance(wrist, HandJoint::PinkyTip) < t.pinky_curl_m
    }

    fn thumb_gap(&self, sample: &HandSample) -> f32 {
        sample.joint_distance(HandJoint::ThumbTip, HandJoint::Index2)
    }

    pub fn is_fist_closed_thumb_out(&self, sample: &HandSample) -> bool {
        self.fingers_curled(sample) && self.thumb_gap(sample) > self.thresholds.thumb_out_m
    }

    pub fn is_fist_closed(&self, sample: &HandSample) -> bool {
        self.fingers_curled(sample) && self.thumb_gap(sample) < self.thresholds.thumb_out_m
    }

    fn pinch(&self, reported: Option<bool>, sample: &HandSample, tip: HandJoint) -> bool {
        let geometric =
            || sample.joint_distance(HandJoint::ThumbTip, tip) < self.thresholds.pinch_distance_m;
        match (self.thresholds.pinch_source, reported) {
            (PinchSource::Runtime, Some(flag)) => flag,
            _ => geometric(),
        }
    }

    pub fn is_index_pinching(&self, sample: &HandSample) -> bool {
        self.pinch(sample.index_pinching, sample, HandJoint::IndexTip)
    }

    pub fn is_middle_pinching(&self, sample: &HandSample) -> bool {
        self.pinch(sample.middle_pinching, sample, HandJoint::MiddleTip)
    }

    fn index_direction(sample: &HandSample) -> Vec3 {
        sample.joint_direction(HandJoint::Index1, HandJoint::IndexTip)
    }

    fn middle_direction(sample: &HandSample) -> Vec3 {
        sample.joint_direction(HandJoint::Middle1, HandJoint::MiddleTip)
    }

    fn finger_alignment(sample: &HandSample) -> f32 {
        dot(Self::index_direction(sample), Self::middle_direction(sample))
    }

    /// Knuckle line far enough from vertical for the palm to be level.
    /// Both vectors are unit length, so the distance lies in [0, 2].
    pub fn is_palm_level(&self, sample: &HandSample) -> bool {
        distance(sample.knuckle_line(), WORLD_UP) > self.thresholds.palm_level_distance
    }

    pub fn is_pointing_upward(&self, sample: &HandSample) -> bool {
        Self::finger_alignment(sample) < self.thresholds.finger_split_dot
            && dot(Self::index_direction(sample), WORLD_UP) > self.thresholds.pointing_up_dot
    }

    pub fn is_pointing_palm_down(&self, sample: &HandSample) -> bool {
        Self::finger_alignment(sample) < self.thresholds.finger_split_dot
            && self.is_palm_level(sample)
    }

    pub fn is_palm_flat_thumb_out(&self, sample: &HandSample) -> bool {
        Self::finger_alignment(sample) > self.thresholds.palm_flat_dot && self.is_palm_level(sample)
    }

    /// Middle and ring fingers both pointing up.  Used by the shift layer.
    pub fn is_whole_hand_up(&self, sample: &HandSample) -> bool {
        let cutoff = self.thresholds.whole_hand_up_dot;
        let middle = Self::middle_direction(sample);
        let ring = sample.joint_direction(HandJoint::Ring1, HandJoint::RingTip);
        dot(WORLD_UP, middle) > cutoff && dot(WORLD_UP, ring) > cutoff
    }
}

// ── Test fixtures ──────────────────────────────────────────

/// Open hand, fingers extended forward (+z).  Palm down for the right hand.
#[cfg(test)]
pub(crate) fn make_open_hand(hand: super::skeleton::Hand) -> HandSample {
    let mut s = HandSample::untracked(hand);
    s.tracked = true;
    let joints: [(HandJoint, Vec3); 12] = [
        (HandJoint::WristRoot, [0.0, 0.0, 0.0]),
        (HandJoint::Thumb1, [-0.03, 0.0, 0.03]),
        (HandJoint::ThumbTip, [-0.07, 0.0, 0.06]),
        (HandJoint::Index1, [-0.02, 0.0, 0.08]),
        (HandJoint::Index2, [-0.02, 0.0, 0.11]),
        (HandJoint::IndexTip, [-0.02, 0.0, 0.16]),
        (HandJoint::Middle1, [0.0, 0.0, 0.08]),
        (HandJoint::MiddleTip, [0.0, 0.0, 0.17]),
        (HandJoint::Ring1, [0.02, 0.0, 0.08]),
        (HandJoint::RingTip, [0.02, 0.0, 0.15]),
        (HandJoint::Pinky1, [0.04, 0.0, 0.07]),
        (HandJoint::PinkyTip, [0.04, 0.0, 0.12]),
    ];
    for (joint, pos) in joints {
        s.set_joint(joint, pos);
    }
    s
}

/// All four fingers curled toward the wrist; thumb tucked or out.
#[cfg(test)]
pub(crate) fn make_fist(hand: super::skeleton::Hand, thumb_out: bool) -> HandSample {
    let mut s = make_open_hand(hand);
    s.set_joint(HandJoint::IndexTip, [-0.02, -0.03, 0.05]);
    s.set_joint(HandJoint::MiddleTip, [0.0, -0.03, 0.05]);
    s.set_joint(HandJoint::RingTip, [0.02, -0.03, 0.04]);
    s.set_joint(HandJoint::PinkyTip, [0.03, -0.02, 0.04]);
    let thumb = if thumb_out {
        [-0.09, 0.02, 0.05]
    } else {
        [-0.02, -0.02, 0.09]
    };
    s.set_joint(HandJoint::ThumbTip, thumb);
    s
}

/// Index finger extended along `index_dir`, middle finger curled back.
#[cfg(test)]
pub(crate) fn make_pointing(hand: super::skeleton::Hand, index_tip: Vec3) -> HandSample {
    let mut s = make_open_hand(hand);
    s.set_joint(HandJoint::IndexTip, index_tip);
    s.set_joint(HandJoint::MiddleTip, [0.0, -0.01, 0.05]);
    s
}
