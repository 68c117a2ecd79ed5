//! Hand skeleton data model shared by every stage of the pipeline.
//!
//! Models the subset of tracked joints the classifiers read, the
//! capacitive touch bits reported by a held controller, and the small
//! amount of vector math the threshold geometry needs.

// ── Vector math ────────────────────────────────────────────

/// Position or direction in meters, in a head/world-consistent frame.
pub type Vec3 = [f32; 3];

pub const WORLD_UP: Vec3 = [0.0, 1.0, 0.0];
pub const WORLD_DOWN: Vec3 = [0.0, -1.0, 0.0];

pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(v: Vec3, s: f32) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

pub fn dot(a: Vec3, b: Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn length(v: Vec3) -> f32 {
    dot(v, v).sqrt()
}

/// Euclidean distance between two points.
pub fn distance(a: Vec3, b: Vec3) -> f32 {
    length(sub(a, b))
}

/// Unit vector in the direction of `v`.  A zero vector stays zero.
pub fn normalize(v: Vec3) -> Vec3 {
    let len = length(v);
    if len <= f32::EPSILON {
        return [0.0, 0.0, 0.0];
    }
    scale(v, 1.0 / len)
}

/// Unit direction from `from` to `to`.
pub fn direction(from: Vec3, to: Vec3) -> Vec3 {
    normalize(sub(to, from))
}

pub(crate) fn lerp3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

// ── Hand enum ──────────────────────────────────────────────

/// Which hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    /// Per-frame processing order.
    pub const ALL: [Hand; 2] = [Hand::Right, Hand::Left];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// Slot in per-hand arrays.
    pub fn index(&self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    /// Mirror factor for geometry that flips between hands.
    pub fn mirror(&self) -> f32 {
        match self {
            Self::Left => 1.0,
            Self::Right => -1.0,
        }
    }
}

// ── Joint definitions ──────────────────────────────────────

/// Skeletal joints read by the classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandJoint {
    WristRoot,
    Thumb1,
    ThumbTip,
    Index1,
    Index2,
    IndexTip,
    Middle1,
    MiddleTip,
    Ring1,
    RingTip,
    Pinky1,
    PinkyTip,
}

/// Number of joints carried per hand.
pub const JOINT_COUNT: usize = 12;

impl HandJoint {
    pub const ALL: [HandJoint; JOINT_COUNT] = [
        Self::WristRoot,
        Self::Thumb1,
        Self::ThumbTip,
        Self::Index1,
        Self::Index2,
        Self::IndexTip,
        Self::Middle1,
        Self::MiddleTip,
        Self::Ring1,
        Self::RingTip,
        Self::Pinky1,
        Self::PinkyTip,
    ];

    /// Convert joint enum to array index.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WristRoot => "wrist-root",
            Self::Thumb1 => "thumb-1",
            Self::ThumbTip => "thumb-tip",
            Self::Index1 => "index-1",
            Self::Index2 => "index-2",
            Self::IndexTip => "index-tip",
            Self::Middle1 => "middle-1",
            Self::MiddleTip => "middle-tip",
            Self::Ring1 => "ring-1",
            Self::RingTip => "ring-tip",
            Self::Pinky1 => "pinky-1",
            Self::PinkyTip => "pinky-tip",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|j| j.as_str() == s)
    }
}

// ── Touch bits ─────────────────────────────────────────────

/// Finger slots on a capacitive controller, in held-long array order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Pointer,
    Thumb,
    Middle,
}

impl Finger {
    pub const ALL: [Finger; 3] = [Finger::Pointer, Finger::Thumb, Finger::Middle];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pointer => "pointer",
            Self::Thumb => "thumb",
            Self::Middle => "middle",
        }
    }
}

/// Capacitive touch state for one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchBits {
    pub pointer: bool,
    pub thumb: bool,
    pub middle: bool,
}

impl TouchBits {
    pub const NONE: TouchBits = TouchBits {
        pointer: false,
        thumb: false,
        middle: false,
    };

    pub fn new(pointer: bool, thumb: bool, middle: bool) -> Self {
        Self {
            pointer,
            thumb,
            middle,
        }
    }

    pub fn get(&self, finger: Finger) -> bool {
        match finger {
            Finger::Pointer => self.pointer,
            Finger::Thumb => self.thumb,
            Finger::Middle => self.middle,
        }
    }

    pub fn set(&mut self, finger: Finger, on: bool) {
        match finger {
            Finger::Pointer => self.pointer = on,
            Finger::Thumb => self.thumb = on,
            Finger::Middle => self.middle = on,
        }
    }

    pub fn any(&self) -> bool {
        self.pointer || self.thumb || self.middle
    }
}

// ── Controller pose ────────────────────────────────────────

/// Pose of a held controller.  Axes are unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerPose {
    pub position: Vec3,
    pub up: Vec3,
    pub right: Vec3,
    pub forward: Vec3,
}

impl Default for ControllerPose {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            up: WORLD_UP,
            right: [1.0, 0.0, 0.0],
            forward: [0.0, 0.0, 1.0],
        }
    }
}

// ── Hand sample ────────────────────────────────────────────

/// One hand's skeletal data for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HandSample {
    pub hand: Hand,
    /// Whether the runtime currently tracks this hand.
    pub tracked: bool,
    /// Joint positions indexed by `HandJoint::index`.
    pub joints: [Vec3; JOINT_COUNT],
    /// Runtime-reported index pinch, if the runtime reports pinches.
    pub index_pinching: Option<bool>,
    /// Runtime-reported middle pinch, if the runtime reports pinches.
    pub middle_pinching: Option<bool>,
    /// Forward axis of the runtime's pointer pose, if available.
    pub pointer_forward: Option<Vec3>,
}

impl HandSample {
    /// An untracked sample with all joints at the origin.
    pub fn untracked(hand: Hand) -> Self {
        Self {
            hand,
            tracked: false,
            joints: [[0.0; 3]; JOINT_COUNT],
            index_pinching: None,
            middle_pinching: None,
            pointer_forward: None,
        }
    }

    pub fn joint(&self, joint: HandJoint) -> Vec3 {
        self.joints[joint.index()]
    }

    pub fn set_joint(&mut self, joint: HandJoint, position: Vec3) {
        self.joints[joint.index()] = position;
    }

    /// Distance between two joints on this hand.
    pub fn joint_distance(&self, a: HandJoint, b: HandJoint) -> f32 {
        distance(self.joint(a), self.joint(b))
    }

    /// Unit direction from joint `from` to joint `to`.
    pub fn joint_direction(&self, from: HandJoint, to: HandJoint) -> Vec3 {
        direction(self.joint(from), self.joint(to))
    }

    /// Line across the knuckles, pinky base toward index base.
    pub fn knuckle_line(&self) -> Vec3 {
        self.joint_direction(HandJoint::Pinky1, HandJoint::Index1)
    }

    /// Palm normal, mirrored so that both hands point out of the palm.
    pub fn palm_normal(&self) -> Vec3 {
        let wrist_dir = self.joint_direction(HandJoint::Middle1, HandJoint::WristRoot);
        let n = cross(self.knuckle_line(), wrist_dir);
        match self.hand {
            Hand::Right => n,
            Hand::Left => scale(n, -1.0),
        }
    }

    /// Pointer forward axis, falling back to wrist toward middle knuckle.
    pub fn pointer_forward(&self) -> Vec3 {
        self.pointer_forward
            .unwrap_or_else(|| self.joint_direction(HandJoint::WristRoot, HandJoint::Middle1))
    }

    /// Horizontal vector pointing from this hand toward the body midline.
    pub fn lateral_inward(&self) -> Vec3 {
        scale(cross(WORLD_UP, self.pointer_forward()), self.hand.mirror())
    }
}

// ── Per-frame input ────────────────────────────────────────

/// Everything the runtime reports for one hand in one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandFrame {
    pub skeleton: Option<HandSample>,
    /// Present while a controller is held in this hand.
    pub touch: Option<TouchBits>,
    pub controller: Option<ControllerPose>,
}

/// Input for one frame tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    /// Frame timestamp in milliseconds.
    pub time_ms: f64,
    pub left: HandFrame,
    pub right: HandFrame,
}

impl FrameInput {
    pub fn hand(&self, hand: Hand) -> &HandFrame {
        match hand {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }

    pub fn hand_mut(&mut self, hand: Hand) -> &mut HandFrame {
        match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────
