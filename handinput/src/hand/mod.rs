//! Per-hand gesture pipeline.
//!
//! Provides:
//! - `skeleton`: joints, touch bits and vector math shared by every stage
//! - `sampler`: raw runtime data to normalized `HandSample`s
//! - `classifier`: stateless pose classification
//! - `gesture`: committed gesture state and drag-lock toggle
//! - `touch`: capacitive touch rule table and held-long flags
//! - `shift_layer`: palm/controller tilt to character bank
//! - `timers`: frame clock and cancellable timed tasks

pub mod classifier;
pub mod gesture;
pub mod sampler;
pub mod shift_layer;
pub mod skeleton;
pub mod timers;
pub mod touch;

pub use classifier::{ClassifierThresholds, PinchSource, PoseClassifier};
pub use gesture::{DebouncePolicy, GestureState, HandGestureMachine, TransitionContext};
pub use sampler::{PoseSampler, RawFrame, RawHand, SamplerConfig};
pub use shift_layer::{RotationState, ShiftLayer};
pub use skeleton::{
    ControllerPose, Finger, FrameInput, Hand, HandFrame, HandJoint, HandSample, TouchBits, Vec3,
};
pub use timers::{FrameClock, TaskId, TaskKind, TaskScheduler, Wake};
pub use touch::{HeldLongFlags, TouchTracker};
