//! Dual-hand gesture recognition for spatial editing.
//!
//! Skeletal hand-tracking samples and capacitive touch bits go in;
//! stable per-hand gesture transitions, shift-layer changes, tool-mode
//! changes and drag/gear events come out, through `HandInputSystem`.

pub mod config;
pub mod error;
pub mod events;
pub mod hand;
pub mod replay;
pub mod sexp;
pub mod state;
pub mod tools;

pub use config::GestureConfig;
pub use error::{Error, Result};
pub use events::{EventBus, HandEvent, SubscriptionId};
pub use hand::{
    DebouncePolicy, Finger, FrameInput, GestureState, Hand, HandFrame, HandJoint, HandSample,
    RawFrame, RawHand, RotationState, TouchBits,
};
pub use state::{HandInputSystem, HandInputSystemBuilder, InputSource};
pub use tools::{ObjectId, SelectionSet, TransformMode};
