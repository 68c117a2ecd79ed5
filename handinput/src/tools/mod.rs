//! Consumers of committed gesture transitions: the mode dial, drag
//! tools with gear engagement, and the selection set.

pub mod gear;
pub mod mode_dial;
pub mod selection;

pub use gear::{DragTool, GearLatch, ToolSet};
pub use mode_dial::{DialZones, ModeDial, TransformMode};
pub use selection::{ObjectId, SelectionSet};
