//! Shared data model for the bar orchestrator: Lemon, Block, Spark, State,
//! and the pure (non-async) scheduling and format-parsing logic that sits
//! on top of them.

pub mod error;
pub mod format;
pub mod scheduling;
pub mod types;

pub use error::LemonError;
pub use scheduling::WAIT_TOLERANCE;
pub use types::{
    ActionCommands, Align, Block, BlockDefaults, BlockId, BlockStyle, ChildId, Fonts, Geometry,
    Lemon, LemonColors, Mode, Preferences, Spark, SparkId, State,
};
