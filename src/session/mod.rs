//! Annotation session: regions, the guarded store and the command queue

pub mod commands;
pub mod region;
pub mod store;

pub use commands::{CommandQueue, SessionCommand};
pub use region::{Region, RegionId};
pub use store::{ImageSession, SessionExport};
