pub mod core;
pub mod repo;
pub mod scripted;

pub use crate::core::*;
pub use crate::repo::*;
pub use crate::scripted::*;
