pub mod command;
pub mod config;
pub mod error;
pub mod refs;
pub mod sink;
pub mod target;
pub mod url;
