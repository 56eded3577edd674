pub mod command;
pub mod config;
pub mod error;
pub mod fusion;
pub mod hook;
pub mod lock;
pub mod mirror;
pub mod outcome;
pub mod repo;
pub mod socket;
pub mod timer;
