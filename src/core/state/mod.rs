// src/core/state/mod.rs

//! Defines the central `ServerState` struct and all related state components.

mod client;
mod core;
mod stats;
mod workspace;

pub use client::*;
pub use core::ServerState;
pub use stats::StatsState;
pub use workspace::Workspace;
