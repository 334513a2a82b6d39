//! # statlink-agent
//!
//! Host agent for statlink: loads configuration, sets up logging and runs the
//! connection supervisor against the local Bluetooth adapter.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod cli;
pub mod logging;
