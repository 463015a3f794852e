//! Output module for sweep reports
//!
//! This module handles collecting statistics from the queue and result store
//! and printing them for the `--stats` mode.

pub mod stats;

pub use stats::{load_statistics, print_statistics, SweepStatistics};
