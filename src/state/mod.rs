//! State module for task outcomes
//!
//! - `OutcomeStatus`: the persisted terminal status of a processed task
//! - `TaskOutcome`: what a worker lane did with one delivery

mod outcome;

pub use outcome::{OutcomeStatus, TaskOutcome};
