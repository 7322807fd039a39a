//! Server-side task tracking

pub mod poller;

pub use poller::{
    wait_for_task, PollState, PollerConfig, ProgressCallback, TaskCompletion, TaskOutcome,
    TaskPoller,
};
