//! Conversation - voice-loop state machine and job manager
//!
//! - `fsm`: Idle/Listening/Thinking/Speaking driver behind a channel
//! - `jobs`: cooperative jobs with pause/resume barge-in

mod fsm;
mod jobs;

#[cfg(test)]
mod tests;

pub use fsm::{
    ConversationConfig, ConversationDriver, ConversationHandle, ConversationState, Transition,
    TransitionOutcome,
};
pub use jobs::{Job, JobConfig, JobEvent, JobManager, JobState};
