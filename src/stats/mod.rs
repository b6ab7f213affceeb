//! Session statistics for the posture agent.
//!
//! Counts what the agent processed so users can see what it did.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SessionLog, SessionStats,
    SharedSessionLog,
};
