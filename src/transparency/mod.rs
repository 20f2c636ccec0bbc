//! Transparency module for the activity recognizer.
//!
//! Exposes what the pipeline did during a session (samples seen, windows
//! classified, fallbacks taken) without retaining any motion data.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
