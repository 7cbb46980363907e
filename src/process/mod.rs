//! Server process supervision.
//!
//! Owns the single server child process of this node: launching it against
//! the rendered configuration, answering liveness queries, and stopping it
//! gracefully with a forced kill as the fallback.
//!
//! ## Module Structure
//!
//! - `types`: launch description, handle, state, rotation settings
//! - `lifecycle`: [`ProcessSupervisor`]
//! - `log_rotation`: rotation of the stdout capture file
//! - `follow`: [`LogFollower`] for mirroring the server log

pub mod follow;
pub mod lifecycle;
pub mod log_rotation;
pub mod types;

pub use follow::LogFollower;
pub use lifecycle::ProcessSupervisor;
pub use log_rotation::rotate_log_if_needed;
pub use types::{LaunchSpec, LogRotationConfig, ProcessHandle, ProcessState};
