//! Port traits: the seams between domain logic and I/O.

pub mod artifact_port;
pub mod config_port;
pub mod model_port;
pub mod source_port;
