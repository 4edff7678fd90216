//! Terminal rendering for the `jobsync-watch` binary.

pub mod render;
