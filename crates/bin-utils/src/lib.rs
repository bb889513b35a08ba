//! Pieces shared by the portal binaries.
pub mod completions_command;
pub mod logger;
