//! Result type alias shared across the workspace.
//!
//! Defaults the error type to the common `FeedError`, so functions can simply
//! return `Result<T>`.
use crate::error::FeedError;

/// Workspace-wide `Result` alias with `FeedError` as the default error.
pub type Result<T, E = FeedError> = std::result::Result<T, E>;
