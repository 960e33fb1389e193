//! Shared building blocks for the workspace: wire types, the injected
//! logging collaborator and small runtime helpers.

pub mod env;
pub mod types;
pub mod utils;
