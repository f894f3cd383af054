//! Core types and collaborator traits for swapkey.
//!
//! This crate is free of storage and process dependencies. The store engine,
//! the identity crate, the orchestrator and the CLI all depend on it.

pub mod host;
pub mod identity;
pub mod outcome;
pub mod profile;
pub mod snapshot;
