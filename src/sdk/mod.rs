/// Software Development Kit (SDK) for Launchpad Store.
///
/// This module provides the caller-facing API: the failover adapter, the remote
/// TCP client it wraps, and mode discovery from the environment.
pub mod client;
/// Automatic mode discovery and store initialization.
pub mod discovery;
/// Remote-first document store with permanent local fallback.
pub mod failover;

pub use client::Client;
pub use discovery::{new, with_remote_addr};
pub use failover::FailoverStore;
