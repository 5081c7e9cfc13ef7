/// TCP server implementation for the Launchpad document daemon.
///
/// This module provides the [`Router`] which handles incoming TCP connections
/// and dispatches protocol lines to a local document store.
pub mod protocol;
pub mod router;

pub use router::Router;
