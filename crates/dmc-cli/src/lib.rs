//! dmc library - expose modules for testing
//!
//! The provisioning boundary (`provision`) turns create/stop requests into
//! calls on the manifest resolver and the workload manager and renders every
//! failure as a structured [`errors::ErrorReport`].

pub mod commands;
pub mod common;
pub mod errors;
pub mod provision;

pub use common::GlobalOpts;
