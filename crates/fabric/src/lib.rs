//! Sortie Fabric
//!
//! The plumbing sortie actors talk through.
//!
//! This crate provides:
//! - `Transport`: fire-and-forget `send` and request/reply `call` between
//!   addresses, failing with a `DeliveryError`
//! - `LocalBus`: the in-process transport (one mailbox per bound address)
//! - `Directory`: which addresses are registered under which tag, with
//!   snapshot-on-read listing
//! - `gather`: concurrent fan-out of a call with a bounded wait

#![warn(missing_docs)]

pub mod bus;
pub mod directory;
pub mod error;
pub mod gather;

pub use bus::{Envelope, LocalBus, Reply, Transport};
pub use directory::Directory;
pub use error::{DeliveryError, Result};
pub use gather::{gather, Gathered};
