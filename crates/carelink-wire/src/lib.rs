//! Wire contract for the CareLink service-request backend.
//!
//! This crate holds everything that is decided by the REST backend rather than
//! by the client: endpoint paths, JSON payload shapes, and the tolerant
//! extraction of data from response envelopes. It performs no I/O.

pub mod endpoints;
pub mod extraction;
pub mod payloads;

pub use endpoints::*;
pub use extraction::*;
pub use payloads::*;
