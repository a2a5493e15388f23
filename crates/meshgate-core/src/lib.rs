//! Core types and wire formats for the meshgate gateway.
//!
//! This crate defines the identity newtypes shared by both meshes, the
//! self-describing gateway frame, announce bodies, the per-fragment checksum,
//! and the byte-stream framings used to talk to the underlying daemons.
//! Nothing in here performs I/O.

pub mod announce;
pub mod checksum;
pub mod constants;
pub mod error;
pub mod frame;
pub mod framing;
pub mod types;

pub use announce::AnnounceEvent;
pub use error::{AnnounceError, FrameError, FramingError, ParseAddressError};
pub use frame::{Frame, FrameKind};
pub use types::{Address, CryptoIdentity, InvalidLength, MessageId, Network, RadioNodeId};
