//! Adapters that carry gateway frames to and from the underlying mesh daemons.
//!
//! The gateway treats every daemon as an opaque frame transport: it reads
//! whole frames, writes whole frames, and occasionally probes reachability.
//! [`tcp::TcpAdapter`] speaks to a daemon over a TCP socket with either HDLC
//! or length-prefixed stream framing; [`memory::MemoryAdapter`] is an
//! in-process pair used for embedding and tests.

pub mod error;
pub mod framing;
pub mod memory;
pub mod shutdown;
pub mod tcp;
pub mod testing;
pub mod traits;

pub use error::AdapterError;
pub use framing::{FrameAccumulator, StreamFraming};
pub use memory::{MemoryAdapter, MemoryPeer};
pub use shutdown::ShutdownToken;
pub use tcp::{TcpAdapter, TcpAdapterConfig};
pub use traits::{Adapter, DEFAULT_MTU};
