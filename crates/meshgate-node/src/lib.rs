//! Runtime for the meshgate crypto-mesh / radio-mesh gateway.
//!
//! This crate ties the wire format, the routing state machines and the daemon
//! adapters together, providing configuration, mapping persistence, the async
//! [`Gateway`] runtime and the [`GatewayHandle`] client API.

pub mod adapter_enum;
pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod storage;
pub mod storage_codec;

pub use adapter_enum::AnyAdapter;
pub use api::{DeliveryReceipt, GatewayHandle, SourceFilter, Subscription};
pub use config::GatewayConfig;
pub use error::{GatewayError, NodeError};
pub use gateway::Gateway;
pub use storage::Storage;
