//! Gateway logic for the meshgate crypto-mesh / radio-mesh bridge.
//!
//! Every component in this crate is a synchronous state machine driven by an
//! injected clock. None of them perform I/O: the [`router::MessageRouter`]
//! returns [`router::RouterAction`]s that the runtime carries out and reports
//! back, which keeps every state transition observable from unit tests.

pub mod codec;
pub mod dedup;
pub mod error;
pub mod health;
pub mod retry;
pub mod route_plan;
pub mod router;
pub mod tracker;
pub mod translator;

pub use codec::{AcceptOutcome, CodecConfig, ExpiredAssembly, PacketCodec, ReassembledMessage};
pub use error::{CodecError, ExhaustionCause, FailureReason, RouterError, TranslatorError};
pub use health::{CircuitBreaker, CircuitState, HealthConfig, HealthMonitor};
pub use retry::RetryPolicy;
pub use route_plan::{LocalIdentity, Route, RouteDecision};
pub use router::{
    DeliveryOutcome, DeliveryState, GatewayEvent, InboundMessage, MessageRouter, OutboundState,
    RouterAction, RouterConfig, SendOutcome, SubmitOutcome, SubmitRequest, Ticket,
};
pub use tracker::{MappingAnomaly, MeshNode, NodeTracker};
pub use translator::{AddressMapping, AddressTranslator, LearnOutcome};
