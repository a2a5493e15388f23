//! Outbound queueing, inbound reassembly and cross-network forwarding.

pub mod dispatch;
pub mod types;

pub use dispatch::MessageRouter;
pub use types::{
    DeliveryOutcome, DeliveryState, GatewayEvent, InboundMessage, OutboundState, RouterAction,
    RouterConfig, SendOutcome, SubmitOutcome, SubmitRequest, Ticket,
};
