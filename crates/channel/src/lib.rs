//! Channel adapter interface.
//!
//! The messaging provider (webhooks in, deliveries out) is an external
//! collaborator; this crate preserves its seams:
//! - **Inbound** (`inbound`) - provider webhook envelope → the one job
//!   payload the pipeline consumes
//! - **Outbound** (`outbound`) - `ReplySender`, the single exit point for
//!   customer-facing text
//! - **Escalation** (`notify`) - `EscalationNotifier`, the fire-and-forget
//!   staff side channel

use thiserror::Error;

pub mod inbound;
pub mod notify;
pub mod outbound;

pub use inbound::{map_webhook, InboundMessage, WebhookEnvelope};
pub use notify::{EscalationNotifier, EscalationSignal, LogEscalationNotifier};
pub use outbound::{DeliveryReport, NoopReplySender, OutboundReply, ReplySender};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("malformed provider payload: {0}")]
    MalformedPayload(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("notification failed: {0}")]
    Notify(String),
}
