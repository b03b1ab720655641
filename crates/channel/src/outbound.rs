use async_trait::async_trait;

use pedibot_core::domain::product::TenantId;

use crate::ChannelError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundReply {
    pub tenant_id: TenantId,
    pub customer_phone: String,
    pub text: String,
}

/// What the provider reported about one delivery attempt. The pipeline logs
/// failures but never retries them; retry policy belongs to the adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: bool,
    pub provider_message_id: Option<String>,
    pub detail: Option<String>,
}

#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send(&self, reply: &OutboundReply) -> Result<DeliveryReport, ChannelError>;
}

/// Stand-in sender for wiring and tests; reports every reply as delivered.
#[derive(Default)]
pub struct NoopReplySender;

#[async_trait]
impl ReplySender for NoopReplySender {
    async fn send(&self, _reply: &OutboundReply) -> Result<DeliveryReport, ChannelError> {
        Ok(DeliveryReport { delivered: true, provider_message_id: None, detail: None })
    }
}

#[cfg(test)]
mod tests {
    use pedibot_core::domain::product::TenantId;

    use super::{NoopReplySender, OutboundReply, ReplySender};

    #[tokio::test]
    async fn noop_sender_reports_delivery() {
        let sender = NoopReplySender;
        let report = sender
            .send(&OutboundReply {
                tenant_id: TenantId("tenant-1".to_string()),
                customer_phone: "+5215512345678".to_string(),
                text: "¡Tu pedido quedó registrado!".to_string(),
            })
            .await
            .expect("send");
        assert!(report.delivered);
    }
}
