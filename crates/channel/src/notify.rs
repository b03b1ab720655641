use async_trait::async_trait;
use tracing::info;

use pedibot_core::domain::product::TenantId;

use crate::ChannelError;

/// Raised to tenant staff whenever extraction confidence falls below the
/// escalation threshold. Fire-and-forget: the customer-facing reply never
/// waits on it and failures are logged, not retried.
#[derive(Clone, Debug, PartialEq)]
pub struct EscalationSignal {
    pub tenant_id: TenantId,
    pub customer_phone: String,
    pub message_text: String,
    pub confidence: f64,
}

#[async_trait]
pub trait EscalationNotifier: Send + Sync {
    async fn notify(&self, signal: &EscalationSignal) -> Result<(), ChannelError>;
}

/// Default notifier: records the escalation in the structured log so an
/// operator-facing integration can be swapped in without touching the
/// pipeline.
#[derive(Default)]
pub struct LogEscalationNotifier;

#[async_trait]
impl EscalationNotifier for LogEscalationNotifier {
    async fn notify(&self, signal: &EscalationSignal) -> Result<(), ChannelError> {
        info!(
            event_name = "channel.escalation_raised",
            tenant_id = %signal.tenant_id.0,
            customer_phone = %signal.customer_phone,
            confidence = signal.confidence,
            "low-confidence conversation escalated to staff"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pedibot_core::domain::product::TenantId;

    use super::{EscalationNotifier, EscalationSignal, LogEscalationNotifier};

    #[tokio::test]
    async fn log_notifier_accepts_signals() {
        let notifier = LogEscalationNotifier;
        notifier
            .notify(&EscalationSignal {
                tenant_id: TenantId("tenant-1".to_string()),
                customer_phone: "+5215512345678".to_string(),
                message_text: "mmm no sé".to_string(),
                confidence: 0.3,
            })
            .await
            .expect("notify");
    }
}
