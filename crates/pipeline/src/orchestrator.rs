//! Pipeline Orchestrator: one inbound message job in, exactly one outbound
//! reply out. Classification and parsing recover locally into the fixed
//! fallback; branching is the pure routing function; escalation runs beside
//! the reply, never instead of it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use pedibot_agent::parser;
use pedibot_agent::{build_prompt, Classifier, TenantContext};
use pedibot_channel::{EscalationNotifier, EscalationSignal, OutboundReply, ReplySender};
use pedibot_core::domain::extraction::ExtractionResult;
use pedibot_core::domain::message::{ChatMessage, MessageDirection, MessageId};
use pedibot_core::domain::order::OrderId;
use pedibot_core::errors::DomainError;
use pedibot_core::replies;
use pedibot_core::routing::{route, Disposition};
use pedibot_db::repositories::{CatalogRepository, MessageJob, MessageStore, RepositoryError};

use crate::assembler::{AssembleOutcome, AssemblyError, OrderAssembler};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] RepositoryError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOutcome {
    pub disposition: Disposition,
    pub escalated: bool,
    pub order_id: Option<OrderId>,
    pub reply: String,
}

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub classifier_timeout: Duration,
    pub history_limit: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { classifier_timeout: Duration::from_secs(20), history_limit: 10 }
    }
}

pub struct MessagePipeline {
    catalog: Arc<dyn CatalogRepository>,
    messages: Arc<dyn MessageStore>,
    assembler: OrderAssembler,
    classifier: Arc<dyn Classifier>,
    sender: Arc<dyn ReplySender>,
    notifier: Arc<dyn EscalationNotifier>,
    options: PipelineOptions,
}

impl MessagePipeline {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        messages: Arc<dyn MessageStore>,
        assembler: OrderAssembler,
        classifier: Arc<dyn Classifier>,
        sender: Arc<dyn ReplySender>,
        notifier: Arc<dyn EscalationNotifier>,
        options: PipelineOptions,
    ) -> Self {
        Self { catalog, messages, assembler, classifier, sender, notifier, options }
    }

    pub async fn process(&self, job: &MessageJob) -> Result<PipelineOutcome, PipelineError> {
        info!(
            event_name = "pipeline.job_started",
            correlation_id = %job.id.0,
            tenant_id = %job.tenant_id.0,
            "processing inbound message job"
        );

        let products = self.catalog.list_for_tenant(&job.tenant_id).await?;
        let history = self
            .messages
            .history(&job.tenant_id, &job.customer_phone, self.options.history_limit)
            .await?;

        let context = TenantContext::new(job.tenant_id.clone(), products.clone());
        let prompt = build_prompt(&context, &history, &job.text);

        let result = match tokio::time::timeout(
            self.options.classifier_timeout,
            self.classifier.classify(&prompt),
        )
        .await
        {
            Ok(Ok(raw)) => parser::validate(parser::parse(&raw), &products),
            Ok(Err(classifier_error)) => {
                warn!(
                    event_name = "pipeline.classifier_unavailable",
                    correlation_id = %job.id.0,
                    tenant_id = %job.tenant_id.0,
                    error = %classifier_error,
                    "classifier unavailable, taking fallback path"
                );
                ExtractionResult::fallback()
            }
            Err(_elapsed) => {
                warn!(
                    event_name = "pipeline.classifier_timeout",
                    correlation_id = %job.id.0,
                    tenant_id = %job.tenant_id.0,
                    timeout_secs = self.options.classifier_timeout.as_secs(),
                    "classifier call exceeded deadline, taking fallback path"
                );
                ExtractionResult::fallback()
            }
        };

        let routing = route(&result);

        if let Err(metadata_error) = self
            .messages
            .attach_nlp_metadata(&job.message_id, extraction_metadata(&result, routing.disposition))
            .await
        {
            warn!(
                event_name = "pipeline.metadata_attach_failed",
                correlation_id = %job.id.0,
                error = %metadata_error,
                "could not attach extraction metadata to inbound message"
            );
        }

        if routing.escalate {
            let signal = EscalationSignal {
                tenant_id: job.tenant_id.clone(),
                customer_phone: job.customer_phone.clone(),
                message_text: job.text.clone(),
                confidence: result.confidence,
            };
            if let Err(notify_error) = self.notifier.notify(&signal).await {
                warn!(
                    event_name = "pipeline.escalation_failed",
                    correlation_id = %job.id.0,
                    tenant_id = %job.tenant_id.0,
                    error = %notify_error,
                    "escalation notification failed, not retrying"
                );
            }
        }

        let (disposition, reply_text, order_id) = match routing.disposition {
            Disposition::OrderReady => {
                match self
                    .assembler
                    .assemble(
                        &job.tenant_id,
                        &job.customer_phone,
                        job.customer_name.as_deref(),
                        &job.message_id,
                        &result,
                    )
                    .await
                {
                    Ok(AssembleOutcome::Created(order)) => {
                        if let Err(link_error) =
                            self.messages.link_order(&job.message_id, &order.id).await
                        {
                            warn!(
                                event_name = "pipeline.order_link_failed",
                                correlation_id = %job.id.0,
                                order_id = %order.id.0,
                                error = %link_error,
                                "could not link order to its source message"
                            );
                        }
                        info!(
                            event_name = "pipeline.order_created",
                            correlation_id = %job.id.0,
                            tenant_id = %job.tenant_id.0,
                            order_id = %order.id.0,
                            total = %order.total,
                            "order persisted"
                        );
                        let reply = replies::confirmation(&order);
                        (Disposition::OrderReady, reply, Some(order.id))
                    }
                    Ok(AssembleOutcome::AlreadyPlaced(order)) => {
                        info!(
                            event_name = "pipeline.order_deduplicated",
                            correlation_id = %job.id.0,
                            order_id = %order.id.0,
                            "redelivered message matched an existing order"
                        );
                        let reply = replies::confirmation(&order);
                        (Disposition::OrderReady, reply, Some(order.id))
                    }
                    Ok(AssembleOutcome::Unavailable(items)) => {
                        (Disposition::OrderPartial, replies::partial(&items), None)
                    }
                    Err(AssemblyError::Domain(domain_error)) => {
                        error!(
                            event_name = "pipeline.contract_violation",
                            correlation_id = %job.id.0,
                            tenant_id = %job.tenant_id.0,
                            error = %domain_error,
                            "assembler precondition broken, failing job"
                        );
                        self.dispatch_reply(job, replies::technical_difficulties().to_string(), None)
                            .await?;
                        return Err(domain_error.into());
                    }
                    Err(AssemblyError::Store(store_error)) => return Err(store_error.into()),
                }
            }
            Disposition::OrderPartial => {
                let items = replies::unavailable_from_extraction(&result);
                (Disposition::OrderPartial, replies::partial(&items), None)
            }
            Disposition::ClarificationNeeded => {
                (Disposition::ClarificationNeeded, replies::clarification(&result), None)
            }
            Disposition::ParseFailed | Disposition::Informational => {
                (routing.disposition, result.reply.clone(), None)
            }
        };

        self.dispatch_reply(job, reply_text.clone(), order_id.clone()).await?;

        info!(
            event_name = "pipeline.job_finished",
            correlation_id = %job.id.0,
            tenant_id = %job.tenant_id.0,
            disposition = disposition.as_str(),
            escalated = routing.escalate,
            "inbound message job processed"
        );

        Ok(PipelineOutcome {
            disposition,
            escalated: routing.escalate,
            order_id,
            reply: reply_text,
        })
    }

    /// Sends the reply through the channel adapter and persists it as an
    /// outbound conversation turn. Delivery failures are the adapter's to
    /// retry; persistence failures fail the job.
    async fn dispatch_reply(
        &self,
        job: &MessageJob,
        text: String,
        order_id: Option<OrderId>,
    ) -> Result<(), PipelineError> {
        let reply = OutboundReply {
            tenant_id: job.tenant_id.clone(),
            customer_phone: job.customer_phone.clone(),
            text,
        };

        match self.sender.send(&reply).await {
            Ok(report) if !report.delivered => {
                warn!(
                    event_name = "pipeline.reply_not_delivered",
                    correlation_id = %job.id.0,
                    tenant_id = %job.tenant_id.0,
                    detail = report.detail.as_deref().unwrap_or("no detail"),
                    "channel adapter reported failed delivery"
                );
            }
            Ok(_) => {}
            Err(send_error) => {
                warn!(
                    event_name = "pipeline.reply_send_failed",
                    correlation_id = %job.id.0,
                    tenant_id = %job.tenant_id.0,
                    error = %send_error,
                    "channel adapter rejected the reply"
                );
            }
        }

        self.messages
            .append(ChatMessage {
                id: MessageId(Uuid::new_v4().to_string()),
                tenant_id: job.tenant_id.clone(),
                customer_phone: job.customer_phone.clone(),
                text: reply.text,
                direction: MessageDirection::Outbound,
                received_at: Utc::now(),
                order_id,
                nlp_metadata: None,
            })
            .await?;

        Ok(())
    }
}

fn extraction_metadata(result: &ExtractionResult, disposition: Disposition) -> serde_json::Value {
    json!({
        "intent": result.intent.as_str(),
        "confidence": result.confidence,
        "disposition": disposition.as_str(),
        "parse_failed": result.parse_failed,
        "products": result
            .entities
            .products
            .iter()
            .map(|product| {
                json!({
                    "requested": product.requested_name,
                    "matched": product.matched_name,
                    "quantity": product.quantity,
                    "insufficient_stock": product.insufficient_stock,
                })
            })
            .collect::<Vec<_>>(),
        "unresolved": result.entities.unresolved,
        "uncertainty": result.entities.uncertainty,
        "total": result.entities.total.to_string(),
    })
}
