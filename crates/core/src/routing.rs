//! Deterministic branching over a validated extraction. The classifier only
//! supplies the inputs; every decision here is fixed policy.

use serde::{Deserialize, Serialize};

use crate::domain::extraction::{ExtractionResult, Intent};

/// `confidence >= 0.8` is required before an order intent may reach the
/// assembler; the boundary itself routes to the order branch.
pub const ORDER_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Below this, tenant staff are notified in parallel with the normal reply,
/// whatever the intent.
pub const ESCALATION_THRESHOLD: f64 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    ParseFailed,
    OrderReady,
    OrderPartial,
    ClarificationNeeded,
    Informational,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseFailed => "parse_failed",
            Self::OrderReady => "order_ready",
            Self::OrderPartial => "order_partial",
            Self::ClarificationNeeded => "clarification_needed",
            Self::Informational => "informational",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingOutcome {
    pub disposition: Disposition,
    pub escalate: bool,
}

pub fn route(result: &ExtractionResult) -> RoutingOutcome {
    RoutingOutcome { disposition: disposition_for(result), escalate: needs_escalation(result) }
}

pub fn needs_escalation(result: &ExtractionResult) -> bool {
    result.confidence < ESCALATION_THRESHOLD
}

fn disposition_for(result: &ExtractionResult) -> Disposition {
    if result.parse_failed {
        return Disposition::ParseFailed;
    }

    match result.intent {
        Intent::Order => order_disposition(result),
        Intent::Inquiry | Intent::Complaint | Intent::Greeting | Intent::Unknown => {
            Disposition::Informational
        }
    }
}

fn order_disposition(result: &ExtractionResult) -> Disposition {
    if result.has_insufficient_stock() {
        return Disposition::OrderPartial;
    }
    if result.entities.products.is_empty() {
        return Disposition::ClarificationNeeded;
    }
    if result.confidence >= ORDER_CONFIDENCE_THRESHOLD {
        Disposition::OrderReady
    } else {
        Disposition::ClarificationNeeded
    }
}
