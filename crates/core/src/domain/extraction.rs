use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::replies;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Order,
    Inquiry,
    Complaint,
    Greeting,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Inquiry => "inquiry",
            Self::Complaint => "complaint",
            Self::Greeting => "greeting",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient mapping for classifier output; anything unrecognized is
    /// `Unknown` rather than an error.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "order" | "pedido" => Self::Order,
            "inquiry" | "consulta" => Self::Inquiry,
            "complaint" | "queja" => Self::Complaint,
            "greeting" | "saludo" => Self::Greeting,
            _ => Self::Unknown,
        }
    }
}

/// A raw (name, quantity) pair as the classifier reported it, before any
/// catalog reconciliation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMention {
    pub name: String,
    pub quantity: u32,
}

/// A mention reconciled against the tenant catalog. `matched_name` always
/// equals an existing product's name; `unit_price` is the catalog price at
/// validation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedProduct {
    pub requested_name: String,
    pub matched_name: String,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub stock_available: Option<i64>,
    pub insufficient_stock: bool,
    pub original_request_text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionEntities {
    pub products: Vec<ResolvedProduct>,
    pub unresolved: Vec<String>,
    pub total: Decimal,
    pub uncertainty: Vec<String>,
}

/// The pipeline's working view of one classified message. Built by the
/// parser, refined by the validator, consumed by routing; never persisted
/// verbatim (a summary lands in the message's NLP metadata).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub intent: Intent,
    pub mentions: Vec<ProductMention>,
    pub entities: ExtractionEntities,
    pub confidence: f64,
    pub reply: String,
    pub parse_failed: bool,
}

impl ExtractionResult {
    /// The fixed local-recovery result used whenever the classifier is
    /// unreachable, times out, or returns text that cannot be interpreted.
    pub fn fallback() -> Self {
        Self {
            intent: Intent::Unknown,
            mentions: Vec::new(),
            entities: ExtractionEntities::default(),
            confidence: 0.1,
            reply: replies::fallback_clarification().to_string(),
            parse_failed: true,
        }
    }

    pub fn recompute_total(&mut self) {
        self.entities.total = self
            .entities
            .products
            .iter()
            .map(|product| product.unit_price * Decimal::from(product.quantity))
            .sum();
    }

    pub fn has_insufficient_stock(&self) -> bool {
        self.entities.products.iter().any(|product| product.insufficient_stock)
    }
}
