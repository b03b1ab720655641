//! Classifier Gateway and extraction pipeline.
//!
//! The external language model is modeled as a capability (`Classifier`) with
//! exactly one concrete adapter (`HttpChatClassifier`); every trust boundary
//! sits outside it:
//!
//! 1. **Prompting** (`prompt`) - business-scoped system prompt with the full
//!    tenant catalog, so the model cannot sell what the tenant does not have
//! 2. **Parsing** (`parser::parse`) - defensive JSON extraction with a fixed
//!    fallback, never an error
//! 3. **Validation** (`parser::validate`) - catalog reconciliation, stock
//!    flags, recomputed totals
//!
//! The model is strictly a translator: it never decides prices, stock, or
//! whether an order is placed. Those are deterministic decisions downstream.

pub mod http;
pub mod llm;
pub mod parser;
pub mod prompt;

pub use http::HttpChatClassifier;
pub use llm::{Classifier, ClassifierError, ClassifierPrompt, HistoryTurn, TurnRole};
pub use prompt::{build_prompt, TenantContext};
