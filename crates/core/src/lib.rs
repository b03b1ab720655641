pub mod business;
pub mod config;
pub mod domain;
pub mod errors;
pub mod replies;
pub mod routing;

pub use business::{infer_business_type, BusinessType};
pub use domain::extraction::{
    ExtractionEntities, ExtractionResult, Intent, ProductMention, ResolvedProduct,
};
pub use domain::message::{ChatMessage, MessageDirection, MessageId};
pub use domain::order::{NewOrder, Order, OrderId, OrderLine, OrderStatus};
pub use domain::product::{Product, ProductId, TenantId};
pub use errors::DomainError;
pub use routing::{
    needs_escalation, route, Disposition, RoutingOutcome, ESCALATION_THRESHOLD,
    ORDER_CONFIDENCE_THRESHOLD,
};
