//! Customer-facing reply composition. Every text the pipeline sends on its
//! own behalf is built here; informational branches reuse the classifier's
//! reply verbatim and never pass through this module.

use rust_decimal::Decimal;

use crate::domain::extraction::ExtractionResult;
use crate::domain::order::Order;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnavailableReason {
    InsufficientStock { available: i64 },
    NotFound,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnavailableItem {
    pub name: String,
    pub requested: u32,
    pub reason: UnavailableReason,
}

pub fn fallback_clarification() -> &'static str {
    "Disculpa, no logré entender bien tu mensaje. ¿Podrías decirme qué productos te gustaría pedir?"
}

pub fn technical_difficulties() -> &'static str {
    "Lo sentimos, estamos presentando problemas técnicos en este momento. Por favor intenta de nuevo en unos minutos."
}

pub fn format_money(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}

/// Confirmation for a placed order: each line as quantity × name, the total,
/// and the payment-method question.
pub fn confirmation(order: &Order) -> String {
    let mut text = String::from("¡Tu pedido quedó registrado! 🎉\n\n");
    for line in &order.lines {
        text.push_str(&format!(
            "• {} x {} — {}\n",
            line.quantity,
            line.product_name,
            format_money(line.line_total())
        ));
    }
    text.push_str(&format!("\nTotal: {}\n\n", format_money(order.total)));
    text.push_str("¿Cómo prefieres pagar? (efectivo, transferencia o tarjeta)");
    text
}

/// Partial-order reply: one bullet per unavailable item with its reason,
/// then an offer to adjust. No order was persisted when this is sent.
pub fn partial(items: &[UnavailableItem]) -> String {
    let mut text = String::from("Lo sentimos, no pudimos completar tu pedido:\n\n");
    for item in items {
        match &item.reason {
            UnavailableReason::InsufficientStock { available } if *available > 0 => {
                text.push_str(&format!(
                    "• {}: solo quedan {} (pediste {})\n",
                    item.name, available, item.requested
                ));
            }
            UnavailableReason::InsufficientStock { .. } => {
                text.push_str(&format!("• {}: agotado por el momento\n", item.name));
            }
            UnavailableReason::NotFound => {
                text.push_str(&format!("• {}: ya no está disponible en el catálogo\n", item.name));
            }
        }
    }
    text.push_str("\n¿Quieres ajustar las cantidades o elegir otro producto?");
    text
}

/// Clarification reply for an order the pipeline is not confident about:
/// echoes the classifier's recorded ambiguities and the names that matched
/// nothing; with neither, asks the customer to confirm what was understood.
pub fn clarification(result: &ExtractionResult) -> String {
    let mut text = String::from("Quiero asegurarme de tomar bien tu pedido.\n");

    for doubt in &result.entities.uncertainty {
        text.push_str(&format!("• {doubt}\n"));
    }
    for name in &result.entities.unresolved {
        text.push_str(&format!("• No encontré \"{name}\" en nuestro catálogo\n"));
    }

    if result.entities.uncertainty.is_empty() && result.entities.unresolved.is_empty() {
        if result.entities.products.is_empty() {
            text.push_str("• No identifiqué ningún producto en tu mensaje\n");
        } else {
            text.push_str("Esto fue lo que entendí:\n");
            for product in &result.entities.products {
                text.push_str(&format!("• {} x {}\n", product.quantity, product.matched_name));
            }
        }
    }

    text.push_str("\n¿Me confirmas exactamente qué productos y cantidades necesitas?");
    text
}

/// Maps the insufficient-stock entries of a validated extraction into the
/// shape `partial` renders.
pub fn unavailable_from_extraction(result: &ExtractionResult) -> Vec<UnavailableItem> {
    result
        .entities
        .products
        .iter()
        .filter(|product| product.insufficient_stock)
        .map(|product| UnavailableItem {
            name: product.matched_name.clone(),
            requested: product.quantity,
            reason: UnavailableReason::InsufficientStock {
                available: product.stock_available.unwrap_or(0),
            },
        })
        .collect()
}
