//! Prompt assembly. The system prompt carries the tenant's entire current
//! catalog so the model has nothing to invent, plus the strict JSON output
//! contract the parser expects.

use pedibot_core::business::infer_business_type;
use pedibot_core::domain::message::{ChatMessage, MessageDirection};
use pedibot_core::domain::product::{Product, TenantId};
use pedibot_core::replies::format_money;

use crate::llm::{ClassifierPrompt, HistoryTurn, TurnRole};

#[derive(Clone, Debug)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub products: Vec<Product>,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, products: Vec<Product>) -> Self {
        Self { tenant_id, products }
    }
}

pub fn build_prompt(
    context: &TenantContext,
    history: &[ChatMessage],
    message_text: &str,
) -> ClassifierPrompt {
    ClassifierPrompt {
        system: system_prompt(context),
        history: history_turns(history),
        message: message_text.to_string(),
    }
}

fn system_prompt(context: &TenantContext) -> String {
    let business_type = infer_business_type(&context.products);

    let mut prompt = format!(
        "Eres el asistente virtual de un {} que recibe pedidos por chat. \
         Atiendes únicamente con el catálogo siguiente; nunca menciones ni aceptes productos que no estén listados.\n\n\
         Catálogo actual:\n",
        business_type.label()
    );

    if context.products.is_empty() {
        prompt.push_str("(sin productos registrados)\n");
    }
    for product in &context.products {
        prompt.push_str(&format!(
            "- {} — {}{}{}\n",
            product.name,
            format_money(product.price),
            match &product.description {
                Some(description) => format!(" — {description}"),
                None => String::new(),
            },
            stock_note(product),
        ));
    }

    prompt.push_str(
        "\nClasifica el mensaje del cliente y responde ÚNICAMENTE con un objeto JSON, sin texto adicional, con esta forma:\n\
         {\n\
           \"intent\": \"order|inquiry|complaint|greeting|unknown\",\n\
           \"entities\": {\n\
             \"products\": [{\"name\": \"nombre exacto del catálogo\", \"quantity\": 1}],\n\
             \"total\": 0,\n\
             \"uncertainty\": [\"descripciones de ambigüedades\"]\n\
           },\n\
           \"confidence\": 0.0,\n\
           \"response\": \"respuesta natural para el cliente\"\n\
         }\n\
         Usa \"uncertainty\" para toda duda sobre qué producto o cantidad quiso el cliente, y baja \"confidence\" en consecuencia.",
    );

    prompt
}

fn stock_note(product: &Product) -> String {
    if !product.available {
        return " (no disponible)".to_string();
    }
    if !product.track_stock {
        return String::new();
    }
    match product.stock {
        Some(0) | None => " (agotado)".to_string(),
        Some(stock) if product.is_low_stock() => format!(" (quedan {stock}, pocas unidades)"),
        Some(stock) => format!(" (quedan {stock})"),
    }
}

fn history_turns(history: &[ChatMessage]) -> Vec<HistoryTurn> {
    history
        .iter()
        .map(|message| HistoryTurn {
            role: match message.direction {
                MessageDirection::Inbound => TurnRole::Customer,
                MessageDirection::Outbound => TurnRole::Assistant,
            },
            text: message.text.clone(),
        })
        .collect()
}
