//! Defensive parsing of classifier output and reconciliation against the
//! tenant catalog. Nothing the model says is trusted: names are re-matched,
//! totals are recomputed, and anything unparsable collapses into the fixed
//! fallback result instead of an error.

use serde_json::Value;

use pedibot_core::domain::extraction::{
    ExtractionResult, Intent, ProductMention, ResolvedProduct,
};
use pedibot_core::domain::product::Product;

/// Turns raw classifier text into an `ExtractionResult`. Never fails: if the
/// text carries no JSON object, or the object lacks both `intent` and
/// `response`, the fixed fallback result is returned.
pub fn parse(raw: &str) -> ExtractionResult {
    let Some(value) = extract_json_object(raw) else {
        return ExtractionResult::fallback();
    };

    let intent_raw = value.get("intent").and_then(Value::as_str);
    let reply_raw = value.get("response").and_then(Value::as_str);
    if intent_raw.is_none() && reply_raw.is_none() {
        return ExtractionResult::fallback();
    }

    let mut result = ExtractionResult::fallback();
    result.parse_failed = false;
    result.intent = intent_raw.map(Intent::from_wire).unwrap_or(Intent::Unknown);
    result.confidence = value
        .get("confidence")
        .and_then(lenient_f64)
        .map(|confidence| confidence.clamp(0.0, 1.0))
        .unwrap_or(0.5);
    result.reply = reply_raw
        .map(|reply| reply.to_string())
        .unwrap_or_else(|| pedibot_core::replies::fallback_clarification().to_string());

    if let Some(entities) = value.get("entities") {
        result.mentions = parse_mentions(entities);
        result.entities.uncertainty = parse_uncertainty(entities);
    }
    // The wire `entities.total` is deliberately ignored; validation recomputes
    // it from catalog prices.

    result
}

/// Reconciles an order extraction against the catalog. Exact name match wins;
/// a unique partial match resolves; multiple partial candidates demote the
/// mention to an uncertainty entry; no match reports the name as unresolved.
/// Matched entries take price and stock snapshots from the catalog.
pub fn validate(mut result: ExtractionResult, catalog: &[Product]) -> ExtractionResult {
    if result.intent != Intent::Order {
        result.mentions.clear();
        return result;
    }

    for mention in std::mem::take(&mut result.mentions) {
        match match_product(&mention.name, catalog) {
            CatalogMatch::Resolved(product) => {
                let (stock_available, insufficient_stock) = stock_state(product, mention.quantity);
                result.entities.products.push(ResolvedProduct {
                    requested_name: mention.name.clone(),
                    matched_name: product.name.clone(),
                    product_id: product.id.clone(),
                    quantity: mention.quantity,
                    unit_price: product.price,
                    stock_available,
                    insufficient_stock,
                    original_request_text: mention.name,
                });
            }
            CatalogMatch::Ambiguous(candidates) => {
                result.entities.uncertainty.push(format!(
                    "\"{}\" coincide con varios productos: {}",
                    mention.name,
                    candidates.join(", ")
                ));
            }
            CatalogMatch::None => {
                result.entities.unresolved.push(mention.name);
            }
        }
    }

    result.recompute_total();
    result
}

enum CatalogMatch<'a> {
    Resolved(&'a Product),
    Ambiguous(Vec<String>),
    None,
}

fn match_product<'a>(mention: &str, catalog: &'a [Product]) -> CatalogMatch<'a> {
    let normalized_mention = normalize(mention);
    if normalized_mention.is_empty() {
        return CatalogMatch::None;
    }

    if let Some(product) =
        catalog.iter().find(|product| normalize(&product.name) == normalized_mention)
    {
        return CatalogMatch::Resolved(product);
    }

    let partial_matches: Vec<&Product> = catalog
        .iter()
        .filter(|product| {
            let normalized_name = normalize(&product.name);
            normalized_name.contains(&normalized_mention)
                || normalized_mention.contains(&normalized_name)
        })
        .collect();

    match partial_matches.as_slice() {
        [] => CatalogMatch::None,
        [product] => CatalogMatch::Resolved(product),
        many => CatalogMatch::Ambiguous(many.iter().map(|product| product.name.clone()).collect()),
    }
}

fn stock_state(product: &Product, quantity: u32) -> (Option<i64>, bool) {
    if !product.available {
        return (Some(0), true);
    }
    if !product.track_stock {
        return (None, false);
    }
    let stock = product.stock.unwrap_or(0);
    (Some(stock), stock < i64::from(quantity))
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Locates the JSON object inside the raw text, tolerating Markdown fences
/// and prose around it.
fn extract_json_object(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value.is_object().then_some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }

    serde_json::from_str::<Value>(&trimmed[start..=end])
        .ok()
        .filter(Value::is_object)
}

fn parse_mentions(entities: &Value) -> Vec<ProductMention> {
    let Some(products) = entities.get("products").and_then(Value::as_array) else {
        return Vec::new();
    };

    products
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name").and_then(Value::as_str)?.trim();
            if name.is_empty() {
                return None;
            }
            let quantity = entry
                .get("quantity")
                .and_then(lenient_u32)
                .unwrap_or(1)
                .max(1);
            Some(ProductMention { name: name.to_string(), quantity })
        })
        .collect()
}

fn parse_uncertainty(entities: &Value) -> Vec<String> {
    entities
        .get("uncertainty")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .filter(|entry| !entry.trim().is_empty())
                .map(|entry| entry.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Quantities and confidences arrive as numbers or numeric strings depending
/// on the model's mood.
fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
