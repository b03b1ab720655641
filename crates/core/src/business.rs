//! Business-type inference from catalog names, used only for prompt framing.

use crate::domain::product::Product;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusinessType {
    Restaurant,
    Grocery,
    Pharmacy,
    Clothing,
    General,
}

impl BusinessType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Restaurant => "restaurante",
            Self::Grocery => "tienda de abarrotes",
            Self::Pharmacy => "farmacia",
            Self::Clothing => "tienda de ropa",
            Self::General => "negocio",
        }
    }
}

const RESTAURANT_KEYWORDS: &[&str] = &[
    "pizza", "hamburguesa", "taco", "burrito", "sushi", "pasta", "torta", "combo", "postre",
    "cafe", "café", "refresco", "alitas",
];
const GROCERY_KEYWORDS: &[&str] = &[
    "leche", "arroz", "frijol", "aceite", "azucar", "azúcar", "huevo", "pan", "tortilla", "jabon",
    "jabón", "detergente",
];
const PHARMACY_KEYWORDS: &[&str] = &[
    "paracetamol", "ibuprofeno", "jarabe", "vitamina", "aspirina", "antigripal", "suero",
    "alcohol", "gasa",
];
const CLOTHING_KEYWORDS: &[&str] = &[
    "camisa", "playera", "pantalon", "pantalón", "vestido", "zapato", "tenis", "gorra", "sudadera",
];

/// Counts keyword hits per category over the catalog names; the category with
/// the most hits wins, with `General` as the explicit fallback.
pub fn infer_business_type(products: &[Product]) -> BusinessType {
    let categories: [(BusinessType, &[&str]); 4] = [
        (BusinessType::Restaurant, RESTAURANT_KEYWORDS),
        (BusinessType::Grocery, GROCERY_KEYWORDS),
        (BusinessType::Pharmacy, PHARMACY_KEYWORDS),
        (BusinessType::Clothing, CLOTHING_KEYWORDS),
    ];

    let mut best = BusinessType::General;
    let mut best_hits = 0usize;
    for (business_type, keywords) in categories {
        let hits = products
            .iter()
            .filter(|product| {
                let name = product.name.to_lowercase();
                keywords.iter().any(|keyword| name.contains(keyword))
            })
            .count();
        if hits > best_hits {
            best = business_type;
            best_hits = hits;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::product::{Product, ProductId, TenantId};

    use super::{infer_business_type, BusinessType};

    fn product(name: &str) -> Product {
        Product {
            id: ProductId(format!("prod-{name}")),
            tenant_id: TenantId("tenant-1".to_string()),
            name: name.to_string(),
            description: None,
            price: Decimal::new(1000, 2),
            sku: None,
            available: true,
            stock: None,
            min_stock: None,
            track_stock: false,
        }
    }

    #[test]
    fn restaurant_catalog_is_recognized() {
        let catalog =
            vec![product("Pizza Margherita"), product("Pizza Pepperoni"), product("Refresco 600ml")];
        assert_eq!(infer_business_type(&catalog), BusinessType::Restaurant);
    }

    #[test]
    fn mixed_catalog_picks_the_dominant_category() {
        let catalog = vec![
            product("Paracetamol 500mg"),
            product("Jarabe para la tos"),
            product("Refresco 600ml"),
        ];
        assert_eq!(infer_business_type(&catalog), BusinessType::Pharmacy);
    }

    #[test]
    fn unmatched_catalog_falls_back_to_general() {
        let catalog = vec![product("Servicio de plomería"), product("Asesoría legal")];
        assert_eq!(infer_business_type(&catalog), BusinessType::General);
    }

    #[test]
    fn empty_catalog_falls_back_to_general() {
        assert_eq!(infer_business_type(&[]), BusinessType::General);
    }
}
