use serde::{Deserialize, Serialize};

use bazaar_core::{CategoryId, ListingId, ParameterId, ProductId, ShopId, UserId};

/// A supplier. Exactly one per owning account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    pub owner: UserId,
    pub url: Option<String>,
    /// Whether buyers may add this shop's listings to a basket.
    pub accepting_orders: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Shops that declared this category in an import, ascending.
    pub shops: Vec<ShopId>,
}

/// Catalog-wide product. Identity is `(name, category_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category_id: CategoryId,
}

/// A shop's offer of a product. Prices are in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub product_id: ProductId,
    pub shop_id: ShopId,
    pub model: String,
    /// Supplier SKU; not unique.
    pub external_id: i64,
    pub quantity: i64,
    pub price: i64,
    pub price_rrc: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewListing {
    pub product_id: ProductId,
    pub shop_id: ShopId,
    pub model: String,
    pub external_id: i64,
    pub quantity: i64,
    pub price: i64,
    pub price_rrc: i64,
}

impl NewListing {
    pub fn into_listing(self, id: ListingId) -> Listing {
        Listing {
            id,
            product_id: self.product_id,
            shop_id: self.shop_id,
            model: self.model,
            external_id: self.external_id,
            quantity: self.quantity,
            price: self.price,
            price_rrc: self.price_rrc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: ParameterId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopRef {
    pub id: ShopId,
    pub name: String,
    pub accepting_orders: bool,
}

/// Read projection of a listing joined with its product, category, shop and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingView {
    pub id: ListingId,
    pub model: String,
    pub external_id: i64,
    pub quantity: i64,
    pub price: i64,
    pub price_rrc: i64,
    pub product_id: ProductId,
    pub product_name: String,
    pub category_id: CategoryId,
    pub category_name: String,
    pub shop: ShopRef,
    /// Sorted by parameter name.
    pub parameters: Vec<ParameterValue>,
}

/// Counts written by one successful import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub shop_id: ShopId,
    pub shop_created: bool,
    pub categories: usize,
    pub listings: usize,
    pub parameters: usize,
}
