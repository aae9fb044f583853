use serde::{Deserialize, Serialize};

use bazaar_core::{CategoryId, ShopId};

use crate::ListingView;

/// Listing query: all set criteria must hold.
///
/// `model` is a case-insensitive substring match; `search` matches the model
/// OR the product name, also case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilter {
    pub model: Option<String>,
    pub external_id: Option<i64>,
    pub category_id: Option<CategoryId>,
    pub shop_id: Option<ShopId>,
    pub search: Option<String>,
}

impl ListingFilter {
    /// Trim text criteria and drop empty ones.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            model: clean(self.model),
            search: clean(self.search),
            ..self
        }
    }

    pub fn matches(&self, listing: &ListingView) -> bool {
        if let Some(model) = &self.model {
            if !contains_ci(&listing.model, model) {
                return false;
            }
        }
        if let Some(external_id) = self.external_id {
            if listing.external_id != external_id {
                return false;
            }
        }
        if let Some(category_id) = self.category_id {
            if listing.category_id != category_id {
                return false;
            }
        }
        if let Some(shop_id) = self.shop_id {
            if listing.shop.id != shop_id {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !contains_ci(&listing.model, search) && !contains_ci(&listing.product_name, search) {
                return false;
            }
        }
        true
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
