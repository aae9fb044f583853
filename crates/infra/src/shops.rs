//! Partner-side shop state.

use std::sync::Arc;

use tracing::info;

use bazaar_auth::{Principal, require_shop};
use bazaar_catalog::Shop;
use bazaar_core::{DomainError, DomainResult};

use crate::store::CatalogStore;

#[derive(Clone)]
pub struct ShopService {
    catalog: Arc<dyn CatalogStore>,
}

impl ShopService {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// The caller's shop. Shop accounts get one on their first import.
    pub async fn get_state(&self, principal: &Principal) -> DomainResult<Shop> {
        require_shop(principal)?;
        self.catalog
            .shop_by_owner(principal.user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("no shop for this account"))
    }

    /// Flip `accepting_orders` and return the updated shop.
    pub async fn toggle(&self, principal: &Principal) -> DomainResult<Shop> {
        let shop = self.get_state(principal).await?;
        let updated = self
            .catalog
            .set_accepting_orders(shop.id, !shop.accepting_orders)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("shop {}", shop.id)))?;
        info!(shop_id = %updated.id, accepting_orders = updated.accepting_orders, "shop state changed");
        Ok(updated)
    }
}
