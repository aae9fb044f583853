//! Read-only catalog queries.

use std::sync::Arc;

use tracing::instrument;

use bazaar_catalog::{Category, ListingFilter, ListingView, Shop};
use bazaar_core::{DomainError, DomainResult, ListingId, Page, PageRequest};

use crate::store::CatalogStore;

#[derive(Clone)]
pub struct CatalogQueryService {
    catalog: Arc<dyn CatalogStore>,
}

impl CatalogQueryService {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Listings of every shop, open or closed, matching all set criteria.
    #[instrument(skip(self), err)]
    pub async fn search(
        &self,
        filter: ListingFilter,
        page: PageRequest,
    ) -> DomainResult<Page<ListingView>> {
        Ok(self
            .catalog
            .listings(&filter.normalized(), page.normalized())
            .await?)
    }

    pub async fn listing(&self, id: ListingId) -> DomainResult<ListingView> {
        self.catalog
            .listing(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("listing {id}")))
    }

    pub async fn categories(&self, page: PageRequest) -> DomainResult<Page<Category>> {
        Ok(self.catalog.categories(page.normalized()).await?)
    }

    /// Shops accepting orders, by name.
    pub async fn shops(&self, page: PageRequest) -> DomainResult<Page<Shop>> {
        Ok(self.catalog.accepting_shops(page.normalized()).await?)
    }
}
