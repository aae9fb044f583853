//! Persistence seams for the catalog, orders, contacts and accounts.
//!
//! Two backends implement every trait here: [`memory::InMemoryStore`] (default,
//! dev/test) and `postgres::PostgresStore` (cargo feature `postgres`).

use async_trait::async_trait;
use thiserror::Error;

use bazaar_catalog::{Category, FeedCategory, ListingFilter, ListingView, NewListing, Shop};
use bazaar_core::{
    CategoryId, ContactId, DomainError, ListingId, OrderId, OrderItemId, Page, PageRequest,
    ParameterId, ProductId, ShopId, UserId,
};
use bazaar_orders::{Contact, ContactPatch, NewContact, Order, OrderDetail, OrderItem};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// Unique constraint on `shops.name`, shared by both backends.
pub const SHOP_NAME_UNIQUE: &str = "shops_name_key";
/// Unique constraint on `shops.owner_id`: one shop per account.
pub const SHOP_OWNER_UNIQUE: &str = "shops_owner_id_key";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint '{0}' violated")]
    Unique(String),

    #[error("foreign key '{0}' violated")]
    ForeignKey(String),

    #[error("check constraint '{0}' violated")]
    Check(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unique(_) | StoreError::ForeignKey(_) | StoreError::Check(_) => {
                DomainError::constraint(err.to_string())
            }
            StoreError::Backend(msg) => DomainError::storage(msg),
        }
    }
}

/// Read side of the catalog plus entry to import transactions.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Open an import transaction. Dropping it without `commit` rolls back.
    async fn begin(&self) -> Result<Box<dyn CatalogTx>, StoreError>;

    async fn shop_by_owner(&self, owner: UserId) -> Result<Option<Shop>, StoreError>;

    async fn shop(&self, id: ShopId) -> Result<Option<Shop>, StoreError>;

    async fn set_accepting_orders(
        &self,
        shop: ShopId,
        accepting: bool,
    ) -> Result<Option<Shop>, StoreError>;

    async fn listing(&self, id: ListingId) -> Result<Option<ListingView>, StoreError>;

    /// Listings matching `filter`, ordered by id.
    async fn listings(
        &self,
        filter: &ListingFilter,
        page: PageRequest,
    ) -> Result<Page<ListingView>, StoreError>;

    async fn categories(&self, page: PageRequest) -> Result<Page<Category>, StoreError>;

    /// Shops currently accepting orders, ordered by name.
    async fn accepting_shops(&self, page: PageRequest) -> Result<Page<Shop>, StoreError>;
}

/// One atomic catalog import.
#[async_trait]
pub trait CatalogTx: Send {
    async fn shop_by_name(&mut self, name: &str) -> Result<Option<Shop>, StoreError>;

    async fn shop_by_owner(&mut self, owner: UserId) -> Result<Option<Shop>, StoreError>;

    async fn create_shop(&mut self, name: &str, owner: UserId) -> Result<Shop, StoreError>;

    async fn category_exists(&mut self, id: CategoryId) -> Result<bool, StoreError>;

    /// Insert the category if absent; an existing name is left unchanged.
    async fn ensure_category(&mut self, category: &FeedCategory) -> Result<(), StoreError>;

    async fn link_category(&mut self, category: CategoryId, shop: ShopId) -> Result<(), StoreError>;

    /// Delete every listing of `shop` (cascading to their parameters and order items).
    async fn delete_listings(&mut self, shop: ShopId) -> Result<u64, StoreError>;

    async fn upsert_product(&mut self, name: &str, category: CategoryId)
    -> Result<ProductId, StoreError>;

    async fn insert_listing(&mut self, listing: NewListing) -> Result<ListingId, StoreError>;

    async fn upsert_parameter(&mut self, name: &str) -> Result<ParameterId, StoreError>;

    async fn insert_listing_parameter(
        &mut self,
        listing: ListingId,
        parameter: ParameterId,
        value: &str,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// The buyer's single basket, created if absent.
    async fn get_or_create_basket(&self, buyer: UserId) -> Result<Order, StoreError>;

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Fails with a foreign-key error if the listing no longer exists.
    async fn insert_item(
        &self,
        order: OrderId,
        listing: ListingId,
        shop: ShopId,
        quantity: i64,
    ) -> Result<OrderItem, StoreError>;

    /// Returns whether an item of `order` was updated.
    async fn update_item_quantity(
        &self,
        order: OrderId,
        item: OrderItemId,
        quantity: i64,
    ) -> Result<bool, StoreError>;

    /// Deletes the given items of `order`; ids of other orders are ignored.
    async fn delete_items(&self, order: OrderId, items: &[OrderItemId]) -> Result<u64, StoreError>;

    async fn item_count(&self, order: OrderId) -> Result<u64, StoreError>;

    /// Conditionally move `order` from basket to new with `contact` attached.
    /// Returns false when the order was not in basket status.
    async fn place_order(&self, order: OrderId, contact: ContactId) -> Result<bool, StoreError>;

    async fn order_detail(&self, id: OrderId) -> Result<Option<OrderDetail>, StoreError>;

    /// Non-basket orders of the buyer, newest first.
    async fn buyer_orders(&self, buyer: UserId) -> Result<Vec<OrderDetail>, StoreError>;

    /// Non-basket orders containing items of `shop`, restricted to those items, newest first.
    async fn shop_orders(&self, shop: ShopId) -> Result<Vec<OrderDetail>, StoreError>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn contacts(&self, user: UserId) -> Result<Vec<Contact>, StoreError>;

    async fn contact(&self, user: UserId, id: ContactId) -> Result<Option<Contact>, StoreError>;

    async fn insert_contact(&self, user: UserId, contact: NewContact) -> Result<Contact, StoreError>;

    async fn update_contact(
        &self,
        user: UserId,
        id: ContactId,
        patch: &ContactPatch,
    ) -> Result<Option<Contact>, StoreError>;

    /// Orders keep their history; their contact reference is cleared.
    async fn delete_contacts(&self, user: UserId, ids: &[ContactId]) -> Result<u64, StoreError>;
}
