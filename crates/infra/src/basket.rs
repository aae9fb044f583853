//! Basket and order engine.
//!
//! Mutations of a buyer's basket and checkout run under a per-buyer lock, so
//! two concurrent requests from one buyer never interleave. Prices are read
//! live from listings; totals are computed when an order is read.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use bazaar_auth::{Principal, require_shop};
use bazaar_core::{ContactId, DomainError, DomainResult, OrderId, OrderItemId, UserId};
use bazaar_orders::{AddItemInput, OrderDetail, OrderItem, OrderStatus, UpdateItemInput};

use crate::jobs::{Job, JobId, JobPayload, JobQueue, RetryPolicy};
use crate::locks::KeyedLocks;
use crate::store::{CatalogStore, ContactStore, OrderStore};

/// Attempts for one order notification, first run included.
const NOTIFY_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub order: OrderDetail,
    /// `None` when the notification could not be enqueued; the order is placed regardless.
    pub notification: Option<JobId>,
}

#[derive(Clone)]
pub struct OrderEngine {
    catalog: Arc<dyn CatalogStore>,
    orders: Arc<dyn OrderStore>,
    contacts: Arc<dyn ContactStore>,
    jobs: JobQueue,
    locks: Arc<KeyedLocks<UserId>>,
}

impl OrderEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        orders: Arc<dyn OrderStore>,
        contacts: Arc<dyn ContactStore>,
        jobs: JobQueue,
    ) -> Self {
        Self {
            catalog,
            orders,
            contacts,
            jobs,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// The buyer's basket with lines and total, created on first access.
    #[instrument(skip(self), fields(buyer = %buyer), err)]
    pub async fn get_basket(&self, buyer: UserId) -> DomainResult<OrderDetail> {
        let _guard = self.locks.lock(buyer).await;
        self.basket_detail(buyer).await
    }

    /// Add items one by one. The first invalid entry stops the loop and its
    /// index is reported; entries before it stay in the basket.
    #[instrument(skip(self, items), fields(buyer = %buyer, count = items.len()), err)]
    pub async fn add_items(
        &self,
        buyer: UserId,
        items: &[AddItemInput],
    ) -> DomainResult<Vec<OrderItem>> {
        if items.is_empty() {
            return Err(DomainError::invalid_arguments("items: must not be empty"));
        }
        let _guard = self.locks.lock(buyer).await;
        let basket = self.orders.get_or_create_basket(buyer).await?;

        let mut added = Vec::with_capacity(items.len());
        for (index, input) in items.iter().enumerate() {
            let item = input.validate(index)?;
            let listing = self.catalog.listing(item.listing).await?.ok_or_else(|| {
                DomainError::invalid_arguments(format!(
                    "items[{index}].listing: listing {} does not exist",
                    item.listing
                ))
            })?;
            if !listing.shop.accepting_orders {
                return Err(DomainError::invalid_arguments(format!(
                    "items[{index}].listing: shop '{}' is not accepting orders",
                    listing.shop.name
                )));
            }
            let row = self
                .orders
                .insert_item(basket.id, listing.id, listing.shop.id, item.quantity)
                .await
                .map_err(|e| match DomainError::from(e) {
                    DomainError::ConstraintViolation(msg) => {
                        DomainError::constraint(format!("items[{index}]: {msg}"))
                    }
                    other => other,
                })?;
            added.push(row);
        }
        info!(order_id = %basket.id, added = added.len(), "items added to basket");
        Ok(added)
    }

    /// Malformed entries and items of other orders are skipped.
    #[instrument(skip(self, updates), fields(buyer = %buyer), err)]
    pub async fn update_quantities(
        &self,
        buyer: UserId,
        updates: &[UpdateItemInput],
    ) -> DomainResult<u64> {
        let _guard = self.locks.lock(buyer).await;
        let basket = self.orders.get_or_create_basket(buyer).await?;
        let mut updated = 0;
        for (item, quantity) in updates.iter().filter_map(UpdateItemInput::well_formed) {
            if self
                .orders
                .update_item_quantity(basket.id, item, quantity)
                .await?
            {
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Ids outside the basket are ignored.
    #[instrument(skip(self, ids), fields(buyer = %buyer), err)]
    pub async fn remove_items(&self, buyer: UserId, ids: &[OrderItemId]) -> DomainResult<u64> {
        let _guard = self.locks.lock(buyer).await;
        let basket = self.orders.get_or_create_basket(buyer).await?;
        if ids.is_empty() {
            return Ok(0);
        }
        Ok(self.orders.delete_items(basket.id, ids).await?)
    }

    /// Place the basket `order`, delivering to `contact`.
    #[instrument(skip(self), fields(buyer = %buyer, order_id = %order, contact_id = %contact), err)]
    pub async fn checkout(
        &self,
        buyer: UserId,
        order: OrderId,
        contact: ContactId,
    ) -> DomainResult<CheckoutOutcome> {
        let _guard = self.locks.lock(buyer).await;

        let current = self
            .orders
            .order(order)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("order {order}")))?;
        current.ensure_owned_by(buyer)?;
        current.status.transition_to(OrderStatus::New)?;

        if self.contacts.contact(buyer, contact).await?.is_none() {
            return Err(DomainError::not_found(format!("contact {contact}")));
        }
        if self.orders.item_count(order).await? == 0 {
            return Err(DomainError::invalid_arguments("basket is empty"));
        }
        if !self.orders.place_order(order, contact).await? {
            return Err(DomainError::invalid_transition(format!(
                "order {order} is no longer a basket"
            )));
        }

        let detail = self
            .orders
            .order_detail(order)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("order {order}")))?;
        info!(order_id = %order, total = detail.total, lines = detail.items.len(), "order placed");

        let job = Job::new(
            buyer,
            JobPayload::NotifyOrderPlaced {
                buyer_id: buyer,
                order_id: order,
            },
        )
        .with_retry_policy(RetryPolicy {
            max_attempts: NOTIFY_ATTEMPTS,
            ..RetryPolicy::default()
        });
        let notification = match self.jobs.submit(job) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(order_id = %order, error = %e, "failed to enqueue order notification");
                None
            }
        };

        Ok(CheckoutOutcome {
            order: detail,
            notification,
        })
    }

    /// Placed orders of the buyer, newest first.
    pub async fn list_orders(&self, buyer: UserId) -> DomainResult<Vec<OrderDetail>> {
        Ok(self.orders.buyer_orders(buyer).await?)
    }

    /// Placed orders with at least one line from the caller's shop, restricted to those lines.
    pub async fn list_shop_orders(&self, principal: &Principal) -> DomainResult<Vec<OrderDetail>> {
        require_shop(principal)?;
        let shop = self
            .catalog
            .shop_by_owner(principal.user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("no shop for this account"))?;
        Ok(self.orders.shop_orders(shop.id).await?)
    }

    /// One of the buyer's orders, basket included. Foreign orders read as missing.
    pub async fn get_order(&self, buyer: UserId, order: OrderId) -> DomainResult<OrderDetail> {
        let detail = self
            .orders
            .order_detail(order)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("order {order}")))?;
        detail.order.ensure_owned_by(buyer)?;
        Ok(detail)
    }

    async fn basket_detail(&self, buyer: UserId) -> DomainResult<OrderDetail> {
        let basket = self.orders.get_or_create_basket(buyer).await?;
        self.orders
            .order_detail(basket.id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("order {}", basket.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::PriceListImporter;
    use crate::jobs::{InMemoryJobStore, JobKind};
    use crate::store::InMemoryStore;
    use bazaar_auth::AccountType;
    use bazaar_catalog::{FeedSource, ListingFilter};
    use bazaar_core::{ListingId, PageRequest};
    use bazaar_orders::NewContact;
    use serde_json::json;

    const FEED: &str = r#"
shop: Acme
categories:
  - {id: 1, name: Tools}
goods:
  - {id: 1, category: 1, name: Hammer, model: H1, price: 100, price_rrc: 200, quantity: 10}
  - {id: 2, category: 1, name: Saw, model: S1, price: 300, price_rrc: 500, quantity: 2}
"#;

    const SHOP_OWNER: UserId = UserId::new(100);
    const BUYER: UserId = UserId::new(1);

    struct Fixture {
        store: InMemoryStore,
        jobs: JobQueue,
        engine: OrderEngine,
        hammer: ListingId,
        saw: ListingId,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let shared = Arc::new(store.clone());
        PriceListImporter::new(shared.clone())
            .import(&FeedSource::Document(FEED.into()), SHOP_OWNER)
            .await
            .unwrap();
        let listings = store
            .listings(&ListingFilter::default(), PageRequest::default())
            .await
            .unwrap()
            .items;
        let find = |name: &str| listings.iter().find(|l| l.product_name == name).unwrap().id;
        let (hammer, saw) = (find("Hammer"), find("Saw"));

        let jobs = JobQueue::new(InMemoryJobStore::arc());
        let engine = OrderEngine::new(shared.clone(), shared.clone(), shared, jobs.clone());
        Fixture {
            store,
            jobs,
            engine,
            hammer,
            saw,
        }
    }

    fn add(listing: ListingId, quantity: i64) -> AddItemInput {
        AddItemInput {
            listing: Some(json!(listing.get())),
            quantity: Some(json!(quantity)),
        }
    }

    fn update(item: OrderItemId, quantity: i64) -> UpdateItemInput {
        UpdateItemInput {
            id: Some(json!(item.get())),
            quantity: Some(json!(quantity)),
        }
    }

    async fn contact(store: &InMemoryStore, user: UserId) -> ContactId {
        store
            .insert_contact(
                user,
                NewContact {
                    city: "Springfield".into(),
                    street: "Main".into(),
                    house: "1".into(),
                    structure: String::new(),
                    building: String::new(),
                    apartment: String::new(),
                    phone: "555".into(),
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn basket_is_created_once_and_starts_empty() {
        let f = fixture().await;
        let a = f.engine.get_basket(BUYER).await.unwrap();
        let b = f.engine.get_basket(BUYER).await.unwrap();
        assert_eq!(a.order.id, b.order.id);
        assert_eq!(a.order.status, OrderStatus::Basket);
        assert!(a.items.is_empty());
        assert_eq!(a.total, 0);
    }

    #[tokio::test]
    async fn add_then_update_prices_from_listing() {
        let f = fixture().await;
        let added = f.engine.add_items(BUYER, &[add(f.hammer, 3)]).await.unwrap();
        assert_eq!(f.engine.get_basket(BUYER).await.unwrap().total, 600);

        let updated = f
            .engine
            .update_quantities(BUYER, &[update(added[0].id, 5)])
            .await
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(f.engine.get_basket(BUYER).await.unwrap().total, 5 * 200);
    }

    #[tokio::test]
    async fn add_reports_failing_index_and_keeps_earlier_rows() {
        let f = fixture().await;
        let err = f
            .engine
            .add_items(BUYER, &[add(f.hammer, 1), add(ListingId::new(9999), 1), add(f.saw, 1)])
            .await
            .unwrap_err();
        assert!(matches!(&err, DomainError::InvalidArguments(msg) if msg.contains("items[1]")));

        let basket = f.engine.get_basket(BUYER).await.unwrap();
        assert_eq!(basket.items.len(), 1);
        assert_eq!(basket.items[0].listing_id, f.hammer);
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let f = fixture().await;
        let err = f.engine.add_items(BUYER, &[add(f.hammer, 0)]).await.unwrap_err();
        assert_eq!(err.code(), "invalid_arguments");
    }

    #[tokio::test]
    async fn closed_shop_does_not_accept_items() {
        let f = fixture().await;
        let shop = f.store.shop_by_owner(SHOP_OWNER).await.unwrap().unwrap();
        f.store.set_accepting_orders(shop.id, false).await.unwrap();
        let err = f.engine.add_items(BUYER, &[add(f.hammer, 1)]).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn update_skips_malformed_and_foreign_entries() {
        let f = fixture().await;
        let other = f.engine.add_items(UserId::new(2), &[add(f.saw, 1)]).await.unwrap();
        let mine = f.engine.add_items(BUYER, &[add(f.hammer, 1)]).await.unwrap();

        let updates = vec![
            update(other[0].id, 9),
            UpdateItemInput {
                id: Some(json!(mine[0].id.get())),
                quantity: Some(json!("4")),
            },
            update(mine[0].id, -1),
            update(mine[0].id, 2),
        ];
        assert_eq!(f.engine.update_quantities(BUYER, &updates).await.unwrap(), 1);
        assert_eq!(f.engine.get_basket(UserId::new(2)).await.unwrap().items[0].quantity, 1);
        assert_eq!(f.engine.get_basket(BUYER).await.unwrap().items[0].quantity, 2);
    }

    #[tokio::test]
    async fn remove_ignores_foreign_ids() {
        let f = fixture().await;
        let other = f.engine.add_items(UserId::new(2), &[add(f.saw, 1)]).await.unwrap();
        let mine = f.engine.add_items(BUYER, &[add(f.hammer, 1)]).await.unwrap();

        assert_eq!(f.engine.remove_items(BUYER, &[other[0].id]).await.unwrap(), 0);
        assert_eq!(f.engine.get_basket(UserId::new(2)).await.unwrap().items.len(), 1);
        assert_eq!(f.engine.remove_items(BUYER, &[mine[0].id]).await.unwrap(), 1);
        assert!(f.engine.get_basket(BUYER).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn checkout_places_once_and_enqueues_notification() {
        let f = fixture().await;
        f.engine
            .add_items(BUYER, &[add(f.hammer, 1), add(f.saw, 1)])
            .await
            .unwrap();
        let basket = f.engine.get_basket(BUYER).await.unwrap();
        let contact = contact(&f.store, BUYER).await;

        let outcome = f.engine.checkout(BUYER, basket.order.id, contact).await.unwrap();
        assert_eq!(outcome.order.order.status, OrderStatus::New);
        assert_eq!(outcome.order.total, 700);
        let job = f.jobs.status(BUYER, outcome.notification.unwrap()).unwrap();
        assert_eq!(job.kind(), JobKind::NotifyOrderPlaced);
        assert_eq!(job.retry_policy.max_attempts, NOTIFY_ATTEMPTS);

        let again = f.engine.checkout(BUYER, basket.order.id, contact).await.unwrap_err();
        assert!(matches!(again, DomainError::InvalidTransition(_)));

        let fresh = f.engine.get_basket(BUYER).await.unwrap();
        assert_ne!(fresh.order.id, basket.order.id);
        assert!(fresh.items.is_empty());
    }

    #[tokio::test]
    async fn checkout_requires_items_and_own_contact() {
        let f = fixture().await;
        let basket = f.engine.get_basket(BUYER).await.unwrap();
        let mine = contact(&f.store, BUYER).await;
        let theirs = contact(&f.store, UserId::new(2)).await;

        let empty = f.engine.checkout(BUYER, basket.order.id, mine).await.unwrap_err();
        assert!(matches!(empty, DomainError::InvalidArguments(_)));

        f.engine.add_items(BUYER, &[add(f.hammer, 1)]).await.unwrap();
        let foreign = f.engine.checkout(BUYER, basket.order.id, theirs).await.unwrap_err();
        assert!(matches!(foreign, DomainError::NotFound(_)));

        let not_mine = f
            .engine
            .checkout(UserId::new(2), basket.order.id, theirs)
            .await
            .unwrap_err();
        assert!(matches!(not_mine, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn shop_orders_are_restricted_to_shop_lines() {
        let f = fixture().await;
        // A second shop so the order spans two suppliers.
        let beta = FEED.replace("shop: Acme", "shop: Beta");
        PriceListImporter::new(Arc::new(f.store.clone()))
            .import(&FeedSource::Document(beta), UserId::new(200))
            .await
            .unwrap();
        let beta_hammer = f
            .store
            .listings(
                &ListingFilter {
                    search: Some("hammer".into()),
                    ..ListingFilter::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap()
            .items
            .into_iter()
            .find(|l| l.shop.name == "Beta")
            .unwrap()
            .id;

        f.engine
            .add_items(BUYER, &[add(f.hammer, 1), add(beta_hammer, 2)])
            .await
            .unwrap();
        let basket = f.engine.get_basket(BUYER).await.unwrap();
        let contact = contact(&f.store, BUYER).await;
        f.engine.checkout(BUYER, basket.order.id, contact).await.unwrap();

        let acme = Principal {
            user_id: SHOP_OWNER,
            email: "acme@example.com".into(),
            account_type: AccountType::Shop,
        };
        let orders = f.engine.list_shop_orders(&acme).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].items.len(), 1);
        assert_eq!(orders[0].total, 200);

        let buyer = Principal {
            user_id: BUYER,
            email: "b@example.com".into(),
            account_type: AccountType::Buyer,
        };
        let denied = f.engine.list_shop_orders(&buyer).await.unwrap_err();
        assert!(matches!(denied, DomainError::PermissionDenied(_)));

        let mine = f.engine.list_orders(BUYER).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].total, 200 + 2 * 200);
        assert!(f.engine.get_order(UserId::new(2), mine[0].order.id).await.is_err());
    }
}
