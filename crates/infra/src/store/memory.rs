//! In-memory backend (dev/test).
//!
//! The catalog is an immutable snapshot behind `RwLock<Arc<_>>`. An import
//! takes the single writer lock, edits a private copy and publishes it with one
//! swap on commit, so readers see either the old or the new catalog, never a
//! shop halfway through a re-import. Dropping the transaction discards the copy.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument};

use bazaar_auth::{Account, AccountDirectory};
use bazaar_catalog::{
    Category, FeedCategory, Listing, ListingFilter, ListingView, NewListing, Parameter,
    ParameterValue, Product, Shop, ShopRef,
};
use bazaar_core::{
    CategoryId, ContactId, DomainError, DomainResult, ListingId, OrderId, OrderItemId, Page,
    PageRequest, ParameterId, ProductId, ShopId, UserId,
};
use bazaar_orders::{Contact, ContactPatch, NewContact, Order, OrderDetail, OrderItem, OrderLine};

use super::{
    CatalogStore, CatalogTx, ContactStore, OrderStore, SHOP_NAME_UNIQUE, SHOP_OWNER_UNIQUE,
    StoreError,
};

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".into())
}

#[derive(Debug, Default)]
struct Sequences {
    shop: AtomicI64,
    product: AtomicI64,
    listing: AtomicI64,
    parameter: AtomicI64,
    order: AtomicI64,
    item: AtomicI64,
    contact: AtomicI64,
}

fn next(counter: &AtomicI64) -> i64 {
    counter.fetch_add(1, Ordering::SeqCst) + 1
}

#[derive(Debug, Clone, Default)]
struct CategoryRow {
    name: String,
    shops: BTreeSet<ShopId>,
}

#[derive(Debug, Clone, Default)]
struct CatalogState {
    shops: BTreeMap<ShopId, Shop>,
    shop_names: HashMap<String, ShopId>,
    shop_owners: HashMap<UserId, ShopId>,
    categories: BTreeMap<CategoryId, CategoryRow>,
    products: BTreeMap<ProductId, Product>,
    product_keys: HashMap<(CategoryId, String), ProductId>,
    listings: BTreeMap<ListingId, Listing>,
    parameters: BTreeMap<ParameterId, Parameter>,
    parameter_names: HashMap<String, ParameterId>,
    listing_parameters: BTreeMap<(ListingId, ParameterId), String>,
}

impl CatalogState {
    fn view(&self, listing: &Listing) -> Option<ListingView> {
        let product = self.products.get(&listing.product_id)?;
        let category = self.categories.get(&product.category_id)?;
        let shop = self.shops.get(&listing.shop_id)?;
        let mut parameters: Vec<ParameterValue> = self
            .listing_parameters
            .range((listing.id, ParameterId::new(i64::MIN))..=(listing.id, ParameterId::new(i64::MAX)))
            .filter_map(|((_, parameter_id), value)| {
                self.parameters.get(parameter_id).map(|p| ParameterValue {
                    name: p.name.clone(),
                    value: value.clone(),
                })
            })
            .collect();
        parameters.sort_by(|a, b| a.name.cmp(&b.name));

        Some(ListingView {
            id: listing.id,
            model: listing.model.clone(),
            external_id: listing.external_id,
            quantity: listing.quantity,
            price: listing.price,
            price_rrc: listing.price_rrc,
            product_id: product.id,
            product_name: product.name.clone(),
            category_id: product.category_id,
            category_name: category.name.clone(),
            shop: ShopRef {
                id: shop.id,
                name: shop.name.clone(),
                accepting_orders: shop.accepting_orders,
            },
            parameters,
        })
    }

    fn line(&self, item: &OrderItem) -> Option<OrderLine> {
        let listing = self.listings.get(&item.listing_id)?;
        let product = self.products.get(&listing.product_id)?;
        let shop = self.shops.get(&item.shop_id)?;
        Some(OrderLine {
            id: item.id,
            listing_id: item.listing_id,
            shop_id: item.shop_id,
            shop_name: shop.name.clone(),
            product_name: product.name.clone(),
            model: listing.model.clone(),
            quantity: item.quantity,
            price_rrc: listing.price_rrc,
        })
    }
}

#[derive(Debug, Default)]
struct OrderState {
    orders: BTreeMap<OrderId, Order>,
    items: BTreeMap<OrderItemId, OrderItem>,
}

impl OrderState {
    fn items_of(&self, order: OrderId) -> impl Iterator<Item = &OrderItem> {
        self.items.values().filter(move |i| i.order_id == order)
    }
}

#[derive(Debug, Default)]
struct Inner {
    catalog: RwLock<Arc<CatalogState>>,
    catalog_writer: Arc<Mutex<()>>,
    orders: RwLock<OrderState>,
    contacts: RwLock<BTreeMap<ContactId, Contact>>,
    accounts: RwLock<HashMap<UserId, Account>>,
    seq: Sequences,
}

/// Process-local implementation of every store trait.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog(&self) -> Result<Arc<CatalogState>, StoreError> {
        Ok(self.inner.catalog.read().map_err(poisoned)?.clone())
    }

    fn detail(
        &self,
        order: &Order,
        items: Vec<OrderItem>,
        catalog: &CatalogState,
    ) -> Result<OrderDetail, StoreError> {
        let lines = items.iter().filter_map(|i| catalog.line(i)).collect();
        let contact = match order.contact_id {
            Some(id) => self.inner.contacts.read().map_err(poisoned)?.get(&id).cloned(),
            None => None,
        };
        Ok(OrderDetail::new(order.clone(), lines, contact))
    }
}

struct MemoryCatalogTx {
    inner: Arc<Inner>,
    state: CatalogState,
    _writer: OwnedMutexGuard<()>,
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn CatalogTx>, StoreError> {
        let writer = self.inner.catalog_writer.clone().lock_owned().await;
        let state = (*self.catalog()?).clone();
        Ok(Box::new(MemoryCatalogTx {
            inner: self.inner.clone(),
            state,
            _writer: writer,
        }))
    }

    async fn shop_by_owner(&self, owner: UserId) -> Result<Option<Shop>, StoreError> {
        let catalog = self.catalog()?;
        Ok(catalog
            .shop_owners
            .get(&owner)
            .and_then(|id| catalog.shops.get(id))
            .cloned())
    }

    async fn shop(&self, id: ShopId) -> Result<Option<Shop>, StoreError> {
        Ok(self.catalog()?.shops.get(&id).cloned())
    }

    #[instrument(skip(self))]
    async fn set_accepting_orders(
        &self,
        shop: ShopId,
        accepting: bool,
    ) -> Result<Option<Shop>, StoreError> {
        let _writer = self.inner.catalog_writer.lock().await;
        let mut catalog = self.inner.catalog.write().map_err(poisoned)?;
        let state = Arc::make_mut(&mut catalog);
        Ok(state.shops.get_mut(&shop).map(|s| {
            s.accepting_orders = accepting;
            s.clone()
        }))
    }

    async fn listing(&self, id: ListingId) -> Result<Option<ListingView>, StoreError> {
        let catalog = self.catalog()?;
        Ok(catalog.listings.get(&id).and_then(|l| catalog.view(l)))
    }

    async fn listings(
        &self,
        filter: &ListingFilter,
        page: PageRequest,
    ) -> Result<Page<ListingView>, StoreError> {
        let catalog = self.catalog()?;
        let matching: Vec<ListingView> = catalog
            .listings
            .values()
            .filter_map(|l| catalog.view(l))
            .filter(|v| filter.matches(v))
            .collect();
        Ok(Page::from_vec(matching, page))
    }

    async fn categories(&self, page: PageRequest) -> Result<Page<Category>, StoreError> {
        let catalog = self.catalog()?;
        let all = catalog
            .categories
            .iter()
            .map(|(id, row)| Category {
                id: *id,
                name: row.name.clone(),
                shops: row.shops.iter().copied().collect(),
            })
            .collect();
        Ok(Page::from_vec(all, page))
    }

    async fn accepting_shops(&self, page: PageRequest) -> Result<Page<Shop>, StoreError> {
        let catalog = self.catalog()?;
        let mut shops: Vec<Shop> = catalog
            .shops
            .values()
            .filter(|s| s.accepting_orders)
            .cloned()
            .collect();
        shops.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(Page::from_vec(shops, page))
    }
}

#[async_trait]
impl CatalogTx for MemoryCatalogTx {
    async fn shop_by_name(&mut self, name: &str) -> Result<Option<Shop>, StoreError> {
        Ok(self
            .state
            .shop_names
            .get(name)
            .and_then(|id| self.state.shops.get(id))
            .cloned())
    }

    async fn shop_by_owner(&mut self, owner: UserId) -> Result<Option<Shop>, StoreError> {
        Ok(self
            .state
            .shop_owners
            .get(&owner)
            .and_then(|id| self.state.shops.get(id))
            .cloned())
    }

    async fn create_shop(&mut self, name: &str, owner: UserId) -> Result<Shop, StoreError> {
        if self.state.shop_names.contains_key(name) {
            return Err(StoreError::Unique(SHOP_NAME_UNIQUE.into()));
        }
        if self.state.shop_owners.contains_key(&owner) {
            return Err(StoreError::Unique(SHOP_OWNER_UNIQUE.into()));
        }
        let shop = Shop {
            id: ShopId::new(next(&self.inner.seq.shop)),
            name: name.to_string(),
            owner,
            url: None,
            accepting_orders: true,
        };
        self.state.shop_names.insert(shop.name.clone(), shop.id);
        self.state.shop_owners.insert(owner, shop.id);
        self.state.shops.insert(shop.id, shop.clone());
        Ok(shop)
    }

    async fn category_exists(&mut self, id: CategoryId) -> Result<bool, StoreError> {
        Ok(self.state.categories.contains_key(&id))
    }

    async fn ensure_category(&mut self, category: &FeedCategory) -> Result<(), StoreError> {
        self.state
            .categories
            .entry(category.id)
            .or_insert_with(|| CategoryRow {
                name: category.name.clone(),
                shops: BTreeSet::new(),
            });
        Ok(())
    }

    async fn link_category(&mut self, category: CategoryId, shop: ShopId) -> Result<(), StoreError> {
        if !self.state.shops.contains_key(&shop) {
            return Err(StoreError::ForeignKey("category_shops_shop_id_fkey".into()));
        }
        let row = self
            .state
            .categories
            .get_mut(&category)
            .ok_or_else(|| StoreError::ForeignKey("category_shops_category_id_fkey".into()))?;
        row.shops.insert(shop);
        Ok(())
    }

    async fn delete_listings(&mut self, shop: ShopId) -> Result<u64, StoreError> {
        let doomed: Vec<ListingId> = self
            .state
            .listings
            .values()
            .filter(|l| l.shop_id == shop)
            .map(|l| l.id)
            .collect();
        for id in &doomed {
            self.state.listings.remove(id);
        }
        self.state
            .listing_parameters
            .retain(|(listing, _), _| !doomed.contains(listing));
        Ok(doomed.len() as u64)
    }

    async fn upsert_product(
        &mut self,
        name: &str,
        category: CategoryId,
    ) -> Result<ProductId, StoreError> {
        if !self.state.categories.contains_key(&category) {
            return Err(StoreError::ForeignKey("products_category_id_fkey".into()));
        }
        let key = (category, name.to_string());
        if let Some(id) = self.state.product_keys.get(&key) {
            return Ok(*id);
        }
        let id = ProductId::new(next(&self.inner.seq.product));
        self.state.products.insert(
            id,
            Product {
                id,
                name: name.to_string(),
                category_id: category,
            },
        );
        self.state.product_keys.insert(key, id);
        Ok(id)
    }

    async fn insert_listing(&mut self, listing: NewListing) -> Result<ListingId, StoreError> {
        if !self.state.products.contains_key(&listing.product_id) {
            return Err(StoreError::ForeignKey("listings_product_id_fkey".into()));
        }
        if !self.state.shops.contains_key(&listing.shop_id) {
            return Err(StoreError::ForeignKey("listings_shop_id_fkey".into()));
        }
        if listing.price < 0 || listing.price_rrc < 0 || listing.quantity < 0 {
            return Err(StoreError::Check("listings_non_negative".into()));
        }
        let id = ListingId::new(next(&self.inner.seq.listing));
        self.state.listings.insert(id, listing.into_listing(id));
        Ok(id)
    }

    async fn upsert_parameter(&mut self, name: &str) -> Result<ParameterId, StoreError> {
        if let Some(id) = self.state.parameter_names.get(name) {
            return Ok(*id);
        }
        let id = ParameterId::new(next(&self.inner.seq.parameter));
        self.state.parameters.insert(
            id,
            Parameter {
                id,
                name: name.to_string(),
            },
        );
        self.state.parameter_names.insert(name.to_string(), id);
        Ok(id)
    }

    async fn insert_listing_parameter(
        &mut self,
        listing: ListingId,
        parameter: ParameterId,
        value: &str,
    ) -> Result<(), StoreError> {
        if !self.state.listings.contains_key(&listing) {
            return Err(StoreError::ForeignKey("listing_parameters_listing_id_fkey".into()));
        }
        if !self.state.parameters.contains_key(&parameter) {
            return Err(StoreError::ForeignKey("listing_parameters_parameter_id_fkey".into()));
        }
        if self.state.listing_parameters.contains_key(&(listing, parameter)) {
            return Err(StoreError::Unique("listing_parameters_pkey".into()));
        }
        self.state
            .listing_parameters
            .insert((listing, parameter), value.to_string());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryCatalogTx {
            inner,
            state,
            _writer,
        } = *self;
        let published = Arc::new(state);
        {
            let mut catalog = inner.catalog.write().map_err(poisoned)?;
            *catalog = published.clone();
        }
        // Order items pointing at replaced listings go with them.
        let mut orders = inner.orders.write().map_err(poisoned)?;
        let before = orders.items.len();
        orders
            .items
            .retain(|_, item| published.listings.contains_key(&item.listing_id));
        let dropped = before - orders.items.len();
        if dropped > 0 {
            debug!(dropped, "removed order items of replaced listings");
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn get_or_create_basket(&self, buyer: UserId) -> Result<Order, StoreError> {
        let mut state = self.inner.orders.write().map_err(poisoned)?;
        if let Some(basket) = state
            .orders
            .values()
            .find(|o| o.buyer == buyer && o.is_basket())
        {
            return Ok(basket.clone());
        }
        let order = Order::new_basket(OrderId::new(next(&self.inner.seq.order)), buyer, Utc::now());
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.orders.read().map_err(poisoned)?.orders.get(&id).cloned())
    }

    async fn insert_item(
        &self,
        order: OrderId,
        listing: ListingId,
        shop: ShopId,
        quantity: i64,
    ) -> Result<OrderItem, StoreError> {
        if quantity <= 0 {
            return Err(StoreError::Check("order_items_quantity_check".into()));
        }
        let mut state = self.inner.orders.write().map_err(poisoned)?;
        if !state.orders.contains_key(&order) {
            return Err(StoreError::ForeignKey("order_items_order_id_fkey".into()));
        }
        if !self.catalog()?.listings.contains_key(&listing) {
            return Err(StoreError::ForeignKey("order_items_listing_id_fkey".into()));
        }
        let item = OrderItem {
            id: OrderItemId::new(next(&self.inner.seq.item)),
            order_id: order,
            listing_id: listing,
            shop_id: shop,
            quantity,
        };
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_item_quantity(
        &self,
        order: OrderId,
        item: OrderItemId,
        quantity: i64,
    ) -> Result<bool, StoreError> {
        if quantity <= 0 {
            return Err(StoreError::Check("order_items_quantity_check".into()));
        }
        let mut state = self.inner.orders.write().map_err(poisoned)?;
        Ok(match state.items.get_mut(&item) {
            Some(row) if row.order_id == order => {
                row.quantity = quantity;
                true
            }
            _ => false,
        })
    }

    async fn delete_items(&self, order: OrderId, items: &[OrderItemId]) -> Result<u64, StoreError> {
        let mut state = self.inner.orders.write().map_err(poisoned)?;
        let mut removed = 0;
        for id in items {
            if state.items.get(id).is_some_and(|i| i.order_id == order) {
                state.items.remove(id);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn item_count(&self, order: OrderId) -> Result<u64, StoreError> {
        let state = self.inner.orders.read().map_err(poisoned)?;
        Ok(state.items_of(order).count() as u64)
    }

    async fn place_order(&self, order: OrderId, contact: ContactId) -> Result<bool, StoreError> {
        let mut state = self.inner.orders.write().map_err(poisoned)?;
        if !self.inner.contacts.read().map_err(poisoned)?.contains_key(&contact) {
            return Err(StoreError::ForeignKey("orders_contact_id_fkey".into()));
        }
        match state.orders.get_mut(&order) {
            Some(row) => Ok(row.place(contact).is_ok()),
            None => Ok(false),
        }
    }

    async fn order_detail(&self, id: OrderId) -> Result<Option<OrderDetail>, StoreError> {
        let catalog = self.catalog()?;
        let (order, items) = {
            let state = self.inner.orders.read().map_err(poisoned)?;
            match state.orders.get(&id) {
                Some(order) => (order.clone(), state.items_of(id).cloned().collect::<Vec<_>>()),
                None => return Ok(None),
            }
        };
        self.detail(&order, items, &catalog).map(Some)
    }

    async fn buyer_orders(&self, buyer: UserId) -> Result<Vec<OrderDetail>, StoreError> {
        let catalog = self.catalog()?;
        let rows: Vec<(Order, Vec<OrderItem>)> = {
            let state = self.inner.orders.read().map_err(poisoned)?;
            state
                .orders
                .values()
                .filter(|o| o.buyer == buyer && !o.is_basket())
                .map(|o| (o.clone(), state.items_of(o.id).cloned().collect()))
                .collect()
        };
        let mut details = rows
            .into_iter()
            .map(|(order, items)| self.detail(&order, items, &catalog))
            .collect::<Result<Vec<_>, _>>()?;
        details.sort_by(|a, b| {
            b.order
                .created_at
                .cmp(&a.order.created_at)
                .then(b.order.id.cmp(&a.order.id))
        });
        Ok(details)
    }

    async fn shop_orders(&self, shop: ShopId) -> Result<Vec<OrderDetail>, StoreError> {
        let catalog = self.catalog()?;
        let rows: Vec<(Order, Vec<OrderItem>)> = {
            let state = self.inner.orders.read().map_err(poisoned)?;
            state
                .orders
                .values()
                .filter(|o| !o.is_basket())
                .map(|o| {
                    let items: Vec<OrderItem> = state
                        .items_of(o.id)
                        .filter(|i| i.shop_id == shop)
                        .cloned()
                        .collect();
                    (o.clone(), items)
                })
                .filter(|(_, items)| !items.is_empty())
                .collect()
        };
        let mut details = rows
            .into_iter()
            .map(|(order, items)| self.detail(&order, items, &catalog))
            .collect::<Result<Vec<_>, _>>()?;
        details.sort_by(|a, b| {
            b.order
                .created_at
                .cmp(&a.order.created_at)
                .then(b.order.id.cmp(&a.order.id))
        });
        Ok(details)
    }
}

#[async_trait]
impl ContactStore for InMemoryStore {
    async fn contacts(&self, user: UserId) -> Result<Vec<Contact>, StoreError> {
        let contacts = self.inner.contacts.read().map_err(poisoned)?;
        Ok(contacts.values().filter(|c| c.user_id == user).cloned().collect())
    }

    async fn contact(&self, user: UserId, id: ContactId) -> Result<Option<Contact>, StoreError> {
        let contacts = self.inner.contacts.read().map_err(poisoned)?;
        Ok(contacts.get(&id).filter(|c| c.user_id == user).cloned())
    }

    async fn insert_contact(&self, user: UserId, contact: NewContact) -> Result<Contact, StoreError> {
        let contact = contact.into_contact(ContactId::new(next(&self.inner.seq.contact)), user);
        self.inner
            .contacts
            .write()
            .map_err(poisoned)?
            .insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn update_contact(
        &self,
        user: UserId,
        id: ContactId,
        patch: &ContactPatch,
    ) -> Result<Option<Contact>, StoreError> {
        let mut contacts = self.inner.contacts.write().map_err(poisoned)?;
        Ok(match contacts.get_mut(&id) {
            Some(contact) if contact.user_id == user => {
                patch.apply(contact);
                Some(contact.clone())
            }
            _ => None,
        })
    }

    async fn delete_contacts(&self, user: UserId, ids: &[ContactId]) -> Result<u64, StoreError> {
        let removed: Vec<ContactId> = {
            let mut contacts = self.inner.contacts.write().map_err(poisoned)?;
            ids.iter()
                .copied()
                .filter(|id| {
                    if contacts.get(id).is_some_and(|c| c.user_id == user) {
                        contacts.remove(id);
                        true
                    } else {
                        false
                    }
                })
                .collect()
        };
        if !removed.is_empty() {
            let mut state = self.inner.orders.write().map_err(poisoned)?;
            for order in state.orders.values_mut() {
                if order.contact_id.is_some_and(|c| removed.contains(&c)) {
                    order.contact_id = None;
                }
            }
        }
        Ok(removed.len() as u64)
    }
}

#[async_trait]
impl AccountDirectory for InMemoryStore {
    async fn get(&self, id: UserId) -> DomainResult<Option<Account>> {
        let accounts = self
            .inner
            .accounts
            .read()
            .map_err(|_| DomainError::storage("account directory lock poisoned"))?;
        Ok(accounts.get(&id).cloned())
    }

    async fn remember(&self, account: Account) -> DomainResult<()> {
        self.inner
            .accounts
            .write()
            .map_err(|_| DomainError::storage("account directory lock poisoned"))?
            .insert(account.id, account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_orders::OrderStatus;

    async fn seed_listing(store: &InMemoryStore, owner: i64, price_rrc: i64) -> (ShopId, ListingId) {
        let mut tx = store.begin().await.unwrap();
        let shop = tx.create_shop(&format!("shop-{owner}"), UserId::new(owner)).await.unwrap();
        tx.ensure_category(&FeedCategory {
            id: CategoryId::new(1),
            name: "Tools".into(),
        })
        .await
        .unwrap();
        let product = tx.upsert_product("Hammer", CategoryId::new(1)).await.unwrap();
        let listing = tx
            .insert_listing(NewListing {
                product_id: product,
                shop_id: shop.id,
                model: "H1".into(),
                external_id: 1,
                quantity: 10,
                price: 1,
                price_rrc,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        (shop.id, listing)
    }

    #[tokio::test]
    async fn uncommitted_import_is_invisible_and_discarded() {
        let store = InMemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.create_shop("Acme", UserId::new(1)).await.unwrap();
            assert!(store.shop_by_owner(UserId::new(1)).await.unwrap().is_none());
        }
        assert!(store.shop_by_owner(UserId::new(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn one_shop_per_owner_and_name() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create_shop("Acme", UserId::new(1)).await.unwrap();
        assert_eq!(
            tx.create_shop("Other", UserId::new(1)).await.unwrap_err(),
            StoreError::Unique("shops_owner_id_key".into())
        );
        assert_eq!(
            tx.create_shop("Acme", UserId::new(2)).await.unwrap_err(),
            StoreError::Unique("shops_name_key".into())
        );
    }

    #[tokio::test]
    async fn listing_parameter_pair_is_unique() {
        let store = InMemoryStore::new();
        let (_, listing) = seed_listing(&store, 1, 100).await;
        let mut tx = store.begin().await.unwrap();
        let weight = tx.upsert_parameter("weight").await.unwrap();
        assert_eq!(tx.upsert_parameter("weight").await.unwrap(), weight);
        tx.insert_listing_parameter(listing, weight, "1kg").await.unwrap();
        assert!(matches!(
            tx.insert_listing_parameter(listing, weight, "2kg").await,
            Err(StoreError::Unique(_))
        ));
    }

    #[tokio::test]
    async fn replacing_listings_cascades_to_order_items() {
        let store = InMemoryStore::new();
        let (shop, listing) = seed_listing(&store, 1, 100).await;
        let basket = store.get_or_create_basket(UserId::new(5)).await.unwrap();
        store.insert_item(basket.id, listing, shop, 2).await.unwrap();
        assert_eq!(store.item_count(basket.id).await.unwrap(), 1);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.delete_listings(shop).await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert_eq!(store.item_count(basket.id).await.unwrap(), 0);
        assert!(store.listing(listing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn basket_is_unique_per_buyer() {
        let store = InMemoryStore::new();
        let a = store.get_or_create_basket(UserId::new(5)).await.unwrap();
        let b = store.get_or_create_basket(UserId::new(5)).await.unwrap();
        assert_eq!(a.id, b.id);
        let other = store.get_or_create_basket(UserId::new(6)).await.unwrap();
        assert_ne!(a.id, other.id);
    }

    #[tokio::test]
    async fn place_order_is_conditional_on_basket_status() {
        let store = InMemoryStore::new();
        let buyer = UserId::new(5);
        let contact = store
            .insert_contact(
                buyer,
                NewContact {
                    city: "c".into(),
                    street: "s".into(),
                    house: "1".into(),
                    structure: String::new(),
                    building: String::new(),
                    apartment: String::new(),
                    phone: "1".into(),
                },
            )
            .await
            .unwrap();
        let basket = store.get_or_create_basket(buyer).await.unwrap();
        assert!(store.place_order(basket.id, contact.id).await.unwrap());
        assert!(!store.place_order(basket.id, contact.id).await.unwrap());

        store.delete_contacts(buyer, &[contact.id]).await.unwrap();
        let order = store.order(basket.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.contact_id, None);
    }

    #[tokio::test]
    async fn contacts_are_scoped_to_their_owner() {
        let store = InMemoryStore::new();
        let contact = store
            .insert_contact(
                UserId::new(1),
                NewContact {
                    city: "c".into(),
                    street: "s".into(),
                    house: "1".into(),
                    structure: String::new(),
                    building: String::new(),
                    apartment: String::new(),
                    phone: "1".into(),
                },
            )
            .await
            .unwrap();
        assert!(store.contact(UserId::new(2), contact.id).await.unwrap().is_none());
        assert_eq!(store.delete_contacts(UserId::new(2), &[contact.id]).await.unwrap(), 0);
        assert_eq!(store.contacts(UserId::new(1)).await.unwrap().len(), 1);
    }
}
