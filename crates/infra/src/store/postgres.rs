//! Postgres-backed stores.
//!
//! ## Error Mapping
//!
//! | PostgreSQL code | `StoreError` |
//! |-----------------|--------------|
//! | `23505` unique violation | `Unique(constraint)` |
//! | `23503` foreign key violation | `ForeignKey(constraint)` |
//! | `23514` check violation | `Check(constraint)` |
//! | anything else, pool/IO errors | `Backend(message)` |
//!
//! Imports run inside one `BEGIN ... COMMIT`; dropping a [`PgCatalogTx`]
//! without committing rolls the transaction back. The basket get-or-create
//! relies on the partial unique index `idx_orders_one_basket`.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{info, instrument};

use bazaar_auth::{Account, AccountDirectory, AccountType};
use bazaar_catalog::{
    Category, FeedCategory, ListingFilter, ListingView, NewListing, ParameterValue, Shop, ShopRef,
};
use bazaar_core::{
    CategoryId, ContactId, DomainResult, ListingId, OrderId, OrderItemId, Page, PageRequest,
    ParameterId, ProductId, ShopId, UserId,
};
use bazaar_orders::{
    Contact, ContactPatch, NewContact, Order, OrderDetail, OrderItem, OrderLine, OrderStatus,
};

use super::{CatalogStore, CatalogTx, ContactStore, OrderStore, StoreError};

const LISTING_SELECT: &str = r#"
    SELECT
        l.id, l.model, l.external_id, l.quantity, l.price, l.price_rrc,
        p.id AS product_id, p.name AS product_name,
        c.id AS category_id, c.name AS category_name,
        s.id AS shop_id, s.name AS shop_name, s.accepting_orders
    FROM listings l
    JOIN products p ON p.id = l.product_id
    JOIN categories c ON c.id = p.category_id
    JOIN shops s ON s.id = l.shop_id
"#;

const LISTING_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR strpos(lower(l.model), lower($1)) > 0)
      AND ($2::bigint IS NULL OR l.external_id = $2)
      AND ($3::bigint IS NULL OR p.category_id = $3)
      AND ($4::bigint IS NULL OR l.shop_id = $4)
      AND ($5::text IS NULL
           OR strpos(lower(l.model), lower($5)) > 0
           OR strpos(lower(p.name), lower($5)) > 0)
"#;

const LINE_SELECT: &str = r#"
    SELECT
        oi.id, oi.listing_id, oi.shop_id, s.name AS shop_name,
        p.name AS product_name, l.model, oi.quantity, l.price_rrc
    FROM order_items oi
    JOIN listings l ON l.id = oi.listing_id
    JOIN products p ON p.id = l.product_id
    JOIN shops s ON s.id = oi.shop_id
"#;

/// Every store trait over one connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;
        info!("database migrations applied");
        Ok(())
    }

    async fn lines(&self, order: OrderId, shop: Option<ShopId>) -> Result<Vec<OrderLine>, StoreError> {
        let sql = format!(
            "{LINE_SELECT} WHERE oi.order_id = $1 AND ($2::bigint IS NULL OR oi.shop_id = $2) ORDER BY oi.id"
        );
        let rows = sqlx::query(&sql)
            .bind(order.get())
            .bind(shop.map(ShopId::get))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("order_lines", e))?;
        rows.iter().map(line_from_row).collect()
    }

    async fn contact_by_id(&self, id: ContactId) -> Result<Option<Contact>, StoreError> {
        let row = sqlx::query("SELECT * FROM contacts WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("contact_by_id", e))?;
        row.as_ref().map(contact_from_row).transpose()
    }

    async fn detail(&self, order: Order, shop: Option<ShopId>) -> Result<OrderDetail, StoreError> {
        let lines = self.lines(order.id, shop).await?;
        let contact = match order.contact_id {
            Some(id) => self.contact_by_id(id).await?,
            None => None,
        };
        Ok(OrderDetail::new(order, lines, contact))
    }

    async fn parameters_for(
        &self,
        listings: &[i64],
    ) -> Result<Vec<(ListingId, ParameterValue)>, StoreError> {
        if listings.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT lp.listing_id, pa.name, lp.value
            FROM listing_parameters lp
            JOIN parameters pa ON pa.id = lp.parameter_id
            WHERE lp.listing_id = ANY($1)
            ORDER BY lp.listing_id, pa.name
            "#,
        )
        .bind(listings)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("listing_parameters", e))?;

        rows.iter()
            .map(|row| {
                Ok((
                    ListingId::new(get(row, "listing_id")?),
                    ParameterValue {
                        name: get(row, "name")?,
                        value: get(row, "value")?,
                    },
                ))
            })
            .collect()
    }

    async fn with_parameters(&self, mut views: Vec<ListingView>) -> Result<Vec<ListingView>, StoreError> {
        let ids: Vec<i64> = views.iter().map(|v| v.id.get()).collect();
        for (listing, value) in self.parameters_for(&ids).await? {
            if let Some(view) = views.iter_mut().find(|v| v.id == listing) {
                view.parameters.push(value);
            }
        }
        Ok(views)
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("column '{column}': {e}")))
}

fn shop_from_row(row: &PgRow) -> Result<Shop, StoreError> {
    Ok(Shop {
        id: ShopId::new(get(row, "id")?),
        name: get(row, "name")?,
        owner: UserId::new(get(row, "owner_id")?),
        url: get(row, "url")?,
        accepting_orders: get(row, "accepting_orders")?,
    })
}

fn view_from_row(row: &PgRow) -> Result<ListingView, StoreError> {
    Ok(ListingView {
        id: ListingId::new(get(row, "id")?),
        model: get(row, "model")?,
        external_id: get(row, "external_id")?,
        quantity: get(row, "quantity")?,
        price: get(row, "price")?,
        price_rrc: get(row, "price_rrc")?,
        product_id: ProductId::new(get(row, "product_id")?),
        product_name: get(row, "product_name")?,
        category_id: CategoryId::new(get(row, "category_id")?),
        category_name: get(row, "category_name")?,
        shop: ShopRef {
            id: ShopId::new(get(row, "shop_id")?),
            name: get(row, "shop_name")?,
            accepting_orders: get(row, "accepting_orders")?,
        },
        parameters: Vec::new(),
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let status: String = get(row, "status")?;
    let contact_id: Option<i64> = get(row, "contact_id")?;
    Ok(Order {
        id: OrderId::new(get(row, "id")?),
        buyer: UserId::new(get(row, "buyer_id")?),
        status: OrderStatus::from_str(&status).map_err(|e| StoreError::Backend(e.to_string()))?,
        created_at: get(row, "created_at")?,
        contact_id: contact_id.map(ContactId::new),
    })
}

fn line_from_row(row: &PgRow) -> Result<OrderLine, StoreError> {
    Ok(OrderLine {
        id: OrderItemId::new(get(row, "id")?),
        listing_id: ListingId::new(get(row, "listing_id")?),
        shop_id: ShopId::new(get(row, "shop_id")?),
        shop_name: get(row, "shop_name")?,
        product_name: get(row, "product_name")?,
        model: get(row, "model")?,
        quantity: get(row, "quantity")?,
        price_rrc: get(row, "price_rrc")?,
    })
}

fn contact_from_row(row: &PgRow) -> Result<Contact, StoreError> {
    Ok(Contact {
        id: ContactId::new(get(row, "id")?),
        user_id: UserId::new(get(row, "user_id")?),
        city: get(row, "city")?,
        street: get(row, "street")?,
        house: get(row, "house")?,
        structure: get(row, "structure")?,
        building: get(row, "building")?,
        apartment: get(row, "apartment")?,
        phone: get(row, "phone")?,
    })
}

fn page_of<T>(items: Vec<T>, total: i64, page: PageRequest) -> Page<T> {
    Page {
        items,
        total: u64::try_from(total).unwrap_or(0),
        page: page.page,
        page_size: page.page_size,
    }
}

fn bounds(page: PageRequest) -> (i64, i64) {
    let limit = i64::try_from(page.limit()).unwrap_or(i64::MAX);
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
    (limit, offset)
}

pub struct PgCatalogTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CatalogStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Box<dyn CatalogTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(Box::new(PgCatalogTx { tx }))
    }

    async fn shop_by_owner(&self, owner: UserId) -> Result<Option<Shop>, StoreError> {
        let row = sqlx::query("SELECT * FROM shops WHERE owner_id = $1")
            .bind(owner.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("shop_by_owner", e))?;
        row.as_ref().map(shop_from_row).transpose()
    }

    async fn shop(&self, id: ShopId) -> Result<Option<Shop>, StoreError> {
        let row = sqlx::query("SELECT * FROM shops WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("shop", e))?;
        row.as_ref().map(shop_from_row).transpose()
    }

    #[instrument(skip(self), fields(shop_id = %shop), err)]
    async fn set_accepting_orders(
        &self,
        shop: ShopId,
        accepting: bool,
    ) -> Result<Option<Shop>, StoreError> {
        let row = sqlx::query("UPDATE shops SET accepting_orders = $2 WHERE id = $1 RETURNING *")
            .bind(shop.get())
            .bind(accepting)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_accepting_orders", e))?;
        row.as_ref().map(shop_from_row).transpose()
    }

    async fn listing(&self, id: ListingId) -> Result<Option<ListingView>, StoreError> {
        let sql = format!("{LISTING_SELECT} WHERE l.id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("listing", e))?;
        let Some(view) = row.as_ref().map(view_from_row).transpose()? else {
            return Ok(None);
        };
        Ok(self.with_parameters(vec![view]).await?.pop())
    }

    #[instrument(skip(self), err)]
    async fn listings(
        &self,
        filter: &ListingFilter,
        page: PageRequest,
    ) -> Result<Page<ListingView>, StoreError> {
        let page = page.normalized();
        let (limit, offset) = bounds(page);

        let count_sql = format!(
            "SELECT COUNT(*) AS total FROM listings l JOIN products p ON p.id = l.product_id {LISTING_FILTER}"
        );
        let total: i64 = sqlx::query(&count_sql)
            .bind(filter.model.as_deref())
            .bind(filter.external_id)
            .bind(filter.category_id.map(CategoryId::get))
            .bind(filter.shop_id.map(ShopId::get))
            .bind(filter.search.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_listings", e))
            .and_then(|row| get(&row, "total"))?;

        let sql = format!("{LISTING_SELECT} {LISTING_FILTER} ORDER BY l.id LIMIT $6 OFFSET $7");
        let rows = sqlx::query(&sql)
            .bind(filter.model.as_deref())
            .bind(filter.external_id)
            .bind(filter.category_id.map(CategoryId::get))
            .bind(filter.shop_id.map(ShopId::get))
            .bind(filter.search.as_deref())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("listings", e))?;
        let views = rows.iter().map(view_from_row).collect::<Result<Vec<_>, _>>()?;
        let views = self.with_parameters(views).await?;
        Ok(page_of(views, total, page))
    }

    async fn categories(&self, page: PageRequest) -> Result<Page<Category>, StoreError> {
        let page = page.normalized();
        let (limit, offset) = bounds(page);
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM categories")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_categories", e))
            .and_then(|row| get(&row, "total"))?;
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name,
                   COALESCE(array_agg(cs.shop_id ORDER BY cs.shop_id)
                            FILTER (WHERE cs.shop_id IS NOT NULL), '{}') AS shops
            FROM categories c
            LEFT JOIN category_shops cs ON cs.category_id = c.id
            GROUP BY c.id, c.name
            ORDER BY c.id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("categories", e))?;

        let categories = rows
            .iter()
            .map(|row| {
                let shops: Vec<i64> = get(row, "shops")?;
                Ok(Category {
                    id: CategoryId::new(get(row, "id")?),
                    name: get(row, "name")?,
                    shops: shops.into_iter().map(ShopId::new).collect(),
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(page_of(categories, total, page))
    }

    async fn accepting_shops(&self, page: PageRequest) -> Result<Page<Shop>, StoreError> {
        let page = page.normalized();
        let (limit, offset) = bounds(page);
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM shops WHERE accepting_orders")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_shops", e))
            .and_then(|row| get(&row, "total"))?;
        let rows = sqlx::query(
            "SELECT * FROM shops WHERE accepting_orders ORDER BY name, id LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("accepting_shops", e))?;
        let shops = rows.iter().map(shop_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(page_of(shops, total, page))
    }
}

#[async_trait]
impl CatalogTx for PgCatalogTx {
    async fn shop_by_name(&mut self, name: &str) -> Result<Option<Shop>, StoreError> {
        // Row lock so a concurrent import of the same shop waits for us.
        let row = sqlx::query("SELECT * FROM shops WHERE name = $1 FOR UPDATE")
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("shop_by_name", e))?;
        row.as_ref().map(shop_from_row).transpose()
    }

    async fn shop_by_owner(&mut self, owner: UserId) -> Result<Option<Shop>, StoreError> {
        let row = sqlx::query("SELECT * FROM shops WHERE owner_id = $1")
            .bind(owner.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("shop_by_owner", e))?;
        row.as_ref().map(shop_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn create_shop(&mut self, name: &str, owner: UserId) -> Result<Shop, StoreError> {
        let row = sqlx::query("INSERT INTO shops (name, owner_id) VALUES ($1, $2) RETURNING *")
            .bind(name)
            .bind(owner.get())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("create_shop", e))?;
        shop_from_row(&row)
    }

    async fn category_exists(&mut self, id: CategoryId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 AS one FROM categories WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("category_exists", e))?;
        Ok(row.is_some())
    }

    async fn ensure_category(&mut self, category: &FeedCategory) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(category.id.get())
            .bind(&category.name)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("ensure_category", e))?;
        Ok(())
    }

    async fn link_category(&mut self, category: CategoryId, shop: ShopId) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO category_shops (category_id, shop_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(category.get())
        .bind(shop.get())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("link_category", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(shop_id = %shop), err)]
    async fn delete_listings(&mut self, shop: ShopId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM listings WHERE shop_id = $1")
            .bind(shop.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_listings", e))?;
        Ok(result.rows_affected())
    }

    async fn upsert_product(
        &mut self,
        name: &str,
        category: CategoryId,
    ) -> Result<ProductId, StoreError> {
        // DO UPDATE (no-op) so RETURNING yields the existing row too.
        let row = sqlx::query(
            r#"
            INSERT INTO products (name, category_id) VALUES ($1, $2)
            ON CONFLICT (name, category_id) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(category.get())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_product", e))?;
        Ok(ProductId::new(get(&row, "id")?))
    }

    async fn insert_listing(&mut self, listing: NewListing) -> Result<ListingId, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO listings (product_id, shop_id, model, external_id, quantity, price, price_rrc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(listing.product_id.get())
        .bind(listing.shop_id.get())
        .bind(&listing.model)
        .bind(listing.external_id)
        .bind(listing.quantity)
        .bind(listing.price)
        .bind(listing.price_rrc)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_listing", e))?;
        Ok(ListingId::new(get(&row, "id")?))
    }

    async fn upsert_parameter(&mut self, name: &str) -> Result<ParameterId, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO parameters (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_parameter", e))?;
        Ok(ParameterId::new(get(&row, "id")?))
    }

    async fn insert_listing_parameter(
        &mut self,
        listing: ListingId,
        parameter: ParameterId,
        value: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO listing_parameters (listing_id, parameter_id, value) VALUES ($1, $2, $3)",
        )
        .bind(listing.get())
        .bind(parameter.get())
        .bind(value)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_listing_parameter", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[instrument(skip(self), fields(buyer = %buyer), err)]
    async fn get_or_create_basket(&self, buyer: UserId) -> Result<Order, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (buyer_id, status) VALUES ($1, 'basket')
            ON CONFLICT (buyer_id) WHERE status = 'basket' DO NOTHING
            "#,
        )
        .bind(buyer.get())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_basket", e))?;

        let row = sqlx::query("SELECT * FROM orders WHERE buyer_id = $1 AND status = 'basket'")
            .bind(buyer.get())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_basket", e))?;
        order_from_row(&row)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("order", e))?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn insert_item(
        &self,
        order: OrderId,
        listing: ListingId,
        shop: ShopId,
        quantity: i64,
    ) -> Result<OrderItem, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO order_items (order_id, listing_id, shop_id, quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(order.get())
        .bind(listing.get())
        .bind(shop.get())
        .bind(quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(OrderItem {
            id: OrderItemId::new(get(&row, "id")?),
            order_id: order,
            listing_id: listing,
            shop_id: shop,
            quantity,
        })
    }

    async fn update_item_quantity(
        &self,
        order: OrderId,
        item: OrderItemId,
        quantity: i64,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE order_items SET quantity = $3 WHERE id = $2 AND order_id = $1")
                .bind(order.get())
                .bind(item.get())
                .bind(quantity)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("update_item_quantity", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_items(&self, order: OrderId, items: &[OrderItemId]) -> Result<u64, StoreError> {
        let ids: Vec<i64> = items.iter().map(|i| i.get()).collect();
        let result = sqlx::query("DELETE FROM order_items WHERE order_id = $1 AND id = ANY($2)")
            .bind(order.get())
            .bind(&ids)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_items", e))?;
        Ok(result.rows_affected())
    }

    async fn item_count(&self, order: OrderId) -> Result<u64, StoreError> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM order_items WHERE order_id = $1")
            .bind(order.get())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("item_count", e))
            .and_then(|row| get(&row, "total"))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    #[instrument(skip(self), fields(order_id = %order, contact_id = %contact), err)]
    async fn place_order(&self, order: OrderId, contact: ContactId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'new', contact_id = $2 WHERE id = $1 AND status = 'basket'",
        )
        .bind(order.get())
        .bind(contact.get())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("place_order", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn order_detail(&self, id: OrderId) -> Result<Option<OrderDetail>, StoreError> {
        match self.order(id).await? {
            Some(order) => self.detail(order, None).await.map(Some),
            None => Ok(None),
        }
    }

    async fn buyer_orders(&self, buyer: UserId) -> Result<Vec<OrderDetail>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE buyer_id = $1 AND status <> 'basket'
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(buyer.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("buyer_orders", e))?;

        let mut details = Vec::with_capacity(rows.len());
        for row in &rows {
            details.push(self.detail(order_from_row(row)?, None).await?);
        }
        Ok(details)
    }

    async fn shop_orders(&self, shop: ShopId) -> Result<Vec<OrderDetail>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT o.* FROM orders o
            WHERE o.status <> 'basket'
              AND EXISTS (SELECT 1 FROM order_items oi WHERE oi.order_id = o.id AND oi.shop_id = $1)
            ORDER BY o.created_at DESC, o.id DESC
            "#,
        )
        .bind(shop.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("shop_orders", e))?;

        let mut details = Vec::with_capacity(rows.len());
        for row in &rows {
            details.push(self.detail(order_from_row(row)?, Some(shop)).await?);
        }
        Ok(details)
    }
}

#[async_trait]
impl ContactStore for PostgresStore {
    async fn contacts(&self, user: UserId) -> Result<Vec<Contact>, StoreError> {
        let rows = sqlx::query("SELECT * FROM contacts WHERE user_id = $1 ORDER BY id")
            .bind(user.get())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("contacts", e))?;
        rows.iter().map(contact_from_row).collect()
    }

    async fn contact(&self, user: UserId, id: ContactId) -> Result<Option<Contact>, StoreError> {
        Ok(self
            .contact_by_id(id)
            .await?
            .filter(|contact| contact.user_id == user))
    }

    async fn insert_contact(&self, user: UserId, contact: NewContact) -> Result<Contact, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO contacts (user_id, city, street, house, structure, building, apartment, phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(user.get())
        .bind(&contact.city)
        .bind(&contact.street)
        .bind(&contact.house)
        .bind(&contact.structure)
        .bind(&contact.building)
        .bind(&contact.apartment)
        .bind(&contact.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_contact", e))?;
        contact_from_row(&row)
    }

    async fn update_contact(
        &self,
        user: UserId,
        id: ContactId,
        patch: &ContactPatch,
    ) -> Result<Option<Contact>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        let row = sqlx::query("SELECT * FROM contacts WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(id.get())
            .bind(user.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_contact", e))?;
        let Some(mut contact) = row.as_ref().map(contact_from_row).transpose()? else {
            return Ok(None);
        };
        patch.apply(&mut contact);

        sqlx::query(
            r#"
            UPDATE contacts
            SET city = $2, street = $3, house = $4, structure = $5,
                building = $6, apartment = $7, phone = $8
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .bind(&contact.city)
        .bind(&contact.street)
        .bind(&contact.house)
        .bind(&contact.structure)
        .bind(&contact.building)
        .bind(&contact.apartment)
        .bind(&contact.phone)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_contact", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(Some(contact))
    }

    async fn delete_contacts(&self, user: UserId, ids: &[ContactId]) -> Result<u64, StoreError> {
        let ids: Vec<i64> = ids.iter().map(|i| i.get()).collect();
        let result = sqlx::query("DELETE FROM contacts WHERE user_id = $1 AND id = ANY($2)")
            .bind(user.get())
            .bind(&ids)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_contacts", e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AccountDirectory for PostgresStore {
    async fn get(&self, id: UserId) -> DomainResult<Option<Account>> {
        let row = sqlx::query("SELECT id, email, account_type FROM users WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_account", e))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let account_type: String = get(&row, "account_type")?;
        Ok(Some(Account {
            id: UserId::new(get(&row, "id")?),
            email: get(&row, "email")?,
            account_type: AccountType::from_str(&account_type)?,
        }))
    }

    async fn remember(&self, account: Account) -> DomainResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, account_type) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET email = EXCLUDED.email, account_type = EXCLUDED.account_type, seen_at = NOW()
            "#,
        )
        .bind(account.id.get())
        .bind(&account.email)
        .bind(account.account_type.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("remember_account", e))?;
        Ok(())
    }
}

/// Map SQLx errors to `StoreError`, keeping the violated constraint name.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let constraint = db_err
                .constraint()
                .map(str::to_string)
                .unwrap_or_else(|| operation.to_string());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Unique(constraint),
                Some("23503") => StoreError::ForeignKey(constraint),
                Some("23514") => StoreError::Check(constraint),
                _ => StoreError::Backend(format!(
                    "database error in {operation}: {}",
                    db_err.message()
                )),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}
