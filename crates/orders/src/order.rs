use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{ContactId, DomainError, DomainResult, ListingId, OrderId, OrderItemId, ShopId, UserId};

use crate::{Contact, OrderStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer: UserId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub contact_id: Option<ContactId>,
}

impl Order {
    pub fn new_basket(id: OrderId, buyer: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            buyer,
            status: OrderStatus::Basket,
            created_at,
            contact_id: None,
        }
    }

    pub fn is_basket(&self) -> bool {
        self.status == OrderStatus::Basket
    }

    pub fn ensure_owned_by(&self, buyer: UserId) -> DomainResult<()> {
        if self.buyer == buyer {
            Ok(())
        } else {
            // Foreign orders are indistinguishable from missing ones.
            Err(DomainError::not_found(format!("order {}", self.id)))
        }
    }

    /// `basket → new`, attaching the delivery contact.
    pub fn place(&mut self, contact: ContactId) -> DomainResult<()> {
        self.status = self.status.transition_to(OrderStatus::New)?;
        self.contact_id = Some(contact);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub listing_id: ListingId,
    pub shop_id: ShopId,
    pub quantity: i64,
}

/// An order item joined with the live listing data it prices from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderItemId,
    pub listing_id: ListingId,
    pub shop_id: ShopId,
    pub shop_name: String,
    pub product_name: String,
    pub model: String,
    pub quantity: i64,
    pub price_rrc: i64,
}

impl OrderLine {
    pub fn line_total(&self) -> i64 {
        self.quantity.saturating_mul(self.price_rrc)
    }
}

/// Order with its lines and a total computed on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLine>,
    pub contact: Option<Contact>,
    pub total: i64,
}

impl OrderDetail {
    pub fn new(order: Order, items: Vec<OrderLine>, contact: Option<Contact>) -> Self {
        let total = items
            .iter()
            .fold(0i64, |acc, line| acc.saturating_add(line.line_total()));
        Self {
            order,
            items,
            contact,
            total,
        }
    }

    pub fn shop_ids(&self) -> Vec<ShopId> {
        let mut ids: Vec<ShopId> = self.items.iter().map(|l| l.shop_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
