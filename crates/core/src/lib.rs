//! `bazaar-core`: shared domain primitives.
//!
//! Identifiers, the error taxonomy and pagination. No infrastructure concerns.

pub mod error;
pub mod id;
pub mod page;

pub use error::{DomainError, DomainResult};
pub use id::{
    CategoryId, ContactId, ListingId, OrderId, OrderItemId, ParameterId, ProductId, ShopId, UserId,
};
pub use page::{Page, PageRequest};
