//! `bazaar-orders`: baskets, orders and delivery contacts (pure domain).
//!
//! The status state machine, order/line/contact types, typed basket requests
//! with per-field validation, and computed totals.

pub mod contact;
pub mod order;
pub mod request;
pub mod status;
pub mod validation;

pub use contact::{Contact, ContactDraft, ContactPatch, NewContact};
pub use order::{Order, OrderDetail, OrderItem, OrderLine};
pub use request::{
    AddItem, AddItemInput, AddItemsRequest, CheckoutRequest, ItemIds, Items, RemoveItemsRequest,
    UpdateItemInput, UpdateItemsRequest,
};
pub use status::OrderStatus;
pub use validation::{FieldError, FieldErrors};
