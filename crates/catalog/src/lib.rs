//! `bazaar-catalog`: the shared multi-shop catalog (pure domain).
//!
//! Entities, the supplier price-list feed format and listing filters. Stores
//! and the import pipeline live in `bazaar-infra`.

pub mod feed;
pub mod filter;
pub mod model;

pub use feed::{FeedCategory, FeedError, FeedGood, FeedSource, PriceList};
pub use filter::ListingFilter;
pub use model::{
    Category, ImportSummary, Listing, ListingView, NewListing, Parameter, ParameterValue, Product,
    Shop, ShopRef,
};
