//! Infrastructure layer: stores, import pipeline, order engine, jobs, mail.

pub mod basket;
pub mod contacts;
pub mod importer;
pub mod jobs;
pub mod locks;
pub mod notifications;
pub mod query;
pub mod shops;
pub mod store;

pub use basket::{CheckoutOutcome, OrderEngine};
pub use contacts::ContactBook;
pub use importer::{ImportError, ImportJobHandler, PriceListImporter};
pub use locks::KeyedLocks;
pub use query::CatalogQueryService;
pub use shops::ShopService;
