//! Price-list import pipeline.
//!
//! A feed is parsed, checked against the catalog and merged in one catalog
//! transaction: resolve or create the shop, upsert and link categories, drop
//! the shop's listings, then write products, listings and parameters. Any
//! error drops the transaction, which rolls everything back, shop creation
//! included.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, instrument, warn};

use bazaar_auth::{AccountDirectory, AccountType};
use bazaar_catalog::{FeedError, FeedSource, ImportSummary, NewListing, PriceList, Shop};
use bazaar_core::{DomainError, UserId};

use crate::jobs::{Job, JobHandler, JobPayload, JobResult};
use crate::store::{CatalogStore, CatalogTx, SHOP_NAME_UNIQUE, SHOP_OWNER_UNIQUE, StoreError};

pub const DEFAULT_IMPORT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("price list not found: {0}")]
    NotFound(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("ownership conflict: {0}")]
    OwnershipConflict(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("import failed: {cause}")]
    ImportFailed { cause: DomainError },
}

impl ImportError {
    /// Whether running the same import again may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ImportFailed { cause } if cause.is_transient())
    }
}

impl From<FeedError> for ImportError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Parse(msg) => Self::Parse(msg),
            FeedError::Invalid(msg) => Self::InvalidArguments(msg),
        }
    }
}

impl From<StoreError> for ImportError {
    fn from(err: StoreError) -> Self {
        Self::ImportFailed { cause: err.into() }
    }
}

impl From<ImportError> for DomainError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::NotFound(msg) => DomainError::not_found(msg),
            ImportError::Parse(msg) => DomainError::parse(msg),
            ImportError::PermissionDenied(msg) => DomainError::permission_denied(msg),
            ImportError::OwnershipConflict(msg) => DomainError::ownership_conflict(msg),
            ImportError::InvalidArguments(msg) => DomainError::invalid_arguments(msg),
            ImportError::ImportFailed { cause } => cause,
        }
    }
}

#[derive(Clone)]
pub struct PriceListImporter {
    catalog: Arc<dyn CatalogStore>,
}

impl PriceListImporter {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Load, parse and apply a feed on behalf of `user`.
    #[instrument(skip(self, source), fields(source = %source.describe(), user = %user), err)]
    pub async fn import(&self, source: &FeedSource, user: UserId) -> Result<ImportSummary, ImportError> {
        let text = load(source).await?;
        let list = PriceList::from_yaml(&text)?;
        self.apply(&list, user).await
    }

    /// Merge an already parsed feed into the catalog.
    pub async fn apply(&self, list: &PriceList, user: UserId) -> Result<ImportSummary, ImportError> {
        let mut tx = self.catalog.begin().await?;

        // Ownership is settled first so a foreign shop name is always denied.
        let (shop, shop_created) = resolve_shop(tx.as_mut(), list.shop.trim(), user).await?;

        // Goods may reference categories declared by earlier imports only.
        for category in list.undeclared_categories() {
            if !tx.category_exists(category).await? {
                return Err(ImportError::InvalidArguments(format!(
                    "category {category} is neither declared in the price list nor known"
                )));
            }
        }

        for category in &list.categories {
            tx.ensure_category(category).await?;
            tx.link_category(category.id, shop.id).await?;
        }
        for category in list.undeclared_categories() {
            tx.link_category(category, shop.id).await?;
        }

        let replaced = tx.delete_listings(shop.id).await?;

        let mut parameters = 0;
        for good in &list.goods {
            let product_id = tx.upsert_product(good.name.trim(), good.category).await?;
            let listing = tx
                .insert_listing(NewListing {
                    product_id,
                    shop_id: shop.id,
                    model: good.model.clone(),
                    external_id: good.id,
                    quantity: good.quantity,
                    price: good.price,
                    price_rrc: good.price_rrc,
                })
                .await?;
            for (name, value) in &good.parameters {
                let parameter = tx.upsert_parameter(name).await?;
                tx.insert_listing_parameter(listing, parameter, value).await?;
                parameters += 1;
            }
        }

        tx.commit().await?;

        let summary = ImportSummary {
            shop_id: shop.id,
            shop_created,
            categories: list.categories.len(),
            listings: list.goods.len(),
            parameters,
        };
        info!(
            shop_id = %shop.id,
            shop = %shop.name,
            shop_created,
            replaced,
            listings = summary.listings,
            parameters,
            "price list imported"
        );
        Ok(summary)
    }
}

async fn load(source: &FeedSource) -> Result<String, ImportError> {
    match source {
        FeedSource::Document(text) => Ok(text.clone()),
        FeedSource::Path(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ImportError::NotFound(path.display().to_string())
            } else {
                ImportError::ImportFailed {
                    cause: DomainError::storage(format!("reading {}: {e}", path.display())),
                }
            }
        }),
    }
}

async fn resolve_shop(
    tx: &mut dyn CatalogTx,
    name: &str,
    user: UserId,
) -> Result<(Shop, bool), ImportError> {
    match tx.shop_by_name(name).await? {
        Some(shop) if shop.owner == user => Ok((shop, false)),
        Some(shop) => Err(ImportError::PermissionDenied(format!(
            "shop '{}' belongs to another account",
            shop.name
        ))),
        None => {
            if let Some(owned) = tx.shop_by_owner(user).await? {
                return Err(ImportError::OwnershipConflict(format!(
                    "account {user} already owns shop '{}'",
                    owned.name
                )));
            }
            let shop = tx
                .create_shop(name, user)
                .await
                .map_err(|err| shop_conflict(err, name, user))?;
            Ok((shop, true))
        }
    }
}

/// A concurrent import may claim the name or the owner between the checks
/// above and the insert; the unique constraints then decide.
fn shop_conflict(err: StoreError, name: &str, user: UserId) -> ImportError {
    match err {
        StoreError::Unique(constraint) if constraint == SHOP_OWNER_UNIQUE => {
            ImportError::OwnershipConflict(format!("account {user} already owns a shop"))
        }
        StoreError::Unique(constraint) if constraint == SHOP_NAME_UNIQUE => {
            ImportError::PermissionDenied(format!("shop '{name}' belongs to another account"))
        }
        other => other.into(),
    }
}

/// Runs `ImportPriceList` jobs.
pub struct ImportJobHandler {
    importer: PriceListImporter,
    accounts: Arc<dyn AccountDirectory>,
    timeout: Duration,
}

impl ImportJobHandler {
    pub fn new(importer: PriceListImporter, accounts: Arc<dyn AccountDirectory>) -> Self {
        Self {
            importer,
            accounts,
            timeout: DEFAULT_IMPORT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl JobHandler for ImportJobHandler {
    async fn handle(&self, job: &Job) -> JobResult {
        let JobPayload::ImportPriceList { source, user_id } = &job.payload else {
            return JobResult::Fatal(format!("unexpected payload for {}", job.kind().as_str()));
        };

        match self.accounts.get(*user_id).await {
            Ok(Some(account)) if account.account_type == AccountType::Shop => {}
            Ok(_) => {
                return JobResult::Fatal(
                    ImportError::PermissionDenied(format!("account {user_id} is not a shop"))
                        .to_string(),
                );
            }
            Err(e) => return JobResult::Failure(e.to_string()),
        }

        match self.importer.import(source, *user_id).await {
            Ok(summary) => match serde_json::to_value(&summary) {
                Ok(output) => JobResult::Success(Some(output)),
                Err(e) => JobResult::Fatal(format!("summary serialization failed: {e}")),
            },
            Err(err) if err.is_transient() => {
                warn!(job_id = %job.id, error = %err, "import failed, will retry");
                JobResult::Failure(err.to_string())
            }
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "import rejected");
                JobResult::Fatal(err.to_string())
            }
        }
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }
}
