use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use bazaar_auth::AccountDirectory;
use bazaar_infra::jobs::{
    InMemoryJobStore, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobKind, JobQueue,
};
use bazaar_infra::notifications::{
    LogMailer, MailError, Mailer, NotifyJobHandler, OrderNotifier, SmtpMailer,
};
use bazaar_infra::store::{CatalogStore, ContactStore, InMemoryStore, OrderStore, StoreError};
use bazaar_infra::{
    CatalogQueryService, ContactBook, ImportJobHandler, OrderEngine, PriceListImporter,
    ShopService,
};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("store initialisation failed: {0}")]
    Store(#[from] StoreError),

    #[error("mailer initialisation failed: {0}")]
    Mail(#[from] MailError),
}

/// Everything a request handler may touch.
pub struct AppServices {
    pub catalog: CatalogQueryService,
    pub orders: OrderEngine,
    pub shops: ShopService,
    pub contacts: ContactBook,
    pub jobs: JobQueue,
    pub accounts: Arc<dyn AccountDirectory>,
    /// Dropping the services stops the executor loop.
    pub executor: JobExecutorHandle,
}

/// One backend seen through each persistence seam.
struct Backends {
    catalog: Arc<dyn CatalogStore>,
    orders: Arc<dyn OrderStore>,
    contacts: Arc<dyn ContactStore>,
    accounts: Arc<dyn AccountDirectory>,
}

impl Backends {
    fn from_store<S>(store: S) -> Self
    where
        S: CatalogStore + OrderStore + ContactStore + AccountDirectory + 'static,
    {
        let store = Arc::new(store);
        Self {
            catalog: store.clone(),
            orders: store.clone(),
            contacts: store.clone(),
            accounts: store,
        }
    }
}

async fn backends(config: &AppConfig) -> Result<Backends, ServiceError> {
    let Some(url) = config.database_url.as_deref() else {
        info!("using in-memory stores");
        return Ok(Backends::from_store(InMemoryStore::new()));
    };

    #[cfg(feature = "postgres")]
    {
        let store =
            bazaar_infra::store::PostgresStore::connect(url, config.database_max_connections)
                .await?;
        info!("using postgres stores");
        Ok(Backends::from_store(store))
    }
    #[cfg(not(feature = "postgres"))]
    {
        let _ = url;
        warn!("DATABASE_URL set but postgres feature not enabled, falling back to in-memory");
        Ok(Backends::from_store(InMemoryStore::new()))
    }
}

fn mailer(config: &AppConfig) -> Result<Arc<dyn Mailer>, ServiceError> {
    match &config.smtp {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "using SMTP mailer");
            Ok(Arc::new(SmtpMailer::new(smtp)?))
        }
        None => {
            warn!("SMTP not configured; order notifications are only logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

/// Wire stores, services and the job executor. Must run inside a tokio runtime.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, ServiceError> {
    let backends = backends(config).await?;
    let mailer = mailer(config)?;
    let jobs = JobQueue::new(InMemoryJobStore::arc());

    let mut executor = JobExecutor::new(&jobs);
    executor.register_handler(
        JobKind::ImportPriceList,
        Arc::new(
            ImportJobHandler::new(
                PriceListImporter::new(backends.catalog.clone()),
                backends.accounts.clone(),
            )
            .with_timeout(config.import_timeout),
        ),
    );
    executor.register_handler(
        JobKind::NotifyOrderPlaced,
        Arc::new(NotifyJobHandler::new(OrderNotifier::new(
            backends.orders.clone(),
            backends.catalog.clone(),
            backends.accounts.clone(),
            mailer,
        ))),
    );
    let executor = executor.spawn(
        JobExecutorConfig::default()
            .with_name("bazaar-jobs")
            .with_max_concurrent(config.job_workers)
            .with_poll_interval(config.job_poll_interval),
    );

    Ok(AppServices {
        catalog: CatalogQueryService::new(backends.catalog.clone()),
        orders: OrderEngine::new(
            backends.catalog.clone(),
            backends.orders.clone(),
            backends.contacts.clone(),
            jobs.clone(),
        ),
        shops: ShopService::new(backends.catalog.clone()),
        contacts: ContactBook::new(backends.contacts),
        jobs,
        accounts: backends.accounts,
        executor,
    })
}
