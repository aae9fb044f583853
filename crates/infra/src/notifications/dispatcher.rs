use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use bazaar_auth::AccountDirectory;
use bazaar_core::{DomainError, DomainResult, OrderId, UserId};
use bazaar_orders::OrderLine;

use super::{Email, Mailer};
use crate::jobs::{Job, JobHandler, JobPayload, JobResult};
use crate::store::{CatalogStore, OrderStore};

/// Outcome of one notification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyReport {
    pub sent: usize,
    /// Recipients without a known email address.
    pub skipped: usize,
    pub failed: Vec<String>,
}

/// Builds and sends the messages for a placed order.
#[derive(Clone)]
pub struct OrderNotifier {
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn CatalogStore>,
    accounts: Arc<dyn AccountDirectory>,
    mailer: Arc<dyn Mailer>,
}

impl OrderNotifier {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn CatalogStore>,
        accounts: Arc<dyn AccountDirectory>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            orders,
            catalog,
            accounts,
            mailer,
        }
    }

    /// One message to the buyer, one to each distinct shop-owner address.
    /// Failed recipients are reported, not returned as an error.
    pub async fn notify(&self, buyer: UserId, order: OrderId) -> DomainResult<NotifyReport> {
        let detail = self
            .orders
            .order_detail(order)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("order {order}")))?;
        detail.order.ensure_owned_by(buyer)?;

        let mut outbox = Vec::new();
        let mut report = NotifyReport::default();

        match self.accounts.get(buyer).await? {
            Some(account) => outbox.push(Email {
                to: account.email,
                subject: format!("Order {order} placed"),
                body: render(&format!("Your order {order} has been placed."), &detail.items),
            }),
            None => {
                warn!(order_id = %order, buyer = %buyer, "buyer has no known email address");
                report.skipped += 1;
            }
        }

        let mut seen = BTreeSet::new();
        for shop_id in detail.shop_ids() {
            let Some(shop) = self.catalog.shop(shop_id).await? else {
                continue;
            };
            let Some(owner) = self.accounts.get(shop.owner).await? else {
                warn!(order_id = %order, shop_id = %shop_id, "shop owner has no known email address");
                report.skipped += 1;
                continue;
            };
            if !seen.insert(owner.email.clone()) {
                continue;
            }
            let lines: Vec<OrderLine> = detail
                .items
                .iter()
                .filter(|line| line.shop_id == shop_id)
                .cloned()
                .collect();
            outbox.push(Email {
                to: owner.email,
                subject: format!("New order {order}"),
                body: render(&format!("Order {order} contains items from {}.", shop.name), &lines),
            });
        }

        for email in &outbox {
            match self.mailer.send(email).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!(order_id = %order, to = %email.to, error = %e, "notification delivery failed");
                    report.failed.push(email.to.clone());
                }
            }
        }
        info!(order_id = %order, sent = report.sent, failed = report.failed.len(), "order notifications dispatched");
        Ok(report)
    }
}

fn render(headline: &str, lines: &[OrderLine]) -> String {
    let mut body = format!("{headline}\n\n");
    for line in lines {
        body.push_str(&format!(
            "- {} {} x{} @ {} = {}\n",
            line.product_name,
            line.model,
            line.quantity,
            line.price_rrc,
            line.line_total()
        ));
    }
    let total = lines
        .iter()
        .fold(0i64, |acc, line| acc.saturating_add(line.line_total()));
    body.push_str(&format!("\nTotal: {total}\n"));
    body
}

/// Runs `NotifyOrderPlaced` jobs. Any failed recipient fails the run so the
/// job is retried; recipients already served may get the message again.
pub struct NotifyJobHandler {
    notifier: OrderNotifier,
}

impl NotifyJobHandler {
    pub fn new(notifier: OrderNotifier) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl JobHandler for NotifyJobHandler {
    async fn handle(&self, job: &Job) -> JobResult {
        let JobPayload::NotifyOrderPlaced { buyer_id, order_id } = &job.payload else {
            return JobResult::Fatal(format!("unexpected payload for {}", job.kind().as_str()));
        };
        match self.notifier.notify(*buyer_id, *order_id).await {
            Ok(report) if report.failed.is_empty() => {
                JobResult::Success(serde_json::to_value(&report).ok())
            }
            Ok(report) => JobResult::Failure(format!(
                "delivery failed for {}",
                report.failed.join(", ")
            )),
            Err(e) if e.is_transient() => JobResult::Failure(e.to_string()),
            Err(e) => JobResult::Fatal(e.to_string()),
        }
    }
}
