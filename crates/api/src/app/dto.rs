use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bazaar_catalog::{FeedSource, ListingFilter};
use bazaar_core::{CategoryId, ContactId, DomainError, DomainResult, PageRequest, ShopId};
use bazaar_infra::jobs::{Job, JobId, JobStatus};
use bazaar_orders::{ContactPatch, ItemIds};

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /partner/update`: exactly one of `path` or `document`.
#[derive(Debug, Default, Deserialize)]
pub struct ImportRequest {
    pub path: Option<String>,
    pub document: Option<String>,
}

impl ImportRequest {
    pub fn into_source(self) -> DomainResult<FeedSource> {
        let path = self.path.filter(|p| !p.trim().is_empty());
        let document = self.document.filter(|d| !d.trim().is_empty());
        match (path, document) {
            (Some(path), None) => Ok(FeedSource::Path(PathBuf::from(path.trim()))),
            (None, Some(document)) => Ok(FeedSource::Document(document)),
            (None, None) => Err(DomainError::invalid_arguments(
                "path: one of path or document is required",
            )),
            (Some(_), Some(_)) => Err(DomainError::invalid_arguments(
                "path: send either path or document, not both",
            )),
        }
    }
}

/// Query string of `GET /products`. Values stay raw so bad ones get a field error.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub model: Option<String>,
    pub external_id: Option<String>,
    #[serde(alias = "category")]
    pub category_id: Option<String>,
    #[serde(alias = "shop")]
    pub shop_id: Option<String>,
    pub search: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

impl ListingQuery {
    pub fn into_filter(self) -> DomainResult<(ListingFilter, PageRequest)> {
        let filter = ListingFilter {
            model: self.model,
            external_id: int_param("external_id", self.external_id)?,
            category_id: int_param("category_id", self.category_id)?.map(CategoryId::new),
            shop_id: int_param("shop_id", self.shop_id)?.map(ShopId::new),
            search: self.search,
        };
        Ok((filter, self.page.into_request()?))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PageQuery {
    pub fn into_request(self) -> DomainResult<PageRequest> {
        Ok(PageRequest::new(
            int_param("page", self.page)?,
            int_param("page_size", self.page_size)?,
        ))
    }
}

fn int_param<T: std::str::FromStr>(name: &str, raw: Option<String>) -> DomainResult<Option<T>> {
    match raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| DomainError::invalid_arguments(format!("{name}: must be an integer"))),
    }
}

/// Body of `PUT /user/contact`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateContactRequest {
    pub id: Option<Value>,
    #[serde(flatten)]
    pub patch: ContactPatch,
}

impl UpdateContactRequest {
    pub fn contact_id(&self) -> DomainResult<ContactId> {
        match &self.id {
            None | Some(Value::Null) => Err(DomainError::invalid_arguments("id: is required")),
            Some(value) => value
                .as_i64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
                .filter(|id| *id > 0)
                .map(ContactId::new)
                .ok_or_else(|| DomainError::invalid_arguments("id: must be a positive integer id")),
        }
    }
}

/// Body of `DELETE /user/contact`.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteContactsRequest {
    pub items: Option<ItemIds>,
}

impl DeleteContactsRequest {
    pub fn ids(&self) -> DomainResult<Vec<ContactId>> {
        let items = self
            .items
            .as_ref()
            .ok_or_else(|| DomainError::invalid_arguments("items: is required"))?;
        Ok(items
            .ids()
            .into_iter()
            .map(|id| ContactId::new(id.get()))
            .collect())
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub kind: &'static str,
    pub state: &'static str,
    pub attempt: u32,
    pub max_attempts: u32,
    pub error: Option<String>,
    pub output: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        let error = match &job.status {
            JobStatus::Retrying { error, .. } => Some(error.clone()),
            JobStatus::Failed { reason, .. } => Some(reason.clone()),
            _ => None,
        };
        Self {
            id: job.id,
            kind: job.kind().as_str(),
            state: job.status.label(),
            attempt: job.attempt,
            max_attempts: job.retry_policy.max_attempts,
            error,
            output: job.output.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            scheduled_at: job.scheduled_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn import_request_needs_exactly_one_source() {
        let both = ImportRequest {
            path: Some("/tmp/feed.yaml".into()),
            document: Some("shop: x".into()),
        };
        assert!(matches!(both.into_source(), Err(DomainError::InvalidArguments(_))));
        assert!(ImportRequest::default().into_source().is_err());

        let path = ImportRequest {
            path: Some(" /tmp/feed.yaml ".into()),
            document: Some("  ".into()),
        };
        assert_eq!(
            path.into_source().unwrap(),
            FeedSource::Path(PathBuf::from("/tmp/feed.yaml"))
        );
    }

    #[test]
    fn listing_query_rejects_non_numeric_ids() {
        let query = ListingQuery {
            shop_id: Some("acme".into()),
            ..ListingQuery::default()
        };
        let err = query.into_filter().unwrap_err();
        assert!(matches!(&err, DomainError::InvalidArguments(m) if m.starts_with("shop_id")));

        let query = ListingQuery {
            category_id: Some("3".into()),
            search: Some("hx".into()),
            page: PageQuery {
                page: Some("2".into()),
                page_size: None,
            },
            ..ListingQuery::default()
        };
        let (filter, page) = query.into_filter().unwrap();
        assert_eq!(filter.category_id, Some(CategoryId::new(3)));
        assert_eq!(page, PageRequest::new(Some(2), None));
    }

    #[test]
    fn contact_update_reads_id_and_patch_from_one_body() {
        let req: UpdateContactRequest =
            serde_json::from_value(json!({"id": "7", "apartment": "4B"})).unwrap();
        assert_eq!(req.contact_id().unwrap(), ContactId::new(7));
        assert_eq!(req.patch.apartment.as_deref(), Some("4B"));

        let req: UpdateContactRequest = serde_json::from_value(json!({"city": "x"})).unwrap();
        assert!(req.contact_id().is_err());
    }

    #[test]
    fn contact_delete_accepts_csv_ids() {
        let req: DeleteContactsRequest = serde_json::from_value(json!({"items": "3,1,x"})).unwrap();
        assert_eq!(req.ids().unwrap(), vec![ContactId::new(1), ContactId::new(3)]);
    }
}
