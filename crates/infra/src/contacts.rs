//! Buyer contact book.

use std::sync::Arc;

use tracing::instrument;

use bazaar_core::{ContactId, DomainError, DomainResult, UserId};
use bazaar_orders::{Contact, ContactDraft, ContactPatch};

use crate::store::ContactStore;

#[derive(Clone)]
pub struct ContactBook {
    contacts: Arc<dyn ContactStore>,
}

impl ContactBook {
    pub fn new(contacts: Arc<dyn ContactStore>) -> Self {
        Self { contacts }
    }

    pub async fn list(&self, user: UserId) -> DomainResult<Vec<Contact>> {
        Ok(self.contacts.contacts(user).await?)
    }

    #[instrument(skip(self, draft), fields(user = %user), err)]
    pub async fn create(&self, user: UserId, draft: ContactDraft) -> DomainResult<Contact> {
        let contact = draft.validate()?;
        Ok(self.contacts.insert_contact(user, contact).await?)
    }

    /// Partial update of one of the user's own contacts.
    #[instrument(skip(self, patch), fields(user = %user, contact_id = %id), err)]
    pub async fn update(
        &self,
        user: UserId,
        id: ContactId,
        patch: ContactPatch,
    ) -> DomainResult<Contact> {
        if patch.is_empty() {
            return Err(DomainError::invalid_arguments("no fields to update"));
        }
        patch.validate()?;
        self.contacts
            .update_contact(user, id, &patch)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("contact {id}")))
    }

    /// Deletes the user's contacts among `ids`; returns how many went.
    pub async fn delete(&self, user: UserId, ids: &[ContactId]) -> DomainResult<u64> {
        if ids.is_empty() {
            return Err(DomainError::invalid_arguments("items: is required"));
        }
        Ok(self.contacts.delete_contacts(user, ids).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn draft() -> ContactDraft {
        ContactDraft {
            city: Some("Springfield".into()),
            street: Some("Main".into()),
            house: Some("12".into()),
            phone: Some("+1 555 0100".into()),
            ..ContactDraft::default()
        }
    }

    #[tokio::test]
    async fn create_requires_address_and_phone() {
        let book = ContactBook::new(Arc::new(InMemoryStore::new()));
        let err = book
            .create(
                UserId::new(1),
                ContactDraft {
                    phone: None,
                    ..draft()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(&err, DomainError::InvalidArguments(msg) if msg.contains("phone")));

        let contact = book.create(UserId::new(1), draft()).await.unwrap();
        assert_eq!(book.list(UserId::new(1)).await.unwrap(), vec![contact]);
    }

    #[tokio::test]
    async fn update_and_delete_are_owner_scoped() {
        let book = ContactBook::new(Arc::new(InMemoryStore::new()));
        let contact = book.create(UserId::new(1), draft()).await.unwrap();
        let patch = ContactPatch {
            apartment: Some("4B".into()),
            ..ContactPatch::default()
        };

        let foreign = book
            .update(UserId::new(2), contact.id, patch.clone())
            .await
            .unwrap_err();
        assert!(matches!(foreign, DomainError::NotFound(_)));

        let updated = book.update(UserId::new(1), contact.id, patch).await.unwrap();
        assert_eq!(updated.apartment, "4B");
        assert_eq!(updated.city, "Springfield");

        assert_eq!(book.delete(UserId::new(2), &[contact.id]).await.unwrap(), 0);
        assert_eq!(book.delete(UserId::new(1), &[contact.id]).await.unwrap(), 1);
        assert!(book.list(UserId::new(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_patch_is_rejected() {
        let book = ContactBook::new(Arc::new(InMemoryStore::new()));
        let contact = book.create(UserId::new(1), draft()).await.unwrap();
        let err = book
            .update(UserId::new(1), contact.id, ContactPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArguments(_)));
    }
}
