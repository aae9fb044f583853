use serde::{Deserialize, Serialize};

use bazaar_core::{ContactId, DomainResult, UserId};

use crate::FieldErrors;

const CITY_MAX: usize = 50;
const STREET_MAX: usize = 100;
const PART_MAX: usize = 15;
const PHONE_MAX: usize = 20;

/// A buyer's delivery record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub user_id: UserId,
    pub city: String,
    pub street: String,
    pub house: String,
    pub structure: String,
    pub building: String,
    pub apartment: String,
    pub phone: String,
}

/// Validated contact ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub city: String,
    pub street: String,
    pub house: String,
    pub structure: String,
    pub building: String,
    pub apartment: String,
    pub phone: String,
}

impl NewContact {
    pub fn into_contact(self, id: ContactId, user_id: UserId) -> Contact {
        Contact {
            id,
            user_id,
            city: self.city,
            street: self.street,
            house: self.house,
            structure: self.structure,
            building: self.building,
            apartment: self.apartment,
            phone: self.phone,
        }
    }
}

/// Raw create request. `city`, `street`, `house` and `phone` are required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactDraft {
    pub city: Option<String>,
    pub street: Option<String>,
    pub house: Option<String>,
    pub structure: Option<String>,
    pub building: Option<String>,
    pub apartment: Option<String>,
    pub phone: Option<String>,
}

impl ContactDraft {
    pub fn validate(self) -> DomainResult<NewContact> {
        let mut errors = FieldErrors::new();
        errors.require_text("city", self.city.as_deref(), CITY_MAX);
        errors.require_text("street", self.street.as_deref(), STREET_MAX);
        errors.require_text("house", self.house.as_deref(), PART_MAX);
        errors.require_text("phone", self.phone.as_deref(), PHONE_MAX);
        for (field, value) in [
            ("structure", &self.structure),
            ("building", &self.building),
            ("apartment", &self.apartment),
        ] {
            if let Some(v) = value {
                errors.limit_text(field, v.trim(), PART_MAX);
            }
        }
        errors.into_result()?;

        let text = |v: Option<String>| v.map(|s| s.trim().to_string()).unwrap_or_default();
        Ok(NewContact {
            city: text(self.city),
            street: text(self.street),
            house: text(self.house),
            structure: text(self.structure),
            building: text(self.building),
            apartment: text(self.apartment),
            phone: text(self.phone),
        })
    }
}

/// Partial update. Absent fields are left alone; required fields cannot be blanked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactPatch {
    pub city: Option<String>,
    pub street: Option<String>,
    pub house: Option<String>,
    pub structure: Option<String>,
    pub building: Option<String>,
    pub apartment: Option<String>,
    pub phone: Option<String>,
}

impl ContactPatch {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = FieldErrors::new();
        for (field, value, max) in [
            ("city", &self.city, CITY_MAX),
            ("street", &self.street, STREET_MAX),
            ("house", &self.house, PART_MAX),
            ("phone", &self.phone, PHONE_MAX),
        ] {
            if value.is_some() {
                errors.require_text(field, value.as_deref(), max);
            }
        }
        for (field, value) in [
            ("structure", &self.structure),
            ("building", &self.building),
            ("apartment", &self.apartment),
        ] {
            if let Some(v) = value {
                errors.limit_text(field, v.trim(), PART_MAX);
            }
        }
        errors.into_result()
    }

    pub fn is_empty(&self) -> bool {
        self.city.is_none()
            && self.street.is_none()
            && self.house.is_none()
            && self.structure.is_none()
            && self.building.is_none()
            && self.apartment.is_none()
            && self.phone.is_none()
    }

    pub fn apply(&self, contact: &mut Contact) {
        let fields = [
            (&self.city, &mut contact.city),
            (&self.street, &mut contact.street),
            (&self.house, &mut contact.house),
            (&self.structure, &mut contact.structure),
            (&self.building, &mut contact.building),
            (&self.apartment, &mut contact.apartment),
            (&self.phone, &mut contact.phone),
        ];
        for (patch, target) in fields {
            if let Some(value) = patch {
                *target = value.trim().to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::DomainError;

    fn draft() -> ContactDraft {
        ContactDraft {
            city: Some("Moscow".into()),
            street: Some(" Tverskaya ".into()),
            house: Some("1".into()),
            phone: Some("+70000000000".into()),
            ..Default::default()
        }
    }

    #[test]
    fn valid_draft_is_trimmed() {
        let contact = draft().validate().unwrap();
        assert_eq!(contact.street, "Tverskaya");
        assert_eq!(contact.apartment, "");
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let err = ContactDraft {
            city: Some("Moscow".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        match err {
            DomainError::InvalidArguments(msg) => {
                assert!(msg.contains("street"));
                assert!(msg.contains("house"));
                assert!(msg.contains("phone"));
                assert!(!msg.contains("city"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn patch_updates_only_given_fields() {
        let mut contact = draft()
            .validate()
            .unwrap()
            .into_contact(ContactId::new(1), UserId::new(2));
        let patch = ContactPatch {
            apartment: Some("12".into()),
            ..Default::default()
        };
        patch.validate().unwrap();
        patch.apply(&mut contact);
        assert_eq!(contact.apartment, "12");
        assert_eq!(contact.city, "Moscow");
    }

    #[test]
    fn patch_cannot_blank_required_field() {
        let patch = ContactPatch {
            phone: Some(" ".into()),
            ..Default::default()
        };
        assert!(matches!(patch.validate(), Err(DomainError::InvalidArguments(_))));
    }
}
