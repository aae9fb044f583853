//! Typed basket and checkout requests.
//!
//! Inputs arrive as loosely typed JSON. `AddItems` validates each entry when
//! it is reached and reports the failing index; `UpdateQuantities` and
//! `RemoveItems` are lenient and silently skip malformed entries.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use bazaar_core::{ContactId, DomainError, DomainResult, ListingId, OrderId, OrderItemId};

use crate::FieldErrors;

/// A list sent either inline or as a JSON-encoded string (legacy form posts).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Items<T> {
    List(Vec<T>),
    Encoded(String),
}

impl<T: DeserializeOwned> Items<T> {
    pub fn decode(self) -> DomainResult<Vec<T>> {
        match self {
            Self::List(items) => Ok(items),
            Self::Encoded(text) => serde_json::from_str(&text)
                .map_err(|e| DomainError::parse(format!("items: {e}"))),
        }
    }
}

/// Integer or a string of ASCII digits.
fn loose_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
        _ => None,
    }
}

/// JSON integer only.
fn strict_int(value: &Value) -> Option<i64> {
    value.as_i64()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddItemsRequest {
    pub items: Option<Items<AddItemInput>>,
}

impl AddItemsRequest {
    pub fn into_items(self) -> DomainResult<Vec<AddItemInput>> {
        self.items
            .ok_or_else(|| DomainError::invalid_arguments("items: is required"))?
            .decode()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddItemInput {
    #[serde(alias = "product_info")]
    pub listing: Option<Value>,
    pub quantity: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddItem {
    pub listing: ListingId,
    pub quantity: i64,
}

impl AddItemInput {
    pub fn validate(&self, index: usize) -> DomainResult<AddItem> {
        let mut errors = FieldErrors::new();
        let listing = match self.listing.as_ref() {
            None | Some(Value::Null) => {
                errors.push(format!("items[{index}].listing"), "is required");
                None
            }
            Some(v) => match loose_int(v).filter(|id| *id > 0) {
                Some(id) => Some(ListingId::new(id)),
                None => {
                    errors.push(format!("items[{index}].listing"), "must be a positive integer id");
                    None
                }
            },
        };
        let quantity = match self.quantity.as_ref() {
            None | Some(Value::Null) => {
                errors.push(format!("items[{index}].quantity"), "is required");
                None
            }
            Some(v) => match loose_int(v).filter(|q| *q > 0) {
                Some(q) => Some(q),
                None => {
                    errors.push(format!("items[{index}].quantity"), "must be a positive integer");
                    None
                }
            },
        };
        match (listing, quantity) {
            (Some(listing), Some(quantity)) => Ok(AddItem { listing, quantity }),
            _ => Err(errors.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateItemsRequest {
    pub items: Option<Items<Value>>,
}

impl UpdateItemsRequest {
    pub fn into_items(self) -> DomainResult<Vec<UpdateItemInput>> {
        let raw = self
            .items
            .ok_or_else(|| DomainError::invalid_arguments("items: is required"))?
            .decode()?;
        // Entries that are not objects are kept so they can be skipped like any malformed entry.
        Ok(raw
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap_or_default())
            .collect())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateItemInput {
    pub id: Option<Value>,
    pub quantity: Option<Value>,
}

impl UpdateItemInput {
    /// `Some` only when both fields are JSON integers and positive.
    pub fn well_formed(&self) -> Option<(OrderItemId, i64)> {
        let id = self.id.as_ref().and_then(strict_int).filter(|id| *id > 0)?;
        let quantity = self.quantity.as_ref().and_then(strict_int).filter(|q| *q > 0)?;
        Some((OrderItemId::new(id), quantity))
    }
}

/// Item ids as a JSON array or a comma-separated string (`"1,2,3"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ItemIds {
    List(Vec<Value>),
    Csv(String),
}

impl ItemIds {
    /// Well-formed ids only; anything else is dropped.
    pub fn ids(&self) -> Vec<OrderItemId> {
        let mut ids: Vec<OrderItemId> = match self {
            Self::List(values) => values.iter().filter_map(loose_int).collect::<Vec<_>>(),
            Self::Csv(text) => text
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
                .filter_map(|s| s.parse::<i64>().ok())
                .collect(),
        }
        .into_iter()
        .filter(|id| *id > 0)
        .map(OrderItemId::new)
        .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoveItemsRequest {
    pub items: Option<ItemIds>,
}

impl RemoveItemsRequest {
    pub fn ids(&self) -> DomainResult<Vec<OrderItemId>> {
        self.items
            .as_ref()
            .map(ItemIds::ids)
            .ok_or_else(|| DomainError::invalid_arguments("items: is required"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    pub id: Option<Value>,
    pub contact: Option<Value>,
}

impl CheckoutRequest {
    pub fn validate(&self) -> DomainResult<(OrderId, ContactId)> {
        let mut errors = FieldErrors::new();
        let mut field = |name: &str, value: &Option<Value>| -> Option<i64> {
            match value.as_ref() {
                None | Some(Value::Null) => {
                    errors.push(name, "is required");
                    None
                }
                Some(v) => {
                    let parsed = loose_int(v).filter(|id| *id > 0);
                    if parsed.is_none() {
                        errors.push(name, "must be a positive integer id");
                    }
                    parsed
                }
            }
        };
        let order = field("id", &self.id);
        let contact = field("contact", &self.contact);
        match (order, contact) {
            (Some(order), Some(contact)) => Ok((OrderId::new(order), ContactId::new(contact))),
            _ => Err(errors.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_items_accepts_inline_and_encoded_lists() {
        let inline: AddItemsRequest =
            serde_json::from_value(json!({"items": [{"listing": 3, "quantity": 2}]})).unwrap();
        let items = inline.into_items().unwrap();
        assert_eq!(
            items[0].validate(0).unwrap(),
            AddItem { listing: ListingId::new(3), quantity: 2 }
        );

        let encoded: AddItemsRequest = serde_json::from_value(
            json!({"items": "[{\"product_info\": \"4\", \"quantity\": 1}]"}),
        )
        .unwrap();
        let items = encoded.into_items().unwrap();
        assert_eq!(items[0].validate(0).unwrap().listing, ListingId::new(4));
    }

    #[test]
    fn add_items_reports_failing_index_and_fields() {
        let input = AddItemInput {
            listing: Some(json!(1)),
            quantity: Some(json!(0)),
        };
        match input.validate(2).unwrap_err() {
            DomainError::InvalidArguments(msg) => assert!(msg.contains("items[2].quantity")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn add_items_requires_items() {
        assert!(matches!(
            AddItemsRequest::default().into_items(),
            Err(DomainError::InvalidArguments(_))
        ));
        let bad: AddItemsRequest = serde_json::from_value(json!({"items": "[oops"})).unwrap();
        assert!(matches!(bad.into_items(), Err(DomainError::Parse(_))));
    }

    #[test]
    fn update_entries_must_be_json_integers() {
        let req: UpdateItemsRequest = serde_json::from_value(json!({"items": [
            {"id": 1, "quantity": 5},
            {"id": "2", "quantity": 5},
            {"id": 3, "quantity": 0},
            {"id": 4},
            "garbage"
        ]}))
        .unwrap();
        let well_formed: Vec<_> = req
            .into_items()
            .unwrap()
            .iter()
            .filter_map(UpdateItemInput::well_formed)
            .collect();
        assert_eq!(well_formed, vec![(OrderItemId::new(1), 5)]);
    }

    #[test]
    fn remove_ids_from_csv_skip_non_digits() {
        let ids = ItemIds::Csv("3, 1,x,,-2,3".into()).ids();
        assert_eq!(ids, vec![OrderItemId::new(1), OrderItemId::new(3)]);
        let ids = ItemIds::List(vec![json!(2), json!("5"), json!("a"), json!(1.5)]).ids();
        assert_eq!(ids, vec![OrderItemId::new(2), OrderItemId::new(5)]);
    }

    #[test]
    fn checkout_requires_both_ids() {
        let ok = CheckoutRequest {
            id: Some(json!("7")),
            contact: Some(json!(2)),
        };
        assert_eq!(ok.validate().unwrap(), (OrderId::new(7), ContactId::new(2)));

        match CheckoutRequest::default().validate().unwrap_err() {
            DomainError::InvalidArguments(msg) => {
                assert!(msg.contains("id: is required"));
                assert!(msg.contains("contact: is required"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
