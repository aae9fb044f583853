//! Strongly-typed identifiers used across the domain.
//!
//! Rows are keyed by store-assigned `i64` sequences. Category ids are the one
//! exception: they are chosen by suppliers in their price-list feeds.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

macro_rules! impl_i64_newtype {
    ($t:ident, $name:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $t(i64);

        impl $t {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| DomainError::invalid_arguments(format!("{}: {}", $name, e)))?;
                Ok(Self(value))
            }
        }
    };
}

impl_i64_newtype!(UserId, "UserId", "Identifier of an account (buyer or shop owner).");
impl_i64_newtype!(ShopId, "ShopId", "Identifier of a supplier shop.");
impl_i64_newtype!(CategoryId, "CategoryId", "External category id, as declared in feeds.");
impl_i64_newtype!(ProductId, "ProductId", "Identifier of a catalog-wide product.");
impl_i64_newtype!(ListingId, "ListingId", "Identifier of a shop's listing of a product.");
impl_i64_newtype!(ParameterId, "ParameterId", "Identifier of a named listing attribute.");
impl_i64_newtype!(OrderId, "OrderId", "Identifier of an order (baskets included).");
impl_i64_newtype!(OrderItemId, "OrderItemId", "Identifier of an order line.");
impl_i64_newtype!(ContactId, "ContactId", "Identifier of a buyer's delivery contact.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trimmed_integers() {
        let id: ListingId = " 42 ".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn rejects_non_numeric_ids_with_type_name() {
        let err = "abc".parse::<OrderId>().unwrap_err();
        match err {
            DomainError::InvalidArguments(msg) => assert!(msg.starts_with("OrderId")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&ShopId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: ShopId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ShopId::new(7));
    }
}
