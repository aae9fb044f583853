//! Supplier price-list feed.
//!
//! ```yaml
//! shop: Acme
//! categories:
//!   - {id: 1, name: Tools}
//! goods:
//!   - id: 1
//!     category: 1
//!     name: Hammer
//!     model: H1
//!     price: 500
//!     price_rrc: 700
//!     quantity: 10
//!     parameters: {weight: 1kg}
//! ```
//!
//! Parameter values may be any YAML scalar and are kept as their string form.
//! A parameter name repeated inside one good is a parse error.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::PathBuf;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bazaar_core::{CategoryId, DomainError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("malformed price list: {0}")]
    Parse(String),

    #[error("invalid price list: {0}")]
    Invalid(String),
}

impl From<FeedError> for DomainError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Parse(msg) => DomainError::Parse(msg),
            FeedError::Invalid(msg) => DomainError::InvalidArguments(msg),
        }
    }
}

/// Where an import reads its feed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    /// File on the server's filesystem.
    Path(PathBuf),
    /// The YAML document itself.
    Document(String),
}

impl FeedSource {
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Document(text) => format!("inline document ({} bytes)", text.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceList {
    pub shop: String,
    pub categories: Vec<FeedCategory>,
    pub goods: Vec<FeedGood>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedCategory {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedGood {
    /// Supplier SKU.
    pub id: i64,
    pub category: CategoryId,
    pub name: String,
    #[serde(default)]
    pub model: String,
    pub price: i64,
    pub price_rrc: i64,
    pub quantity: i64,
    /// Declaration order is kept.
    #[serde(default, deserialize_with = "deserialize_parameters")]
    pub parameters: Vec<(String, String)>,
}

impl PriceList {
    /// Parse and validate a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, FeedError> {
        let list: PriceList =
            serde_yaml::from_str(text).map_err(|e| FeedError::Parse(e.to_string()))?;
        list.validate()?;
        Ok(list)
    }

    /// Structural checks that do not need the catalog.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.shop.trim().is_empty() {
            return Err(FeedError::Invalid("shop name is empty".into()));
        }
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(FeedError::Invalid(format!(
                    "category {} has an empty name",
                    category.id
                )));
            }
        }
        for (index, good) in self.goods.iter().enumerate() {
            if good.name.trim().is_empty() {
                return Err(FeedError::Invalid(format!("goods[{index}]: name is empty")));
            }
            for (field, value) in [
                ("price", good.price),
                ("price_rrc", good.price_rrc),
                ("quantity", good.quantity),
            ] {
                if value < 0 {
                    return Err(FeedError::Invalid(format!(
                        "goods[{index}]: {field} must not be negative (got {value})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Category ids referenced by goods but not declared in `categories`.
    pub fn undeclared_categories(&self) -> BTreeSet<CategoryId> {
        let declared: HashSet<CategoryId> = self.categories.iter().map(|c| c.id).collect();
        self.goods
            .iter()
            .map(|g| g.category)
            .filter(|id| !declared.contains(id))
            .collect()
    }
}

fn scalar_text(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}

fn deserialize_parameters<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ParametersVisitor;

    impl<'de> Visitor<'de> for ParametersVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping of parameter names to scalar values")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            while let Some((key, value)) =
                map.next_entry::<serde_yaml::Value, serde_yaml::Value>()?
            {
                let name = scalar_text(key)
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| de::Error::custom("parameter name must be a non-empty scalar"))?;
                let value = scalar_text(value).ok_or_else(|| {
                    de::Error::custom(format!("parameter '{name}' must have a scalar value"))
                })?;
                if !seen.insert(name.clone()) {
                    return Err(de::Error::custom(format!("duplicate parameter '{name}'")));
                }
                out.push((name, value));
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(ParametersVisitor)
}
