use core::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use bazaar_core::{DomainError, DomainResult, UserId};

/// Kind of account. Shops upload price lists and receive orders; buyers order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Buyer,
    Shop,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Shop => "shop",
        }
    }
}

impl core::fmt::Display for AccountType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buyer" => Ok(Self::Buyer),
            "shop" => Ok(Self::Shop),
            other => Err(DomainError::invalid_arguments(format!(
                "unknown account type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub email: String,
    pub account_type: AccountType,
}

/// Identity lookup used by the importer guard and the notification fan-out.
///
/// Accounts are owned by the identity provider; the backend only learns about
/// them from validated tokens (`remember`) and reads them back by id.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn get(&self, id: UserId) -> DomainResult<Option<Account>>;

    /// Insert or refresh an account record.
    async fn remember(&self, account: Account) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_type_parses_case_insensitively() {
        assert_eq!("Shop".parse::<AccountType>().unwrap(), AccountType::Shop);
        assert_eq!(" buyer ".parse::<AccountType>().unwrap(), AccountType::Buyer);
        assert!("admin".parse::<AccountType>().is_err());
    }

    #[test]
    fn account_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&AccountType::Shop).unwrap(), "\"shop\"");
    }
}
