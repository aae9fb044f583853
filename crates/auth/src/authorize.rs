use thiserror::Error;

use bazaar_core::{DomainError, UserId};

use crate::{Account, AccountType};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub account_type: AccountType,
}

impl From<Account> for Principal {
    fn from(account: Account) -> Self {
        Self {
            user_id: account.id,
            email: account.email,
            account_type: account.account_type,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("operation requires a {required} account (caller is {actual})")]
    WrongAccountType {
        required: AccountType,
        actual: AccountType,
    },
}

impl From<AuthzError> for DomainError {
    fn from(err: AuthzError) -> Self {
        DomainError::permission_denied(err.to_string())
    }
}

/// Pure policy check: no IO, no panics.
pub fn require_account_type(principal: &Principal, required: AccountType) -> Result<(), AuthzError> {
    if principal.account_type == required {
        Ok(())
    } else {
        Err(AuthzError::WrongAccountType {
            required,
            actual: principal.account_type,
        })
    }
}

/// Guard for partner operations (imports, shop state, shop orders).
pub fn require_shop(principal: &Principal) -> Result<(), AuthzError> {
    require_account_type(principal, AccountType::Shop)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(account_type: AccountType) -> Principal {
        Principal {
            user_id: UserId::new(1),
            email: "a@example.com".into(),
            account_type,
        }
    }

    #[test]
    fn shop_guard_allows_shops_only() {
        assert!(require_shop(&principal(AccountType::Shop)).is_ok());
        let err = require_shop(&principal(AccountType::Buyer)).unwrap_err();
        assert_eq!(
            err,
            AuthzError::WrongAccountType {
                required: AccountType::Shop,
                actual: AccountType::Buyer
            }
        );
    }

    #[test]
    fn authz_error_maps_to_permission_denied() {
        let err: DomainError = require_shop(&principal(AccountType::Buyer)).unwrap_err().into();
        assert!(matches!(err, DomainError::PermissionDenied(_)));
    }
}
