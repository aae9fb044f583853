use bazaar_auth::{AccountType, Principal};
use bazaar_core::UserId;

/// Authenticated caller for a request, inserted by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn account_type(&self) -> AccountType {
        self.principal.account_type
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
