//! `bazaar-auth`: authentication/authorization boundary.
//!
//! Decoupled from HTTP and storage: token validation, the account model and
//! the account-type guard live here; directory backends live in `bazaar-infra`.

pub mod account;
pub mod authorize;
pub mod claims;
pub mod jwt;

pub use account::{Account, AccountDirectory, AccountType};
pub use authorize::{AuthzError, Principal, require_account_type, require_shop};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
