use core::str::FromStr;

use serde::{Deserialize, Serialize};

use bazaar_core::{DomainError, DomainResult};

/// Order lifecycle.
///
/// `basket → new → confirmed → assembled → sent → delivered`, with `canceled`
/// reachable from any non-terminal state. Transitions only move forward, one
/// step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Basket,
    New,
    Confirmed,
    Assembled,
    Sent,
    Delivered,
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        Self::Basket,
        Self::New,
        Self::Confirmed,
        Self::Assembled,
        Self::Sent,
        Self::Delivered,
        Self::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basket => "basket",
            Self::New => "new",
            Self::Confirmed => "confirmed",
            Self::Assembled => "assembled",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Canceled => "canceled",
        }
    }

    /// Position on the main chain; `None` for `canceled`.
    fn rank(self) -> Option<u8> {
        match self {
            Self::Basket => Some(0),
            Self::New => Some(1),
            Self::Confirmed => Some(2),
            Self::Assembled => Some(3),
            Self::Sent => Some(4),
            Self::Delivered => Some(5),
            Self::Canceled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Canceled)
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Canceled {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to == from + 1,
            _ => false,
        }
    }

    pub fn transition_to(self, next: OrderStatus) -> DomainResult<OrderStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::invalid_transition(format!(
                "order cannot move from '{}' to '{}'",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::invalid_arguments(format!("unknown order status '{s}'")))
    }
}
