//! Shared domain enumerations aligned with persisted database enums.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "receipt_status", rename_all = "snake_case")]
pub enum ReceiptStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl ReceiptStatus {
    /// Statuses after which a receipt no longer pins the components it references.
    pub const TERMINAL: [ReceiptStatus; 2] = [ReceiptStatus::Cancelled, ReceiptStatus::Delivered];

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReceiptStatus::Pending => "pending",
            ReceiptStatus::Processing => "processing",
            ReceiptStatus::Shipped => "shipped",
            ReceiptStatus::Delivered => "delivered",
            ReceiptStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiptStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ReceiptStatus::Pending),
            "processing" => Ok(ReceiptStatus::Processing),
            "shipped" => Ok(ReceiptStatus::Shipped),
            "delivered" => Ok(ReceiptStatus::Delivered),
            "cancelled" | "canceled" => Ok(ReceiptStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown receipt status `{other}`"
            ))),
        }
    }
}

/// Roles carried by an actor. Only `Admin` is elevated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" | "user" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::validation(format!("unknown role `{other}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_set_is_cancelled_and_delivered() {
        assert!(ReceiptStatus::Cancelled.is_terminal());
        assert!(ReceiptStatus::Delivered.is_terminal());
        assert!(!ReceiptStatus::Pending.is_terminal());
        assert!(!ReceiptStatus::Processing.is_terminal());
        assert!(!ReceiptStatus::Shipped.is_terminal());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            "Delivered".parse::<ReceiptStatus>().expect("parse"),
            ReceiptStatus::Delivered
        );
        assert_eq!(
            "canceled".parse::<ReceiptStatus>().expect("parse"),
            ReceiptStatus::Cancelled
        );
        assert!("lost".parse::<ReceiptStatus>().is_err());
    }

    #[test]
    fn roles_parse_from_header_values() {
        assert_eq!("ADMIN".parse::<Role>().expect("parse"), Role::Admin);
        assert_eq!(" user ".parse::<Role>().expect("parse"), Role::Customer);
        assert!("staff".parse::<Role>().is_err());
        assert!("root".parse::<Role>().is_err());
    }
}
