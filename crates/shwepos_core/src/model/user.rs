//! Staff accounts, roles and what each role may do.
//!
//! # Invariants
//! - `username` is unique (case-insensitive).
//! - Password material never appears on `User`; storage keeps a salted digest.

use super::{require_text, ModelValidationError, RecordId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Cashier,
}

/// Guarded actions across the POS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Sell,
    ViewTransactions,
    ProcessReturns,
    ManageInventory,
    ManageCustomers,
    ManageSuppliers,
    ManageUsers,
    ManageSettings,
    ViewReports,
}

/// Top-level screens of the shop front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Pos,
    Inventory,
    Customers,
    Transactions,
    Reports,
    Finance,
    Suppliers,
    Settings,
}

impl Tab {
    /// Tabs in display order.
    pub const ALL: [Tab; 8] = [
        Tab::Pos,
        Tab::Inventory,
        Tab::Customers,
        Tab::Transactions,
        Tab::Reports,
        Tab::Finance,
        Tab::Suppliers,
        Tab::Settings,
    ];

    /// Permission needed to open this tab.
    pub fn required_permission(self) -> Permission {
        match self {
            Tab::Pos => Permission::Sell,
            Tab::Inventory => Permission::ManageInventory,
            Tab::Customers => Permission::ManageCustomers,
            Tab::Transactions => Permission::ViewTransactions,
            Tab::Reports | Tab::Finance => Permission::ViewReports,
            Tab::Suppliers => Permission::ManageSuppliers,
            Tab::Settings => Permission::ManageSettings,
        }
    }
}

impl Role {
    pub fn permits(self, permission: Permission) -> bool {
        match self {
            Role::Admin => true,
            Role::Cashier => matches!(
                permission,
                Permission::Sell | Permission::ViewTransactions | Permission::ProcessReturns
            ),
        }
    }

    /// Tabs this role may open, in display order.
    pub fn visible_tabs(self) -> Vec<Tab> {
        Tab::ALL
            .into_iter()
            .filter(|tab| self.permits(tab.required_permission()))
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Cashier => "cashier",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "cashier" => Some(Role::Cashier),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub username: String,
    pub role: Role,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("username", &self.username)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::{Permission, Role, Tab};

    #[test]
    fn cashier_sees_pos_and_transactions_only() {
        assert_eq!(
            Role::Cashier.visible_tabs(),
            vec![Tab::Pos, Tab::Transactions]
        );
        assert!(Role::Cashier.permits(Permission::ProcessReturns));
        assert!(!Role::Cashier.permits(Permission::ManageInventory));
    }

    #[test]
    fn admin_sees_every_tab() {
        assert_eq!(Role::Admin.visible_tabs(), Tab::ALL.to_vec());
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(Role::parse(" Admin "), Some(Role::Admin));
        assert_eq!(Role::parse("CASHIER"), Some(Role::Cashier));
        assert_eq!(Role::parse("owner"), None);
    }
}
