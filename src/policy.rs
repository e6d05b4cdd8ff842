use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Bartender,
    #[default]
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Bartender => "bartender",
            Role::Guest => "guest",
        }
    }

    /// Unrecognised role names resolve to the least privileged role.
    pub fn parse_or_guest(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            "bartender" => Role::Bartender,
            _ => Role::Guest,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    AdjustStock,
    EditProduct,
    DeleteProduct,
    ManageProviders,
    ManageUsers,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Read => "read inventory",
            Capability::AdjustStock => "adjust stock",
            Capability::EditProduct => "edit products",
            Capability::DeleteProduct => "delete products",
            Capability::ManageProviders => "manage providers",
            Capability::ManageUsers => "manage users",
        }
    }
}

/// What a role may do.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
    pub read: bool,
    pub adjust_stock: bool,
    pub edit_product: bool,
    pub delete_product: bool,
    pub manage_providers: bool,
    pub manage_users: bool,
}

impl CapabilitySet {
    pub fn allows(&self, cap: Capability) -> bool {
        match cap {
            Capability::Read => self.read,
            Capability::AdjustStock => self.adjust_stock,
            Capability::EditProduct => self.edit_product,
            Capability::DeleteProduct => self.delete_product,
            Capability::ManageProviders => self.manage_providers,
            Capability::ManageUsers => self.manage_users,
        }
    }
}

pub fn capabilities_for(role: Role) -> CapabilitySet {
    match role {
        Role::Admin => CapabilitySet {
            read: true,
            adjust_stock: true,
            edit_product: true,
            delete_product: true,
            manage_providers: true,
            manage_users: true,
        },
        Role::Manager => CapabilitySet {
            read: true,
            adjust_stock: true,
            edit_product: true,
            delete_product: true,
            manage_providers: true,
            manage_users: false,
        },
        Role::Bartender => CapabilitySet {
            read: true,
            adjust_stock: true,
            edit_product: true,
            delete_product: false,
            manage_providers: false,
            manage_users: false,
        },
        Role::Guest => CapabilitySet {
            read: true,
            adjust_stock: false,
            edit_product: false,
            delete_product: false,
            manage_providers: false,
            manage_users: false,
        },
    }
}

/// The signed-in identity performing an operation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Actor {
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
        }
    }

    pub fn can(&self, cap: Capability) -> bool {
        capabilities_for(self.role).allows(cap)
    }
}

pub fn ensure_capability(actor: &Actor, cap: Capability) -> Result<()> {
    if actor.can(cap) {
        return Ok(());
    }
    tracing::warn!(actor = %actor.email, role = actor.role.as_str(), capability = cap.as_str(), "capability denied");
    Err(InventoryError::PermissionDenied {
        role: actor.role.as_str().to_string(),
        action: cap.as_str().to_string(),
    })
}
