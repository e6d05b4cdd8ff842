use serde::{Deserialize, Serialize};

use crate::policy::Role;

pub const DEFAULT_LOW_STOCK_THRESHOLD: f64 = 5.0;

/// Domain tag written on every history row so the log can share a store
/// with other inventories.
pub const HISTORY_DOMAIN: &str = "bar";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Liquor,
    Wine,
    Beer,
    Whisky,
    Vodka,
    Gin,
    Rum,
    Tequila,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Liquor,
        Category::Wine,
        Category::Beer,
        Category::Whisky,
        Category::Vodka,
        Category::Gin,
        Category::Rum,
        Category::Tequila,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Liquor => "liquor",
            Category::Wine => "wine",
            Category::Beer => "beer",
            Category::Whisky => "whisky",
            Category::Vodka => "vodka",
            Category::Gin => "gin",
            Category::Rum => "rum",
            Category::Tequila => "tequila",
        }
    }

    /// Unknown or legacy values fall back to the default category.
    pub fn parse_or_default(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Bottle,
    Liter,
    Milliliter,
    Unit,
    Box,
    Kilogram,
    Gram,
}

impl Unit {
    pub const ALL: [Unit; 7] = [
        Unit::Bottle,
        Unit::Liter,
        Unit::Milliliter,
        Unit::Unit,
        Unit::Box,
        Unit::Kilogram,
        Unit::Gram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Bottle => "bottle",
            Unit::Liter => "liter",
            Unit::Milliliter => "milliliter",
            Unit::Unit => "unit",
            Unit::Box => "box",
            Unit::Kilogram => "kilogram",
            Unit::Gram => "gram",
        }
    }

    pub fn parse_or_default(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|u| u.as_str() == s)
            .unwrap_or_default()
    }
}

/// Stock band of a product relative to its own threshold.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    Out,
    Low,
    Good,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub category: Category,
    pub stock: f64,
    pub low_stock_threshold: f64,
    pub unit: Unit,
    pub sale_price: f64,
    pub purchase_price: f64,
    pub provider_id: Option<i64>,
    pub barcode: Option<String>,
    pub sku: Option<String>,
    pub upc: Option<String>,
    pub important: bool,
    pub notes: String,
    pub previous_stock: f64,
    pub version: i64,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Product {
    pub fn stock_status(&self) -> StockStatus {
        if self.stock <= 0.0 {
            StockStatus::Out
        } else if self.stock <= self.low_stock_threshold {
            StockStatus::Low
        } else {
            StockStatus::Good
        }
    }

    /// Name as shown in lists: "Brand Name", or just the name.
    pub fn display_name(&self) -> String {
        match self.brand.as_deref().map(str::trim) {
            Some(brand) if !brand.is_empty() => format!("{} {}", brand, self.name),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CreateProduct {
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<Category>,
    pub stock: f64,
    pub low_stock_threshold: Option<f64>,
    pub unit: Option<Unit>,
    pub sale_price: f64,
    pub purchase_price: f64,
    pub provider_id: Option<i64>,
    pub barcode: Option<String>,
    pub sku: Option<String>,
    pub upc: Option<String>,
    pub important: bool,
    pub notes: Option<String>,
}

/// Descriptive fields of a product. Stock is deliberately absent: it only
/// moves through the ledger.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UpdateProduct {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub category: Category,
    pub low_stock_threshold: f64,
    pub unit: Unit,
    pub sale_price: f64,
    pub purchase_price: f64,
    pub provider_id: Option<i64>,
    pub barcode: Option<String>,
    pub sku: Option<String>,
    pub upc: Option<String>,
    pub notes: String,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Edit,
    StockUpdate,
    Delete,
    MarkImportant,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Edit => "edit",
            ActionKind::StockUpdate => "stock_update",
            ActionKind::Delete => "delete",
            ActionKind::MarkImportant => "mark_important",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(ActionKind::Create),
            "edit" => Some(ActionKind::Edit),
            "stock_update" => Some(ActionKind::StockUpdate),
            "delete" => Some(ActionKind::Delete),
            "mark_important" => Some(ActionKind::MarkImportant),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct StockChange {
    pub previous: f64,
    pub new: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub product_name: String,
    pub actor: String,
    pub action: ActionKind,
    pub timestamp: String,
    pub details: String,
    pub previous_stock: Option<f64>,
    pub new_stock: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Provider {
    pub id: i64,
    pub company_name: String,
    pub contact_person: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub notes: String,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SaveProvider {
    #[serde(alias = "empresa")]
    pub company_name: String,
    #[serde(default)]
    pub contact_person: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SaveUser {
    pub email: String,
    pub display_name: String,
    pub role: Role,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
