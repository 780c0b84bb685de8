//! Equipment entity
//!
//! Table: md_equipment

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Operational status of a piece of equipment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Active,
    Inactive,
    Maintenance,
    Retired,
}

impl EquipmentStatus {
    pub const ALL: [EquipmentStatus; 4] = [
        EquipmentStatus::Active,
        EquipmentStatus::Inactive,
        EquipmentStatus::Maintenance,
        EquipmentStatus::Retired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Active => "active",
            EquipmentStatus::Inactive => "inactive",
            EquipmentStatus::Maintenance => "maintenance",
            EquipmentStatus::Retired => "retired",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EquipmentStatus::Active => "Active",
            EquipmentStatus::Inactive => "Inactive",
            EquipmentStatus::Maintenance => "Under Maintenance",
            EquipmentStatus::Retired => "Retired",
        }
    }

    /// Accepts the stored value or the display name, case-insensitive
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|s| {
            s.as_str().eq_ignore_ascii_case(value) || s.display_name().eq_ignore_ascii_case(value)
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_equipment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(200))", unique)]
    pub name: String,

    pub category_id: Option<i64>,

    #[sea_orm(column_type = "String(Some(100))", unique)]
    pub manufacturer_serial: String,

    #[sea_orm(column_type = "String(Some(100))", unique)]
    pub asset_tag: String,

    pub location_id: Option<i64>,

    /// See [`EquipmentStatus`]
    #[sea_orm(column_type = "String(Some(20))")]
    pub status: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub manufacturer: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub model_number: String,

    #[sea_orm(column_type = "Text")]
    pub power_ratings: String,

    #[sea_orm(column_type = "Text")]
    pub trip_setpoints: String,

    #[sea_orm(column_type = "Text")]
    pub installed_upgrades: String,

    #[sea_orm(column_type = "Text")]
    pub warranty_details: String,

    pub dga_due_date: Option<Date>,

    pub next_maintenance_date: Option<Date>,

    pub commissioning_date: Option<Date>,

    pub warranty_expiry_date: Option<Date>,

    pub is_active: bool,

    pub created_by: Option<i64>,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn status(&self) -> EquipmentStatus {
        EquipmentStatus::parse(&self.status).unwrap_or(EquipmentStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(EquipmentStatus::parse("ACTIVE"), Some(EquipmentStatus::Active));
        assert_eq!(
            EquipmentStatus::parse("Under Maintenance"),
            Some(EquipmentStatus::Maintenance)
        );
        assert_eq!(EquipmentStatus::parse("broken"), None);
    }
}
