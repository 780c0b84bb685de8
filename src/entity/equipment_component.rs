//! Equipment component - parts installed in a piece of equipment

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_equipment_component")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub equipment_id: i64,

    /// Unique per equipment
    #[sea_orm(column_type = "String(Some(200))")]
    pub name: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub part_number: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub serial_number: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub quantity: i32,

    pub is_critical: bool,

    pub replacement_date: Option<Date>,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
