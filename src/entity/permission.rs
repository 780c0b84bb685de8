//! Permission entity - catalogue of permission codenames

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_permission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// e.g. "equipment.view"
    #[sea_orm(column_type = "String(Some(100))", unique)]
    pub codename: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Functional area, e.g. "equipment"
    #[sea_orm(column_type = "String(Some(50))")]
    pub module: String,

    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
