//! Maintenance activity type - the catalogue of recurring kinds of work

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_activity_type")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(100))", unique)]
    pub name: String,

    /// Equipment category this type applies to
    pub category_id: Option<i64>,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub estimated_duration_hours: i32,

    pub frequency_days: i32,

    pub is_mandatory: bool,

    #[sea_orm(column_type = "Text")]
    pub checklist_template: String,

    #[sea_orm(column_type = "Text")]
    pub tools_required: String,

    #[sea_orm(column_type = "Text")]
    pub parts_required: String,

    #[sea_orm(column_type = "Text")]
    pub safety_notes: String,

    pub is_active: bool,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
