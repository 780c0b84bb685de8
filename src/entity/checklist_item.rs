//! Checklist item attached to a maintenance activity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_checklist_item")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub activity_id: i64,

    #[sea_orm(column_type = "Text")]
    pub item_text: String,

    /// Unique per activity
    pub sort_order: i32,

    pub is_required: bool,

    pub is_completed: bool,

    pub completed_by: Option<i64>,

    pub completed_at: Option<i64>,

    #[sea_orm(column_type = "Text")]
    pub notes: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
