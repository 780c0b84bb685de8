//! Role entity
//!
//! Role metadata lives here; the permissions a role grants are casbin
//! policy lines keyed by `role:<name>`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_role")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(50))", unique)]
    pub name: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub display_name: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub is_active: bool,

    /// System roles cannot be deleted
    pub is_system_role: bool,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
