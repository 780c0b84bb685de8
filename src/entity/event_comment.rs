use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_event_comment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub event_id: i64,

    pub user_id: i64,

    #[sea_orm(column_type = "Text")]
    pub comment: String,

    /// Internal comments are hidden from viewers without edit rights
    pub is_internal: bool,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
