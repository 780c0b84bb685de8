//! Container manager (Portainer) settings used by the redeploy webhook.
//! Single row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_portainer_config")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(255))")]
    pub portainer_url: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub stack_name: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub portainer_user: String,

    #[sea_orm(column_type = "String(Some(255))")]
    #[serde(skip_serializing)]
    pub portainer_password: String,

    #[sea_orm(column_type = "String(Some(255))")]
    #[serde(skip_serializing)]
    pub webhook_secret: String,

    pub endpoint_id: i64,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_complete(&self) -> bool {
        !self.portainer_url.is_empty() && !self.stack_name.is_empty()
    }
}
