//! OpLog entity - audit trail of user operations
//!
//! Table: md_op_log

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Operation type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    Login,
    Logout,
    Create,
    Update,
    Delete,
    Import,
    Export,
    Generate,
    Complete,
    Reset,
    Redeploy,
    RunJob,
}

impl OpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Login => "login",
            OpType::Logout => "logout",
            OpType::Create => "create",
            OpType::Update => "update",
            OpType::Delete => "delete",
            OpType::Import => "import",
            OpType::Export => "export",
            OpType::Generate => "generate",
            OpType::Complete => "complete",
            OpType::Reset => "reset",
            OpType::Redeploy => "redeploy",
            OpType::RunJob => "run_job",
        }
    }
}

/// Operation result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpResult {
    Success,
    Failed,
}

impl OpResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpResult::Success => "success",
            OpResult::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_op_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Unix timestamp
    pub op_time: i64,

    #[sea_orm(column_type = "String(Some(150))")]
    pub username: String,

    #[sea_orm(column_type = "String(Some(32))")]
    pub op_type: String,

    #[sea_orm(column_type = "Text")]
    pub op_desc: String,

    #[sea_orm(column_type = "String(Some(16))")]
    pub result: String,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub ip: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
