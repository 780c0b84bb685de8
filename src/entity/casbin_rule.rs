//! CasbinRule entity
//!
//! Stores the casbin policy lines that back the RBAC enforcer.
//! Table: md_casbin_rule

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_casbin_rule")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 'p' grants a permission to a role, 'g' puts a user in a role
    #[sea_orm(column_type = "String(Some(10))")]
    pub ptype: String,

    /// p: role subject, g: username
    #[sea_orm(column_type = "String(Some(150))")]
    pub v0: String,

    /// p: permission codename, g: role subject
    #[sea_orm(column_type = "String(Some(150))")]
    pub v1: String,

    /// p: action
    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub v2: Option<String>,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub v3: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Convert to a casbin policy vector
    pub fn to_policy_vec(&self) -> Vec<String> {
        let mut policy = vec![self.v0.clone(), self.v1.clone()];
        for extra in [&self.v2, &self.v3].into_iter().flatten() {
            if !extra.is_empty() {
                policy.push(extra.clone());
            }
        }
        policy
    }
}

pub fn new_policy(sub: &str, obj: &str, act: &str) -> ActiveModel {
    use sea_orm::Set;
    ActiveModel {
        ptype: Set("p".to_string()),
        v0: Set(sub.to_string()),
        v1: Set(obj.to_string()),
        v2: Set(Some(act.to_string())),
        ..Default::default()
    }
}

pub fn new_grouping(user: &str, role: &str) -> ActiveModel {
    use sea_orm::Set;
    ActiveModel {
        ptype: Set("g".to_string()),
        v0: Set(user.to_string()),
        v1: Set(role.to_string()),
        v2: Set(None),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_vec_skips_empty_fields() {
        let rule = Model {
            id: 1,
            ptype: "g".to_string(),
            v0: "alice".to_string(),
            v1: "role:viewer".to_string(),
            v2: Some(String::new()),
            v3: None,
        };
        assert_eq!(rule.to_policy_vec(), vec!["alice", "role:viewer"]);
    }
}
