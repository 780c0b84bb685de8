//! Permission module using Casbin
//!
//! Role metadata and the permission catalogue live in their own tables.
//! Grants (`p, role:<name>, <codename>, access`) and assignments
//! (`g, <username>, role:<name>`) are casbin policy lines persisted in
//! `md_casbin_rule`. Only active roles and active permissions are loaded
//! into the enforcer, so deactivating either revokes it immediately.

use casbin::{CoreApi, DefaultModel, Enforcer, MgmtApi};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::entity::{casbin_rule, now_ts, permission, role, user};

/// Permission codenames
pub mod perm {
    pub const ADMIN_FULL_ACCESS: &str = "admin.full_access";

    pub const EQUIPMENT_VIEW: &str = "equipment.view";
    pub const EQUIPMENT_CREATE: &str = "equipment.create";
    pub const EQUIPMENT_EDIT: &str = "equipment.edit";
    pub const EQUIPMENT_DELETE: &str = "equipment.delete";

    pub const MAINTENANCE_VIEW: &str = "maintenance.view";
    pub const MAINTENANCE_CREATE: &str = "maintenance.create";
    pub const MAINTENANCE_EDIT: &str = "maintenance.edit";
    pub const MAINTENANCE_DELETE: &str = "maintenance.delete";
    pub const MAINTENANCE_ASSIGN: &str = "maintenance.assign";
    pub const MAINTENANCE_COMPLETE: &str = "maintenance.complete";
    pub const MAINTENANCE_MANAGE: &str = "maintenance.manage";
    pub const MAINTENANCE_MANAGE_ALL: &str = "maintenance.manage_all";

    pub const USERS_VIEW: &str = "users.view";
    pub const USERS_MANAGE: &str = "users.manage";

    pub const SETTINGS_VIEW: &str = "settings.view";
    pub const SETTINGS_MANAGE: &str = "settings.manage";

    pub const CALENDAR_VIEW: &str = "calendar.view";
    pub const CALENDAR_CREATE: &str = "calendar.create";
    pub const CALENDAR_EDIT: &str = "calendar.edit";
    pub const CALENDAR_DELETE: &str = "calendar.delete";

    pub const REPORTS_VIEW: &str = "reports.view";
    pub const REPORTS_GENERATE: &str = "reports.generate";
}

/// Action constants
pub mod action {
    pub const ACCESS: &str = "access";
}

/// Role name prefix to distinguish roles from usernames
pub const ROLE_PREFIX: &str = "role:";

/// Casbin model used when no model file is configured.
/// A grant of `admin.full_access` matches every object.
pub const DEFAULT_MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && (r.obj == p.obj || p.obj == "admin.full_access") && r.act == p.act
"#;

/// Entry of the built-in permission catalogue
#[derive(Debug, Clone, Copy)]
pub struct PermissionDef {
    pub codename: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub module: &'static str,
}

const fn def(
    codename: &'static str,
    name: &'static str,
    description: &'static str,
    module: &'static str,
) -> PermissionDef {
    PermissionDef {
        codename,
        name,
        description,
        module,
    }
}

pub const DEFAULT_PERMISSIONS: [PermissionDef; 23] = [
    def(perm::ADMIN_FULL_ACCESS, "Full Admin Access", "Complete administrative access to all features", "admin"),
    def(perm::EQUIPMENT_VIEW, "View Equipment", "Can view equipment list and details", "equipment"),
    def(perm::EQUIPMENT_CREATE, "Create Equipment", "Can create new equipment", "equipment"),
    def(perm::EQUIPMENT_EDIT, "Edit Equipment", "Can edit equipment information", "equipment"),
    def(perm::EQUIPMENT_DELETE, "Delete Equipment", "Can delete equipment", "equipment"),
    def(perm::MAINTENANCE_VIEW, "View Maintenance", "Can view maintenance activities", "maintenance"),
    def(perm::MAINTENANCE_CREATE, "Create Maintenance", "Can create maintenance activities", "maintenance"),
    def(perm::MAINTENANCE_EDIT, "Edit Maintenance", "Can edit maintenance activities", "maintenance"),
    def(perm::MAINTENANCE_DELETE, "Delete Maintenance", "Can delete maintenance activities", "maintenance"),
    def(perm::MAINTENANCE_ASSIGN, "Assign Maintenance", "Can assign maintenance activities to users", "maintenance"),
    def(perm::MAINTENANCE_COMPLETE, "Complete Maintenance", "Can mark maintenance activities as complete", "maintenance"),
    def(perm::MAINTENANCE_MANAGE, "Manage Own Maintenance", "Can manage assigned maintenance activities", "maintenance"),
    def(perm::MAINTENANCE_MANAGE_ALL, "Manage All Maintenance", "Can manage all maintenance activities", "maintenance"),
    def(perm::USERS_VIEW, "View Users", "Can view user list and profiles", "users"),
    def(perm::USERS_MANAGE, "Manage Users", "Can create, edit, and manage users", "users"),
    def(perm::SETTINGS_VIEW, "View Settings", "Can view system settings", "settings"),
    def(perm::SETTINGS_MANAGE, "Manage Settings", "Can modify system settings", "settings"),
    def(perm::CALENDAR_VIEW, "View Calendar", "Can view calendar events", "calendar"),
    def(perm::CALENDAR_CREATE, "Create Calendar Events", "Can create calendar events", "calendar"),
    def(perm::CALENDAR_EDIT, "Edit Calendar Events", "Can edit calendar events", "calendar"),
    def(perm::CALENDAR_DELETE, "Delete Calendar Events", "Can delete calendar events", "calendar"),
    def(perm::REPORTS_VIEW, "View Reports", "Can view reports and analytics", "reports"),
    def(perm::REPORTS_GENERATE, "Generate Reports", "Can generate and export reports", "reports"),
];

/// Built-in role and the codenames it is granted
#[derive(Debug, Clone, Copy)]
pub struct RoleDef {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub permissions: &'static [&'static str],
}

pub const SYSTEM_ROLES: [RoleDef; 4] = [
    RoleDef {
        name: "admin",
        display_name: "Administrator",
        description: "Full system access",
        permissions: &[perm::ADMIN_FULL_ACCESS],
    },
    RoleDef {
        name: "manager",
        display_name: "Manager",
        description: "Manages equipment, maintenance schedules and reports",
        permissions: &[
            perm::EQUIPMENT_VIEW,
            perm::EQUIPMENT_CREATE,
            perm::EQUIPMENT_EDIT,
            perm::MAINTENANCE_VIEW,
            perm::MAINTENANCE_CREATE,
            perm::MAINTENANCE_EDIT,
            perm::MAINTENANCE_ASSIGN,
            perm::MAINTENANCE_COMPLETE,
            perm::MAINTENANCE_MANAGE_ALL,
            perm::CALENDAR_VIEW,
            perm::CALENDAR_CREATE,
            perm::CALENDAR_EDIT,
            perm::CALENDAR_DELETE,
            perm::REPORTS_VIEW,
            perm::REPORTS_GENERATE,
            perm::SETTINGS_VIEW,
        ],
    },
    RoleDef {
        name: "technician",
        display_name: "Technician",
        description: "Performs and records maintenance work",
        permissions: &[
            perm::EQUIPMENT_VIEW,
            perm::EQUIPMENT_EDIT,
            perm::MAINTENANCE_VIEW,
            perm::MAINTENANCE_EDIT,
            perm::MAINTENANCE_COMPLETE,
            perm::MAINTENANCE_MANAGE,
            perm::CALENDAR_VIEW,
            perm::CALENDAR_CREATE,
            perm::CALENDAR_EDIT,
            perm::REPORTS_VIEW,
        ],
    },
    RoleDef {
        name: "viewer",
        display_name: "Viewer",
        description: "Read-only access",
        permissions: &[
            perm::EQUIPMENT_VIEW,
            perm::MAINTENANCE_VIEW,
            perm::CALENDAR_VIEW,
            perm::REPORTS_VIEW,
        ],
    },
];

/// Counts reported by the idempotent initializers
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct InitCounts {
    pub created: usize,
    pub updated: usize,
}

/// Permission enforcer wrapper
#[derive(Clone)]
pub struct PermissionEnforcer {
    enforcer: Arc<RwLock<Enforcer>>,
    /// Active permission codenames, refreshed on every policy load
    codenames: Arc<RwLock<Vec<String>>>,
    db: DatabaseConnection,
}

impl PermissionEnforcer {
    /// Create a new permission enforcer. Falls back to the built-in model
    /// when the model file is missing.
    pub async fn new(db: DatabaseConnection, model_path: Option<&Path>) -> anyhow::Result<Self> {
        let model = match model_path {
            Some(path) if path.exists() => {
                DefaultModel::from_file(path.to_string_lossy().as_ref()).await?
            }
            _ => DefaultModel::from_str(DEFAULT_MODEL).await?,
        };
        let enforcer = Enforcer::new(model, ()).await?;

        let perm_enforcer = Self {
            enforcer: Arc::new(RwLock::new(enforcer)),
            codenames: Arc::new(RwLock::new(Vec::new())),
            db,
        };

        perm_enforcer.load_policies().await?;

        Ok(perm_enforcer)
    }

    pub fn role_subject(role: &str) -> String {
        format!("{}{}", ROLE_PREFIX, role)
    }

    fn extract_role_name(prefixed: &str) -> &str {
        prefixed.strip_prefix(ROLE_PREFIX).unwrap_or(prefixed)
    }

    /// Load all policies from database
    pub async fn load_policies(&self) -> anyhow::Result<()> {
        let active_roles: HashSet<String> = role::Entity::find()
            .filter(role::Column::IsActive.eq(true))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|r| Self::role_subject(&r.name))
            .collect();
        let active_perms: Vec<String> = permission::Entity::find()
            .filter(permission::Column::IsActive.eq(true))
            .order_by_asc(permission::Column::Codename)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|p| p.codename)
            .collect();
        let active_perm_set: HashSet<&str> = active_perms.iter().map(String::as_str).collect();

        let rules = casbin_rule::Entity::find().all(&self.db).await?;

        let mut enforcer = self.enforcer.write().await;
        enforcer.clear_policy().await?;

        for rule in rules {
            let policy = rule.to_policy_vec();
            if rule.ptype == "p" {
                if active_roles.contains(&rule.v0) && active_perm_set.contains(rule.v1.as_str()) {
                    let _ = enforcer.add_policy(policy).await;
                }
            } else if rule.ptype == "g" && active_roles.contains(&rule.v1) {
                let _ = enforcer.add_grouping_policy(policy).await;
            }
        }
        drop(enforcer);

        *self.codenames.write().await = active_perms;

        Ok(())
    }

    /// Check a username against a permission codename
    pub async fn check(&self, username: &str, codename: &str) -> bool {
        let enforcer = self.enforcer.read().await;
        enforcer
            .enforce((username, codename, action::ACCESS))
            .unwrap_or(false)
    }

    /// Superusers hold everything; users without a role hold nothing.
    pub async fn has_permission(&self, user: &user::Model, codename: &str) -> bool {
        if user.is_superuser {
            return true;
        }
        if !user.is_active || user.role_id.is_none() {
            return false;
        }
        self.check(&user.username, codename).await
    }

    /// All active codenames the user holds
    pub async fn user_permissions(&self, user: &user::Model) -> Vec<String> {
        let codenames = self.codenames.read().await.clone();
        if user.is_superuser {
            return codenames;
        }
        if !user.is_active || user.role_id.is_none() {
            return Vec::new();
        }
        let enforcer = self.enforcer.read().await;
        codenames
            .into_iter()
            .filter(|c| {
                enforcer
                    .enforce((user.username.as_str(), c.as_str(), action::ACCESS))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Codenames granted to a role, as stored
    pub async fn role_permissions(&self, role: &str) -> anyhow::Result<Vec<String>> {
        let rules = casbin_rule::Entity::find()
            .filter(casbin_rule::Column::Ptype.eq("p"))
            .filter(casbin_rule::Column::V0.eq(Self::role_subject(role)))
            .order_by_asc(casbin_rule::Column::V1)
            .all(&self.db)
            .await?;

        Ok(rules.into_iter().map(|r| r.v1).collect())
    }

    /// Replace the permissions granted to a role
    pub async fn set_role_permissions(&self, role: &str, permissions: &[String]) -> anyhow::Result<()> {
        let subject = Self::role_subject(role);

        casbin_rule::Entity::delete_many()
            .filter(casbin_rule::Column::Ptype.eq("p"))
            .filter(casbin_rule::Column::V0.eq(&subject))
            .exec(&self.db)
            .await?;

        let mut seen = HashSet::new();
        for codename in permissions {
            if seen.insert(codename.as_str()) {
                casbin_rule::new_policy(&subject, codename, action::ACCESS)
                    .insert(&self.db)
                    .await?;
            }
        }

        self.load_policies().await
    }

    /// Move grants and assignments from one role name to another
    pub async fn rename_role(&self, old_name: &str, new_name: &str) -> anyhow::Result<()> {
        if old_name == new_name {
            return Ok(());
        }
        let old_subject = Self::role_subject(old_name);
        let new_subject = Self::role_subject(new_name);

        let rules = casbin_rule::Entity::find()
            .filter(
                casbin_rule::Column::V0
                    .eq(&old_subject)
                    .or(casbin_rule::Column::V1.eq(&old_subject)),
            )
            .all(&self.db)
            .await?;

        for rule in rules {
            let mut active: casbin_rule::ActiveModel = rule.clone().into();
            if rule.v0 == old_subject {
                active.v0 = Set(new_subject.clone());
            }
            if rule.v1 == old_subject {
                active.v1 = Set(new_subject.clone());
            }
            active.update(&self.db).await?;
        }

        self.load_policies().await
    }

    /// Delete every policy line that mentions a role
    pub async fn delete_role_rules(&self, role: &str) -> anyhow::Result<()> {
        let subject = Self::role_subject(role);

        casbin_rule::Entity::delete_many()
            .filter(casbin_rule::Column::Ptype.eq("p"))
            .filter(casbin_rule::Column::V0.eq(&subject))
            .exec(&self.db)
            .await?;

        casbin_rule::Entity::delete_many()
            .filter(casbin_rule::Column::Ptype.eq("g"))
            .filter(casbin_rule::Column::V1.eq(&subject))
            .exec(&self.db)
            .await?;

        self.load_policies().await
    }

    /// Set a user's role, keeping `md_user.role_id` and the grouping rule in step
    pub async fn set_user_role(&self, user: user::Model, role: Option<&role::Model>) -> anyhow::Result<user::Model> {
        casbin_rule::Entity::delete_many()
            .filter(casbin_rule::Column::Ptype.eq("g"))
            .filter(casbin_rule::Column::V0.eq(&user.username))
            .exec(&self.db)
            .await?;

        if let Some(role) = role {
            casbin_rule::new_grouping(&user.username, &Self::role_subject(&role.name))
                .insert(&self.db)
                .await?;
        }

        let mut active: user::ActiveModel = user.into();
        active.role_id = Set(role.map(|r| r.id));
        let updated = active.update(&self.db).await?;

        self.load_policies().await?;

        Ok(updated)
    }

    /// Remove a user's grouping rules (used when the user is deleted)
    pub async fn forget_user(&self, username: &str) -> anyhow::Result<()> {
        casbin_rule::Entity::delete_many()
            .filter(casbin_rule::Column::Ptype.eq("g"))
            .filter(casbin_rule::Column::V0.eq(username))
            .exec(&self.db)
            .await?;

        self.load_policies().await
    }

    /// Create or refresh the built-in permission catalogue
    pub async fn initialize_default_permissions(&self) -> anyhow::Result<InitCounts> {
        let mut counts = InitCounts::default();

        for def in DEFAULT_PERMISSIONS {
            let existing = permission::Entity::find()
                .filter(permission::Column::Codename.eq(def.codename))
                .one(&self.db)
                .await?;

            match existing {
                Some(p) => {
                    if p.name != def.name || p.description != def.description || p.module != def.module {
                        let mut active: permission::ActiveModel = p.into();
                        active.name = Set(def.name.to_string());
                        active.description = Set(def.description.to_string());
                        active.module = Set(def.module.to_string());
                        active.update(&self.db).await?;
                        counts.updated += 1;
                    }
                }
                None => {
                    permission::ActiveModel {
                        codename: Set(def.codename.to_string()),
                        name: Set(def.name.to_string()),
                        description: Set(def.description.to_string()),
                        module: Set(def.module.to_string()),
                        is_active: Set(true),
                        ..Default::default()
                    }
                    .insert(&self.db)
                    .await?;
                    counts.created += 1;
                }
            }
        }

        self.load_policies().await?;
        Ok(counts)
    }

    /// Create or refresh the system roles and their grants
    pub async fn initialize_default_roles(&self) -> anyhow::Result<InitCounts> {
        let mut counts = InitCounts::default();
        let now = now_ts();

        for def in SYSTEM_ROLES {
            let existing = role::Entity::find()
                .filter(role::Column::Name.eq(def.name))
                .one(&self.db)
                .await?;

            match existing {
                Some(r) => {
                    let mut active: role::ActiveModel = r.into();
                    active.display_name = Set(def.display_name.to_string());
                    active.description = Set(def.description.to_string());
                    active.is_system_role = Set(true);
                    active.updated_at = Set(now);
                    active.update(&self.db).await?;
                    counts.updated += 1;
                }
                None => {
                    role::ActiveModel {
                        name: Set(def.name.to_string()),
                        display_name: Set(def.display_name.to_string()),
                        description: Set(def.description.to_string()),
                        is_active: Set(true),
                        is_system_role: Set(true),
                        created_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    }
                    .insert(&self.db)
                    .await?;
                    counts.created += 1;
                }
            }

            let grants: Vec<String> = def.permissions.iter().map(|p| p.to_string()).collect();
            self.set_role_permissions(def.name, &grants).await?;
        }

        tracing::info!(
            "System roles initialized: {} created, {} updated",
            counts.created,
            counts.updated
        );
        Ok(counts)
    }

    /// Give every user without a role a default one: admin for superusers,
    /// viewer for everyone else. Returns the number of users changed.
    pub async fn assign_default_roles(&self) -> anyhow::Result<usize> {
        let admin = role::Entity::find()
            .filter(role::Column::Name.eq("admin"))
            .one(&self.db)
            .await?;
        let viewer = role::Entity::find()
            .filter(role::Column::Name.eq("viewer"))
            .one(&self.db)
            .await?;
        let (Some(admin), Some(viewer)) = (admin, viewer) else {
            anyhow::bail!("System roles are missing, run init-rbac first");
        };

        let users = user::Entity::find()
            .filter(user::Column::RoleId.is_null())
            .all(&self.db)
            .await?;

        let mut assigned = 0;
        for u in users {
            let target = if u.is_superuser { &admin } else { &viewer };
            self.set_user_role(u, Some(target)).await?;
            assigned += 1;
        }

        Ok(assigned)
    }

    /// Initialize the catalogue and roles in one go
    pub async fn ensure_defaults(&self) -> anyhow::Result<()> {
        self.initialize_default_permissions().await?;
        self.initialize_default_roles().await?;
        Ok(())
    }

    /// Role name encoded in a grouping subject
    pub fn role_name_of(subject: &str) -> &str {
        Self::extract_role_name(subject)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    pub(crate) async fn insert_user(db: &DatabaseConnection, username: &str, superuser: bool) -> user::Model {
        user::ActiveModel {
            username: Set(username.to_string()),
            password: Set(String::new()),
            email: Set(Some(format!("{}@example.com", username))),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            is_superuser: Set(superuser),
            is_active: Set(true),
            role_id: Set(None),
            phone: Set(String::new()),
            employee_id: Set(String::new()),
            department: Set(String::new()),
            default_location_id: Set(None),
            default_site_id: Set(None),
            email_notifications: Set(true),
            sms_notifications: Set(false),
            notification_frequency: Set("immediate".to_string()),
            theme_preference: Set("dark".to_string()),
            last_login: Set(0),
            created_at: Set(now_ts()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    async fn setup() -> (DatabaseConnection, PermissionEnforcer) {
        let db = connect_in_memory().await.unwrap();
        let enforcer = PermissionEnforcer::new(db.clone(), None).await.unwrap();
        enforcer.ensure_defaults().await.unwrap();
        (db, enforcer)
    }

    async fn role_named(db: &DatabaseConnection, name: &str) -> role::Model {
        role::Entity::find()
            .filter(role::Column::Name.eq(name))
            .one(db)
            .await
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_catalogue_shape() {
        assert_eq!(DEFAULT_PERMISSIONS.len(), 23);
        let codes: HashSet<&str> = DEFAULT_PERMISSIONS.iter().map(|p| p.codename).collect();
        assert_eq!(codes.len(), 23);
        for role in SYSTEM_ROLES {
            assert!(role.permissions.iter().all(|p| codes.contains(p)), "{}", role.name);
        }
    }

    #[tokio::test]
    async fn test_initializers_are_idempotent() {
        let (db, enforcer) = setup().await;
        let again = enforcer.initialize_default_permissions().await.unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.updated, 0);

        let roles = enforcer.initialize_default_roles().await.unwrap();
        assert_eq!(roles.created, 0);
        assert_eq!(roles.updated, 4);
        assert_eq!(role::Entity::find().all(&db).await.unwrap().len(), 4);
        assert_eq!(enforcer.role_permissions("technician").await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_role_grants() {
        let (db, enforcer) = setup().await;
        let tech = insert_user(&db, "tech", false).await;
        let tech = enforcer
            .set_user_role(tech, Some(&role_named(&db, "technician").await))
            .await
            .unwrap();

        assert!(enforcer.has_permission(&tech, perm::MAINTENANCE_COMPLETE).await);
        assert!(enforcer.has_permission(&tech, perm::EQUIPMENT_EDIT).await);
        assert!(!enforcer.has_permission(&tech, perm::EQUIPMENT_DELETE).await);
        assert!(!enforcer.has_permission(&tech, perm::USERS_MANAGE).await);
    }

    #[tokio::test]
    async fn test_admin_full_access_implies_everything() {
        let (db, enforcer) = setup().await;
        let boss = insert_user(&db, "boss", false).await;
        let boss = enforcer
            .set_user_role(boss, Some(&role_named(&db, "admin").await))
            .await
            .unwrap();

        assert!(enforcer.has_permission(&boss, perm::EQUIPMENT_DELETE).await);
        assert!(enforcer.has_permission(&boss, perm::SETTINGS_MANAGE).await);
        assert_eq!(enforcer.user_permissions(&boss).await.len(), 23);
    }

    #[tokio::test]
    async fn test_no_role_and_inactive_role() {
        let (db, enforcer) = setup().await;
        let nobody = insert_user(&db, "nobody", false).await;
        assert!(!enforcer.has_permission(&nobody, perm::EQUIPMENT_VIEW).await);

        let root = insert_user(&db, "root", true).await;
        assert!(enforcer.has_permission(&root, perm::USERS_MANAGE).await);

        let viewer_role = role_named(&db, "viewer").await;
        let v = insert_user(&db, "v", false).await;
        let v = enforcer.set_user_role(v, Some(&viewer_role)).await.unwrap();
        assert!(enforcer.has_permission(&v, perm::EQUIPMENT_VIEW).await);

        let mut active: role::ActiveModel = viewer_role.into();
        active.is_active = Set(false);
        active.update(&db).await.unwrap();
        enforcer.load_policies().await.unwrap();
        assert!(!enforcer.has_permission(&v, perm::EQUIPMENT_VIEW).await);
    }

    #[tokio::test]
    async fn test_inactive_permission_is_not_granted() {
        let (db, enforcer) = setup().await;
        let v = insert_user(&db, "v", false).await;
        let v = enforcer
            .set_user_role(v, Some(&role_named(&db, "viewer").await))
            .await
            .unwrap();

        let p = permission::Entity::find()
            .filter(permission::Column::Codename.eq(perm::CALENDAR_VIEW))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        let mut active: permission::ActiveModel = p.into();
        active.is_active = Set(false);
        active.update(&db).await.unwrap();
        enforcer.load_policies().await.unwrap();

        assert!(!enforcer.has_permission(&v, perm::CALENDAR_VIEW).await);
        assert!(enforcer.has_permission(&v, perm::REPORTS_VIEW).await);
    }

    #[tokio::test]
    async fn test_assign_default_roles() {
        let (db, enforcer) = setup().await;
        insert_user(&db, "root", true).await;
        insert_user(&db, "alice", false).await;

        assert_eq!(enforcer.assign_default_roles().await.unwrap(), 2);
        assert_eq!(enforcer.assign_default_roles().await.unwrap(), 0);

        let admin_id = role_named(&db, "admin").await.id;
        let viewer_id = role_named(&db, "viewer").await.id;
        let users = user::Entity::find().all(&db).await.unwrap();
        for u in users {
            let expected = if u.is_superuser { admin_id } else { viewer_id };
            assert_eq!(u.role_id, Some(expected));
        }
    }

    #[tokio::test]
    async fn test_rename_role_keeps_assignments() {
        let (db, enforcer) = setup().await;
        enforcer
            .set_role_permissions("auditor", &[perm::REPORTS_VIEW.to_string()])
            .await
            .unwrap();
        let now = now_ts();
        let auditor = role::ActiveModel {
            name: Set("auditor".to_string()),
            display_name: Set("Auditor".to_string()),
            description: Set(String::new()),
            is_active: Set(true),
            is_system_role: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        let u = insert_user(&db, "carol", false).await;
        let u = enforcer.set_user_role(u, Some(&auditor)).await.unwrap();

        let mut active: role::ActiveModel = auditor.into();
        active.name = Set("reviewer".to_string());
        active.update(&db).await.unwrap();
        enforcer.rename_role("auditor", "reviewer").await.unwrap();

        assert!(enforcer.has_permission(&u, perm::REPORTS_VIEW).await);
        assert_eq!(enforcer.role_permissions("reviewer").await.unwrap(), vec![perm::REPORTS_VIEW]);
        assert!(enforcer.role_permissions("auditor").await.unwrap().is_empty());
    }
}
