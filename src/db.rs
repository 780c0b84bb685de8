use sea_orm::sea_query::TableCreateStatement;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, EntityTrait,
    PaginatorTrait, Schema, Statement,
};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::entity::{
    activity_type, branding_settings, calendar_event, casbin_rule, checklist_item, customer,
    dashboard_settings, equipment, equipment_category, equipment_component, event_comment,
    location, maintenance_activity, maintenance_schedule, op_log, permission, portainer_config,
    role, user,
};

/// Initialize database connection and auto-migrate tables
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let database_url = config.connection_url();

    if config.is_sqlite() {
        info!("Connecting to sqlite database: {}", config.path.display());
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DbErr::Custom(e.to_string()))?;
            }
        }
    } else {
        info!("Connecting to database: {}:{}/{}", config.host, config.port, config.name);
    }

    let mut opt = ConnectOptions::new(&database_url);
    opt.connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);
    if config.is_sqlite() {
        opt.max_connections(1);
    } else {
        opt.max_connections(50)
            .min_connections(2)
            .set_schema_search_path("public");
    }

    let db = Database::connect(opt).await?;
    info!("Database connection established");

    auto_migrate(&db).await?;

    Ok(db)
}

/// Connect to a private in-memory SQLite database with the full schema
pub async fn connect_in_memory() -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1)
        .min_connections(1)
        .idle_timeout(Duration::from_secs(3600))
        .sqlx_logging(false);
    let db = Database::connect(opt).await?;
    auto_migrate(&db).await?;
    Ok(db)
}

/// Test database connection
pub async fn test_connection(config: &DatabaseConfig) -> Result<(), DbErr> {
    let mut opt = ConnectOptions::new(config.connection_url());
    opt.connect_timeout(Duration::from_secs(5));

    let db = Database::connect(opt).await?;
    db.ping().await?;

    Ok(())
}

/// Create every table that does not exist yet
pub async fn auto_migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    info!("Running auto-migration for all entities...");

    // Reference data and RBAC
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(permission::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(role::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(casbin_rule::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(user::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(op_log::Entity)).await?;

    // Sites and inventory
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(customer::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(location::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(equipment_category::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(equipment::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(equipment_component::Entity)).await?;

    // Maintenance and calendar
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(activity_type::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(maintenance_activity::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(checklist_item::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(maintenance_schedule::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(calendar_event::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(event_comment::Entity)).await?;

    // Settings
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(branding_settings::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(dashboard_settings::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(portainer_config::Entity)).await?;

    info!("Auto-migration completed successfully");
    Ok(())
}

/// Create a table if it doesn't exist
async fn create_table_if_not_exists(
    db: &DatabaseConnection,
    backend: DbBackend,
    mut stmt: TableCreateStatement,
) -> Result<(), DbErr> {
    stmt.if_not_exists();

    let sql = backend.build(&stmt);

    db.execute(Statement::from_string(backend, sql.to_string())).await?;

    Ok(())
}

/// Row counts for every table, used by `check-db`
pub async fn table_counts(db: &DatabaseConnection) -> Result<Vec<(&'static str, u64)>, DbErr> {
    Ok(vec![
        ("md_permission", permission::Entity::find().count(db).await?),
        ("md_role", role::Entity::find().count(db).await?),
        ("md_casbin_rule", casbin_rule::Entity::find().count(db).await?),
        ("md_user", user::Entity::find().count(db).await?),
        ("md_op_log", op_log::Entity::find().count(db).await?),
        ("md_customer", customer::Entity::find().count(db).await?),
        ("md_location", location::Entity::find().count(db).await?),
        ("md_equipment_category", equipment_category::Entity::find().count(db).await?),
        ("md_equipment", equipment::Entity::find().count(db).await?),
        ("md_equipment_component", equipment_component::Entity::find().count(db).await?),
        ("md_activity_type", activity_type::Entity::find().count(db).await?),
        ("md_maintenance_activity", maintenance_activity::Entity::find().count(db).await?),
        ("md_checklist_item", checklist_item::Entity::find().count(db).await?),
        ("md_maintenance_schedule", maintenance_schedule::Entity::find().count(db).await?),
        ("md_calendar_event", calendar_event::Entity::find().count(db).await?),
        ("md_event_comment", event_comment::Entity::find().count(db).await?),
        ("md_branding_settings", branding_settings::Entity::find().count(db).await?),
        ("md_dashboard_settings", dashboard_settings::Entity::find().count(db).await?),
        ("md_portainer_config", portainer_config::Entity::find().count(db).await?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_schema() {
        let db = connect_in_memory().await.unwrap();
        // Running the migration twice must be harmless
        auto_migrate(&db).await.unwrap();
        let counts = table_counts(&db).await.unwrap();
        assert_eq!(counts.len(), 19);
        assert!(counts.iter().all(|(_, n)| *n == 0));
    }
}
