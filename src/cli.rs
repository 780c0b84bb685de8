//! Command line interface
//!
//! `serve` runs the HTTP server, the other subcommands are one-shot
//! administration tasks against the configured database.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::entity::{now_ts, role, user};
use crate::handlers;
use crate::permission::PermissionEnforcer;
use crate::routes;
use crate::service::{demo, location as locations, webhook};
use crate::state::AppState;
use crate::task::{self, JobKind};

#[derive(Debug, Parser)]
#[command(name = "maintdash", version, about = "Maintenance management dashboard")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "./etc/maintdash.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server and the background scheduler (default)
    Serve,
    /// Create the default permissions and system roles
    InitRbac {
        /// Also give every user without a role a default one
        #[arg(long)]
        assign_defaults: bool,
    },
    /// Create a superuser holding the admin role
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Create POD and MDC locations under every active site
    GeneratePods {
        #[arg(long, default_value_t = 11)]
        pod_count: u32,
        #[arg(long, default_value_t = 2)]
        mdcs_per_pod: u32,
        /// Delete existing pods and MDCs first
        #[arg(long)]
        force: bool,
    },
    /// Load a small demo dataset
    PopulateDemo,
    /// Delete maintenance, calendar, equipment and location data
    ClearData {
        #[arg(long)]
        confirm: bool,
    },
    /// Check the database connection and print table sizes
    CheckDb,
    /// Run one background job once
    RunJob { name: String },
    /// Manage the container redeploy webhook
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum WebhookAction {
    /// Print the stored configuration with secrets masked
    Show,
    /// Store the Portainer connection
    Set {
        #[arg(long)]
        url: String,
        #[arg(long)]
        stack: String,
        #[arg(long, default_value = "")]
        user: String,
        /// Keeps the stored password when omitted
        #[arg(long, default_value = "")]
        password: String,
        /// Keeps the stored secret when omitted
        #[arg(long, default_value = "")]
        secret: String,
        #[arg(long, default_value_t = 1)]
        endpoint_id: i64,
    },
    /// Remove the stored configuration
    Clear,
    /// Authenticate against Portainer and look up the stack
    Test,
    /// Replace the webhook secret and print the new one
    GenerateSecret,
}

/// Load the config file, falling back to defaults
pub fn load_config(path: &str) -> Config {
    Config::load(path).unwrap_or_else(|e| {
        eprintln!("Could not load config file {}: {}, using defaults", path, e);
        Config::default()
    })
}

async fn connect(config: &Config) -> anyhow::Result<(DatabaseConnection, PermissionEnforcer)> {
    let db = db::init_database(&config.database)
        .await
        .context("Database initialization failed")?;
    let perm = PermissionEnforcer::new(db.clone(), Some(config.casbin_conf.as_path()))
        .await
        .context("Permission enforcer initialization failed")?;
    Ok((db, perm))
}

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::InitRbac { assign_defaults } => {
            let (_, perm) = connect(&config).await?;
            let permissions = perm.initialize_default_permissions().await?;
            let roles = perm.initialize_default_roles().await?;
            println!(
                "Permissions: {} created, {} updated",
                permissions.created, permissions.updated
            );
            println!("Roles: {} created, {} updated", roles.created, roles.updated);
            if assign_defaults {
                let assigned = perm.assign_default_roles().await?;
                println!("Assigned default roles to {} users", assigned);
            }
            Ok(())
        }
        Command::CreateAdmin {
            username,
            password,
            email,
        } => {
            let (db, perm) = connect(&config).await?;
            create_admin(&db, &perm, &username, &password, email).await?;
            println!("Superuser '{}' created", username);
            Ok(())
        }
        Command::GeneratePods {
            pod_count,
            mdcs_per_pod,
            force,
        } => {
            let (db, _) = connect(&config).await?;
            let summary = locations::generate_pods(&db, pod_count, mdcs_per_pod, force).await?;
            println!(
                "Sites: {}, pods created: {}, MDCs created: {}",
                summary.sites, summary.pods_created, summary.mdcs_created
            );
            Ok(())
        }
        Command::PopulateDemo => {
            let (db, perm) = connect(&config).await?;
            perm.ensure_defaults().await?;
            let summary = demo::populate(&db).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::ClearData { confirm } => {
            if !confirm {
                bail!("Refusing to delete data without --confirm");
            }
            let (db, _) = connect(&config).await?;
            let counts = demo::reset(&db, demo::ResetScope::All).await?;
            for (table, n) in counts {
                println!("{:<24} {}", table, n);
            }
            Ok(())
        }
        Command::CheckDb => {
            let (db, _) = connect(&config).await?;
            db.ping().await.context("Database ping failed")?;
            println!("Database connection OK ({:?})", db.get_database_backend());
            for (table, count) in db::table_counts(&db).await? {
                println!("{:<28} {}", table, count);
            }
            Ok(())
        }
        Command::RunJob { name } => {
            let Some(kind) = JobKind::parse(&name) else {
                let known: Vec<&str> = JobKind::ALL.iter().map(|k| k.name()).collect();
                bail!("Unknown job '{}'. Available: {}", name, known.join(", "));
            };
            let (db, perm) = connect(&config).await?;
            let state = AppState::new(db, perm, config);
            let message = task::run(kind, &state.job_context()).await?;
            println!("{}", message);
            Ok(())
        }
        Command::Webhook { action } => {
            let (db, _) = connect(&config).await?;
            run_webhook(&db, action).await
        }
    }
}

async fn run_webhook(db: &DatabaseConnection, action: WebhookAction) -> anyhow::Result<()> {
    match action {
        WebhookAction::Show => match webhook::config(db).await? {
            Some(model) => {
                let view = webhook::PortainerView::from(&model);
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
            None => println!("Webhook is not configured"),
        },
        WebhookAction::Set {
            url,
            stack,
            user,
            password,
            secret,
            endpoint_id,
        } => {
            let saved = webhook::save(
                db,
                &webhook::PortainerInput {
                    portainer_url: url,
                    stack_name: stack,
                    portainer_user: user,
                    portainer_password: password,
                    webhook_secret: secret,
                    endpoint_id,
                },
            )
            .await?;
            println!(
                "Saved. Webhook secret fingerprint: {}",
                webhook::fingerprint(&saved.webhook_secret)
            );
        }
        WebhookAction::Clear => {
            if webhook::clear(db).await? {
                println!("Webhook configuration removed");
            } else {
                println!("Webhook is not configured");
            }
        }
        WebhookAction::Test => {
            let Some(model) = webhook::config(db).await? else {
                bail!("Webhook is not configured");
            };
            let report = webhook::test_connection(&model).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        WebhookAction::GenerateSecret => {
            let secret = webhook::rotate_secret(db).await?;
            println!("{}", secret);
        }
    }
    Ok(())
}

/// Create a superuser and place it in the admin role
pub async fn create_admin(
    db: &DatabaseConnection,
    perm: &PermissionEnforcer,
    username: &str,
    password: &str,
    email: Option<String>,
) -> anyhow::Result<user::Model> {
    let username = username.trim();
    if username.is_empty() {
        bail!("Username is required");
    }
    if password.len() < handlers::auth::MIN_PASSWORD_LEN {
        bail!(
            "Password must be at least {} characters",
            handlers::auth::MIN_PASSWORD_LEN
        );
    }
    if user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
        .is_some()
    {
        bail!("User '{}' already exists", username);
    }

    perm.ensure_defaults().await?;
    let admin_role = role::Entity::find()
        .filter(role::Column::Name.eq("admin"))
        .one(db)
        .await?
        .context("admin role is missing")?;

    let created = user::ActiveModel {
        username: Set(username.to_string()),
        password: Set(bcrypt::hash(password, bcrypt::DEFAULT_COST)?),
        email: Set(email.filter(|e| !e.trim().is_empty())),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        is_superuser: Set(true),
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
    .await?;

    let created = perm.set_user_role(created, Some(&admin_role)).await?;
    info!("Superuser created: {}", created.username);
    Ok(created)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let (db, perm) = connect(&config).await?;
    perm.ensure_defaults().await?;
    info!("Permission enforcer initialized");

    handlers::audit::service::init(db.clone());
    info!("Audit log service initialized");

    let addr: SocketAddr = match config.addr.parse() {
        Ok(addr) => addr,
        Err(_) => {
            tracing::warn!("Invalid address '{}', using default 0.0.0.0:8080", config.addr);
            SocketAddr::from(([0, 0, 0, 0], 8080))
        }
    };
    if !config.static_dir.exists() {
        tracing::warn!(
            "Static directory {} not found, only the API is served",
            config.static_dir.display()
        );
    }

    let state = AppState::new(db, perm, config);
    let jobs = Arc::clone(&state.jobs);
    if state.config.scheduler.enabled {
        jobs.start(state.job_context());
        info!("Background scheduler started");
    } else {
        info!("Background scheduler disabled");
    }

    let app = routes::create_router(state);

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    jobs.stop();
    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::parse_from(["maintdash"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, "./etc/maintdash.toml");

        let cli = Cli::parse_from(["maintdash", "generate-pods", "--pod-count", "3", "--force"]);
        match cli.command {
            Some(Command::GeneratePods {
                pod_count,
                mdcs_per_pod,
                force,
            }) => {
                assert_eq!(pod_count, 3);
                assert_eq!(mdcs_per_pod, 2);
                assert!(force);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::parse_from(["maintdash", "--config", "x.toml", "webhook", "show"]);
        assert_eq!(cli.config, "x.toml");
        assert!(matches!(
            cli.command,
            Some(Command::Webhook {
                action: WebhookAction::Show
            })
        ));
    }

    #[tokio::test]
    async fn test_create_admin() {
        let db = connect_in_memory().await.unwrap();
        let perm = PermissionEnforcer::new(db.clone(), None).await.unwrap();

        let admin = create_admin(&db, &perm, "root", "longenough", None).await.unwrap();
        assert!(admin.is_superuser);
        assert!(admin.role_id.is_some());
        assert!(perm.has_permission(&admin, "equipment.delete").await);

        assert!(create_admin(&db, &perm, "root", "longenough", None).await.is_err());
        assert!(create_admin(&db, &perm, "other", "short", None).await.is_err());
    }
}
