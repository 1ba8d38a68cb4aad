mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use entity::{Action, DepartmentId, RoleId, UserId};
use platform_authn::SessionManager;
use platform_authz::{PermissionCatalog, PolicyEngine};
use platform_db::{KvStore, RedbStore};
use platform_directory::{HashedCredentials, NewUser, UserDirectory, UserUpdate};
use platform_obs::{ObsConfig, init_tracing};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "crm-access", version, about = "CRM access control: sessions, roles and users")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and persist the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CRM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the current session.
    Logout,
    /// Show the signed-in user and session expiry.
    Whoami,
    /// Check whether the current user holds an action on a permission.
    Can {
        permission: String,
        #[arg(value_parser = parse_action)]
        action: Action,
    },
    /// Check whether the current user may see a record.
    CanAccess { owner_id: String, department_id: String },
    /// Check whether the current user may approve an amount.
    CanApprove {
        #[arg(long)]
        amount: Option<u64>,
    },
    /// User administration.
    #[command(subcommand)]
    Users(UsersCommand),
    /// Print the built-in catalogs.
    #[command(subcommand)]
    Catalog(CatalogCommand),
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
    List {
        #[arg(long)]
        department: Option<String>,
    },
    Create(CreateArgs),
    Update(UpdateArgs),
    /// Rebuild a user's permissions from their role.
    Refresh { id: String },
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    department: String,
    #[arg(long)]
    role: String,
    #[arg(long)]
    manager: Option<String>,
    #[arg(long)]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    role: Option<String>,
    #[arg(long)]
    active: Option<bool>,
    #[arg(long)]
    manager: Option<String>,
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    Roles,
    Departments,
    Permissions,
}

struct Services {
    sessions: Arc<SessionManager>,
    policy: PolicyEngine,
}

impl Services {
    fn open(config: &AppConfig) -> Result<Self> {
        let store: Arc<dyn KvStore> = Arc::new(
            RedbStore::open(&config.store_path)
                .with_context(|| format!("open store {}", config.store_path.display()))?,
        );
        let credentials = Arc::new(HashedCredentials::new(store.clone()));
        let directory = Arc::new(UserDirectory::new(store.clone(), credentials));
        let sessions = Arc::new(SessionManager::with_defaults(
            store,
            directory,
            config.session.clone(),
        ));
        let policy = PolicyEngine::new(sessions.clone());
        Ok(Self { sessions, policy })
    }

    fn directory(&self) -> &UserDirectory {
        self.sessions.directory()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::default())?;
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    debug!(store = %config.store_path.display(), "configuration loaded");
    let services = Services::open(&config)?;

    match cli.command {
        Command::Login { email, password } => print(&services.sessions.login(&email, &password).await),
        Command::Logout => match services.sessions.logout() {
            Ok(()) => print(&json!({ "success": true, "message": "Logged out" })),
            Err(err) => print(&json!({
                "success": false,
                "message": format!("Logged out here, but the stored session could not be removed: {err}"),
            })),
        },
        Command::Whoami => whoami(&services),
        Command::Can { permission, action } => print(&json!({
            "permission": permission,
            "action": action,
            "allowed": services.policy.has_permission(&permission, action),
        })),
        Command::CanAccess {
            owner_id,
            department_id,
        } => print(&json!({
            "ownerId": owner_id,
            "departmentId": department_id,
            "allowed": services.policy.can_access_data(&owner_id, &department_id),
        })),
        Command::CanApprove { amount } => print(&json!({
            "amount": amount,
            "allowed": services.policy.can_approve(amount),
        })),
        Command::Users(cmd) => users(&services, cmd),
        Command::Catalog(cmd) => catalog(&services, cmd),
    }
}

fn whoami(services: &Services) -> Result<()> {
    if !services.sessions.is_authenticated() {
        return print(&json!({ "authenticated": false }));
    }
    match services.sessions.current_session() {
        Some(session) => print(&json!({
            "authenticated": true,
            "user": session.user,
            "expiresAt": session.expires_at,
            "withinAccessWindow": services.policy.within_access_window(Utc::now()),
            "tokenValid": services.sessions.verify_token(&session.token).is_ok(),
        })),
        None => print(&json!({ "authenticated": false })),
    }
}

fn users(services: &Services, cmd: UsersCommand) -> Result<()> {
    let directory = services.directory();
    match cmd {
        UsersCommand::List { department } => {
            let users = match department {
                Some(department) => directory.get_users_by_department(&department)?,
                None => directory.get_users()?,
            };
            print(&users)
        }
        UsersCommand::Create(args) => {
            let input = NewUser {
                name: args.name,
                email: args.email,
                department_id: DepartmentId::new(args.department),
                role_id: RoleId::new(args.role),
                manager_id: args.manager.map(UserId::new),
                password: args.password,
            };
            print(&directory.create_user(&services.policy, input))
        }
        UsersCommand::Update(args) => {
            let update = UserUpdate {
                name: args.name,
                email: args.email,
                department_id: args.department.map(DepartmentId::new),
                role_id: args.role.map(RoleId::new),
                is_active: args.active,
                manager_id: args.manager.map(UserId::new),
                direct_reports: None,
            };
            print(&directory.update_user(&services.policy, &UserId::new(args.id), update))
        }
        UsersCommand::Refresh { id } => {
            print(&directory.refresh_permissions(&services.policy, &UserId::new(id)))
        }
    }
}

fn catalog(services: &Services, cmd: CatalogCommand) -> Result<()> {
    match cmd {
        CatalogCommand::Roles => {
            let roles = services.directory().roles();
            print(&roles.iter().collect::<Vec<_>>())
        }
        CatalogCommand::Departments => {
            print(&services.directory().departments().iter().collect::<Vec<_>>())
        }
        CatalogCommand::Permissions => {
            print(&PermissionCatalog::standard().iter().collect::<Vec<_>>())
        }
    }
}

fn parse_action(raw: &str) -> Result<Action, String> {
    Action::parse(raw).ok_or_else(|| {
        let known: Vec<_> = Action::ALL.iter().map(|a| a.as_str()).collect();
        format!("unknown action {raw}; expected one of {}", known.join(", "))
    })
}

fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
