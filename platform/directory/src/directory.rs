use std::sync::Arc;

use chrono::{DateTime, Utc};
use entity::{Action, DepartmentId, Role, RoleId, User, UserId};
use parking_lot::{Mutex, MutexGuard, RwLock};
use platform_authz::{
    DepartmentCatalog, PolicyEngine, RoleCatalog, SYSTEM_ADMIN, refresh_permissions_from_role,
};
use platform_db::{KvStore, StoreError, load_json, save_json};
use platform_obs::{LogRecovery, Recovered, RecoveryObserver};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::credentials::CredentialStore;
use crate::seed::demo_users;
use crate::{DirectoryError, DirectoryResult, USERS_KEY, UserPayload};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone, Debug, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub department_id: DepartmentId,
    pub role_id: RoleId,
    #[serde(default)]
    pub manager_id: Option<UserId>,
    /// Initial password. Without one the account cannot log in until an
    /// administrator sets it.
    #[serde(default)]
    pub password: Option<String>,
}

/// Fields to overwrite. `None` leaves the stored value alone.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub department_id: Option<DepartmentId>,
    /// Replaces the assigned role. The permission snapshot is left as it is
    /// until `refresh_permissions` runs.
    pub role_id: Option<RoleId>,
    pub is_active: Option<bool>,
    pub manager_id: Option<UserId>,
    pub direct_reports: Option<Vec<UserId>>,
}

/// Durable list of user accounts.
///
/// All reads and writes go through one lock: a load-modify-store cycle is
/// never interleaved with another one in this process. Separate processes
/// sharing a store are not coordinated.
pub struct UserDirectory {
    store: Arc<dyn KvStore>,
    credentials: Arc<dyn CredentialStore>,
    roles: RwLock<RoleCatalog>,
    departments: DepartmentCatalog,
    observer: Arc<dyn RecoveryObserver>,
    writer: Mutex<()>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn KvStore>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            credentials,
            roles: RwLock::new(RoleCatalog::standard()),
            departments: DepartmentCatalog::standard(),
            observer: Arc::new(LogRecovery),
            writer: Mutex::new(()),
        }
    }

    pub fn with_roles(mut self, roles: RoleCatalog) -> Self {
        self.roles = RwLock::new(roles);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RecoveryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn roles(&self) -> RoleCatalog {
        self.roles.read().clone()
    }

    pub fn departments(&self) -> &DepartmentCatalog {
        &self.departments
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// All users. The first call against an empty store writes the demo
    /// accounts.
    pub fn get_users(&self) -> DirectoryResult<Vec<User>> {
        let guard = self.writer.lock();
        self.load(&guard)
    }

    pub fn get_users_by_department(&self, department_id: &str) -> DirectoryResult<Vec<User>> {
        Ok(self
            .get_users()?
            .into_iter()
            .filter(|user| user.department_id == department_id)
            .collect())
    }

    pub fn get_user(&self, id: &str) -> DirectoryResult<Option<User>> {
        Ok(self.get_users()?.into_iter().find(|user| user.id == id))
    }

    /// First active account whose email matches, ignoring case.
    pub fn find_active_by_email(&self, email: &str) -> DirectoryResult<Option<User>> {
        Ok(self
            .get_users()?
            .into_iter()
            .find(|user| user.is_active && user.email_matches(email)))
    }

    /// Stamp the last login time. Not permission gated: only the session
    /// manager calls this, after verifying credentials.
    pub fn record_login(&self, id: &UserId, at: DateTime<Utc>) -> DirectoryResult<User> {
        self.modify(id, |user| {
            user.last_login = Some(at);
            Ok(())
        })
    }

    #[instrument(skip_all, fields(email = %input.email, role = %input.role_id))]
    pub fn create_user(&self, policy: &PolicyEngine, input: NewUser) -> UserPayload {
        UserPayload::from_result(self.try_create_user(policy, input), "User created")
    }

    #[instrument(skip_all, fields(user = %id))]
    pub fn update_user(&self, policy: &PolicyEngine, id: &UserId, update: UserUpdate) -> UserPayload {
        UserPayload::from_result(self.try_update_user(policy, id, update), "User updated")
    }

    /// Re-materialize a user's permission snapshot from the current role
    /// definition.
    #[instrument(skip_all, fields(user = %id))]
    pub fn refresh_permissions(&self, policy: &PolicyEngine, id: &UserId) -> UserPayload {
        let result = policy
            .require(SYSTEM_ADMIN, Action::Update)
            .map_err(DirectoryError::from)
            .and_then(|_| {
                let roles = self.roles.read().clone();
                self.modify(id, |user| {
                    if refresh_permissions_from_role(user, &roles)? {
                        info!(user = %user.id, role = %user.role.id, "permissions refreshed");
                    }
                    Ok(())
                })
            });
        UserPayload::from_result(result, "Permissions refreshed")
    }

    /// Add or replace a role definition. Users holding the role keep their
    /// old snapshot until refreshed.
    #[instrument(skip_all, fields(role = %role.id))]
    pub fn define_role(&self, policy: &PolicyEngine, role: Role) -> DirectoryResult<()> {
        policy.require(SYSTEM_ADMIN, Action::Update)?;
        if self.departments.get(role.department_id.as_str()).is_none() {
            return Err(DirectoryError::InvalidInput(format!(
                "unknown department {}",
                role.department_id
            )));
        }
        info!(role = %role.id, "role definition updated");
        self.roles.write().insert(role);
        Ok(())
    }

    fn try_create_user(&self, policy: &PolicyEngine, input: NewUser) -> DirectoryResult<User> {
        let actor = policy.require(SYSTEM_ADMIN, Action::Create)?;
        let name = validate_name(&input.name)?;
        let email = normalize_email(&input.email)?;
        self.ensure_department(&input.department_id)?;
        let role = self.resolve_role(&input.role_id)?;
        if let Some(password) = input.password.as_deref() {
            validate_password(password)?;
        }

        let guard = self.writer.lock();
        let mut users = self.load(&guard)?;
        if let Some(manager_id) = &input.manager_id {
            if !users.iter().any(|user| &user.id == manager_id) {
                return Err(DirectoryError::InvalidInput(format!(
                    "manager {manager_id} does not exist"
                )));
            }
        }

        let user = User {
            id: UserId::new(Uuid::new_v4().to_string()),
            name,
            email,
            department_id: input.department_id,
            permissions: role.permissions.clone(),
            role,
            direct_reports: Vec::new(),
            manager_id: input.manager_id,
            is_active: true,
            last_login: None,
        };
        if let Some(password) = input.password.as_deref() {
            self.credentials.set_password(&user.id, password)?;
        }
        if let Some(manager) = user
            .manager_id
            .as_ref()
            .and_then(|id| users.iter_mut().find(|candidate| &candidate.id == id))
        {
            manager.direct_reports.push(user.id.clone());
        }
        users.push(user.clone());
        save_json(self.store.as_ref(), USERS_KEY, &users)?;
        info!(user = %user.id, role = %user.role.id, by = %actor.id, "user created");
        Ok(user)
    }

    fn try_update_user(
        &self,
        policy: &PolicyEngine,
        id: &UserId,
        update: UserUpdate,
    ) -> DirectoryResult<User> {
        let actor = policy.require(SYSTEM_ADMIN, Action::Update)?;
        let name = update.name.as_deref().map(validate_name).transpose()?;
        let email = update.email.as_deref().map(normalize_email).transpose()?;
        if let Some(department_id) = &update.department_id {
            self.ensure_department(department_id)?;
        }
        let role = update
            .role_id
            .as_ref()
            .map(|role_id| self.resolve_role(role_id))
            .transpose()?;

        let updated = self.modify(id, move |user| {
            if let Some(name) = name {
                user.name = name;
            }
            if let Some(email) = email {
                user.email = email;
            }
            if let Some(department_id) = update.department_id {
                user.department_id = department_id;
            }
            if let Some(role) = role {
                user.role = role;
            }
            if let Some(is_active) = update.is_active {
                user.is_active = is_active;
            }
            if let Some(manager_id) = update.manager_id {
                user.manager_id = Some(manager_id);
            }
            if let Some(direct_reports) = update.direct_reports {
                user.direct_reports = direct_reports;
            }
            Ok(())
        })?;
        info!(user = %updated.id, by = %actor.id, "user updated");
        Ok(updated)
    }

    /// Apply `change` to one stored user and persist the list.
    fn modify(
        &self,
        id: &UserId,
        change: impl FnOnce(&mut User) -> DirectoryResult<()>,
    ) -> DirectoryResult<User> {
        let guard = self.writer.lock();
        let mut users = self.load(&guard)?;
        let user = users
            .iter_mut()
            .find(|user| &user.id == id)
            .ok_or_else(|| DirectoryError::NotFound(id.clone()))?;
        change(user)?;
        let updated = user.clone();
        save_json(self.store.as_ref(), USERS_KEY, &users)?;
        Ok(updated)
    }

    /// Read the stored list, seeding it when absent and reseeding it when it
    /// cannot be decoded. Requires the writer lock.
    fn load(&self, _guard: &MutexGuard<'_, ()>) -> DirectoryResult<Vec<User>> {
        match load_json::<Vec<User>>(self.store.as_ref(), USERS_KEY) {
            Ok(Some(users)) => Ok(users),
            Ok(None) => self.seed(),
            Err(StoreError::Corrupt { reason, .. }) => {
                self.observer
                    .recovered(&Recovered::UserListReseeded { reason });
                self.seed()
            }
            Err(err) => Err(err.into()),
        }
    }

    fn seed(&self) -> DirectoryResult<Vec<User>> {
        let seeded = demo_users(&self.roles.read());
        for (user, password) in &seeded {
            self.credentials.set_password(&user.id, password)?;
        }
        let users: Vec<User> = seeded.into_iter().map(|(user, _)| user).collect();
        save_json(self.store.as_ref(), USERS_KEY, &users)?;
        info!(count = users.len(), "seeded demo accounts");
        Ok(users)
    }

    fn resolve_role(&self, role_id: &RoleId) -> DirectoryResult<Role> {
        self.roles
            .read()
            .get(role_id.as_str())
            .cloned()
            .ok_or_else(|| DirectoryError::InvalidInput(format!("unknown role {role_id}")))
    }

    fn ensure_department(&self, department_id: &DepartmentId) -> DirectoryResult<()> {
        if self.departments.get(department_id.as_str()).is_some() {
            Ok(())
        } else {
            warn!(department = %department_id, "rejected unknown department");
            Err(DirectoryError::InvalidInput(format!(
                "unknown department {department_id}"
            )))
        }
    }
}

fn validate_name(name: &str) -> DirectoryResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DirectoryError::InvalidInput("name is required".into()));
    }
    Ok(trimmed.to_string())
}

fn normalize_email(email: &str) -> DirectoryResult<String> {
    let normalized = email.trim().to_ascii_lowercase();
    match normalized.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(normalized),
        _ => Err(DirectoryError::InvalidInput(format!(
            "{email:?} is not a valid email address"
        ))),
    }
}

fn validate_password(password: &str) -> DirectoryResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DirectoryError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
