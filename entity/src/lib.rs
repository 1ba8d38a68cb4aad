//! Data model for the CRM access core: permissions, departments, roles,
//! users and sessions.
//!
//! Everything here is plain data. Catalogs live in `platform-authz`, the
//! directory and session lifecycle in `platform-directory` and
//! `platform-authn`.

mod ids;

pub mod department;
pub mod permission;
pub mod role;
pub mod session;
pub mod user;

pub use department::Department;
pub use ids::{DepartmentId, PermissionId, RoleId, UserId};
pub use permission::{Action, Permission};
pub use role::{DataAccess, Level, Restrictions, Role, TimeWindow};
pub use session::UserSession;
pub use user::User;
