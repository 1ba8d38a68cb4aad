use serde::{Deserialize, Serialize};

use crate::DepartmentId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub description: String,
    /// Title of the department head, not a user reference.
    pub head: String,
    /// Budget ceiling in whole currency units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<u64>,
}
