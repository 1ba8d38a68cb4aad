use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PermissionId;

/// Verbs a permission can allow.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Approve,
    Export,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Approve,
        Action::Export,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Approve => "approve",
            Action::Export => "export",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" => Some(Action::Create),
            "read" => Some(Action::Read),
            "update" => Some(Action::Update),
            "delete" => Some(Action::Delete),
            "approve" => Some(Action::Approve),
            "export" => Some(Action::Export),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A module-scoped bundle of allowed actions. Permissions are defined once in
/// the catalog and only ever referenced afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub description: String,
    pub module: String,
    pub actions: BTreeSet<Action>,
}

impl Permission {
    pub fn new(
        id: impl Into<PermissionId>,
        name: impl Into<String>,
        description: impl Into<String>,
        module: impl Into<String>,
        actions: &[Action],
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            module: module.into(),
            actions: actions.iter().copied().collect(),
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    /// Copy of this permission limited to `actions`. Actions the permission
    /// never allowed are not added.
    pub fn narrowed(&self, actions: &[Action]) -> Self {
        Self {
            actions: actions
                .iter()
                .copied()
                .filter(|action| self.actions.contains(action))
                .collect(),
            ..self.clone()
        }
    }
}
