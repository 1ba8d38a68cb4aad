use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::{DepartmentId, Permission, PermissionId, RoleId};

/// Seniority of a role. Ordering runs from `Executive` (highest) to
/// `Support`; it carries no capabilities of its own.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Executive,
    Management,
    Operations,
    Support,
}

impl Level {
    pub fn rank(self) -> u8 {
        match self {
            Level::Executive => 4,
            Level::Management => 3,
            Level::Operations => 2,
            Level::Support => 1,
        }
    }
}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Which records a role holder may see.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataAccess {
    All,
    Department,
    Team,
    Own,
}

/// Allowed clock-time window, evaluated on the timestamp handed in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub days: Vec<Weekday>,
}

impl TimeWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let time = at.time();
        self.days.contains(&at.weekday()) && self.start <= time && time < self.end
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restrictions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_access: Option<DataAccess>,
    /// Largest amount, in whole currency units, a holder may approve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial_limit: Option<u64>,
    #[serde(default)]
    pub approval_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_restrictions: Option<TimeWindow>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub department_id: DepartmentId,
    pub level: Level,
    /// The complete capability set of the role. Nothing is inherited from
    /// `level`.
    pub permissions: Vec<Permission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Restrictions>,
}

impl Role {
    pub fn permission(&self, id: &PermissionId) -> Option<&Permission> {
        self.permissions.iter().find(|permission| &permission.id == id)
    }

    pub fn data_access(&self) -> Option<DataAccess> {
        self.restrictions.as_ref().and_then(|r| r.data_access)
    }
}
