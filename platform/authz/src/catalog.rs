//! The fixed product catalogs: what permissions exist, which departments the
//! company has, and which roles combine them.

use chrono::{NaiveTime, Weekday};
use entity::{
    Action, DataAccess, Department, Level, Permission, Restrictions, Role, TimeWindow,
};

use Action::{Approve, Create, Delete, Export, Read, Update};

fn dashboard() -> Permission {
    Permission::new(
        "dashboard",
        "Dashboard",
        "View dashboards and KPIs",
        "dashboard",
        &[Read, Export],
    )
}

fn lead_management() -> Permission {
    Permission::new(
        "lead_management",
        "Lead Management",
        "Capture, score and assign leads",
        "leads",
        &[Create, Read, Update, Delete, Export],
    )
}

fn property_management() -> Permission {
    Permission::new(
        "property_management",
        "Property Management",
        "Maintain property listings",
        "properties",
        &[Create, Read, Update, Delete],
    )
}

fn deal_management() -> Permission {
    Permission::new(
        "deal_management",
        "Deal Management",
        "Negotiate and close deals",
        "deals",
        &[Create, Read, Update, Delete, Approve],
    )
}

fn document_management() -> Permission {
    Permission::new(
        "document_management",
        "Document Management",
        "Upload and share contracts and files",
        "documents",
        &[Create, Read, Update, Delete, Export],
    )
}

fn marketing() -> Permission {
    Permission::new(
        "marketing",
        "Marketing Campaigns",
        "Plan campaigns and social posts",
        "marketing",
        &[Create, Read, Update, Delete, Approve],
    )
}

fn financial_reports() -> Permission {
    Permission::new(
        "financial_reports",
        "Financial Reports",
        "Revenue, commission and budget reporting",
        "finance",
        &[Read, Export, Approve],
    )
}

fn hr_management() -> Permission {
    Permission::new(
        "hr_management",
        "HR Management",
        "Staff records and performance reviews",
        "hr",
        &[Create, Read, Update, Delete],
    )
}

fn system_admin() -> Permission {
    Permission::new(
        "system_admin",
        "System Administration",
        "Manage users, roles and settings",
        "system",
        &Action::ALL,
    )
}

#[derive(Clone, Debug)]
pub struct PermissionCatalog {
    permissions: Vec<Permission>,
}

impl PermissionCatalog {
    pub fn standard() -> Self {
        Self {
            permissions: vec![
                dashboard(),
                lead_management(),
                property_management(),
                deal_management(),
                document_management(),
                marketing(),
                financial_reports(),
                hr_management(),
                system_admin(),
            ],
        }
    }

    pub fn get(&self, id: &str) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }
}

#[derive(Clone, Debug)]
pub struct DepartmentCatalog {
    departments: Vec<Department>,
}

fn department(id: &str, name: &str, description: &str, head: &str, budget: Option<u64>) -> Department {
    Department {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        head: head.into(),
        budget,
    }
}

impl DepartmentCatalog {
    pub fn standard() -> Self {
        let departments = vec![
            department(
                "executive",
                "Executive",
                "Company leadership",
                "Chief Executive Officer",
                None,
            ),
            department(
                "sales",
                "Sales",
                "Residential and commercial sales teams",
                "Sales Director",
                Some(5_000_000),
            ),
            department(
                "marketing",
                "Marketing",
                "Brand, campaigns and lead generation",
                "Marketing Director",
                Some(1_500_000),
            ),
            department(
                "finance",
                "Finance",
                "Accounting, commissions and budgeting",
                "Chief Financial Officer",
                Some(2_000_000),
            ),
            department(
                "operations",
                "Operations",
                "Transactions, closings and property operations",
                "Operations Manager",
                Some(1_000_000),
            ),
            department(
                "customer_support",
                "Customer Support",
                "Client enquiries and after-sales care",
                "Support Lead",
                Some(250_000),
            ),
        ];
        Self { departments }
    }

    pub fn get(&self, id: &str) -> Option<&Department> {
        self.departments.iter().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Department> {
        self.departments.iter()
    }
}

#[derive(Clone, Debug)]
pub struct RoleCatalog {
    roles: Vec<Role>,
}

impl RoleCatalog {
    pub fn standard() -> Self {
        let office_hours = NaiveTime::from_hms_opt(8, 0, 0)
            .zip(NaiveTime::from_hms_opt(18, 0, 0))
            .map(|(start, end)| TimeWindow {
                start,
                end,
                days: vec![
                    Weekday::Mon,
                    Weekday::Tue,
                    Weekday::Wed,
                    Weekday::Thu,
                    Weekday::Fri,
                ],
            });

        let roles = vec![
            Role {
                id: "ceo".into(),
                name: "Chief Executive Officer".into(),
                description: "Full access across every module".into(),
                department_id: "executive".into(),
                level: Level::Executive,
                permissions: PermissionCatalog::standard().permissions,
                restrictions: Some(Restrictions {
                    data_access: Some(DataAccess::All),
                    ..Restrictions::default()
                }),
            },
            Role {
                id: "sales_manager".into(),
                name: "Sales Manager".into(),
                description: "Runs a sales team and approves its deals".into(),
                department_id: "sales".into(),
                level: Level::Management,
                permissions: vec![
                    dashboard(),
                    lead_management(),
                    property_management(),
                    deal_management(),
                    document_management(),
                    financial_reports().narrowed(&[Read, Export]),
                ],
                restrictions: Some(Restrictions {
                    data_access: Some(DataAccess::Team),
                    financial_limit: Some(500_000),
                    ..Restrictions::default()
                }),
            },
            Role {
                id: "sales_agent".into(),
                name: "Sales Agent".into(),
                description: "Works their own leads and deals".into(),
                department_id: "sales".into(),
                level: Level::Operations,
                permissions: vec![
                    dashboard().narrowed(&[Read]),
                    lead_management().narrowed(&[Create, Read, Update]),
                    property_management().narrowed(&[Read]),
                    deal_management().narrowed(&[Create, Read, Update]),
                    document_management().narrowed(&[Create, Read]),
                ],
                restrictions: Some(Restrictions {
                    data_access: Some(DataAccess::Own),
                    financial_limit: Some(50_000),
                    approval_required: true,
                    ..Restrictions::default()
                }),
            },
            Role {
                id: "marketing_manager".into(),
                name: "Marketing Manager".into(),
                description: "Owns campaigns and marketing spend".into(),
                department_id: "marketing".into(),
                level: Level::Management,
                permissions: vec![
                    dashboard(),
                    marketing(),
                    lead_management().narrowed(&[Read, Export]),
                    document_management(),
                ],
                restrictions: Some(Restrictions {
                    data_access: Some(DataAccess::Department),
                    financial_limit: Some(100_000),
                    ..Restrictions::default()
                }),
            },
            Role {
                id: "finance_officer".into(),
                name: "Finance Officer".into(),
                description: "Reports on revenue and signs off payments".into(),
                department_id: "finance".into(),
                level: Level::Operations,
                permissions: vec![
                    dashboard(),
                    financial_reports(),
                    deal_management().narrowed(&[Read, Approve]),
                    document_management().narrowed(&[Read, Export]),
                ],
                restrictions: Some(Restrictions {
                    data_access: Some(DataAccess::Department),
                    financial_limit: Some(250_000),
                    approval_required: true,
                    ..Restrictions::default()
                }),
            },
            Role {
                id: "support_agent".into(),
                name: "Support Agent".into(),
                description: "Answers client enquiries during office hours".into(),
                department_id: "customer_support".into(),
                level: Level::Support,
                permissions: vec![
                    dashboard().narrowed(&[Read]),
                    lead_management().narrowed(&[Read, Update]),
                    document_management().narrowed(&[Read]),
                ],
                restrictions: Some(Restrictions {
                    data_access: Some(DataAccess::Own),
                    approval_required: true,
                    time_restrictions: office_hours,
                    ..Restrictions::default()
                }),
            },
        ];
        Self { roles }
    }

    pub fn get(&self, id: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    /// Add a role or replace the definition with the same id.
    pub fn insert(&mut self, role: Role) {
        match self.roles.iter_mut().find(|r| r.id == role.id) {
            Some(existing) => *existing = role,
            None => self.roles.push(role),
        }
    }
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_belongs_to_a_known_department() {
        let departments = DepartmentCatalog::standard();
        for role in RoleCatalog::standard().iter() {
            assert!(
                departments.get(role.department_id.as_str()).is_some(),
                "role {} has unknown department",
                role.id
            );
        }
    }

    #[test]
    fn role_permissions_are_subsets_of_the_catalog() {
        let permissions = PermissionCatalog::standard();
        for role in RoleCatalog::standard().iter() {
            for held in &role.permissions {
                let defined = permissions.get(held.id.as_str()).unwrap();
                assert!(held.actions.is_subset(&defined.actions), "{} / {}", role.id, held.id);
            }
        }
    }

    #[test]
    fn only_the_ceo_administers_the_system() {
        let admins: Vec<_> = RoleCatalog::standard()
            .iter()
            .filter(|r| r.permission(&"system_admin".into()).is_some())
            .map(|r| r.id.to_string())
            .collect();
        assert_eq!(admins, vec!["ceo".to_string()]);
    }

    #[test]
    fn insert_replaces_by_id() {
        let mut roles = RoleCatalog::standard();
        let mut agent = roles.get("sales_agent").unwrap().clone();
        agent.permissions.clear();
        let before = roles.iter().count();
        roles.insert(agent);
        assert_eq!(roles.iter().count(), before);
        assert!(roles.get("sales_agent").unwrap().permissions.is_empty());
    }
}
