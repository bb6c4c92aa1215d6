//! ---
//! chapel_section: "06-security-access-control"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Role table, permission resolution, and identity collaborators."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

/// Capabilities gating staff actions in the app.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    /// Wildcard: satisfies every permission check.
    FullAccess,
    /// Edit member profiles and roles.
    ManageMembers,
    /// Browse the member directory.
    ViewMemberDirectory,
    /// Create and edit events.
    ManageEvents,
    /// Publish sermons.
    ManageSermons,
    /// Moderate prayer requests.
    ManagePrayerRequests,
    /// Manage life groups and their rosters.
    ManageLifeGroups,
    /// See donation history and totals.
    ViewDonations,
    /// Send push notifications to the congregation.
    SendNotifications,
    /// Create and edit Sunday School classes.
    ManageSundaySchoolClasses,
    /// Check children in and out.
    TakeKidsAttendance,
    /// View Sunday School attendance reports.
    ViewKidsAttendanceReports,
    /// Register children and their guardians.
    RegisterChildren,
}

impl Permission {
    /// True for the wildcard permission.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Permission::FullAccess)
    }
}

/// Identity classification. Exactly one per user; `Member` when absent.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Role {
    /// Senior staff with full access.
    Pastor,
    /// Church office administration.
    Admin,
    /// Runs the children's ministry.
    SundaySchoolHead,
    /// Volunteer without elevated permissions.
    Volunteer,
    /// Regular congregation member.
    #[default]
    Member,
}

const PASTOR_PERMISSIONS: &[Permission] = &[Permission::FullAccess];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ManageMembers,
    Permission::ViewMemberDirectory,
    Permission::ManageEvents,
    Permission::ManageSermons,
    Permission::ManagePrayerRequests,
    Permission::ManageLifeGroups,
    Permission::ViewDonations,
    Permission::SendNotifications,
];

const SUNDAY_SCHOOL_HEAD_PERMISSIONS: &[Permission] = &[
    Permission::ManageSundaySchoolClasses,
    Permission::TakeKidsAttendance,
    Permission::ViewKidsAttendanceReports,
    Permission::RegisterChildren,
];

/// Role table lookup.
pub fn permissions_for(role: Role) -> &'static [Permission] {
    role.permissions()
}

/// Table-level grant test used by every resolver query.
pub fn role_grants(role: Role, permission: Permission) -> bool {
    role.grants(permission)
}

impl Role {
    /// Ordered permission set from the static role table.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Pastor => PASTOR_PERMISSIONS,
            Role::Admin => ADMIN_PERMISSIONS,
            Role::SundaySchoolHead => SUNDAY_SCHOOL_HEAD_PERMISSIONS,
            Role::Volunteer | Role::Member => &[],
        }
    }

    /// Whether the role's set holds `full_access`.
    pub fn has_full_access(&self) -> bool {
        self.permissions().iter().any(Permission::is_wildcard)
    }

    /// `full_access` or an exact match.
    pub fn grants(&self, permission: Permission) -> bool {
        self.has_full_access() || self.permissions().contains(&permission)
    }

    /// `full_access` or a non-empty intersection with `permissions`.
    pub fn grants_any(&self, permissions: &[Permission]) -> bool {
        self.has_full_access() || permissions.iter().any(|p| self.permissions().contains(p))
    }

    /// `full_access` or a superset of `permissions`. Vacuously true for `[]`.
    pub fn grants_all(&self, permissions: &[Permission]) -> bool {
        self.has_full_access() || permissions.iter().all(|p| self.permissions().contains(p))
    }

    /// Whether the role carries any permission at all.
    pub fn is_staff(&self) -> bool {
        !self.permissions().is_empty()
    }

    /// Label shown in the app.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Pastor => "Pastor",
            Role::Admin => "Admin",
            Role::SundaySchoolHead => "Sunday School Head",
            Role::Volunteer => "Volunteer",
            Role::Member => "Member",
        }
    }

    /// Classify a raw role string read from a profile record.
    pub fn parse_stored(raw: &str) -> StoredRole {
        raw.parse::<Role>()
            .map(StoredRole::Known)
            .unwrap_or_else(|_| StoredRole::Unknown(raw.to_owned()))
    }
}

/// Role value as found in storage, validated against the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StoredRole {
    /// One of the enumerated roles.
    Known(Role),
    /// Anything else. Never trusted.
    Unknown(String),
}

impl StoredRole {
    /// Role to evaluate checks against; unknown values fall back to `Member`.
    pub fn effective(&self) -> Role {
        match self {
            StoredRole::Known(role) => *role,
            StoredRole::Unknown(_) => Role::Member,
        }
    }
}

impl From<String> for StoredRole {
    fn from(raw: String) -> Self {
        Role::parse_stored(&raw)
    }
}

impl From<StoredRole> for String {
    fn from(stored: StoredRole) -> Self {
        match stored {
            StoredRole::Known(role) => role.to_string(),
            StoredRole::Unknown(raw) => raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn only_pastor_holds_full_access() {
        for role in Role::iter() {
            assert_eq!(role.grants(Permission::FullAccess), role == Role::Pastor);
        }
    }

    #[test]
    fn sunday_school_head_table_is_exact() {
        assert_eq!(
            Role::SundaySchoolHead.permissions(),
            &[
                Permission::ManageSundaySchoolClasses,
                Permission::TakeKidsAttendance,
                Permission::ViewKidsAttendanceReports,
                Permission::RegisterChildren,
            ]
        );
        assert!(!Role::SundaySchoolHead.grants(Permission::ManageMembers));
    }

    #[test]
    fn empty_queries_follow_set_semantics() {
        for role in Role::iter() {
            assert!(role.grants_all(&[]));
            assert_eq!(role.grants_any(&[]), role.has_full_access());
        }
    }

    #[test]
    fn pastor_wildcard_covers_everything() {
        let all: Vec<Permission> = Permission::iter().collect();
        assert!(Role::Pastor.grants_all(&all));
        assert!(!Role::Admin.grants_all(&all));
        assert!(Role::Admin.grants_any(&all));
    }

    #[test]
    fn volunteer_and_member_have_no_permissions() {
        assert!(permissions_for(Role::Volunteer).is_empty());
        assert!(!role_grants(Role::Member, Permission::ViewMemberDirectory));
        assert!(!Role::Volunteer.is_staff());
        assert!(!Role::Member.is_staff());
        assert!(Role::Admin.is_staff());
    }

    #[test]
    fn identifiers_match_stored_spelling() {
        assert_eq!(Role::SundaySchoolHead.to_string(), "sundaySchoolHead");
        assert_eq!(
            Permission::ViewKidsAttendanceReports.as_ref(),
            "view_kids_attendance_reports"
        );
        assert_eq!(
            "manage_members".parse::<Permission>().unwrap(),
            Permission::ManageMembers
        );
    }

    #[test]
    fn unknown_stored_roles_default_to_member() {
        assert_eq!(Role::parse_stored("admin"), StoredRole::Known(Role::Admin));
        let stored = Role::parse_stored("superuser");
        assert_eq!(stored, StoredRole::Unknown("superuser".into()));
        assert_eq!(stored.effective(), Role::Member);
        assert_eq!(Role::parse_stored("Admin").effective(), Role::Member);
    }
}
