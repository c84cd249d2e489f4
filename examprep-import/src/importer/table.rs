//! The fixed set of importable tables

use serde_json::Value;
use std::fmt;

/// Tables accepted by the importer
///
/// Declaration order is processing order: every table comes after the
/// tables its rows reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImportTable {
    Permissions,
    RolePermissions,
    UserRoles,
    UserAchievements,
    Profiles,
}

impl ImportTable {
    /// All tables in processing order
    pub const ORDER: [ImportTable; 5] = [
        ImportTable::Permissions,
        ImportTable::RolePermissions,
        ImportTable::UserRoles,
        ImportTable::UserAchievements,
        ImportTable::Profiles,
    ];

    /// Table name as it appears in payloads and in the database
    pub fn name(self) -> &'static str {
        match self {
            ImportTable::Permissions => "permissions",
            ImportTable::RolePermissions => "role_permissions",
            ImportTable::UserRoles => "user_roles",
            ImportTable::UserAchievements => "user_achievements",
            ImportTable::Profiles => "profiles",
        }
    }

    /// Look up a table by its payload name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|table| table.name() == name)
    }

    /// Column used as the upsert conflict target
    pub fn conflict_column(self) -> &'static str {
        "id"
    }

    /// Row field that identifies a row to a human reading error messages
    pub fn natural_key_field(self) -> &'static str {
        match self {
            ImportTable::Permissions => "name",
            ImportTable::Profiles => "email",
            _ => "id",
        }
    }

    /// Label prefixed to per-row error messages
    pub fn label(self) -> &'static str {
        match self {
            ImportTable::Permissions => "Permission",
            ImportTable::RolePermissions => "Role permission",
            ImportTable::UserRoles => "User role",
            ImportTable::UserAchievements => "User achievement",
            ImportTable::Profiles => "Profile",
        }
    }

    /// Natural key of `row`, falling back to its `id`
    pub fn natural_key(self, row: &Value) -> String {
        [self.natural_key_field(), self.conflict_column()]
            .into_iter()
            .find_map(|field| match row.get(field) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => Some(other.to_string()),
            })
            .unwrap_or_else(|| "<unknown>".to_string())
    }
}

impl fmt::Display for ImportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
