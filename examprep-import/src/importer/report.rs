//! Import outcome reporting

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use super::{ImportTable, RowError};

/// Outcome of importing one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    /// Rows upserted successfully
    pub inserted: u64,
    /// One message per failed row, in input order
    pub errors: Vec<String>,
}

impl TableOutcome {
    /// Fold per-row results into counts and messages
    pub fn from_results(results: impl IntoIterator<Item = Result<(), RowError>>) -> Self {
        results
            .into_iter()
            .fold(Self::default(), |mut outcome, result| {
                match result {
                    Ok(()) => outcome.inserted += 1,
                    Err(err) => outcome.errors.push(err.to_string()),
                }
                outcome
            })
    }
}

/// Per-table outcomes, serialized as a JSON object in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableResults(Vec<(ImportTable, TableOutcome)>);

impl TableResults {
    pub fn get(&self, table: ImportTable) -> Option<&TableOutcome> {
        self.0
            .iter()
            .find(|(t, _)| *t == table)
            .map(|(_, outcome)| outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ImportTable, &TableOutcome)> {
        self.0.iter().map(|(table, outcome)| (*table, outcome))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for TableResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (table, outcome) in &self.0 {
            map.serialize_entry(table.name(), outcome)?;
        }
        map.end()
    }
}

/// Inserted counts for every known table, zero when the table was absent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub permissions: u64,
    pub role_permissions: u64,
    pub user_roles: u64,
    pub user_achievements: u64,
    pub profiles: u64,
}

impl ImportSummary {
    fn slot(&mut self, table: ImportTable) -> &mut u64 {
        match table {
            ImportTable::Permissions => &mut self.permissions,
            ImportTable::RolePermissions => &mut self.role_permissions,
            ImportTable::UserRoles => &mut self.user_roles,
            ImportTable::UserAchievements => &mut self.user_achievements,
            ImportTable::Profiles => &mut self.profiles,
        }
    }
}

/// Complete result of one import call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub success: bool,
    pub results: TableResults,
    pub summary: ImportSummary,
}

impl Default for ImportReport {
    fn default() -> Self {
        Self {
            success: true,
            results: TableResults::default(),
            summary: ImportSummary::default(),
        }
    }
}

impl ImportReport {
    /// Record the outcome of a processed table
    pub fn record(&mut self, table: ImportTable, outcome: TableOutcome) {
        *self.summary.slot(table) = outcome.inserted;
        self.results.0.push((table, outcome));
    }

    pub fn total_inserted(&self) -> u64 {
        self.results.iter().map(|(_, o)| o.inserted).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.results.iter().map(|(_, o)| o.errors.len()).sum()
    }
}
