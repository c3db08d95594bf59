//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Record store collection that holds synchronized group data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Users,
    Groups,
    GroupMembers,
    Expenses,
    PotActivities,
}

impl Table {
    /// All tables, in the order the adapter syncs a group.
    pub const ALL: [Table; 5] = [
        Table::Users,
        Table::Groups,
        Table::GroupMembers,
        Table::Expenses,
        Table::PotActivities,
    ];

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Groups => "groups",
            Self::GroupMembers => "group_members",
            Self::Expenses => "expenses",
            Self::PotActivities => "pot_activities",
        }
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "users" => Ok(Self::Users),
            "groups" => Ok(Self::Groups),
            "group_members" => Ok(Self::GroupMembers),
            "expenses" => Ok(Self::Expenses),
            "pot_activities" => Ok(Self::PotActivities),
            other => Err(format!("unknown table: {}", other)),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_round_trips_through_str() {
        for table in Table::ALL {
            assert_eq!(table.as_str().parse::<Table>().unwrap(), table);
        }
    }

    #[test]
    fn test_table_from_str_unknown() {
        let err = "ledgers".parse::<Table>().unwrap_err();
        assert!(err.contains("ledgers"));
    }

    #[test]
    fn test_table_serde_matches_as_str() {
        let encoded = serde_json::to_string(&Table::PotActivities).unwrap();
        assert_eq!(encoded, "\"pot_activities\"");
    }
}
