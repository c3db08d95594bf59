//! Domain Entities - Records owned by the record store
//!
//! These are the shapes of the group data the sync engine carries around.
//! Business rules for them live in the record store, not here.

use serde::{Deserialize, Serialize};

/// A person using the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A group of people sharing expenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    /// ISO 4217 currency code
    pub currency: String,
    pub created_by: String,
}

/// Membership of a user in a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    #[serde(default)]
    pub role: MemberRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    #[default]
    Member,
}

/// An expense paid by one member and split among others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub group_id: String,
    pub description: String,
    /// Amount in minor currency units
    pub amount_cents: i64,
    pub paid_by: String,
    #[serde(default)]
    pub split_between: Vec<String>,
}

/// A contribution to or withdrawal from a group's shared pot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotActivity {
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    pub kind: PotActivityKind,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PotActivityKind {
    Contribution,
    Expense,
    Withdrawal,
}
