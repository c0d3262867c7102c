//! Defensive normalization of catalog payloads
//!
//! Remote and older nodes send partial or loosely typed data. These helpers
//! coerce it into the strict shapes the rest of the crate relies on; they
//! never fail.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::types::{CatalogNodeScope, CatalogNodeStatus};

/// Keep only string entries of an array; anything else becomes empty
#[must_use]
pub fn normalize_name_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

/// Coerce a count to a non-negative integer; non-numeric or non-finite is 0
#[must_use]
pub fn normalize_count(value: &Value) -> u32 {
    let Some(n) = value.as_f64() else {
        return 0;
    };
    if !n.is_finite() || n <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = n.min(f64::from(u32::MAX)).trunc() as u32;
    count
}

/// Map a status string onto the known set; unknown values are `degraded`
#[must_use]
pub fn normalize_status(value: &Value) -> CatalogNodeStatus {
    match value.as_str().map(str::to_ascii_lowercase).as_deref() {
        Some("ready") => CatalogNodeStatus::Ready,
        Some("unreachable") => CatalogNodeStatus::Unreachable,
        _ => CatalogNodeStatus::Degraded,
    }
}

/// Serde adapter for [`normalize_name_list`]
///
/// # Errors
///
/// Only fails if the input is not valid JSON at all
pub fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Value::deserialize(deserializer).map(|v| normalize_name_list(&v))
}

/// Serde adapter for [`normalize_count`]
///
/// # Errors
///
/// Only fails if the input is not valid JSON at all
pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Value::deserialize(deserializer).map(|v| normalize_count(&v))
}

/// Serde adapter for [`normalize_status`]
///
/// # Errors
///
/// Only fails if the input is not valid JSON at all
pub fn status<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<CatalogNodeStatus, D::Error> {
    Value::deserialize(deserializer).map(|v| normalize_status(&v))
}

/// Serde adapter turning `null` or non-strings into an empty string
///
/// # Errors
///
/// Only fails if the input is not valid JSON at all
pub fn string_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Value::deserialize(deserializer).map(|v| match v {
        Value::String(s) => s,
        _ => String::new(),
    })
}

/// Serde adapter for lists of records: non-arrays become empty, entries that
/// do not parse are dropped
///
/// # Errors
///
/// Only fails if the input is not valid JSON at all
pub fn lenient_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed catalog entry");
                None
            }
        })
        .collect())
}

/// Fill gaps a scope's own data cannot express and drop duplicate identities
///
/// Entries without a `homeNodeId` belong to the scope's node. Within a scope
/// each `(homeNodeId, definitionId)` appears once per kind; the first wins.
#[must_use]
pub fn normalize_scope(mut scope: CatalogNodeScope) -> CatalogNodeScope {
    for agent in &mut scope.agents {
        if agent.home_node_id.trim().is_empty() {
            agent.home_node_id.clone_from(&scope.node_id);
        }
    }
    for team in &mut scope.teams {
        if team.home_node_id.trim().is_empty() {
            team.home_node_id.clone_from(&scope.node_id);
        }
    }

    let mut seen = HashSet::new();
    scope
        .agents
        .retain(|a| seen.insert((a.home_node_id.clone(), a.definition_id.clone())));
    let mut seen = HashSet::new();
    scope
        .teams
        .retain(|t| seen.insert((t.home_node_id.clone(), t.definition_id.clone())));

    if scope.node_name.trim().is_empty() {
        scope.node_name.clone_from(&scope.node_id);
    }
    scope
}
