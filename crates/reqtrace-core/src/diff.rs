//! Requirement set comparison against a baseline

use crate::model::Requirement;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What changed on a requirement present on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangedField {
    Title,
    Satisfies,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: ChangedField,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedRequirement {
    pub id: String,
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementDiff {
    pub added: Vec<Requirement>,
    pub removed: Vec<Requirement>,
    pub modified: Vec<ModifiedRequirement>,
    pub unchanged: Vec<String>,
}

fn field_changes(before: &Requirement, after: &Requirement) -> Vec<FieldChange> {
    let sides = [
        (ChangedField::Title, before.title.clone(), after.title.clone()),
        (
            ChangedField::Satisfies,
            before.satisfies.join(", "),
            after.satisfies.join(", "),
        ),
        (
            ChangedField::Status,
            before.status.clone().unwrap_or_default(),
            after.status.clone().unwrap_or_default(),
        ),
    ];
    sides
        .into_iter()
        .filter(|(_, b, a)| b != a)
        .map(|(field, before, after)| FieldChange { field, before, after })
        .collect()
}

impl RequirementDiff {
    /// Compare by id. Source locations do not count as a change.
    pub fn compute(current: &[Requirement], baseline: &[Requirement]) -> Self {
        let current: BTreeMap<&str, &Requirement> =
            current.iter().map(|r| (r.id.as_str(), r)).collect();
        let baseline: BTreeMap<&str, &Requirement> =
            baseline.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut diff = RequirementDiff::default();
        for (id, req) in &current {
            match baseline.get(id) {
                None => diff.added.push((*req).clone()),
                Some(old) => {
                    let changes = field_changes(old, req);
                    if changes.is_empty() {
                        diff.unchanged.push(id.to_string());
                    } else {
                        diff.modified.push(ModifiedRequirement {
                            id: id.to_string(),
                            changes,
                        });
                    }
                }
            }
        }
        diff.removed = baseline
            .iter()
            .filter(|(id, _)| !current.contains_key(*id))
            .map(|(_, req)| (*req).clone())
            .collect();
        diff
    }

    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty())
    }

    /// Requirements on the current side.
    pub fn total(&self) -> usize {
        self.added.len() + self.modified.len() + self.unchanged.len()
    }
}
