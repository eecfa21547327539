//! Spec clause → requirement mapping

use crate::classify::ClassificationTable;
use crate::gaps::percent;
use crate::link::TraceGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A requirement claiming to satisfy a clause nobody declared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvalidSpecLink {
    pub requirement: String,
    pub spec: String,
}

/// How many clauses of one spec document are mapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    pub file: String,
    pub mapped: Vec<String>,
    pub unmapped: Vec<String>,
}

impl FileCoverage {
    pub fn total(&self) -> usize {
        self.mapped.len() + self.unmapped.len()
    }

    pub fn coverage(&self) -> f64 {
        percent(self.mapped.len(), self.total())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecMapping {
    pub spec_clauses: usize,
    pub requirements: usize,
    /// Requirements expected to trace to a clause
    pub spec_derived: usize,
    /// Requirements of exempt categories
    pub implementation_derived: usize,
    /// Every satisfied clause id (known or not) → requirements claiming it
    pub spec_to_requirements: BTreeMap<String, Vec<String>>,
    /// Known clauses with at least one requirement
    pub mapped: BTreeSet<String>,
    /// Known clauses no requirement claims
    pub unmapped: BTreeSet<String>,
    /// Spec-derived requirements without any satisfies link
    pub missing_spec_links: Vec<String>,
    pub invalid_links: Vec<InvalidSpecLink>,
    pub by_file: Vec<FileCoverage>,
}

impl SpecMapping {
    pub fn analyze(graph: &TraceGraph, table: &ClassificationTable) -> Self {
        let known = graph.spec_clause_ids();
        let mut mapping = SpecMapping {
            spec_clauses: known.len(),
            requirements: graph.requirements.len(),
            ..SpecMapping::default()
        };

        for (req, specs) in graph.satisfies_map() {
            for spec in specs {
                mapping
                    .spec_to_requirements
                    .entry(spec.clone())
                    .or_default()
                    .push(req.to_string());
                if known.contains(spec.as_str()) {
                    mapping.mapped.insert(spec.clone());
                } else {
                    mapping.invalid_links.push(InvalidSpecLink {
                        requirement: req.to_string(),
                        spec: spec.clone(),
                    });
                }
            }
        }
        mapping.unmapped = known
            .iter()
            .filter(|id| !mapping.mapped.contains(**id))
            .map(|id| id.to_string())
            .collect();

        for req in &graph.requirements {
            if table.is_exempt(&req.category) {
                mapping.implementation_derived += 1;
            } else {
                mapping.spec_derived += 1;
                if !req.has_spec_link() {
                    mapping.missing_spec_links.push(req.id().to_string());
                }
            }
        }

        let mut files: BTreeMap<String, FileCoverage> = BTreeMap::new();
        for clause in &graph.spec_clauses {
            let file = clause
                .source_file
                .as_ref()
                .map(|f| f.display().to_string().replace('\\', "/"))
                .unwrap_or_else(|| "unknown".to_string());
            let entry = files.entry(file.clone()).or_insert_with(|| FileCoverage {
                file,
                mapped: Vec::new(),
                unmapped: Vec::new(),
            });
            if mapping.mapped.contains(&clause.id) {
                entry.mapped.push(clause.id.clone());
            } else {
                entry.unmapped.push(clause.id.clone());
            }
        }
        mapping.by_file = files.into_values().collect();

        mapping
    }

    /// Share of known clauses at least one requirement satisfies.
    pub fn coverage(&self) -> f64 {
        percent(self.mapped.len(), self.spec_clauses)
    }

    /// No invalid links and no spec-derived requirement without a link.
    pub fn is_clean(&self) -> bool {
        self.invalid_links.is_empty() && self.missing_spec_links.is_empty()
    }
}
