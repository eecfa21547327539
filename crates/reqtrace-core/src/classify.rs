//! Requirement classification by identifier shape
//!
//! Category and priority are a pure function of the requirement id and a
//! [`ClassificationTable`]. The table is data: an ordered list of
//! [`CategoryRule`]s (first match wins), per-category [`PriorityRule`]s and
//! the set of categories exempt from needing a spec link. The default table
//! is [`ClassificationTable::default`]; a config file can replace it.

use crate::ids::normalize_req_id;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// A requirement category name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(Cow<'static, str>);

impl Category {
    pub const ERROR_HANDLING: Category = Category(Cow::Borrowed("error_handling"));
    pub const ARCHITECTURAL: Category = Category(Cow::Borrowed("architectural"));
    pub const PLUGIN: Category = Category(Cow::Borrowed("plugin"));
    pub const TRANSPORT: Category = Category(Cow::Borrowed("transport"));
    pub const MESSAGE: Category = Category(Cow::Borrowed("message"));
    pub const SERIALIZATION: Category = Category(Cow::Borrowed("serialization"));
    pub const SERVICE_DISCOVERY: Category = Category(Cow::Borrowed("service_discovery"));
    pub const TRANSPORT_PROTOCOL: Category = Category(Cow::Borrowed("transport_protocol"));
    pub const OTHER: Category = Category(Cow::Borrowed("other"));

    pub fn new(name: impl Into<String>) -> Self {
        Category(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Priority tier. Orders from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the ordered category table.
///
/// A rule matches when every condition it sets holds; a rule that sets none
/// matches everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// The id must start with this prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// The id must contain at least one of these substrings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contains: Vec<String>,
    pub category: Category,
}

impl CategoryRule {
    pub fn prefix(prefix: &str, category: Category) -> Self {
        Self {
            prefix: Some(normalize_req_id(prefix)),
            contains: Vec::new(),
            category,
        }
    }

    pub fn contains(needles: &[&str], category: Category) -> Self {
        Self {
            prefix: None,
            contains: needles.iter().map(|n| normalize_req_id(n)).collect(),
            category,
        }
    }

    /// Byte length of the matched prefix when the rule matches `id`.
    fn matches(&self, id: &str) -> Option<usize> {
        let prefix_len = match &self.prefix {
            Some(prefix) if id.starts_with(&normalize_req_id(prefix)) => prefix.len(),
            Some(_) => return None,
            None => 0,
        };
        if !self.contains.is_empty()
            && !self
                .contains
                .iter()
                .any(|needle| id.contains(&normalize_req_id(needle)))
        {
            return None;
        }
        Some(prefix_len)
    }
}

/// An inclusive upper bound on the numeric suffix and the priority it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityBand {
    pub max: u32,
    pub priority: Priority,
}

/// How a category's priority is decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityRule {
    /// Used when there are no bands or the id has no numeric suffix
    pub default: Priority,
    /// Checked in order; the first band whose `max` is not exceeded wins
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bands: Vec<PriorityBand>,
    /// Used when the suffix exceeds every band
    #[serde(default = "default_beyond")]
    pub beyond: Priority,
}

fn default_beyond() -> Priority {
    Priority::Low
}

impl PriorityRule {
    pub fn fixed(priority: Priority) -> Self {
        Self {
            default: priority,
            bands: Vec::new(),
            beyond: Priority::Low,
        }
    }

    pub fn banded(default: Priority, bands: &[(u32, Priority)], beyond: Priority) -> Self {
        Self {
            default,
            bands: bands
                .iter()
                .map(|&(max, priority)| PriorityBand { max, priority })
                .collect(),
            beyond,
        }
    }

    fn priority_for(&self, suffix: Option<u32>) -> Priority {
        if self.bands.is_empty() {
            return self.default;
        }
        let Some(n) = suffix else {
            return self.default;
        };
        self.bands
            .iter()
            .find(|band| n <= band.max)
            .map(|band| band.priority)
            .unwrap_or(self.beyond)
    }
}

/// The outcome of classifying one id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub priority: Priority,
}

/// Rules, priority policies and exemptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationTable {
    /// Evaluated in order; the first matching rule decides the category
    pub rules: Vec<CategoryRule>,
    /// Category for ids no rule matches
    pub fallback: Category,
    /// Per-category priority policy
    pub priorities: BTreeMap<Category, PriorityRule>,
    /// Priority for categories with no policy
    pub default_priority: Priority,
    /// Categories whose requirements need no spec link
    pub exempt: Vec<Category>,
}

impl Default for ClassificationTable {
    fn default() -> Self {
        use Priority::*;

        let rules = vec![
            CategoryRule::contains(&["_E0", "_E1"], Category::ERROR_HANDLING),
            CategoryRule::prefix("REQ_ARCH_", Category::ARCHITECTURAL),
            CategoryRule::prefix("REQ_E2E_PLUGIN_", Category::PLUGIN),
            CategoryRule::prefix("REQ_TRANSPORT_", Category::TRANSPORT),
            CategoryRule::prefix("REQ_MSG_", Category::MESSAGE),
            CategoryRule::prefix("REQ_SER_", Category::SERIALIZATION),
            CategoryRule::prefix("REQ_SD_", Category::SERVICE_DISCOVERY),
            CategoryRule::prefix("REQ_TP_", Category::TRANSPORT_PROTOCOL),
        ];

        let priorities = BTreeMap::from([
            (Category::ERROR_HANDLING, PriorityRule::fixed(Low)),
            (Category::ARCHITECTURAL, PriorityRule::fixed(High)),
            (Category::PLUGIN, PriorityRule::fixed(High)),
            (Category::TRANSPORT, PriorityRule::fixed(Medium)),
            (
                Category::MESSAGE,
                PriorityRule::banded(Critical, &[(20, Critical), (60, High), (90, Medium)], Low),
            ),
            (
                Category::SERIALIZATION,
                PriorityRule::banded(Critical, &[(10, Critical), (30, High), (60, Medium)], Low),
            ),
            (Category::SERVICE_DISCOVERY, PriorityRule::fixed(Medium)),
            (
                Category::TRANSPORT_PROTOCOL,
                PriorityRule::banded(Medium, &[(10, Critical), (30, High), (60, Medium)], Low),
            ),
            (Category::OTHER, PriorityRule::fixed(Medium)),
        ]);

        Self {
            rules,
            fallback: Category::OTHER,
            priorities,
            default_priority: Medium,
            exempt: vec![
                Category::ERROR_HANDLING,
                Category::ARCHITECTURAL,
                Category::PLUGIN,
            ],
        }
    }
}

/// First `_`-separated token after `prefix_len` that is entirely digits.
fn numeric_suffix(id: &str, prefix_len: usize) -> Option<u32> {
    id.get(prefix_len..)?
        .split('_')
        .find(|token| !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
        .and_then(|token| token.parse().ok())
}

impl ClassificationTable {
    /// Classify a requirement id. Deterministic in `id` and `self`.
    pub fn classify(&self, id: &str) -> Classification {
        let id = normalize_req_id(id);
        let (category, prefix_len) = self
            .rules
            .iter()
            .find_map(|rule| rule.matches(&id).map(|len| (rule.category.clone(), len)))
            .unwrap_or_else(|| (self.fallback.clone(), 0));

        let priority = match self.priorities.get(&category) {
            Some(rule) => rule.priority_for(numeric_suffix(&id, prefix_len)),
            None => self.default_priority,
        };

        Classification { category, priority }
    }

    pub fn is_exempt(&self, category: &Category) -> bool {
        self.exempt.contains(category)
    }

    /// Every category this table can produce, in rule order then fallback.
    pub fn categories(&self) -> Vec<Category> {
        let mut out: Vec<Category> = Vec::new();
        for category in self
            .rules
            .iter()
            .map(|r| &r.category)
            .chain(std::iter::once(&self.fallback))
        {
            if !out.contains(category) {
                out.push(category.clone());
            }
        }
        out
    }
}
