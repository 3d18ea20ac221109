use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a field's merged value is chosen across a duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// First value containing '@', else the first non-empty value.
    PreferEmail,
    /// Union of option names across every member.
    UnionOptions,
    /// Keep the survivor's value unless it is empty, then take the
    /// first non-empty value in group order.
    FillIfEmpty,
}

/// Field-name-keyed strategy table. Fields without an entry merge
/// with [`MergeStrategy::FillIfEmpty`].
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    overrides: BTreeMap<String, MergeStrategy>,
}

impl PolicyTable {
    pub fn new(overrides: BTreeMap<String, MergeStrategy>) -> Self {
        PolicyTable { overrides }
    }

    pub fn strategy_for(&self, field: &str) -> MergeStrategy {
        self.overrides
            .get(field)
            .copied()
            .unwrap_or(MergeStrategy::FillIfEmpty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlisted_fields_fill_if_empty() {
        let table = PolicyTable::default();
        assert_eq!(table.strategy_for("Town"), MergeStrategy::FillIfEmpty);
    }

    #[test]
    fn overrides_take_precedence() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Primary Contact".to_string(), MergeStrategy::PreferEmail);
        let table = PolicyTable::new(overrides);
        assert_eq!(
            table.strategy_for("Primary Contact"),
            MergeStrategy::PreferEmail
        );
        assert_eq!(table.strategy_for("Province"), MergeStrategy::FillIfEmpty);
    }

    #[test]
    fn strategies_use_snake_case_names() {
        let strategy: MergeStrategy = serde_json::from_str(r#""union_options""#).unwrap();
        assert_eq!(strategy, MergeStrategy::UnionOptions);
    }
}
