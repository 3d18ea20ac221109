use std::collections::BTreeSet;

use crate::config::Settings;
use crate::record::{ChangeSet, FieldValue, Record};
use crate::resolver::groups::DuplicateGroup;
use crate::resolver::policy::{MergeStrategy, PolicyTable};

/// Union of field names across the input records. The merge iterates
/// this instead of asking the store for a schema; a field empty on
/// every record merges to nothing either way.
pub fn field_names(records: &[Record]) -> Vec<String> {
    let mut names = BTreeSet::new();
    for record in records {
        for name in record.fields.keys() {
            names.insert(name.clone());
        }
    }
    names.into_iter().collect()
}

/// Compute the staged changes for a group's survivor.
///
/// The flag and link fields are exempt from the policy loop and reset
/// unconditionally at the end, so every group stages at least those
/// two fields.
pub fn merge_group(
    group: &DuplicateGroup,
    fields: &[String],
    policies: &PolicyTable,
    settings: &Settings,
) -> ChangeSet {
    let survivor = group.survivor();
    let mut changes = ChangeSet::new();

    for field in fields {
        if *field == settings.flag_field || *field == settings.link_field {
            continue;
        }
        let staged = match policies.strategy_for(field) {
            MergeStrategy::PreferEmail => prefer_email(group, field, survivor),
            MergeStrategy::UnionOptions => union_options(group, field, survivor),
            MergeStrategy::FillIfEmpty => fill_if_empty(group, field, survivor),
        };
        if let Some(value) = staged {
            changes.insert(field.clone(), value);
        }
    }

    changes.insert(
        settings.flag_field.clone(),
        FieldValue::Select(settings.cleared_value.clone()),
    );
    changes.insert(settings.link_field.clone(), FieldValue::Links(Vec::new()));
    changes
}

fn prefer_email(group: &DuplicateGroup, field: &str, survivor: &Record) -> Option<FieldValue> {
    let mut fallback: Option<&str> = None;
    let mut with_email: Option<&str> = None;
    for member in &group.members {
        let Some(text) = member.value(field).and_then(FieldValue::as_text) else {
            continue;
        };
        if text.trim().is_empty() {
            continue;
        }
        if fallback.is_none() {
            fallback = Some(text);
        }
        if text.contains('@') {
            with_email = Some(text);
            break;
        }
    }
    let chosen = with_email.or(fallback)?;
    match survivor.value(field) {
        Some(FieldValue::Text(current)) if current == chosen => None,
        _ => Some(FieldValue::Text(chosen.to_string())),
    }
}

fn union_options(group: &DuplicateGroup, field: &str, survivor: &Record) -> Option<FieldValue> {
    let mut union: Vec<String> = Vec::new();
    for member in &group.members {
        let Some(value) = member.value(field) else {
            continue;
        };
        for name in value.option_names() {
            if !union.iter().any(|n| n == name) {
                union.push(name.clone());
            }
        }
    }
    let current: BTreeSet<&String> = survivor
        .value(field)
        .map(|v| v.option_names().iter().collect())
        .unwrap_or_default();
    let merged: BTreeSet<&String> = union.iter().collect();
    if merged == current {
        return None;
    }
    Some(FieldValue::MultiSelect(union))
}

fn fill_if_empty(group: &DuplicateGroup, field: &str, survivor: &Record) -> Option<FieldValue> {
    if !survivor.is_empty(field) {
        return None;
    }
    group
        .members
        .iter()
        .filter_map(|m| m.value(field))
        .find(|v| !v.is_empty())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::groups::DuplicateGroup;

    fn settings() -> Settings {
        Settings::default()
    }

    fn policies() -> PolicyTable {
        PolicyTable::new(settings().policies)
    }

    fn merge<'a>(members: Vec<&'a Record>, fields: &[&str]) -> ChangeSet {
        let group = DuplicateGroup { members };
        let fields: Vec<String> = fields.iter().map(|s| s.to_string()).collect();
        merge_group(&group, &fields, &policies(), &settings())
    }

    fn text_record(id: &str, field: &str, value: &str) -> Record {
        Record::new(id).with_field(field, FieldValue::Text(value.into()))
    }

    #[test]
    fn contact_prefers_the_first_email() {
        let a = text_record("a", "Primary Contact", "Jane Doe");
        let b = text_record("b", "Primary Contact", "jane@x.com");
        let c = text_record("c", "Primary Contact", "J. Doe");
        let changes = merge(vec![&a, &b, &c], &["Primary Contact"]);
        assert_eq!(
            changes.get("Primary Contact"),
            Some(&FieldValue::Text("jane@x.com".into()))
        );
    }

    #[test]
    fn contact_falls_back_to_the_first_non_empty_value() {
        let a = text_record("a", "Primary Contact", "   ");
        let b = text_record("b", "Primary Contact", "Jane Doe");
        let c = text_record("c", "Primary Contact", "J. Doe");
        let changes = merge(vec![&a, &b, &c], &["Primary Contact"]);
        assert_eq!(
            changes.get("Primary Contact"),
            Some(&FieldValue::Text("Jane Doe".into()))
        );
    }

    #[test]
    fn contact_unchanged_when_survivor_already_holds_the_winner() {
        let a = text_record("a", "Primary Contact", "jane@x.com");
        let b = text_record("b", "Primary Contact", "Jane Doe");
        let changes = merge(vec![&a, &b], &["Primary Contact"]);
        assert!(!changes.contains_key("Primary Contact"));
    }

    #[test]
    fn mandates_union_all_options() {
        let a = Record::new("a").with_field(
            "Scouting Mandates",
            FieldValue::MultiSelect(vec!["A".into(), "B".into()]),
        );
        let b = Record::new("b").with_field(
            "Scouting Mandates",
            FieldValue::MultiSelect(vec!["B".into(), "C".into()]),
        );
        let c = Record::new("c").with_field("Scouting Mandates", FieldValue::MultiSelect(vec![]));
        let changes = merge(vec![&a, &b, &c], &["Scouting Mandates"]);
        assert_eq!(
            changes.get("Scouting Mandates"),
            Some(&FieldValue::MultiSelect(vec![
                "A".into(),
                "B".into(),
                "C".into()
            ]))
        );
    }

    #[test]
    fn mandates_compare_as_sets() {
        // Same options in a different order must not stage an update.
        let a = Record::new("a").with_field(
            "Scouting Mandates",
            FieldValue::MultiSelect(vec!["B".into(), "A".into()]),
        );
        let b = Record::new("b").with_field(
            "Scouting Mandates",
            FieldValue::MultiSelect(vec!["A".into(), "B".into()]),
        );
        let changes = merge(vec![&a, &b], &["Scouting Mandates"]);
        assert!(!changes.contains_key("Scouting Mandates"));
    }

    #[test]
    fn generic_field_takes_the_first_non_empty_value() {
        let a = text_record("a", "Town", "");
        let b = text_record("b", "Town", "");
        let c = text_record("c", "Town", "first");
        let d = text_record("d", "Town", "second");
        let changes = merge(vec![&a, &b, &c, &d], &["Town"]);
        assert_eq!(changes.get("Town"), Some(&FieldValue::Text("first".into())));
    }

    #[test]
    fn generic_field_survivor_wins_ties() {
        let a = text_record("a", "Town", "Montreal");
        let b = text_record("b", "Town", "Laval");
        let changes = merge(vec![&a, &b], &["Town"]);
        assert!(!changes.contains_key("Town"));
    }

    #[test]
    fn generic_field_fills_links_and_options_too() {
        let a = Record::new("a");
        let b = Record::new("b").with_field("Deals", FieldValue::Links(vec!["rec7".into()]));
        let changes = merge(vec![&a, &b], &["Deals"]);
        assert_eq!(changes.get("Deals"), Some(&FieldValue::Links(vec!["rec7".into()])));
    }

    #[test]
    fn flag_and_link_fields_are_always_reset() {
        let a = Record::new("a")
            .with_field("Duplicate", FieldValue::Select("Confirmed duplicate".into()))
            .with_field("Duplicate Of", FieldValue::Links(vec!["b".into()]));
        let b = Record::new("b");
        let changes = merge(vec![&a, &b], &["Duplicate", "Duplicate Of"]);
        assert_eq!(
            changes.get("Duplicate"),
            Some(&FieldValue::Select("No duplicate".into()))
        );
        assert_eq!(changes.get("Duplicate Of"), Some(&FieldValue::Links(vec![])));
    }

    #[test]
    fn field_names_cover_every_record() {
        let a = Record::new("a").with_field("Town", FieldValue::Text("X".into()));
        let b = Record::new("b").with_field("Province", FieldValue::Text("QC".into()));
        assert_eq!(field_names(&[a, b]), ["Province", "Town"]);
    }
}
