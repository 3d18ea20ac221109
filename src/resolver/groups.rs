use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::record::Record;

/// One duplicate cluster: the survivor first, losers after it.
#[derive(Debug)]
pub struct DuplicateGroup<'a> {
    pub members: Vec<&'a Record>,
}

impl<'a> DuplicateGroup<'a> {
    pub fn survivor(&self) -> &'a Record {
        self.members[0]
    }

    pub fn losers(&self) -> &[&'a Record] {
        &self.members[1..]
    }
}

#[derive(Debug, Default)]
pub struct Grouping<'a> {
    pub groups: Vec<DuplicateGroup<'a>>,
    /// Flagged records with no usable link data, left untouched.
    pub skipped: Vec<&'a Record>,
    /// All records whose flag matched the confirmed sentinel.
    pub flagged: usize,
}

pub fn is_flagged(record: &Record, settings: &Settings) -> bool {
    record
        .value(&settings.flag_field)
        .and_then(|v| v.label())
        .map_or(false, |label| label == settings.confirmed_value)
}

/// Partition flagged records into disjoint single-hop groups.
///
/// "First" is the order of `records` as supplied by the caller; the
/// first member of each group is the survivor. A record already
/// absorbed into an earlier group is never regrouped.
pub fn build_groups<'a>(records: &'a [Record], settings: &Settings) -> Grouping<'a> {
    let by_id: HashMap<&str, &Record> = records.iter().map(|r| (r.id.as_str(), r)).collect();
    let mut claimed: HashSet<&str> = HashSet::new();
    let mut grouping = Grouping::default();

    for record in records.iter().filter(|r| is_flagged(r, settings)) {
        grouping.flagged += 1;
        if claimed.contains(record.id.as_str()) {
            debug!(id = %record.id, "already claimed by an earlier group");
            continue;
        }

        let link_ids = record
            .value(&settings.link_field)
            .map(|v| v.link_ids())
            .unwrap_or_default();
        if link_ids.is_empty() {
            warn!(id = %record.id, "flagged as duplicate but has no linked records, skipping");
            grouping.skipped.push(record);
            continue;
        }

        let mut members = vec![record];
        for link_id in link_ids.iter().unique() {
            if *link_id == record.id || claimed.contains(link_id.as_str()) {
                continue;
            }
            match by_id.get(link_id.as_str()).copied() {
                Some(linked) => members.push(linked),
                // A dangling reference; the linked record was likely
                // deleted in an earlier run.
                None => debug!(id = %record.id, link = %link_id, "linked record not found"),
            }
        }

        for member in &members {
            claimed.insert(member.id.as_str());
        }
        grouping.groups.push(DuplicateGroup { members });
    }

    grouping
}
