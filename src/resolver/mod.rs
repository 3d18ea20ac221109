pub mod groups;
pub mod merge;
pub mod policy;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use tracing::{error, info};

use crate::config::Settings;
use crate::record::ChangeSet;
use crate::store::RecordStore;

/// Staged work for one duplicate group.
#[derive(Debug)]
pub struct GroupPlan {
    pub survivor: String,
    pub changes: ChangeSet,
    pub losers: Vec<String>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub total_records: usize,
    pub flagged: usize,
    pub groups: usize,
    pub skipped_no_links: usize,
    /// Losers staged for deletion across all groups.
    pub planned_deletions: usize,
    pub merged: usize,
    pub update_failures: usize,
    pub deleted: usize,
    pub delete_failures: usize,
    pub dry_run: bool,
}

/// Phase 1: read everything once and compute the merge plan without
/// touching the store.
pub fn plan<S: RecordStore>(store: &S, settings: &Settings) -> Result<(Vec<GroupPlan>, RunSummary)> {
    let records = store.fetch_all()?;
    let fields = merge::field_names(&records);
    let policies = policy::PolicyTable::new(settings.policies.clone());

    let grouping = groups::build_groups(&records, settings);
    let mut summary = RunSummary {
        total_records: records.len(),
        flagged: grouping.flagged,
        groups: grouping.groups.len(),
        skipped_no_links: grouping.skipped.len(),
        ..Default::default()
    };

    let mut plans = Vec::with_capacity(grouping.groups.len());
    for group in &grouping.groups {
        let changes = merge::merge_group(group, &fields, &policies, settings);
        info!(
            survivor = %group.survivor().id,
            members = %group.members.iter().map(|m| m.id.as_str()).join(", "),
            staged = changes.len(),
            "planned duplicate group"
        );
        plans.push(GroupPlan {
            survivor: group.survivor().id.clone(),
            changes,
            losers: group.losers().iter().map(|r| r.id.clone()).collect(),
        });
    }
    summary.planned_deletions = plans.iter().map(|p| p.losers.len()).sum();

    Ok((plans, summary))
}

/// Phase 2: survivor updates first, one call per survivor, then loser
/// deletions in limit-bounded batches. Losers of a survivor whose
/// update failed are withheld from deletion so the group stays intact.
pub fn apply<S: RecordStore>(
    store: &mut S,
    plans: &[GroupPlan],
    summary: &mut RunSummary,
) -> Result<()> {
    let pb = ProgressBar::new(plans.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} groups")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut to_delete: Vec<String> = Vec::new();
    for plan in plans {
        match store.update(&plan.survivor, &plan.changes) {
            Ok(()) => {
                summary.merged += 1;
                to_delete.extend(plan.losers.iter().cloned());
            }
            Err(err) => {
                error!(survivor = %plan.survivor, %err, "failed to update survivor, keeping its group");
                summary.update_failures += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    for batch in to_delete.chunks(store.batch_limit()) {
        match store.delete_many(batch) {
            Ok(()) => summary.deleted += batch.len(),
            Err(err) => {
                error!(%err, ids = %batch.iter().join(", "), "failed to delete batch");
                summary.delete_failures += batch.len();
            }
        }
    }

    Ok(())
}

/// Full resolver run. With `dry_run` the store is read but never
/// written.
pub fn run<S: RecordStore>(store: &mut S, settings: &Settings, dry_run: bool) -> Result<RunSummary> {
    let (plans, mut summary) = plan(store, settings)?;
    summary.dry_run = dry_run;
    if !dry_run {
        apply(store, &plans, &mut summary)?;
    }
    Ok(summary)
}
