use chrono::Utc;

use crate::resolver::RunSummary;

/// Timestamped identifier for one resolver run.
pub fn new_run_id() -> String {
    format!("run-{}", Utc::now().timestamp())
}

/// Operator-facing summary, printed after every run.
pub fn print_summary(summary: &RunSummary) {
    if summary.dry_run {
        println!("\nDry run, nothing written.");
        println!("  Records:            {}", summary.total_records);
        println!("  Flagged:            {}", summary.flagged);
        println!("  Groups:             {}", summary.groups);
        println!("  Would update:       {}", summary.groups);
        println!("  Would delete:       {}", summary.planned_deletions);
        println!("  Skipped (no links): {}", summary.skipped_no_links);
        return;
    }

    println!("\nMerge complete.");
    println!("  Records:            {}", summary.total_records);
    println!("  Flagged:            {}", summary.flagged);
    println!("  Groups:             {}", summary.groups);
    println!("  Survivors updated:  {}", summary.merged);
    println!("  Losers deleted:     {}", summary.deleted);
    println!("  Skipped (no links): {}", summary.skipped_no_links);
    if summary.update_failures > 0 {
        println!("  Update failures:    {}", summary.update_failures);
    }
    if summary.delete_failures > 0 {
        println!("  Delete failures:    {}", summary.delete_failures);
    }
}
