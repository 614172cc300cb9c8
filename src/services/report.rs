use crate::services::reconcile_service::{RunMode, RunSummary, TypeSummary};

/// Operator-facing text report, one line per event.
pub fn render_text(summary: &RunSummary) -> String {
    let dry_run = summary.mode == RunMode::DryRun;
    let mut lines = Vec::new();

    if dry_run {
        lines.push("[DRY RUN] No changes will be written.".to_string());
    }

    for t in &summary.types {
        lines.extend(render_type(t, dry_run));
    }

    lines.push(total_line(summary.mode, summary.total_merged));

    let failed: Vec<&str> = summary
        .types
        .iter()
        .filter(|t| t.error.is_some())
        .map(|t| t.label)
        .collect();
    if !failed.is_empty() {
        lines.push(format!("Failed schedule types: {}", failed.join(", ")));
    }

    finish(lines)
}

/// Report for a run that never reached the schedule tables.
pub fn render_storage_unavailable(mode: RunMode, error: &str) -> String {
    let mut lines = Vec::new();
    if mode == RunMode::DryRun {
        lines.push("[DRY RUN] No changes will be written.".to_string());
    }
    lines.push(total_line(mode, 0));
    lines.push(format!("Storage unavailable: {}", error));
    finish(lines)
}

fn total_line(mode: RunMode, merged: usize) -> String {
    match mode {
        RunMode::DryRun => format!("Total duplicates that would be merged: {}", merged),
        RunMode::Apply => format!("Total duplicates merged: {}", merged),
    }
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn render_type(t: &TypeSummary, dry_run: bool) -> Vec<String> {
    let mut lines = vec![format!("Cleaning up {} duplicates...", t.label)];

    for line in &t.audit_lines {
        if dry_run {
            lines.push(format!("  [DRY RUN] {}", line));
        } else {
            lines.push(format!("  {}", line));
        }
    }

    if dry_run {
        lines.push(format!(
            "Would delete {} duplicate {} schedules",
            t.merged_count, t.label
        ));
    } else {
        lines.push(format!(
            "Deleted {} duplicate {} schedules",
            t.merged_count, t.label
        ));
    }

    if t.skipped_count > 0 {
        lines.push(format!(
            "  {} unresolved duplicate(s) left in place",
            t.skipped_count
        ));
    }
    if t.unkeyed_count > 0 {
        lines.push(format!(
            "  {} row(s) skipped with an incomplete key",
            t.unkeyed_count
        ));
    }
    if let Some(e) = &t.error {
        lines.push(format!(
            "  FAILED: {} ({} merged before the failure, remaining groups untouched)",
            e, t.merged_count
        ));
    }

    lines
}
