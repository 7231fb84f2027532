use std::collections::HashMap;

use harvester_core::panel::{PanelViewModel, RowStatus, RowView};
use harvester_engine::{PanelView, SessionSummary};

/// Prints a line whenever a row changes status, plus a progress line when the
/// counts move.
#[derive(Debug, Default)]
pub struct TerminalView {
    shown: HashMap<String, RowStatus>,
    last_progress: Option<String>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines describing what changed since the previous view.
    pub fn changes(&mut self, view: &PanelViewModel) -> Vec<String> {
        let mut lines = Vec::new();
        for row in &view.rows {
            if self.shown.get(&row.url) == Some(&row.status) {
                continue;
            }
            self.shown.insert(row.url.clone(), row.status.clone());
            if row.status != RowStatus::Pending {
                lines.push(row_line(row));
            }
        }
        self.shown
            .retain(|url, _| view.rows.iter().any(|row| &row.url == url));

        let progress = progress_line(view);
        if self.last_progress.as_deref() != Some(progress.as_str()) {
            lines.push(progress.clone());
            self.last_progress = Some(progress);
        }
        lines
    }
}

impl PanelView for TerminalView {
    fn render(&mut self, view: &PanelViewModel) {
        for line in self.changes(view) {
            println!("{line}");
        }
    }

    fn session_complete(&mut self, summary: SessionSummary) {
        println!(
            "Session complete: {} completed, {} failed",
            summary.completed, summary.failed
        );
    }
}

pub fn row_line(row: &RowView) -> String {
    let status = match &row.status {
        RowStatus::Pending => "pending".to_string(),
        RowStatus::Processing if row.retry_count > 0 => {
            format!("processing (retry {})", row.retry_count)
        }
        RowStatus::Processing => "processing".to_string(),
        RowStatus::Completed => match &row.record {
            Some(record) => format!("done: {}", describe(record)),
            None => "done".to_string(),
        },
        RowStatus::Failed(reason) => format!("failed: {reason}"),
        RowStatus::Error(reason) => format!("error: {reason}"),
    };
    format!("[{status}] {}", row.url)
}

fn describe(record: &harvester_core::PlaceRecord) -> String {
    let mut parts = vec![record.name.clone()];
    if !record.business_type.is_empty() {
        parts.push(record.business_type.clone());
    }
    if let Some(rating) = record.rating {
        parts.push(format!("{rating} stars ({} reviews)", record.review_count));
    }
    parts.join(" | ")
}

pub fn progress_line(view: &PanelViewModel) -> String {
    let state = if view.complete {
        "Finished"
    } else if view.running {
        "Running"
    } else {
        "Idle"
    };
    let counts = view.counts;
    let base = format!(
        "Session: {} | Jobs: {} | Done: {} | Failed: {} | Pending: {}",
        state,
        view.rows.len(),
        counts.completed,
        counts.failed,
        counts.pending + counts.in_flight
    );
    match view.last_collection {
        Some(stats) => format!(
            "{base} | Last collection: enqueued {}, skipped {}",
            stats.enqueued, stats.skipped
        ),
        None => base,
    }
}
