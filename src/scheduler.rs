//! Frequency gating and the scheduled dispatcher that fans a run out over
//! every enabled group.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::db::Database;
use crate::error::GenerationError;
use crate::fetch::ArticleSource;
use crate::generator::{self, GenerationRequest};
use crate::image::ImageSource;
use crate::types::{GroupReport, OutcomeStatus, RunReport};

/// Whether a group is due for automated generation.
///
/// Manual requests always pass. Otherwise a group is due when it has
/// never generated, or when the elapsed time since the last generation,
/// floored to whole days, meets the configured frequency. Elapsed-time
/// floor division is deliberate: calendar-date subtraction would skip a
/// group that last ran late in the evening.
pub fn should_generate(
    last_generation: Option<DateTime<Utc>>,
    update_frequency: i64,
    is_manual: bool,
    now: DateTime<Utc>,
) -> bool {
    if is_manual {
        return true;
    }

    let last = match last_generation {
        Some(last) => last,
        None => return true,
    };

    let required = if update_frequency >= 1 { update_frequency } else { 1 };
    let days_since = now.signed_duration_since(last).num_days();
    days_since >= required
}

/// One scheduled pass: every enabled group, most-starved first, gated by
/// frequency, then handed to the orchestrator one group at a time. A
/// group's failure never stops the pass.
pub async fn run_scheduled<S: ArticleSource, I: ImageSource>(
    db: &Database,
    llm: &S,
    images: &I,
) -> Result<RunReport, GenerationError> {
    info!("Starting scheduled news generation");

    let groups = db.enabled_groups().await?;
    if groups.is_empty() {
        info!("No groups with automated news enabled");
        return Ok(RunReport {
            message: "No groups with automated news enabled".to_string(),
            results: Vec::new(),
        });
    }

    let now = Utc::now();
    let mut results: Vec<GroupReport> = Vec::new();

    for group in groups {
        let frequency = group.update_frequency;
        if !should_generate(group.last_generation_time(), frequency, false, now) {
            info!("Skipping group {}: frequency not met", group.name);
            results.push(GroupReport {
                group: group.name.clone(),
                status: OutcomeStatus::Skipped,
                message: format!("Frequency not met ({} days)", frequency.max(1)),
            });
            continue;
        }

        let request = GenerationRequest {
            group_id: Some(group.id.clone()),
            is_manual: false,
            user_id: None,
        };
        match generator::run(db, llm, images, request).await {
            Ok(report) => results.extend(report.results),
            Err(err) => {
                warn!("Generation dispatch failed for group {}: {}", group.name, err);
                results.push(GroupReport {
                    group: group.name.clone(),
                    status: OutcomeStatus::Error,
                    message: err.to_string(),
                });
            }
        }
    }

    info!("Scheduled news generation completed: {} groups", results.len());
    Ok(RunReport {
        message: "Scheduled news generation completed".to_string(),
        results,
    })
}
