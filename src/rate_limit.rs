//! Daily per-(group, user) generation quota, computed from the append-only
//! generation log.

use chrono::{DateTime, Local, TimeZone};
use tracing::{debug, info};

use crate::db::Database;
use crate::error::GenerationError;
use crate::TARGET_DB;

/// Fixed daily cap on generation attempts per (group, user) pair.
pub const DAILY_GENERATION_LIMIT: i64 = 10;

/// The gate's answer. `message` is suitable for surfacing directly to the
/// admin who pressed "Generate Now".
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub can_generate: bool,
    pub remaining_count: i64,
    pub limit_count: i64,
    pub message: String,
}

/// Midnight at the start of the local calendar day containing `now`.
fn local_day_start(now: DateTime<Local>) -> DateTime<Local> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .unwrap_or(now)
}

/// Check the daily quota for a (group, user) pair. Read-only: recording
/// the attempt is a separate, explicit log write after the decision, so
/// every outcome is logged exactly once.
///
/// A failed count query is a hard error for the caller; the gate never
/// fails open into unlimited generation.
pub async fn check_and_reserve(
    db: &Database,
    group_id: &str,
    user_id: &str,
) -> Result<RateLimitDecision, GenerationError> {
    let since = local_day_start(Local::now()).timestamp();
    let used = db.count_attempts_since(group_id, user_id, since).await?;

    let remaining = (DAILY_GENERATION_LIMIT - used).max(0);
    let can_generate = used < DAILY_GENERATION_LIMIT;

    let message = if can_generate {
        format!(
            "{} of {} daily generations remaining",
            remaining, DAILY_GENERATION_LIMIT
        )
    } else {
        format!(
            "Daily generation limit reached ({} of {} used today)",
            used, DAILY_GENERATION_LIMIT
        )
    };

    if can_generate {
        debug!(target: TARGET_DB, "Rate limit check for group {}: {}", group_id, message);
    } else {
        info!(target: TARGET_DB, "Rate limit hit for group {} user {}: {}", group_id, user_id, message);
    }

    Ok(RateLimitDecision {
        can_generate,
        remaining_count: remaining,
        limit_count: DAILY_GENERATION_LIMIT,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_day_start_is_midnight() {
        let now = Local::now();
        let start = local_day_start(now);
        assert_eq!(start.date_naive(), now.date_naive());
        assert!(start <= now);
    }
}
