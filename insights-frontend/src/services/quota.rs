//! Daily report quota against the remote user record.
//!
//! Check-then-act over the remote store with no cross-request locking:
//! two concurrent submissions from the same user can both pass the check
//! and overshoot the limit by one. The window is a single request pair
//! per user and the limit is advisory, so this is tolerated.

use crate::services::user_store::UserStore;
use chrono::Utc;

/// Outcome of a quota check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Denied(DenyReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No user record exists; fail closed.
    MissingRecord,
    /// The daily limit is already spent.
    LimitReached,
    /// The store could not be read or written; fail closed.
    StoreUnavailable,
}

/// Usage fields to write back on an allowed generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    pub report_count: i64,
    pub last_report_date: String,
}

/// Pure quota decision.
///
/// Returns the usage update to persist when generation is allowed, or
/// `None` when the daily limit is spent. A stored date other than `today`
/// (including never set) means the count restarts at 1.
pub fn next_usage(
    last_report_date: Option<&str>,
    report_count: i64,
    today: &str,
    daily_limit: i64,
) -> Option<Usage> {
    // A negative count would only come from a corrupted record; read it as zero.
    let report_count = report_count.max(0);

    if last_report_date == Some(today) {
        if report_count >= daily_limit {
            return None;
        }
        Some(Usage {
            report_count: report_count + 1,
            last_report_date: today.to_string(),
        })
    } else {
        Some(Usage {
            report_count: 1,
            last_report_date: today.to_string(),
        })
    }
}

/// Today's UTC calendar date as an ISO date string.
fn today_utc() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Check whether the user may generate a report today and, if so, record
/// the consumption in the remote store. Any store failure denies.
pub async fn check_and_increment(
    store: &dyn UserStore,
    user_id: &str,
    daily_limit: i64,
) -> QuotaDecision {
    let record = match store.get_user(user_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::error!(user_id = %user_id, "User record not found for quota check");
            return QuotaDecision::Denied(DenyReason::MissingRecord);
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Quota check read failed");
            return QuotaDecision::Denied(DenyReason::StoreUnavailable);
        }
    };

    let today = today_utc();
    let usage = match next_usage(
        record.last_report_date.as_deref(),
        record.report_count,
        &today,
        daily_limit,
    ) {
        Some(usage) => usage,
        None => return QuotaDecision::Denied(DenyReason::LimitReached),
    };

    match store
        .set_report_usage(user_id, usage.report_count, &usage.last_report_date)
        .await
    {
        Ok(()) => QuotaDecision::Allowed,
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Quota check write failed");
            QuotaDecision::Denied(DenyReason::StoreUnavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRecord;
    use crate::services::user_store::memory::InMemoryUserStore;

    fn record(count: i64, date: Option<&str>) -> UserRecord {
        UserRecord {
            id: "uid-1".to_string(),
            email: "ada@example.com".to_string(),
            full_name: "Ada Lovelace".to_string(),
            registration_date: "2024-01-01T00:00:00Z".to_string(),
            report_count: count,
            last_report_date: date.map(|d| d.to_string()),
        }
    }

    #[test]
    fn stale_date_resets_count_to_one() {
        let usage = next_usage(Some("2024-01-01"), 5, "2024-01-02", 10).unwrap();
        assert_eq!(
            usage,
            Usage {
                report_count: 1,
                last_report_date: "2024-01-02".to_string(),
            }
        );
    }

    #[test]
    fn never_set_date_resets_count_to_one() {
        let usage = next_usage(None, 7, "2024-01-02", 10).unwrap();
        assert_eq!(usage.report_count, 1);
        assert_eq!(usage.last_report_date, "2024-01-02");
    }

    #[test]
    fn under_limit_today_increments_by_one() {
        let usage = next_usage(Some("2024-01-02"), 4, "2024-01-02", 10).unwrap();
        assert_eq!(usage.report_count, 5);
        assert_eq!(usage.last_report_date, "2024-01-02");
    }

    #[test]
    fn at_limit_today_denies() {
        assert_eq!(next_usage(Some("2024-01-02"), 10, "2024-01-02", 10), None);
    }

    #[test]
    fn over_limit_today_denies() {
        assert_eq!(next_usage(Some("2024-01-02"), 12, "2024-01-02", 10), None);
    }

    #[test]
    fn negative_count_reads_as_zero() {
        let usage = next_usage(Some("2024-01-02"), -3, "2024-01-02", 10).unwrap();
        assert_eq!(usage.report_count, 1);
    }

    #[tokio::test]
    async fn missing_record_denies() {
        let store = InMemoryUserStore::new();
        let decision = check_and_increment(&store, "nobody", 10).await;
        assert_eq!(decision, QuotaDecision::Denied(DenyReason::MissingRecord));
    }

    #[tokio::test]
    async fn store_failure_denies() {
        let store = InMemoryUserStore::failing();
        let decision = check_and_increment(&store, "uid-1", 10).await;
        assert_eq!(
            decision,
            QuotaDecision::Denied(DenyReason::StoreUnavailable)
        );
    }

    #[tokio::test]
    async fn stale_date_allows_and_rewrites_record() {
        let store = InMemoryUserStore::new();
        store.insert(record(5, Some("2024-01-01"))).await;

        let decision = check_and_increment(&store, "uid-1", 10).await;
        assert_eq!(decision, QuotaDecision::Allowed);

        let updated = store.record("uid-1").await.unwrap();
        assert_eq!(updated.report_count, 1);
        // The stored date moved to today.
        let today = Utc::now().format("%Y-%m-%d").to_string();
        assert_eq!(updated.last_report_date.as_deref(), Some(today.as_str()));
    }

    #[tokio::test]
    async fn under_limit_today_allows_and_increments() {
        let store = InMemoryUserStore::new();
        let today = Utc::now().format("%Y-%m-%d").to_string();
        store.insert(record(4, Some(&today))).await;

        let decision = check_and_increment(&store, "uid-1", 10).await;
        assert_eq!(decision, QuotaDecision::Allowed);

        let updated = store.record("uid-1").await.unwrap();
        assert_eq!(updated.report_count, 5);
    }

    #[tokio::test]
    async fn at_limit_today_denies_without_mutation() {
        let store = InMemoryUserStore::new();
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let original = record(10, Some(&today));
        store.insert(original.clone()).await;

        let decision = check_and_increment(&store, "uid-1", 10).await;
        assert_eq!(decision, QuotaDecision::Denied(DenyReason::LimitReached));

        let after = store.record("uid-1").await.unwrap();
        assert_eq!(after, original);
    }
}
