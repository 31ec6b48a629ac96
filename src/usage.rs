//! Monthly usage metering against subscription tiers.

use crate::config::{SubscriptionTier, TiersConfig};
use crate::db::{Database, User};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metered action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    /// One AI suggestion call.
    Ai,
    /// One export.
    Export,
}

/// Current month's usage and limits of a user.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    /// AI calls so far.
    pub ai_calls: i64,
    /// AI call limit.
    pub ai_limit: i64,
    /// Exports so far.
    pub exports: i64,
    /// Export limit.
    pub export_limit: i64,
    /// Tier name.
    pub tier: String,
}

/// Key of the usage row for the month containing `now`: the first instant of
/// that month, in UTC.
pub fn month_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-01T00:00:00+00:00").to_string()
}

/// Fail with `QuotaExceeded` when the user has used up the monthly quota.
pub fn check_limit(db: &Database, tiers: &TiersConfig, user: &User, kind: UsageKind) -> Result<()> {
    let limits = tiers.limits(SubscriptionTier::from_name(&user.subscription_tier));
    let usage = db.get_usage(&user.id, &month_key(Utc::now()))?;

    let (current, limit, what) = match kind {
        UsageKind::Ai => (usage.ai_calls, limits.ai_calls_monthly, "AI"),
        UsageKind::Export => (usage.exports, limits.exports_monthly, "export"),
    };

    if current < limit {
        Ok(())
    } else {
        tracing::info!(user_id = %user.id, kind = ?kind, current, limit, "Monthly quota reached");
        Err(AppError::QuotaExceeded(format!(
            "Monthly {} limit reached. Please upgrade your plan.",
            what
        )))
    }
}

/// Count one use in the current month.
pub fn increment(db: &Database, user_id: &str, kind: UsageKind) -> Result<()> {
    db.increment_usage(user_id, &month_key(Utc::now()), kind)
}

/// Usage and limits for the current month.
pub fn report(db: &Database, tiers: &TiersConfig, user: &User) -> Result<UsageReport> {
    let tier = SubscriptionTier::from_name(&user.subscription_tier);
    let limits = tiers.limits(tier);
    let usage = db.get_usage(&user.id, &month_key(Utc::now()))?;

    Ok(UsageReport {
        ai_calls: usage.ai_calls,
        ai_limit: limits.ai_calls_monthly,
        exports: usage.exports,
        export_limit: limits.exports_monthly,
        tier: tier.as_str().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::now_timestamp;
    use chrono::TimeZone;

    fn user(db: &Database, tier: &str) -> User {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: format!("{}@example.com", tier),
            password_hash: String::new(),
            name: "Writer".to_string(),
            subscription_tier: tier.to_string(),
            created_at: now_timestamp(),
            last_login: None,
        };
        db.create_user(&user).unwrap();
        user
    }

    #[test]
    fn test_month_key() {
        let now = Utc.with_ymd_and_hms(2024, 5, 17, 13, 4, 5).unwrap();
        assert_eq!(month_key(now), "2024-05-01T00:00:00+00:00");
    }

    #[test]
    fn test_free_tier_export_quota() {
        let db = Database::open_memory().unwrap();
        let tiers = TiersConfig::default();
        let user = user(&db, "free");

        for _ in 0..2 {
            check_limit(&db, &tiers, &user, UsageKind::Export).unwrap();
            increment(&db, &user.id, UsageKind::Export).unwrap();
        }

        let err = check_limit(&db, &tiers, &user, UsageKind::Export).unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded(_)));
        assert_eq!(
            err.to_string(),
            "Monthly export limit reached. Please upgrade your plan."
        );

        // AI calls are counted separately.
        check_limit(&db, &tiers, &user, UsageKind::Ai).unwrap();
    }

    #[test]
    fn test_unknown_tier_gets_free_limits() {
        let db = Database::open_memory().unwrap();
        let tiers = TiersConfig::default();
        let user = user(&db, "platinum");

        let report = report(&db, &tiers, &user).unwrap();
        assert_eq!(report.tier, "free");
        assert_eq!(report.ai_limit, 10);
        assert_eq!(report.export_limit, 2);
        assert_eq!(report.exports, 0);
    }

    #[test]
    fn test_report_counts() {
        let db = Database::open_memory().unwrap();
        let tiers = TiersConfig::default();
        let user = user(&db, "pro");

        increment(&db, &user.id, UsageKind::Ai).unwrap();
        increment(&db, &user.id, UsageKind::Ai).unwrap();
        increment(&db, &user.id, UsageKind::Export).unwrap();

        let report = report(&db, &tiers, &user).unwrap();
        assert_eq!((report.ai_calls, report.exports), (2, 1));
        assert_eq!((report.ai_limit, report.export_limit), (500, 50));
    }
}
