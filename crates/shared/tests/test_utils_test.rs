//! test_utils 模块的集成测试

use chrono::{NaiveDate, Timelike};
use progression_shared::test_utils::*;

#[test]
fn test_database_config_defaults_to_test_db() {
    let config = test_database_config();
    assert_eq!(config.max_connections, 5);
    assert!(!config.url.is_empty());
}

#[test]
fn test_utc_at_builds_exact_instant() {
    let date = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
    let at = utc_at(date, 23, 59);
    assert_eq!(at.date_naive(), date);
    assert_eq!(at.hour(), 23);
    assert_eq!(at.minute(), 59);
}

#[test]
fn test_daily_logins_keep_order() {
    let start = NaiveDate::from_ymd_opt(2026, 12, 30).unwrap();
    let logins = daily_logins(start, &[0, 1, 2]);
    assert!(logins.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(logins[2].date_naive(), NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
}
