//! Level, XP and point-rate derivation over a user's activity log, plus the
//! transaction-lifecycle guards that feed the log.
//!
//! XP is the raw cumulative activity volume; there is no separate XP curve.
//! The level table is passed in explicitly so callers (and tests) can supply
//! alternate threshold schedules. `LEVELS` is the canonical one.

use std::str::FromStr;

use lazy_static::lazy_static;
use serde::Serialize;

use crate::error::ServiceError;

/// One tier of the level table. `threshold` is exclusive: a user sits in
/// this tier while `xp` is strictly below it.
#[derive(Debug, Clone)]
pub struct LevelTier {
    pub name: &'static str,
    pub threshold: f64,
    pub points_per_hundred_xp: i64,
}

impl LevelTier {
    pub const fn new(name: &'static str, threshold: f64, points_per_hundred_xp: i64) -> Self {
        Self {
            name,
            threshold,
            points_per_hundred_xp,
        }
    }
}

lazy_static! {
    /// Canonical threshold schedule. The terminal tier's infinite threshold
    /// keeps the rate lookup total for any finite XP.
    pub static ref LEVELS: Vec<LevelTier> = vec![
        LevelTier::new("Rookie", 100.0, 1),
        LevelTier::new("Bronze", 101.0, 3),
        LevelTier::new("Silver", 300.0, 5),
        LevelTier::new("Gold", 700.0, 7),
        LevelTier::new("Diamond", 1100.0, 10),
        LevelTier::new("Platinum", 1500.0, 15),
        LevelTier::new("Infinite", f64::INFINITY, 15),
    ];
}

/// Everything the profile and user endpoints derive from an activity log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetrics {
    pub total_pi_sold: f64,
    pub xp: f64,
    pub level: usize,
    pub pi_points: i64,
    pub progress_percent: f64,
}

/// Derives the profile metrics for an activity log against a level table.
///
/// The level counts crossed thresholds: it is the position of the first tier
/// whose threshold still exceeds `xp`, floored at 1 so a fresh user reads as
/// level 1, and saturating at `table.len()` when every finite threshold is
/// behind. The earning rate comes from the tier at `level - 1`, falling back
/// to the last tier when the level runs past the table.
pub fn derive_metrics(activity_log: &[f64], table: &[LevelTier]) -> ProfileMetrics {
    let xp: f64 = activity_log.iter().sum();

    let position = table
        .iter()
        .position(|tier| xp < tier.threshold)
        .unwrap_or(table.len());
    let level = position.max(1);

    let rate = table
        .get(level - 1)
        .or_else(|| table.last())
        .map(|tier| tier.points_per_hundred_xp)
        .unwrap_or(0);
    let pi_points = (xp / 100.0).floor() as i64 * rate;

    ProfileMetrics {
        total_pi_sold: xp,
        xp,
        level,
        pi_points,
        progress_percent: progress_within_tier(xp, position, table),
    }
}

/// Position of `xp` between the surrounding tier thresholds, as a
/// percentage capped at 100. Against an infinite next threshold the
/// progress reads 0.
fn progress_within_tier(xp: f64, position: usize, table: &[LevelTier]) -> f64 {
    let previous = if position > 0 {
        table[position - 1].threshold
    } else {
        0.0
    };
    let next = table
        .get(position)
        .or_else(|| table.last())
        .map(|tier| tier.threshold)
        .unwrap_or(0.0);

    let span = next - previous;
    if span > 0.0 && span.is_finite() {
        (((xp - previous) / span) * 100.0).min(100.0)
    } else if span.is_infinite() {
        0.0
    } else {
        100.0
    }
}

/// Stage of one sequential activity attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Processing,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }
}

impl FromStr for TransactionStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(TransactionStatus::Processing),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(ServiceError::InvalidInput(format!(
                "unknown transaction status '{}'",
                other
            ))),
        }
    }
}

/// A new activity may start only when nothing is in flight: the history is
/// empty or its last entry is terminal.
pub fn can_initiate_new_transaction(log: &[String]) -> bool {
    match log.last() {
        None => true,
        Some(last) => matches!(
            last.parse::<TransactionStatus>(),
            Ok(status) if status.is_terminal()
        ),
    }
}

/// Overwrites one entry of the transaction history in place. An index past
/// the end is an explicit error and leaves the log untouched.
pub fn apply_status_update(
    log: &mut [String],
    index: usize,
    status: TransactionStatus,
) -> Result<(), ServiceError> {
    match log.get_mut(index) {
        Some(slot) => {
            *slot = status.as_str().to_string();
            Ok(())
        }
        None => Err(ServiceError::InvalidInput(format!(
            "transaction index {} out of range",
            index
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_log_is_level_one_with_no_points() {
        let metrics = derive_metrics(&[], &LEVELS);
        assert_eq!(metrics.xp, 0.0);
        assert_eq!(metrics.level, 1);
        assert_eq!(metrics.pi_points, 0);
        assert_eq!(metrics.progress_percent, 0.0);
    }

    #[test]
    fn below_first_threshold_earns_nothing() {
        for xp in [1.0, 42.0, 99.0] {
            let metrics = derive_metrics(&[xp], &LEVELS);
            assert_eq!(metrics.level, 1, "xp {}", xp);
            assert_eq!(metrics.pi_points, 0, "xp {}", xp);
        }
    }

    #[test]
    fn hundred_ten_xp_is_bronze_at_three_points() {
        let metrics = derive_metrics(&[50.0, 60.0], &LEVELS);
        assert_eq!(metrics.total_pi_sold, 110.0);
        assert_eq!(metrics.xp, 110.0);
        assert_eq!(metrics.level, 2);
        assert_eq!(metrics.pi_points, 3);
    }

    #[test]
    fn exactly_one_hundred_xp_is_still_rookie() {
        let metrics = derive_metrics(&[100.0], &LEVELS);
        assert_eq!(metrics.level, 1);
        assert_eq!(metrics.pi_points, 1);
    }

    #[test]
    fn past_every_finite_threshold_uses_terminal_rate() {
        let metrics = derive_metrics(&[2000.0], &LEVELS);
        assert_eq!(metrics.level, 6);
        assert_eq!(metrics.pi_points, 20 * 15);
        assert_eq!(metrics.progress_percent, 0.0);
    }

    #[test]
    fn points_are_monotonic_in_xp() {
        let mut previous = 0;
        for xp in 0..=2000 {
            let metrics = derive_metrics(&[xp as f64], &LEVELS);
            assert!(
                metrics.pi_points >= previous,
                "points dropped from {} to {} at xp {}",
                previous,
                metrics.pi_points,
                xp
            );
            previous = metrics.pi_points;
        }
    }

    #[test]
    fn progress_is_zero_at_tier_lower_bound() {
        let metrics = derive_metrics(&[101.0], &LEVELS);
        assert_eq!(metrics.level, 2);
        assert_eq!(metrics.progress_percent, 0.0);
    }

    #[test]
    fn progress_is_halfway_through_the_first_tier_at_fifty_xp() {
        let metrics = derive_metrics(&[50.0], &LEVELS);
        assert!((metrics.progress_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn progress_never_exceeds_one_hundred() {
        for xp in (0..=2000).step_by(7) {
            let metrics = derive_metrics(&[xp as f64], &LEVELS);
            assert!(metrics.progress_percent <= 100.0, "xp {}", xp);
            assert!(metrics.progress_percent >= 0.0, "xp {}", xp);
        }
    }

    #[test]
    fn alternate_table_shifts_the_thresholds() {
        let table = vec![
            LevelTier::new("Novice", 200.0, 2),
            LevelTier::new("Expert", f64::INFINITY, 9),
        ];
        let metrics = derive_metrics(&[150.0], &table);
        assert_eq!(metrics.level, 1);
        assert_eq!(metrics.pi_points, 2);

        // Same log against the canonical table lands on a different tier.
        assert_eq!(derive_metrics(&[150.0], &LEVELS).level, 2);
    }

    #[test]
    fn status_labels_round_trip() {
        for status in [
            TransactionStatus::Processing,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<TransactionStatus>().unwrap(), status);
        }
        assert!("garbage".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn new_transaction_allowed_only_after_terminal_state() {
        assert!(can_initiate_new_transaction(&log(&[])));
        assert!(!can_initiate_new_transaction(&log(&["processing"])));
        assert!(can_initiate_new_transaction(&log(&["completed"])));
        assert!(can_initiate_new_transaction(&log(&["failed"])));
        assert!(!can_initiate_new_transaction(&log(&["completed", "processing"])));
    }

    #[test]
    fn status_update_overwrites_in_place() {
        let mut history = log(&["processing"]);
        apply_status_update(&mut history, 0, TransactionStatus::Completed).unwrap();
        assert_eq!(history, log(&["completed"]));
        assert!(can_initiate_new_transaction(&history));
    }

    #[test]
    fn out_of_range_update_errors_and_leaves_log_unchanged() {
        let mut history = log(&["processing"]);
        let err = apply_status_update(&mut history, 3, TransactionStatus::Completed);
        assert!(matches!(err, Err(ServiceError::InvalidInput(_))));
        assert_eq!(history, log(&["processing"]));
    }
}
