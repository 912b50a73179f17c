//! Alert Decision Policy
//!
//! Pure decision logic for the monitor cycle: range-exit detection,
//! value-change thresholding, and impermanent-loss hysteresis. Takes the
//! stored baselines and a fresh valuation, returns the alerts to deliver
//! and the baseline fields to persist. No I/O.

use serde::{Deserialize, Serialize};

use super::position::TrackedPosition;
use super::valuation::PositionValue;

/// Absolute value-change percentage that triggers an alert and moves the baseline.
pub const VALUE_CHANGE_THRESHOLD_PCT: f64 = 10.0;

/// IL level (signed) at or below which warnings fire.
pub const IL_THRESHOLD_PCT: f64 = -5.0;

/// Minimum worsening between consecutive IL warnings.
pub const IL_NOTIFICATION_STEP_PCT: f64 = 2.5;

/// A single alert decided for one position in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlertEvent {
    /// The pool's active bin left the position's range. Stateless; re-fires
    /// every cycle the position remains out of range.
    RangeExit {
        active_bin: i32,
        lower_bin_id: i32,
        upper_bin_id: i32,
    },
    /// Total USD value moved at least the threshold against the stored baseline.
    ValueChange {
        previous_usd: f64,
        current_usd: f64,
        change_pct: f64,
    },
    /// Impermanent loss crossed the threshold, or worsened by a full step.
    IlWarning {
        il_pct: f64,
        current_usd: f64,
        hodl_usd: f64,
    },
    /// Position recovered from a warned loss to a gain versus holding.
    IlRecovered {
        il_pct: f64,
        current_usd: f64,
        hodl_usd: f64,
    },
}

/// Baseline fields to persist after a cycle. `None` leaves the field as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineUpdate {
    pub last_valuation_usd: Option<f64>,
    pub last_il_warning_percent: Option<f64>,
}

impl BaselineUpdate {
    pub fn is_empty(&self) -> bool {
        self.last_valuation_usd.is_none() && self.last_il_warning_percent.is_none()
    }
}

/// Outcome of evaluating one position: zero or more alerts plus the store update.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub alerts: Vec<AlertEvent>,
    pub update: BaselineUpdate,
}

/// Stateless range check, also used on its own when valuation cannot resolve
/// the position (a withdrawn position can still be out of range).
pub fn range_exit(position: &TrackedPosition, active_bin: i32) -> Option<AlertEvent> {
    if position.is_in_range(active_bin) {
        None
    } else {
        Some(AlertEvent::RangeExit {
            active_bin,
            lower_bin_id: position.lower_bin_id,
            upper_bin_id: position.upper_bin_id,
        })
    }
}

/// Evaluate every alert rule for one position against a fresh valuation.
///
/// All checks fire independently; a single cycle may emit more than one
/// alert kind for the same position.
pub fn evaluate(
    position: &TrackedPosition,
    current: &PositionValue,
    active_bin: i32,
) -> Evaluation {
    let mut evaluation = Evaluation::default();

    if let Some(alert) = range_exit(position, active_bin) {
        evaluation.alerts.push(alert);
    }

    check_value_change(position, current, &mut evaluation);
    check_impermanent_loss(position, current, &mut evaluation);

    evaluation
}

fn check_value_change(
    position: &TrackedPosition,
    current: &PositionValue,
    evaluation: &mut Evaluation,
) {
    let previous = position.last_valuation_usd;
    if previous > 0.0 {
        let change_pct = (current.usd_value - previous) / previous * 100.0;
        if change_pct.abs() >= VALUE_CHANGE_THRESHOLD_PCT {
            evaluation.alerts.push(AlertEvent::ValueChange {
                previous_usd: previous,
                current_usd: current.usd_value,
                change_pct,
            });
            evaluation.update.last_valuation_usd = Some(current.usd_value);
        }
        // Below threshold the baseline persists, so small drifts never erode
        // the reference point.
    } else {
        // First observation seeds the baseline silently.
        evaluation.update.last_valuation_usd = Some(current.usd_value);
    }
}

fn check_impermanent_loss(
    position: &TrackedPosition,
    current: &PositionValue,
    evaluation: &mut Evaluation,
) {
    if !position.has_initial_snapshot() {
        return;
    }

    // HODL counterfactual: initial holdings at current prices.
    let hodl_usd = position.initial_token_a_amount * current.token_x_price_usd
        + position.initial_token_b_amount * current.token_y_price_usd;

    let il_pct = if hodl_usd > 0.0 {
        (current.usd_value - hodl_usd) / hodl_usd * 100.0
    } else {
        0.0
    };

    let last_warned = position.last_il_warning_percent;

    if il_pct <= IL_THRESHOLD_PCT {
        let first_crossing = last_warned == 0.0;
        let worsened_a_step = (il_pct - last_warned).abs() >= IL_NOTIFICATION_STEP_PCT;
        if first_crossing || worsened_a_step {
            evaluation.alerts.push(AlertEvent::IlWarning {
                il_pct,
                current_usd: current.usd_value,
                hodl_usd,
            });
            evaluation.update.last_il_warning_percent = Some(il_pct);
        }
    } else if il_pct > 0.0 && last_warned < 0.0 {
        evaluation.alerts.push(AlertEvent::IlRecovered {
            il_pct,
            current_usd: current.usd_value,
            hodl_usd,
        });
        evaluation.update.last_il_warning_percent = Some(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::PositionStatus;
    use approx::assert_relative_eq;
    use chrono::Utc;

    fn position() -> TrackedPosition {
        TrackedPosition {
            id: 1,
            owner_id: "user-1".to_string(),
            mint: "MintAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            market: "Market111111111111111111111111111111111111".to_string(),
            lower_bin_id: 100,
            upper_bin_id: 120,
            last_valuation_usd: 0.0,
            initial_token_a_amount: 0.0,
            initial_token_b_amount: 0.0,
            initial_token_a_price_usd: 0.0,
            initial_token_b_price_usd: 0.0,
            last_il_warning_percent: 0.0,
            status: PositionStatus::Active,
            created_at: Utc::now(),
        }
    }

    fn value(usd: f64) -> PositionValue {
        PositionValue {
            token_x_amount: usd,
            token_y_amount: 0.0,
            token_x_price_usd: 1.0,
            token_y_price_usd: 0.0,
            usd_value: usd,
        }
    }

    fn has_range_exit(evaluation: &Evaluation) -> bool {
        evaluation
            .alerts
            .iter()
            .any(|a| matches!(a, AlertEvent::RangeExit { .. }))
    }

    fn value_change(evaluation: &Evaluation) -> Option<f64> {
        evaluation.alerts.iter().find_map(|a| match a {
            AlertEvent::ValueChange { change_pct, .. } => Some(*change_pct),
            _ => None,
        })
    }

    #[test]
    fn test_in_range_no_alert() {
        let evaluation = evaluate(&position(), &value(0.0), 110);
        assert!(!has_range_exit(&evaluation));
    }

    #[test]
    fn test_range_exit_above_and_below() {
        assert!(has_range_exit(&evaluate(&position(), &value(0.0), 121)));
        assert!(has_range_exit(&evaluate(&position(), &value(0.0), 99)));
    }

    #[test]
    fn test_range_exit_boundary_bins_inclusive() {
        assert!(!has_range_exit(&evaluate(&position(), &value(0.0), 100)));
        assert!(!has_range_exit(&evaluate(&position(), &value(0.0), 120)));
    }

    #[test]
    fn test_range_check_is_stateless() {
        // Two consecutive out-of-range cycles both fire; nothing is persisted
        // for the range rule.
        let p = position();
        let first = evaluate(&p, &value(0.0), 130);
        let second = evaluate(&p, &value(0.0), 130);
        assert!(has_range_exit(&first));
        assert!(has_range_exit(&second));
    }

    #[test]
    fn test_first_observation_seeds_baseline_silently() {
        let p = position(); // last_valuation_usd == 0
        let evaluation = evaluate(&p, &value(5000.0), 110);
        assert!(value_change(&evaluation).is_none());
        assert_eq!(evaluation.update.last_valuation_usd, Some(5000.0));
    }

    #[test]
    fn test_value_change_below_threshold_keeps_baseline() {
        let mut p = position();
        p.last_valuation_usd = 100.0;
        let evaluation = evaluate(&p, &value(109.99), 110);
        assert!(value_change(&evaluation).is_none());
        assert_eq!(evaluation.update.last_valuation_usd, None);
    }

    #[test]
    fn test_value_change_at_threshold_fires_and_updates() {
        let mut p = position();
        p.last_valuation_usd = 100.0;
        let evaluation = evaluate(&p, &value(110.0), 110);
        assert_relative_eq!(value_change(&evaluation).unwrap(), 10.0);
        assert_eq!(evaluation.update.last_valuation_usd, Some(110.0));
    }

    #[test]
    fn test_value_drop_at_threshold_fires() {
        let mut p = position();
        p.last_valuation_usd = 100.0;
        let evaluation = evaluate(&p, &value(90.0), 110);
        assert_relative_eq!(value_change(&evaluation).unwrap(), -10.0);
        assert_eq!(evaluation.update.last_valuation_usd, Some(90.0));
    }

    #[test]
    fn test_il_skipped_without_initial_snapshot() {
        let mut p = position();
        p.last_valuation_usd = 100.0;
        // Deep loss relative to nothing: no initial amounts, no IL check.
        let evaluation = evaluate(&p, &value(100.0), 110);
        assert!(evaluation.alerts.is_empty());
    }

    fn il_position(last_warned: f64) -> TrackedPosition {
        let mut p = position();
        p.initial_token_a_amount = 100.0;
        p.initial_token_a_price_usd = 1.0;
        p.last_valuation_usd = 0.0;
        p.last_il_warning_percent = last_warned;
        p
    }

    /// Current value chosen against a $100 HODL baseline (100 tokens at $1).
    fn il_value(usd: f64) -> PositionValue {
        PositionValue {
            token_x_amount: usd,
            token_y_amount: 0.0,
            token_x_price_usd: 1.0,
            token_y_price_usd: 0.0,
            usd_value: usd,
        }
    }

    fn il_warning(evaluation: &Evaluation) -> Option<f64> {
        evaluation.alerts.iter().find_map(|a| match a {
            AlertEvent::IlWarning { il_pct, .. } => Some(*il_pct),
            _ => None,
        })
    }

    fn il_recovered(evaluation: &Evaluation) -> Option<f64> {
        evaluation.alerts.iter().find_map(|a| match a {
            AlertEvent::IlRecovered { il_pct, .. } => Some(*il_pct),
            _ => None,
        })
    }

    #[test]
    fn test_il_first_crossing_notifies() {
        let p = il_position(0.0);
        let evaluation = evaluate(&p, &il_value(94.9), 110);
        let il = il_warning(&evaluation).unwrap();
        assert_relative_eq!(il, -5.1, epsilon = 1e-9);
        assert_eq!(evaluation.update.last_il_warning_percent, Some(il));
    }

    #[test]
    fn test_il_exactly_at_threshold_notifies() {
        let p = il_position(0.0);
        let evaluation = evaluate(&p, &il_value(95.0), 110);
        assert_relative_eq!(il_warning(&evaluation).unwrap(), -5.0);
    }

    #[test]
    fn test_il_mild_loss_above_threshold_is_silent() {
        let p = il_position(0.0);
        let evaluation = evaluate(&p, &il_value(96.0), 110);
        assert!(il_warning(&evaluation).is_none());
        assert_eq!(evaluation.update.last_il_warning_percent, None);
    }

    #[test]
    fn test_il_hysteresis_small_worsening_is_silent() {
        // Last warned at -6; -7.4 is only 1.4 worse, under the 2.5 step.
        let p = il_position(-6.0);
        let evaluation = evaluate(&p, &il_value(92.6), 110);
        assert!(il_warning(&evaluation).is_none());
        assert_eq!(evaluation.update.last_il_warning_percent, None);
    }

    #[test]
    fn test_il_hysteresis_full_step_notifies() {
        // -8.6 is 2.6 worse than -6: past the step, fire and move the baseline.
        let p = il_position(-6.0);
        let evaluation = evaluate(&p, &il_value(91.4), 110);
        let il = il_warning(&evaluation).unwrap();
        assert_relative_eq!(il, -8.6, epsilon = 1e-9);
        assert_eq!(evaluation.update.last_il_warning_percent, Some(il));
    }

    #[test]
    fn test_il_recovery_resets_baseline() {
        let p = il_position(-6.0);
        let evaluation = evaluate(&p, &il_value(102.0), 110);
        assert_relative_eq!(il_recovered(&evaluation).unwrap(), 2.0, epsilon = 1e-9);
        assert_eq!(evaluation.update.last_il_warning_percent, Some(0.0));
    }

    #[test]
    fn test_recovery_then_fresh_crossing_notifies_immediately() {
        // After a recovery reset the next threshold crossing is a first
        // crossing again, regardless of step size.
        let p = il_position(0.0);
        let evaluation = evaluate(&p, &il_value(94.9), 110);
        assert!(il_warning(&evaluation).is_some());
    }

    #[test]
    fn test_il_flat_gain_without_prior_warning_is_silent() {
        let p = il_position(0.0);
        let evaluation = evaluate(&p, &il_value(103.0), 110);
        assert!(il_recovered(&evaluation).is_none());
        assert!(evaluation.update.last_il_warning_percent.is_none());
    }

    #[test]
    fn test_il_zero_hodl_value_is_silent() {
        let mut p = il_position(0.0);
        p.initial_token_a_price_usd = 1.0;
        let current = PositionValue {
            token_x_amount: 50.0,
            token_y_amount: 0.0,
            token_x_price_usd: 0.0, // price outage: HODL value collapses to 0
            token_y_price_usd: 0.0,
            usd_value: 0.0,
        };
        let evaluation = evaluate(&p, &current, 110);
        assert!(il_warning(&evaluation).is_none());
        assert!(il_recovered(&evaluation).is_none());
    }

    #[test]
    fn test_combined_scenario_range_value_and_recovery() {
        // lower=100 upper=120, initial 10 tokens A, last value 110,
        // active bin 130, current value $95 with token A now at $0.80.
        // HODL = 10 * 0.80 = 8, so ilPct = (95-8)/8*100 > 0: a recovery
        // fires because a warning was outstanding.
        let mut p = position();
        p.initial_token_a_amount = 10.0;
        p.initial_token_a_price_usd = 1.0;
        p.last_valuation_usd = 110.0;
        p.last_il_warning_percent = -6.0;

        let current = PositionValue {
            token_x_amount: 118.75,
            token_y_amount: 0.0,
            token_x_price_usd: 0.80,
            token_y_price_usd: 0.0,
            usd_value: 95.0,
        };

        let evaluation = evaluate(&p, &current, 130);

        assert!(has_range_exit(&evaluation));

        let change = value_change(&evaluation).unwrap();
        assert_relative_eq!(change, (95.0 - 110.0) / 110.0 * 100.0);
        assert!((change - (-13.64)).abs() < 0.01);
        assert_eq!(evaluation.update.last_valuation_usd, Some(95.0));

        let il = il_recovered(&evaluation).unwrap();
        assert_relative_eq!(il, (95.0 - 8.0) / 8.0 * 100.0);
        assert_eq!(evaluation.update.last_il_warning_percent, Some(0.0));

        assert_eq!(evaluation.alerts.len(), 3);
    }
}
