// DANS : src/state/stats.rs

use crate::monitoring::metrics::TRADE_OUTCOMES;
use serde::{Serialize, Serializer};
use std::{
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::info;

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionCounters {
    pub total: u64,
    pub success: u64,
    pub failure: u64,
}

impl TransactionCounters {
    /// Taux de succès en %, `None` si aucune transaction dans la fenêtre.
    pub fn success_percentage(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.success as f64 * 100.0 / self.total as f64)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Admitted,
    Success,
    Failure,
}

impl Outcome {
    fn label(self) -> &'static str {
        match self {
            Outcome::Admitted => "admitted",
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SuccessPercentages {
    #[serde(serialize_with = "percentage")]
    pub current: Option<f64>,
    #[serde(serialize_with = "percentage")]
    pub previous: Option<f64>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDifference {
    pub success: i64,
    pub failure: i64,
    pub total: i64,
}

/// Projection de l'état courant vs précédent : sert au rapport de fin de
/// fenêtre et à l'endpoint `/statistics`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub current_state: TransactionCounters,
    pub previous_state: TransactionCounters,
    pub success_percentages: SuccessPercentages,
    pub difference: CounterDifference,
}

impl StatsReport {
    pub fn build(current: TransactionCounters, previous: TransactionCounters) -> Self {
        let diff = |a: u64, b: u64| a as i64 - b as i64;
        Self {
            current_state: current,
            previous_state: previous,
            success_percentages: SuccessPercentages {
                current: current.success_percentage(),
                previous: previous.success_percentage(),
            },
            difference: CounterDifference {
                success: diff(current.success, previous.success),
                failure: diff(current.failure, previous.failure),
                total: diff(current.total, previous.total),
            },
        }
    }
}

pub fn format_percentage(value: Option<f64>) -> String {
    match value {
        Some(p) => format!("{}%", (p * 100.0).round() / 100.0),
        None => "-".to_string(),
    }
}

fn percentage<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_percentage(*value))
}

#[derive(Debug)]
struct StatsState {
    current: TransactionCounters,
    previous: TransactionCounters,
    last_rotation: Instant,
}

/// Compteurs glissants du pipeline. Une seule instance, partagée par `Arc`
/// entre le dispatcher (total) et les workers (success / failure).
#[derive(Debug)]
pub struct StatsAggregator {
    window: Duration,
    state: Mutex<StatsState>,
}

impl StatsAggregator {
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            window,
            state: Mutex::new(StatsState {
                current: TransactionCounters::default(),
                previous: TransactionCounters::default(),
                last_rotation: now,
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn record(&self, outcome: Outcome) {
        self.record_n(outcome, 1);
    }

    pub fn record_n(&self, outcome: Outcome, count: u64) {
        if count == 0 {
            return;
        }
        {
            let mut state = self.lock();
            let counters = &mut state.current;
            match outcome {
                Outcome::Admitted => counters.total += count,
                Outcome::Success => counters.success += count,
                Outcome::Failure => counters.failure += count,
            }
        }
        TRADE_OUTCOMES.with_label_values(&[outcome.label()]).inc_by(count);
    }

    /// (courant, précédent)
    pub fn snapshot(&self) -> (TransactionCounters, TransactionCounters) {
        let state = self.lock();
        (state.current, state.previous)
    }

    pub fn report(&self) -> StatsReport {
        let (current, previous) = self.snapshot();
        StatsReport::build(current, previous)
    }

    /// Bascule la fenêtre si elle est écoulée. Retourne le rapport calculé
    /// juste avant la bascule (courant vs précédent).
    pub fn rotate_if_due(&self, now: Instant) -> Option<StatsReport> {
        let mut state = self.lock();
        if now.saturating_duration_since(state.last_rotation) < self.window {
            return None;
        }
        let report = StatsReport::build(state.current, state.previous);
        state.previous = state.current;
        state.current = TransactionCounters::default();
        state.last_rotation = now;
        info!(
            total = report.current_state.total,
            success = report.current_state.success,
            failure = report.current_state.failure,
            "[Stats] Fin de fenêtre, rotation des compteurs."
        );
        Some(report)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatsState> {
        // Un panic pendant une simple addition ne laisse pas l'état incohérent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Rapport HTML envoyé au canal à chaque fin de fenêtre.
pub fn format_report(report: &StatsReport) -> String {
    // JSON indenté sur 2 espaces, clés dans l'ordre total / success / failure.
    let counters = |c: &TransactionCounters| serde_json::to_string_pretty(c).unwrap_or_default();
    let rounded = |p: Option<f64>| match p {
        Some(p) => format!("{}%", p.round()),
        None => "-".to_string(),
    };

    format!(
        "\n<b>Transaction Status📊:</b>\n  - Current State: {}\n  - Previous State: {}\n\n<b>Success Rate:</b>\n  - Current: {}\n  - Previous: {}\n\n<b>Differences:</b>\n  - Success: {}\n  - Failure: {}\n  - Total: {}\n",
        counters(&report.current_state),
        counters(&report.previous_state),
        rounded(report.success_percentages.current),
        rounded(report.success_percentages.previous),
        report.difference.success,
        report.difference.failure,
        report.difference.total,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HOUR: Duration = Duration::from_secs(3600);

    fn counters(total: u64, success: u64, failure: u64) -> TransactionCounters {
        TransactionCounters { total, success, failure }
    }

    #[test]
    fn report_compares_current_with_previous() {
        let report = StatsReport::build(counters(10, 7, 3), counters(5, 2, 2));
        assert_eq!(report.success_percentages.current, Some(70.0));
        assert_eq!(report.success_percentages.previous, Some(40.0));
        assert_eq!(report.difference, CounterDifference { success: 5, failure: 1, total: 5 });
    }

    #[test]
    fn zero_total_has_no_percentage() {
        let report = StatsReport::build(counters(0, 0, 0), counters(0, 0, 0));
        assert_eq!(report.success_percentages.current, None);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["successPercentages"]["current"], "-");
        assert_eq!(json["currentState"]["total"], 0);
    }

    #[test]
    fn report_serializes_like_status_endpoint() {
        let json = serde_json::to_value(StatsReport::build(counters(10, 7, 3), counters(4, 1, 3))).unwrap();
        assert_eq!(json["successPercentages"]["current"], "70%");
        assert_eq!(json["successPercentages"]["previous"], "25%");
        assert_eq!(json["difference"]["failure"], 0);
        assert_eq!(json["difference"]["total"], 6);
    }

    #[test]
    fn rotation_archives_current_and_resets() {
        let start = Instant::now();
        let stats = StatsAggregator::new(HOUR, start);
        for _ in 0..3 {
            stats.record(Outcome::Admitted);
        }
        stats.record(Outcome::Success);
        stats.record_n(Outcome::Failure, 2);

        assert!(stats.rotate_if_due(start + HOUR - Duration::from_millis(1)).is_none());

        let report = stats.rotate_if_due(start + HOUR).expect("la fenêtre est écoulée");
        assert_eq!(report.current_state, counters(3, 1, 2));
        assert_eq!(report.previous_state, counters(0, 0, 0));

        let (current, previous) = stats.snapshot();
        assert_eq!(previous, counters(3, 1, 2));
        assert_eq!(current, counters(0, 0, 0));

        // L'horloge de rotation repart de la bascule.
        assert!(stats.rotate_if_due(start + HOUR + Duration::from_secs(60)).is_none());
    }

    #[test]
    fn report_message_rounds_percentages() {
        let message = format_report(&StatsReport::build(counters(3, 2, 1), counters(0, 0, 0)));
        assert!(message.contains("  - Current: 67%"));
        assert!(message.contains("  - Previous: -"));
        assert!(message.contains("  - Total: 3"));
    }

    #[test]
    fn report_message_renders_counters_as_indented_json() {
        let message = format_report(&StatsReport::build(counters(10, 7, 3), counters(5, 2, 2)));
        assert!(message.contains(
            "  - Current State: {\n  \"total\": 10,\n  \"success\": 7,\n  \"failure\": 3\n}\n"
        ));
        assert!(message.contains("  - Previous State: {\n  \"total\": 5,"));
        assert!(message.contains("  - Current: 70%"));
    }
}
