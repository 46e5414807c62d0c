//! Smart Score computation.
//!
//! The score is an additive blend of four independently bounded terms:
//! priority (max 40), deadline urgency (max 30), Eisenhower quadrant weight
//! (max 20), and a quick-win effort bonus (max 10). It is a pure function of
//! the task's normalized fields and the clock. The urgency term tightens as
//! the ETA approaches, so scores for an unchanged task drift over time.

use chrono::{DateTime, Utc};

use crate::fields::Quadrant;

/// Compute the Smart Score, rounded half-up to one decimal place.
pub fn smart_score(
    priority: i64,
    eta: Option<DateTime<Utc>>,
    quadrant: &str,
    time_required: i64,
    now: DateTime<Utc>,
) -> f64 {
    let priority_term = priority as f64 / 100.0 * 40.0;
    let urgency_term = match eta {
        Some(eta) => {
            // Fractional days until the deadline; negative means overdue.
            let days = (eta - now).num_seconds() as f64 / 86_400.0;
            if days < 0.0 {
                30.0
            } else if days <= 1.0 {
                25.0
            } else if days <= 7.0 {
                20.0
            } else if days <= 30.0 {
                10.0
            } else {
                5.0
            }
        }
        None => 5.0,
    };
    let quadrant_term = match Quadrant::parse(quadrant) {
        Some(Quadrant::Q1) => 20.0,
        Some(Quadrant::Q2) | None => 15.0,
        Some(Quadrant::Q3) => 10.0,
        Some(Quadrant::Q4) => 5.0,
    };
    let effort_term = if time_required <= 30 {
        10.0
    } else if time_required <= 120 {
        8.0
    } else if time_required <= 480 {
        5.0
    } else {
        2.0
    };

    let total = priority_term + urgency_term + quadrant_term + effort_term;
    (total * 10.0).round() / 10.0
}

/// A task is overdue when it has an ETA strictly in the past and is not done.
pub fn is_overdue(eta: Option<DateTime<Utc>>, completed: bool, now: DateTime<Utc>) -> bool {
    match eta {
        Some(eta) => !completed && eta < now,
        None => false,
    }
}

/// Whether the stored quadrant string counts as urgent. Unrecognized values
/// are neither urgent nor important.
pub fn is_urgent(quadrant: &str) -> bool {
    Quadrant::parse(quadrant).map(Quadrant::urgent).unwrap_or(false)
}

/// Whether the stored quadrant string counts as important.
pub fn is_important(quadrant: &str) -> bool {
    Quadrant::parse(quadrant).map(Quadrant::important).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2026-08-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn score_stays_in_range() {
        let n = now();
        let min = smart_score(1, None, "Q4", 1000, n);
        let max = smart_score(100, Some(n - Duration::hours(1)), "Q1", 5, n);
        assert!(min >= 7.0, "min was {min}");
        assert_eq!(max, 100.0);
    }

    #[test]
    fn score_monotonic_in_priority() {
        let n = now();
        let mut prev = 0.0;
        for p in 1..=100 {
            let s = smart_score(p, None, "Q2", 60, n);
            assert!(s >= prev, "score dropped at priority {p}");
            prev = s;
        }
    }

    #[test]
    fn urgency_tiers() {
        let n = now();
        let score_at = |eta| smart_score(50, Some(eta), "Q2", 60, n);
        let base = 50.0 / 100.0 * 40.0 + 15.0 + 8.0;
        assert_eq!(score_at(n - Duration::minutes(1)), base + 30.0);
        assert_eq!(score_at(n + Duration::hours(12)), base + 25.0);
        assert_eq!(score_at(n + Duration::days(3)), base + 20.0);
        assert_eq!(score_at(n + Duration::days(20)), base + 10.0);
        assert_eq!(score_at(n + Duration::days(45)), base + 5.0);
        assert_eq!(smart_score(50, None, "Q2", 60, n), base + 5.0);
    }

    #[test]
    fn unrecognized_quadrant_scores_like_q2() {
        let n = now();
        assert_eq!(
            smart_score(50, None, "banana", 60, n),
            smart_score(50, None, "Q2", 60, n)
        );
        // But it is neither urgent nor important.
        assert!(!is_urgent("banana"));
        assert!(!is_important("banana"));
    }

    #[test]
    fn overdue_requires_past_eta_and_open_task() {
        let n = now();
        assert!(is_overdue(Some(n - Duration::seconds(1)), false, n));
        assert!(!is_overdue(Some(n - Duration::seconds(1)), true, n));
        assert!(!is_overdue(Some(n + Duration::seconds(1)), false, n));
        assert!(!is_overdue(None, false, n));
    }

    #[test]
    fn quadrant_flags() {
        assert!(is_urgent("Q1") && is_important("Q1"));
        assert!(!is_urgent("Q2") && is_important("Q2"));
        assert!(is_urgent("Q3") && !is_important("Q3"));
        assert!(!is_urgent("Q4") && !is_important("Q4"));
    }
}
