use crate::sdk::location::{LegStats, UNKNOWN_LEG};
use serde::{Deserialize, Serialize};

/// Raw leg measurement as reported by the routing engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub distance_m: f64,
    pub duration_s: f64,
}

impl RouteSummary {
    pub fn zero() -> Self {
        Self {
            distance_m: 0.0,
            duration_s: 0.0,
        }
    }

    fn is_valid(&self) -> bool {
        self.distance_m.is_finite()
            && self.duration_s.is_finite()
            && self.distance_m >= 0.0
            && self.duration_s >= 0.0
    }
}

/// Formats meters as kilometers with one decimal, e.g. `"12.3 km"`.
pub fn format_distance(distance_m: f64) -> String {
    format!("{:.1} km", distance_m / 1000.0)
}

/// Formats seconds as whole minutes. Minutes are rounded before the hour check,
/// so 3599 s reads `"1h 0min"`.
pub fn format_duration(duration_s: f64) -> String {
    let minutes = (duration_s / 60.0).round() as u64;
    if minutes >= 60 {
        format!("{}h {}min", minutes / 60, minutes % 60)
    } else {
        format!("{} min", minutes)
    }
}

/// Turns a provider answer into display strings. Any failure collapses to the sentinel pair.
pub fn leg_stats<E>(result: Result<RouteSummary, E>) -> LegStats {
    match result {
        Ok(summary) if summary.is_valid() => LegStats {
            distance: format_distance(summary.distance_m),
            travel_time: format_duration(summary.duration_s),
        },
        _ => LegStats {
            distance: UNKNOWN_LEG.to_string(),
            travel_time: UNKNOWN_LEG.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(distance_m: f64, duration_s: f64) -> Result<RouteSummary, ()> {
        Ok(RouteSummary {
            distance_m,
            duration_s,
        })
    }

    #[test]
    fn distance_is_rendered_in_km_with_one_decimal() {
        assert_eq!(format_distance(12_345.0), "12.3 km");
        assert_eq!(format_distance(0.0), "0.0 km");
        assert_eq!(format_distance(980.0), "1.0 km");
    }

    #[test]
    fn duration_below_an_hour_is_minutes() {
        assert_eq!(format_duration(0.0), "0 min");
        assert_eq!(format_duration(600.0), "10 min");
        assert_eq!(format_duration(3569.0), "59 min");
    }

    #[test]
    fn duration_rounds_to_minutes_before_hour_check() {
        assert_eq!(format_duration(3600.0), "1h 0min");
        assert_eq!(format_duration(3599.0), "1h 0min");
        assert_eq!(format_duration(5_430.0), "1h 31min");
    }

    #[test]
    fn failures_become_the_sentinel_pair() {
        assert!(leg_stats::<()>(Err(())).is_unavailable());
        assert!(leg_stats(summary(f64::NAN, 60.0)).is_unavailable());
        assert!(leg_stats(summary(100.0, -1.0)).is_unavailable());
    }

    #[test]
    fn successful_summary_fills_both_fields() {
        let leg = leg_stats(summary(2_500.0, 420.0));
        assert_eq!(leg.distance, "2.5 km");
        assert_eq!(leg.travel_time, "7 min");
    }
}
