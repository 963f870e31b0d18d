//! Differential and joint features built from already materialized own and
//! mirrored columns. Pure functions: a missing input yields a missing output.

/// Designed nonlinear joint signals between the two sides of a matchup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrossKind {
    /// Mean of both sides' recent scoring.
    CombinedGoals,
    /// Own scoring rate times the opponent's conceding rate.
    BttsIndex,
    /// Own recent scoring times the opponent's recent conceding.
    AttackVsDefence,
}

impl CrossKind {
    pub const ALL: [CrossKind; 3] = [
        CrossKind::CombinedGoals,
        CrossKind::BttsIndex,
        CrossKind::AttackVsDefence,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CrossKind::CombinedGoals => "combined_goals_L5",
            CrossKind::BttsIndex => "btts_index_L5",
            CrossKind::AttackVsDefence => "attack_vs_defence_L5",
        }
    }

    /// (own feature, opponent feature before the `opp_` prefix).
    pub fn inputs(self) -> (&'static str, &'static str) {
        match self {
            CrossKind::CombinedGoals => ("goals_for_L5_mean", "goals_for_L5_mean"),
            CrossKind::BttsIndex => ("failed_to_score_rate_L5", "clean_sheet_rate_L5"),
            CrossKind::AttackVsDefence => ("goals_for_L5_mean", "goals_against_L5_mean"),
        }
    }

    pub fn combine(self, own: f64, opp: f64) -> f64 {
        match self {
            CrossKind::CombinedGoals => (own + opp) / 2.0,
            CrossKind::BttsIndex => (1.0 - own) * (1.0 - opp),
            CrossKind::AttackVsDefence => own * opp,
        }
    }
}

pub fn difference(own: &[Option<f64>], opp: &[Option<f64>]) -> Vec<Option<f64>> {
    zip_with(own, opp, |a, b| a - b)
}

pub fn cross(kind: CrossKind, own: &[Option<f64>], opp: &[Option<f64>]) -> Vec<Option<f64>> {
    zip_with(own, opp, |a, b| kind.combine(a, b))
}

fn zip_with(
    own: &[Option<f64>],
    opp: &[Option<f64>],
    f: impl Fn(f64, f64) -> f64,
) -> Vec<Option<f64>> {
    own.iter()
        .zip(opp)
        .map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => Some(f(*a, *b)).filter(|v| v.is_finite()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difference_propagates_missing() {
        let own = [Some(2.0), None, Some(1.5)];
        let opp = [Some(0.5), Some(1.0), None];
        assert_eq!(difference(&own, &opp), vec![Some(1.5), None, None]);
    }

    #[test]
    fn btts_index_multiplies_scoring_by_conceding() {
        // Fails to score 20% of the time, opponent keeps a clean sheet 40% of the time.
        let out = cross(CrossKind::BttsIndex, &[Some(0.2)], &[Some(0.4)]);
        let v = out[0].unwrap();
        assert!((v - 0.8 * 0.6).abs() < 1e-12);
    }

    #[test]
    fn combined_goals_is_the_average() {
        let out = cross(CrossKind::CombinedGoals, &[Some(1.0), None], &[Some(2.0), Some(1.0)]);
        assert_eq!(out, vec![Some(1.5), None]);
    }
}
