//! Seeded synthetic league history for demos, tests and benches.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::event_log::PairedEvent;

const TEAM_NAMES: &[&str] = &[
    "Ashford Rovers",
    "Bramley Town",
    "Castleford United",
    "Dunmore Athletic",
    "Eastwick City",
    "Fallowfield",
    "Glenbrook",
    "Harrowgate Wanderers",
    "Ironbridge",
    "Kingsmere",
    "Longford Albion",
    "Marston Vale",
    "Northcote",
    "Oakhurst",
    "Penrith Park",
    "Queensbury",
    "Redcliffe",
    "Stanmore",
    "Thornbury",
    "Westfield Rangers",
];

#[derive(Debug, Clone)]
pub struct FakeLeague {
    pub teams: usize,
    pub seasons: usize,
    pub seed: u64,
    /// Kickoff date of the first round.
    pub start: NaiveDate,
}

impl Default for FakeLeague {
    fn default() -> Self {
        Self {
            teams: 12,
            seasons: 2,
            seed: 7,
            start: NaiveDate::from_ymd_opt(2022, 8, 6).unwrap_or_default(),
        }
    }
}

struct Side {
    attack: f64,
    defence: f64,
}

impl FakeLeague {
    pub fn team_names(&self) -> Vec<String> {
        (0..self.teams)
            .map(|i| match TEAM_NAMES.get(i) {
                Some(name) => name.to_string(),
                None => format!("Team {}", i + 1),
            })
            .collect()
    }

    /// Double round robin per season, one round per week. Identical
    /// parameters always yield identical matches.
    pub fn generate(&self) -> Vec<PairedEvent> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let names = self.team_names();
        let sides = names
            .iter()
            .map(|_| Side {
                attack: rng.gen_range(0.7..1.35),
                defence: rng.gen_range(0.7..1.35),
            })
            .collect::<Vec<_>>();

        let rounds = double_round_robin(names.len());
        let season_days = rounds.len() as i64 * 7 + 56;
        let mut out = Vec::new();
        for season in 0..self.seasons {
            let season_start = self.start + Duration::days(season as i64 * season_days);
            for (round_idx, fixtures) in rounds.iter().enumerate() {
                let date = season_start + Duration::days(round_idx as i64 * 7);
                for &(home, away) in fixtures {
                    let match_id = format!("s{}r{:02}-{}-{}", season + 1, round_idx + 1, home, away);
                    out.push(simulate(
                        &mut rng,
                        match_id,
                        date,
                        (&names[home], &sides[home]),
                        (&names[away], &sides[away]),
                    ));
                }
            }
        }
        out
    }
}

/// Circle-method pairings; the second half mirrors the first with venues
/// swapped. An odd team count gets a bye slot.
fn double_round_robin(teams: usize) -> Vec<Vec<(usize, usize)>> {
    if teams < 2 {
        return Vec::new();
    }
    let n = teams + teams % 2;
    let mut order = (0..n).collect::<Vec<_>>();
    let mut first = Vec::with_capacity(n - 1);
    for round in 0..n - 1 {
        let mut fixtures = Vec::with_capacity(n / 2);
        for i in 0..n / 2 {
            let (a, b) = (order[i], order[n - 1 - i]);
            if a >= teams || b >= teams {
                continue;
            }
            fixtures.push(if round % 2 == 0 { (a, b) } else { (b, a) });
        }
        first.push(fixtures);
        order[1..].rotate_right(1);
    }
    let second = first
        .iter()
        .map(|fixtures| fixtures.iter().map(|&(h, a)| (a, h)).collect())
        .collect::<Vec<_>>();
    first.extend(second);
    first
}

fn simulate(
    rng: &mut StdRng,
    match_id: String,
    date: NaiveDate,
    home: (&str, &Side),
    away: (&str, &Side),
) -> PairedEvent {
    let home_xg = (1.45 * home.1.attack / away.1.defence * rng.gen_range(0.7..1.3)).max(0.05);
    let away_xg = (1.10 * away.1.attack / home.1.defence * rng.gen_range(0.7..1.3)).max(0.05);
    let home_goals = poisson(rng, home_xg);
    let away_goals = poisson(rng, away_xg);

    let home_shots = (poisson(rng, home_xg * 8.5) + home_goals) as f64;
    let away_shots = (poisson(rng, away_xg * 8.5) + away_goals) as f64;
    let home_sot = (home_goals as f64).max((home_shots * rng.gen_range(0.25..0.45)).round());
    let away_sot = (away_goals as f64).max((away_shots * rng.gen_range(0.25..0.45)).round());
    let possession = (50.0 + 12.0 * (home.1.attack - away.1.attack) + rng.gen_range(-6.0..6.0))
        .clamp(25.0, 75.0)
        .round();
    let home_yellow = poisson(rng, 1.7) as f64;
    let away_yellow = poisson(rng, 1.9) as f64;
    let home_red = if rng.gen_bool(0.04) { 1.0 } else { 0.0 };
    let away_red = if rng.gen_bool(0.05) { 1.0 } else { 0.0 };

    PairedEvent::new(match_id, date, home.0, away.0, home_goals, away_goals)
        .with_stat("xg_for", round2(home_xg), round2(away_xg))
        .with_stat("xg_against", round2(away_xg), round2(home_xg))
        .with_stat("shots", home_shots, away_shots)
        .with_stat("shots_on_target", home_sot, away_sot)
        .with_stat("possession", possession, 100.0 - possession)
        .with_stat("corners", poisson(rng, 5.4) as f64, poisson(rng, 4.6) as f64)
        .with_stat("cards_yellow", home_yellow, away_yellow)
        .with_stat("cards_red", home_red, away_red)
        .with_stat("cards_yellow_against", away_yellow, home_yellow)
        .with_stat("cards_red_against", away_red, home_red)
}

/// Knuth's multiplication method; fine for the small rates used here.
fn poisson(rng: &mut StdRng, lambda: f64) -> u32 {
    let limit = (-lambda).exp();
    let mut k = 0u32;
    let mut p = 1.0;
    loop {
        p *= rng.r#gen::<f64>();
        if p <= limit || k >= 30 {
            return k;
        }
        k += 1;
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
