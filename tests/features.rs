use chrono::{Duration, NaiveDate};

use form_engine::fake_log::FakeLeague;
use form_engine::{Engine, EngineConfig, EventLog, FeatureError, FeatureFrame, PairedEvent};

fn week(n: i64) -> NaiveDate {
    // 2024-01-06 is a Saturday.
    NaiveDate::from_ymd_opt(2024, 1, 6).unwrap() + Duration::days(7 * (n - 1))
}

fn close(actual: Option<f64>, expected: f64) -> bool {
    actual.is_some_and(|v| (v - expected).abs() < 1e-9)
}

/// Three teams, ten weekly matches.
fn toy_events() -> Vec<PairedEvent> {
    let fixtures = [
        ("A", "B", 2, 1),
        ("C", "A", 0, 0),
        ("B", "C", 3, 1),
        ("A", "C", 1, 0),
        ("B", "A", 2, 2),
        ("C", "B", 1, 2),
        ("A", "B", 0, 1),
        ("C", "A", 2, 3),
        ("B", "C", 1, 1),
        ("A", "C", 4, 0),
    ];
    fixtures
        .iter()
        .enumerate()
        .map(|(i, (h, a, hg, ag))| {
            let n = i as i64 + 1;
            PairedEvent::new(format!("m{n}"), week(n), *h, *a, *hg, *ag)
        })
        .collect()
}

fn featurize(events: &[PairedEvent]) -> FeatureFrame {
    let log = EventLog::from_paired(events).unwrap();
    Engine::default().featurize(&log).unwrap()
}

#[test]
fn end_to_end_values_at_event_eight() {
    let frame = featurize(&toy_events());
    let a = frame.row_of(&"A".into(), week(8)).unwrap();

    // A before week 8: W 2-1, D 0-0, W 1-0, D 2-2, L 0-1.
    assert!(close(frame.value(a, "is_home"), 0.0));
    assert!(close(frame.value(a, "is_weekend"), 1.0));
    assert!(close(frame.value(a, "matches_played"), 5.0));
    assert!(close(frame.value(a, "rest_days"), 7.0));
    assert!(close(frame.value(a, "goals_for_L3_mean"), 1.0));
    assert!(close(frame.value(a, "goals_for_L5_mean"), 1.0));
    assert!(close(frame.value(a, "goals_for_L5_std"), 1.0));
    assert!(close(frame.value(a, "points_L5_mean"), 1.6));
    assert!(close(frame.value(a, "win_rate_L5"), 0.4));
    assert!(close(frame.value(a, "win_rate_L3"), 1.0 / 3.0));
    assert!(close(frame.value(a, "clean_sheet_rate_L5"), 0.4));
    assert!(close(frame.value(a, "goals_for_Away_L3_mean"), 1.0));
    assert!(close(frame.value(a, "goals_for_expanding_mean"), 1.0));
    assert!(close(frame.value(a, "win_streak"), 0.0));
    assert!(close(frame.value(a, "events_since_win"), 2.0));
    assert!(close(frame.value(a, "events_since_loss"), 0.0));

    // Meetings with C: D 0-0, W 1-0.
    assert!(close(frame.value(a, "h2h_matches"), 2.0));
    assert!(close(frame.value(a, "h2h_win_rate"), 0.5));
    assert!(close(frame.value(a, "h2h_points_L5"), 2.0));
    assert!(close(frame.value(a, "h2h_goals_for_L5"), 0.5));

    // C before week 8: D 0-0, L 1-3, L 0-1, L 1-2.
    assert!(close(frame.value(a, "opp_win_rate_L5"), 0.0));
    assert!(close(frame.value(a, "opp_matches_played"), 4.0));
    assert!(close(frame.value(a, "opp_goals_against_L5_mean"), 1.5));
    assert!(close(frame.value(a, "opp_rest_days"), 14.0));
    assert!(close(frame.value(a, "diff_points"), 1.6 - 0.25));
    assert!(close(frame.value(a, "diff_rest_days"), -7.0));
    assert!(close(frame.value(a, "btts_index_L5"), 0.6 * 0.75));
    assert!(close(frame.value(a, "attack_vs_defence_L5"), 1.5));
    assert!(close(frame.value(a, "combined_goals_L5"), 0.75));
}

#[test]
fn rolling_window_excludes_current_event() {
    let goals = [1, 0, 2, 3, 1, 4, 0];
    let opponents = ["B", "C", "D", "E", "F", "G", "H"];
    let events = goals
        .iter()
        .zip(opponents)
        .enumerate()
        .map(|(i, (g, opp))| {
            let n = i as i64 + 1;
            PairedEvent::new(format!("m{n}"), week(n), "A", opp, *g, 0)
        })
        .collect::<Vec<_>>();
    let frame = featurize(&events);

    let row = |n: i64| frame.row_of(&"A".into(), week(n)).unwrap();
    // The event scoring 4 sees [2, 3, 1].
    assert!(close(frame.value(row(6), "goals_for_L3_mean"), 2.0));
    // The one after it sees [3, 1, 4].
    assert!(close(frame.value(row(7), "goals_for_L3_mean"), 8.0 / 3.0));
    assert!(close(frame.value(row(3), "goals_for_L3_mean"), 0.5));
}

#[test]
fn first_event_has_missing_history() {
    let frame = featurize(&toy_events());
    let b = frame.row_of(&"B".into(), week(1)).unwrap();
    assert_eq!(frame.value(b, "goals_for_L3_mean"), None);
    assert_eq!(frame.value(b, "win_rate_L5"), None);
    assert_eq!(frame.value(b, "rest_days"), None);
    assert_eq!(frame.value(b, "events_since_win"), None);
    assert_eq!(frame.value(b, "h2h_win_rate"), None);
    assert!(close(frame.value(b, "h2h_matches"), 0.0));
    assert!(close(frame.value(b, "matches_played"), 0.0));
    assert!(close(frame.value(b, "win_streak"), 0.0));
    assert!(close(frame.value(b, "is_home"), 0.0));
}

#[test]
fn first_event_defaults_after_reconcile() {
    let events = toy_events();
    let log = EventLog::from_paired(&events).unwrap();
    let set = Engine::default().train(&log).unwrap();
    let b = set
        .rows
        .iter()
        .find(|r| r.key.entity.as_str() == "B" && r.key.date == week(1))
        .unwrap();
    let at = |name: &str| b.values[set.schema.position(name).unwrap()];

    // 7 decisive matches out of 10: 7 wins over 20 rows.
    assert!((at("win_rate_L5") - 7.0 / 20.0).abs() < 1e-9);
    assert_eq!(at("goals_for_L3_mean"), 0.0);
    assert_eq!(at("rest_days"), 7.0);
    assert_eq!(at("events_since_win"), 10.0);
    assert!(set.rows.iter().all(|r| r.values.iter().all(|v| v.is_finite())));
}

#[test]
fn rows_ignore_their_own_and_later_events() {
    let events = FakeLeague {
        teams: 4,
        seasons: 1,
        ..FakeLeague::default()
    }
    .generate();
    let base = featurize(&events);

    for (i, target) in events.iter().enumerate() {
        let mut altered = events.clone();
        let ev = &mut altered[i];
        ev.home_goals += 3;
        std::mem::swap(&mut ev.home_goals, &mut ev.away_goals);
        for value in ev.home_stats.values_mut().chain(ev.away_stats.values_mut()) {
            *value = *value * 2.0 + 1.0;
        }
        let changed = featurize(&altered);
        assert_eq!(changed.names(), base.names());
        assert_eq!(changed.keys(), base.keys());

        for (row, key) in base.keys().iter().enumerate() {
            if key.date > target.date {
                continue;
            }
            for name in base.names() {
                assert_eq!(
                    base.value(row, name),
                    changed.value(row, name),
                    "{} on {} {name} moved when event {} changed",
                    key.entity,
                    key.date,
                    target.match_id
                );
            }
        }
    }
}

#[test]
fn long_drought_never_reads_better_than_no_win() {
    // A wins once then loses twenty; N loses all twenty-one; then they meet.
    let mut events = vec![PairedEvent::new("a1", week(1), "A", "B", 1, 0)];
    for n in 2..=21 {
        events.push(PairedEvent::new(format!("a{n}"), week(n), "A", "C", 0, 1));
    }
    for n in 1..=21 {
        events.push(PairedEvent::new(format!("n{n}"), week(n), "N", "D", 0, 2));
    }
    events.push(PairedEvent::new("final", week(22), "A", "N", 1, 1));
    let log = EventLog::from_paired(&events).unwrap();
    let set = Engine::default().train(&log).unwrap();

    let at = |entity: &str| {
        let row = set
            .rows
            .iter()
            .find(|r| r.key.entity.as_str() == entity && r.key.date == week(22))
            .unwrap();
        row.values[set.schema.position("events_since_win").unwrap()]
    };
    assert_eq!(at("A"), 10.0);
    assert_eq!(at("N"), 10.0);
    assert!(at("N") >= at("A"));
}

#[test]
fn zero_min_periods_are_raised_before_aggregating() {
    let mut cfg = EngineConfig::default();
    cfg.min_periods.mean = 0;
    cfg.min_periods.rate = 0;
    let engine = Engine::new(cfg);
    assert_eq!(engine.config().min_periods.mean, 1);

    let frame = engine
        .featurize(&EventLog::from_paired(&toy_events()).unwrap())
        .unwrap();
    let b = frame.row_of(&"B".into(), week(1)).unwrap();
    assert_eq!(frame.value(b, "goals_for_L3_mean"), None);
    assert_eq!(frame.value(b, "win_rate_L5"), None);
    for name in frame.names() {
        for row in 0..frame.len() {
            assert!(frame.value(row, name).is_none_or(|v| v.is_finite()), "{name}");
        }
    }
}

#[test]
fn opponent_mirror_matches_opponent_row() {
    let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let mut events = vec![
        PairedEvent::new("p1", d - Duration::days(21), "A", "C", 1, 0),
        PairedEvent::new("p2", d - Duration::days(14), "B", "C", 2, 0),
        PairedEvent::new("p3", d - Duration::days(7), "D", "B", 1, 1),
    ];
    events.push(PairedEvent::new("target", d, "A", "B", 0, 0));
    let frame = featurize(&events);

    let a = frame.row_of(&"A".into(), d).unwrap();
    let b = frame.row_of(&"B".into(), d).unwrap();
    for name in ["win_rate_L5", "points_L5_mean", "matches_played", "rest_days"] {
        assert_eq!(
            frame.value(a, &format!("opp_{name}")),
            frame.value(b, name),
            "mirror of {name}"
        );
        assert_eq!(frame.value(b, &format!("opp_{name}")), frame.value(a, name));
    }
    assert!(close(frame.value(a, "opp_win_rate_L5"), 0.5));
}

#[test]
fn repeated_runs_are_identical() {
    let league = FakeLeague {
        teams: 8,
        seasons: 2,
        ..FakeLeague::default()
    };
    let log = EventLog::from_paired(&league.generate()).unwrap();

    let serial = Engine::new(EngineConfig {
        parallelism: 1,
        ..EngineConfig::default()
    });
    let parallel = Engine::new(EngineConfig {
        parallelism: 4,
        ..EngineConfig::default()
    });
    let a = serial.train(&log).unwrap();
    let b = parallel.train(&log).unwrap();
    let c = parallel.train(&log).unwrap();

    assert_eq!(a.schema.fingerprint, b.schema.fingerprint);
    assert_eq!(a.rows, b.rows);
    assert_eq!(b.rows, c.rows);
    assert_eq!(a.targets, c.targets);
    assert!(a.schema.position("xg_for_L5_mean").is_some());
    assert!(a.schema.position("total_cards_L5_mean").is_some());
}

#[test]
fn one_entity_twice_on_a_date_is_rejected() {
    let d = week(1);
    let err = EventLog::from_paired(&[
        PairedEvent::new("x1", d, "A", "B", 1, 0),
        PairedEvent::new("x2", d, "C", "A", 1, 0),
    ])
    .unwrap_err();
    assert!(matches!(err, FeatureError::DuplicateEventDate { .. }));
}
