use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use form_engine::fake_log::FakeLeague;
use form_engine::plan::FeaturePlan;
use form_engine::{Engine, EngineConfig, EventLog, MatchupRequest, Venue};

fn sample_league() -> FakeLeague {
    FakeLeague {
        teams: 20,
        seasons: 3,
        ..FakeLeague::default()
    }
}

fn sample_log() -> EventLog {
    EventLog::from_paired(&sample_league().generate()).expect("valid synthetic league")
}

fn bench_plan_resolve(c: &mut Criterion) {
    let log = sample_log();
    let cfg = EngineConfig::default();
    c.bench_function("plan_resolve", |b| {
        b.iter(|| {
            let plan = FeaturePlan::resolve(black_box(&cfg), black_box(&log));
            black_box(plan.len());
        })
    });
}

fn bench_featurize(c: &mut Criterion) {
    let log = sample_log();
    let engine = Engine::default();
    c.bench_function("featurize_league", |b| {
        b.iter(|| {
            let frame = engine.featurize(black_box(&log)).expect("featurize");
            black_box(frame.len());
        })
    });
}

fn bench_train(c: &mut Criterion) {
    let log = sample_log();
    let engine = Engine::default();
    c.bench_function("train_league", |b| {
        b.iter(|| {
            let set = engine.train(black_box(&log)).expect("train");
            black_box(set.rows.len());
        })
    });
}

fn bench_infer(c: &mut Criterion) {
    let log = sample_log();
    let engine = Engine::default();
    let schema = engine.train(&log).expect("train").schema;
    let names = sample_league().team_names();
    let request = MatchupRequest::new(names[0].clone(), names[1].clone(), Venue::Home);
    c.bench_function("infer_matchup", |b| {
        b.iter(|| {
            let vector = engine
                .infer(black_box(&log), black_box(&schema), black_box(&request))
                .expect("infer");
            black_box(vector.values.len());
        })
    });
}

criterion_group!(
    perf,
    bench_plan_resolve,
    bench_featurize,
    bench_train,
    bench_infer
);
criterion_main!(perf);
