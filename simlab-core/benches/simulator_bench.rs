//! Criterion benchmarks for SimLab hot paths.
//!
//! Benchmarks:
//! 1. Full simulation (entry scan + exit state machine)
//! 2. Indicator series computation
//! 3. Signal tree evaluation
//! 4. Friction overlay on a finished trade
//! 5. Calibration over a live-trade sample

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use simlab_core::calibration::{calibrate, CalibrationOptions, LiveTradeRecord};
use simlab_core::domain::{Candle, Timestamp};
use simlab_core::entry::InitialEntry;
use simlab_core::execution::{
    ExecutionContext, ExecutionModel, FailureModel, LatencyDistribution, PartialFillModel,
    Side, SlippageModel, TradeExecutor,
};
use simlab_core::exit::{ProfitTarget, TrailingStopConfig};
use simlab_core::indicators::{IndicatorKind, IndicatorSpec};
use simlab_core::signals::{evaluate, Comparison, EvalContext, SignalCondition, SignalGroupConfig};
use simlab_core::{simulate, StrategyConfig};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_candles(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 1.0 + (i as f64 * 0.05).sin() * 0.2;
            let open = close - 0.003;
            Candle::new(
                Timestamp::from_secs(60 * i as i64),
                open,
                close + 0.01,
                open - 0.01,
                close,
                10_000.0 + (i % 500) as f64,
            )
        })
        .collect()
}

fn make_strategy() -> StrategyConfig {
    let mut cfg = StrategyConfig::new("bench");
    cfg.indicators = vec![
        IndicatorSpec::new("fast", IndicatorKind::Ema { period: 9 }),
        IndicatorSpec::new("slow", IndicatorKind::Ema { period: 21 }),
        IndicatorSpec::new("rsi", IndicatorKind::Rsi { period: 14 }),
        IndicatorSpec::new("atr", IndicatorKind::Atr { period: 14 }),
        IndicatorSpec::new(
            "bb",
            IndicatorKind::Bollinger {
                period: 20,
                std_dev: 2.0,
            },
        ),
    ];
    cfg.entry.initial_entry = Some(InitialEntry { drop_pct: -0.02 });
    cfg.entry.signal = Some(
        SignalGroupConfig::all(vec![SignalCondition::against(
            "fast",
            Comparison::Gt,
            "slow",
            None,
        )])
        .with_group(SignalGroupConfig::any(vec![
            SignalCondition::new("rsi", Comparison::Lt, 70.0),
            SignalCondition::new("bb", Comparison::Gt, 0.9).with_field("lower"),
        ])),
    );
    cfg.exit.targets = vec![ProfitTarget::new(0.5, 0.05), ProfitTarget::new(0.5, 0.12)];
    cfg.exit.stop_loss_pct = Some(0.08);
    cfg.exit.trailing_stop = Some(TrailingStopConfig {
        trail_pct: 0.04,
        activation_pct: 0.03,
    });
    cfg.exit.break_even_after_first_target = true;
    cfg
}

fn make_model() -> ExecutionModel {
    let mut model = ExecutionModel::ideal("bench");
    model.network_latency = LatencyDistribution::new(400.0, 1_200.0, 4_000.0, 50.0);
    model.confirmation_latency = LatencyDistribution::new(800.0, 2_000.0, 6_000.0, 80.0);
    model.slippage = SlippageModel::SqrtSize {
        coefficient: 8.0,
        min_bps: 2.0,
        max_bps: 150.0,
    };
    model.failure = FailureModel {
        base_rate: 0.05,
        congestion_delta: 0.1,
        fee_shortfall_delta: 0.05,
        max_rate: 0.2,
    };
    model.partial_fill = PartialFillModel {
        probability: 0.1,
        min_fraction: 0.4,
        max_fraction: 0.95,
    };
    model.fee_bps = 25.0;
    model
}

fn make_records(n: usize) -> Vec<LiveTradeRecord> {
    (0..n)
        .map(|i| {
            let size = (i % 20 + 1) as f64;
            let submitted = 10_000 * i as i64;
            let landed = submitted + 200 + (i % 97) as i64 * 7;
            let failed = i % 13 == 0;
            LiveTradeRecord {
                venue: "bench".into(),
                side: if i % 2 == 0 { Side::Buy } else { Side::Sell },
                size,
                expected_price: 1.0,
                actual_price: (!failed).then(|| {
                    let bps = 6.0 * size.sqrt();
                    if i % 2 == 0 {
                        1.0 + bps / 10_000.0
                    } else {
                        1.0 - bps / 10_000.0
                    }
                }),
                submitted_at: Timestamp::from_millis(submitted),
                landed_at: Timestamp::from_millis(landed),
                confirmed_at: (!failed).then(|| Timestamp::from_millis(landed + 600 + (i % 31) as i64 * 20)),
                failed,
                fill_fraction: if i % 11 == 0 { 0.7 } else { 1.0 },
                congested: i % 5 == 0,
                fee_shortfall: i % 7 == 0,
            }
        })
        .collect()
}

// ── 1. Full Simulation ───────────────────────────────────────────────

fn bench_simulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate");
    let compiled = make_strategy().compile().unwrap();

    for &candle_count in &[500, 5_000, 50_000] {
        let candles = make_candles(candle_count);
        group.bench_with_input(BenchmarkId::new("ladder_trailing", candle_count), &candles, |b, candles| {
            b.iter(|| simulate(black_box(&compiled), black_box(candles)));
        });
    }

    group.finish();
}

// ── 2. Indicator Series ──────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicators");
    let compiled = make_strategy().compile().unwrap();
    let candles = make_candles(10_000);

    group.bench_function("compute_series_5_indicators_10k", |b| {
        b.iter(|| compiled.engine.compute_series(black_box(&candles)));
    });

    group.finish();
}

// ── 3. Signal Evaluation ─────────────────────────────────────────────

fn bench_signals(c: &mut Criterion) {
    let mut group = c.benchmark_group("signals");
    let compiled = make_strategy().compile().unwrap();
    let candles = make_candles(2_000);
    let snapshots = compiled.engine.compute_series(&candles);
    let Some(node) = compiled.entry.signal.as_ref() else {
        return;
    };

    group.bench_function("nested_tree_2k_candles", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for i in 1..candles.len() {
                let ctx = EvalContext {
                    candle: &candles[i],
                    indicators: &snapshots[i],
                    prev_indicators: Some(&snapshots[i - 1]),
                };
                if evaluate(black_box(node), &ctx).satisfied {
                    hits += 1;
                }
            }
            hits
        });
    });

    group.finish();
}

// ── 4. Friction Overlay ──────────────────────────────────────────────

fn bench_overlay(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlay");
    let compiled = make_strategy().compile().unwrap();
    let candles = make_candles(5_000);
    let Some(trade) = simulate(&compiled, &candles).trade else {
        return;
    };
    let model = make_model();
    let executor = TradeExecutor::new(&model, ExecutionContext::new(5.0).congested(true));

    group.bench_function("execute_trade", |b| {
        let mut rng = StdRng::seed_from_u64(42);
        b.iter(|| executor.execute(black_box(&trade), black_box(&candles), &mut rng));
    });

    group.finish();
}

// ── 5. Calibration ───────────────────────────────────────────────────

fn bench_calibration(c: &mut Criterion) {
    let mut group = c.benchmark_group("calibration");
    let options = CalibrationOptions::new("bench");

    for &n in &[100, 10_000] {
        let records = make_records(n);
        group.bench_with_input(BenchmarkId::new("calibrate", n), &records, |b, records| {
            b.iter(|| calibrate(black_box(records), "bench", &options));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_simulate,
    bench_indicators,
    bench_signals,
    bench_overlay,
    bench_calibration,
);
criterion_main!(benches);
