//! Signal semantics through a compiled strategy: defaults, short-circuit
//! order, crossings and TOML loading.

use simlab_core::domain::{Candle, Timestamp};
use simlab_core::indicators::{IndicatorKind, IndicatorSnapshot, IndicatorSpec};
use simlab_core::signals::{
    compile_group, evaluate, Comparison, EvalContext, Logic, SignalCondition, SignalGroupConfig,
    SignalNode, TraceEntry,
};
use simlab_core::StrategyConfig;

fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let open = if i == 0 { c } else { closes[i - 1] };
            Candle::new(
                Timestamp::from_secs(60 * i as i64),
                open,
                open.max(c) + 0.5,
                open.min(c) - 0.5,
                c,
                100.0,
            )
        })
        .collect()
}

fn strategy_with(indicators: Vec<IndicatorSpec>) -> StrategyConfig {
    let mut cfg = StrategyConfig::new("signals");
    cfg.indicators = indicators;
    cfg
}

fn compile(cfg: &StrategyConfig, group: &SignalGroupConfig) -> SignalNode {
    compile_group(group, &cfg.catalog().unwrap()).unwrap()
}

fn ctx<'a>(candles: &'a [Candle], snaps: &'a [IndicatorSnapshot], i: usize) -> EvalContext<'a> {
    EvalContext {
        candle: &candles[i],
        indicators: &snaps[i],
        prev_indicators: i.checked_sub(1).map(|p| &snaps[p]),
    }
}

#[test]
fn empty_and_group_is_vacuously_true() {
    let cfg = strategy_with(vec![IndicatorSpec::new("price", IndicatorKind::Price)]);
    let node = compile(&cfg, &SignalGroupConfig::default());
    assert!(matches!(node, SignalNode::Group { logic: Logic::And, ref children } if children.is_empty()));

    let candles = candles_from_closes(&[1.0, 2.0]);
    let snaps = cfg.compile().unwrap().engine.compute_series(&candles);
    assert!(evaluate(&node, &ctx(&candles, &snaps, 1)).satisfied);

    let empty_or = compile(&cfg, &SignalGroupConfig::any(vec![]));
    assert!(!evaluate(&empty_or, &ctx(&candles, &snaps, 1)).satisfied);
}

#[test]
fn omitted_field_reads_value() {
    let cfg = strategy_with(vec![IndicatorSpec::new(
        "bb",
        IndicatorKind::Bollinger {
            period: 3,
            std_dev: 2.0,
        },
    )]);
    let closes = [10.0, 11.0, 12.0, 11.0, 13.0, 12.5];
    let candles = candles_from_closes(&closes);
    let snaps = cfg.compile().unwrap().engine.compute_series(&candles);

    for threshold in [11.0, 12.0, 12.2, 13.0] {
        let implicit = compile(
            &cfg,
            &SignalGroupConfig::all(vec![SignalCondition::new("bb", Comparison::Gt, threshold)]),
        );
        let explicit = compile(
            &cfg,
            &SignalGroupConfig::all(vec![
                SignalCondition::new("bb", Comparison::Gt, threshold).with_field("value")
            ]),
        );
        assert_eq!(implicit, explicit);
        for i in 0..candles.len() {
            assert_eq!(
                evaluate(&implicit, &ctx(&candles, &snaps, i)).satisfied,
                evaluate(&explicit, &ctx(&candles, &snaps, i)).satisfied,
            );
        }
    }
}

#[test]
fn leaves_on_warmup_snapshots_are_unsatisfied() {
    let cfg = strategy_with(vec![IndicatorSpec::new("sma", IndicatorKind::Sma { period: 4 })]);
    let candles = candles_from_closes(&[5.0, 5.0, 5.0, 5.0, 5.0]);
    let snaps = cfg.compile().unwrap().engine.compute_series(&candles);
    let node = compile(
        &cfg,
        &SignalGroupConfig::all(vec![SignalCondition::new("sma", Comparison::Gt, 0.0)]),
    );
    let satisfied: Vec<bool> = (0..candles.len())
        .map(|i| evaluate(&node, &ctx(&candles, &snaps, i)).satisfied)
        .collect();
    assert_eq!(satisfied, vec![false, false, false, true, true]);
}

#[test]
fn fast_ema_crosses_above_slow_once_after_the_bottom() {
    let cfg = strategy_with(vec![
        IndicatorSpec::new("fast", IndicatorKind::Ema { period: 2 }),
        IndicatorSpec::new("slow", IndicatorKind::Ema { period: 5 }),
    ]);
    let closes = [
        10.0, 9.0, 8.0, 7.0, 6.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0,
    ];
    let candles = candles_from_closes(&closes);
    let snaps = cfg.compile().unwrap().engine.compute_series(&candles);
    let node = compile(
        &cfg,
        &SignalGroupConfig::all(vec![SignalCondition::against(
            "fast",
            Comparison::CrossesAbove,
            "slow",
            None,
        )]),
    );
    let crossings: Vec<usize> = (0..candles.len())
        .filter(|&i| evaluate(&node, &ctx(&candles, &snaps, i)).satisfied)
        .collect();
    assert_eq!(crossings, vec![8]);
}

#[test]
fn crossing_without_previous_snapshot_is_unsatisfied() {
    let cfg = strategy_with(vec![IndicatorSpec::new("price", IndicatorKind::Price)]);
    let candles = candles_from_closes(&[1.0, 3.0]);
    let snaps = cfg.compile().unwrap().engine.compute_series(&candles);
    let node = compile(
        &cfg,
        &SignalGroupConfig::all(vec![SignalCondition::new("price", Comparison::CrossesAbove, 2.0)]),
    );
    let no_prev = EvalContext {
        candle: &candles[1],
        indicators: &snaps[1],
        prev_indicators: None,
    };
    assert!(!evaluate(&node, &no_prev).satisfied);
    assert!(evaluate(&node, &ctx(&candles, &snaps, 1)).satisfied);
}

#[test]
fn nested_groups_short_circuit_in_document_order() {
    let cfg = strategy_with(vec![
        IndicatorSpec::new("price", IndicatorKind::Price),
        IndicatorSpec::new("sma", IndicatorKind::Sma { period: 2 }),
    ]);
    let candles = candles_from_closes(&[10.0, 12.0]);
    let snaps = cfg.compile().unwrap().engine.compute_series(&candles);

    // price > 11 AND (price < 5 OR sma > 10 OR price.volume > 0)
    let group = SignalGroupConfig::all(vec![SignalCondition::new("price", Comparison::Gt, 11.0)])
        .with_group(SignalGroupConfig::any(vec![
            SignalCondition::new("price", Comparison::Lt, 5.0),
            SignalCondition::new("sma", Comparison::Gt, 10.0),
            SignalCondition::new("price", Comparison::Gt, 0.0).with_field("volume"),
        ]));
    let outcome = evaluate(&compile(&cfg, &group), &ctx(&candles, &snaps, 1));
    assert!(outcome.satisfied);

    let visited: Vec<String> = outcome
        .trace
        .iter()
        .filter_map(|t| match t {
            TraceEntry::Condition { condition, .. } => Some(condition.clone()),
            TraceEntry::Group { .. } => None,
        })
        .collect();
    // The OR stops at the sma leaf; the volume leaf is never visited.
    assert_eq!(visited, vec!["price.value > 11", "price.value < 5", "sma.value > 10"]);
}

#[test]
fn toml_signal_with_operator_alias_and_nested_group() {
    let text = r#"
        name = "toml-signals"

        [[indicators]]
        name = "rsi"
        type = "rsi"
        period = 3

        [[indicators]]
        name = "macd"
        type = "macd"
        fast = 2
        slow = 4
        signal = 2

        [entry.signal]
        logic = "or"

        [[entry.signal.conditions]]
        indicator = "rsi"
        operator = "<="
        threshold = 20

        [[entry.signal.groups]]
        [[entry.signal.groups.conditions]]
        indicator = "macd"
        field = "histogram"
        op = "crosses_above"
        threshold = 0
    "#;
    let cfg = StrategyConfig::from_toml_str(text).unwrap();
    let compiled = cfg.compile().unwrap();
    let node = compiled.entry.signal.as_ref().unwrap();
    assert!(node.uses_crossing());
    assert_eq!(node.leaf_count(), 2);
    match node {
        SignalNode::Group { logic, children } => {
            assert_eq!(*logic, Logic::Or);
            assert!(matches!(children[1], SignalNode::Group { logic: Logic::And, .. }));
        }
        SignalNode::Leaf(_) => panic!("root must be a group"),
    }
}

#[test]
fn unknown_field_is_a_config_error() {
    let mut cfg = strategy_with(vec![IndicatorSpec::new("rsi", IndicatorKind::Rsi { period: 14 })]);
    cfg.entry.signal = Some(SignalGroupConfig::all(vec![
        SignalCondition::new("rsi", Comparison::Lt, 30.0).with_field("upper")
    ]));
    let err = cfg.compile().unwrap_err();
    assert!(err.to_string().contains("no field 'upper'"), "{err}");
}
