//! End-to-end tests of the backtest pipeline against a mock data port.

mod common;

use approx::assert_relative_eq;
use common::*;
use proptest::prelude::*;
use std::sync::atomic::AtomicBool;
use stratsim::domain::codegen::generate;
use stratsim::domain::engine::{self, prepare};
use stratsim::domain::error::{EngineError, RejectReason};
use stratsim::domain::interpreter::interpret;
use stratsim::domain::metrics::{Metrics, QualityGrade};
use stratsim::domain::position::{ExitReason, Trade};
use stratsim::domain::sandbox;

fn run_closes(text: &str, closes: &[f64]) -> Result<engine::BacktestReport, EngineError> {
    let data = MockDataPort::new().with_bars("TEST", bars_from_closes("TEST", closes));
    engine::run(
        &data,
        &request(text, "TEST", closes.len()),
        &EngineSettings::default(),
        &AtomicBool::new(false),
    )
}

mod scenarios {
    use super::*;

    #[test]
    fn rsi_strategy_on_uptrend_trades_and_is_graded() {
        let report = run_closes(RSI_STRATEGY, &uptrend_with_pullbacks(300)).unwrap();

        assert!(report.intent.understood);
        assert!(report.intent.clarifications_needed.is_empty());
        assert!(!report.trades.is_empty());
        assert_eq!(
            report.metrics.quality_grade,
            QualityGrade::from_score(report.metrics.composite_score)
        );
        assert_eq!(report.metrics.total_trades, report.trades.len());
    }

    #[test]
    fn unrecognised_text_asks_for_both_signals() {
        let intent = interpret("make me some money please", "swing");
        assert!(!intent.understood);
        assert_eq!(intent.clarifications_needed.len(), 2);
        assert!(matches!(
            generate(&intent),
            Err(EngineError::ClarificationNeeded { .. })
        ));

        let data = MockDataPort::new().with_bars("TEST", bars_from_closes("TEST", &flat(10, 1.0)));
        let result = engine::run(
            &data,
            &request("make me some money please", "TEST", 10),
            &EngineSettings::default(),
            &AtomicBool::new(false),
        );
        match result {
            Err(EngineError::ClarificationNeeded { clarifications }) => {
                assert_eq!(clarifications.len(), 2)
            }
            other => panic!("expected clarification, got {:?}", other.map(|r| r.trades.len())),
        }
        assert_eq!(data.fetches.get(), 0);
    }

    #[test]
    fn injected_file_access_is_rejected_before_execution() {
        let intent = interpret(RSI_STRATEGY, "swing");
        let mut source = generate(&intent).unwrap();
        source.push_str("# open('/etc/passwd')\n");

        match sandbox::compile(&source) {
            Err(RejectReason::DeniedToken { token }) => assert_eq!(token, "open("),
            other => panic!("expected denied token, got {:?}", other.map(|r| r.warmup())),
        }
        let err: EngineError = sandbox::compile(&source).unwrap_err().into();
        assert!(matches!(err, EngineError::GenerationRejected(_)));
    }

    #[test]
    fn category_wording_does_not_affect_the_run() {
        let closes = uptrend_with_pullbacks(300);
        let data = MockDataPort::new().with_bars("TEST", bars_from_closes("TEST", &closes));
        let baseline = run_closes(RSI_STRATEGY, &closes).unwrap();

        for category in ["evaluation", "important", "intraday execution"] {
            let mut req = request(RSI_STRATEGY, "TEST", closes.len());
            req.category = category.to_string();
            let report = engine::run(&data, &req, &EngineSettings::default(), &AtomicBool::new(false))
                .unwrap();
            assert_eq!(report.category, category);
            assert_eq!(report.generated_source, baseline.generated_source);
            assert_eq!(report.trades, baseline.trades);
        }
    }

    #[test]
    fn flat_equity_ratios_are_zero() {
        let trade = Trade {
            entry_date: day(0),
            exit_date: day(5),
            entry_price: 10.0,
            exit_price: 10.0,
            shares: 100.0,
            return_pct: 0.0,
            profit: 0.0,
            exit_reason: ExitReason::Signal,
            bars_held: 5,
        };
        let curve = vec![1_000.0; 7];
        let m = Metrics::compute(&[trade], &curve, 1_000.0);

        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.sortino_ratio, 0.0);
        assert_eq!(m.calmar_ratio, 0.0);
        assert!(m.composite_score.is_finite());
        assert_eq!(m.p_value, 1.0);
    }

    #[test]
    fn no_trades_is_degenerate() {
        let report = run_closes(RSI_STRATEGY, &flat(260, 50.0)).unwrap();
        assert!(report.trades.is_empty());
        assert_eq!(report.metrics.composite_score, 0.0);
        assert_eq!(report.metrics.quality_grade, QualityGrade::F);
        assert_eq!(report.metrics.final_equity, 100_000.0);
    }
}

mod invariants {
    use super::*;

    #[test]
    fn generated_source_is_deterministic() {
        let a = generate(&interpret(RSI_STRATEGY, "swing")).unwrap();
        let b = generate(&interpret(RSI_STRATEGY, "swing")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn simulation_is_deterministic() {
        let closes = uptrend_with_pullbacks(300);
        let a = run_closes(RSI_STRATEGY, &closes).unwrap();
        let b = run_closes(RSI_STRATEGY, &closes).unwrap();
        assert_eq!(a.trades, b.trades);
        assert_eq!(a.equity_curve, b.equity_curve);
    }

    #[test]
    fn equity_curve_has_one_point_per_bar_plus_start() {
        let report = run_closes(RSI_STRATEGY, &uptrend_with_pullbacks(300)).unwrap();
        assert_eq!(report.equity_curve.len(), 301);
        assert_eq!(report.equity_curve[0], 100_000.0);
    }

    #[test]
    fn trades_alternate_and_never_overlap() {
        let report = run_closes(RSI_STRATEGY, &uptrend_with_pullbacks(300)).unwrap();
        for t in &report.trades {
            assert!(t.exit_date > t.entry_date);
        }
        for pair in report.trades.windows(2) {
            assert!(pair[1].entry_date > pair[0].exit_date);
        }
    }

    #[test]
    fn profit_reconciles_with_final_equity() {
        let report = run_closes(RSI_STRATEGY, &uptrend_with_pullbacks(300)).unwrap();
        let total: f64 = report.trades.iter().map(|t| t.profit).sum();
        assert_relative_eq!(
            total,
            report.metrics.final_equity - report.initial_capital,
            epsilon = 1e-6
        );
    }

    #[test]
    fn last_trade_is_forced_closed_when_still_open() {
        let report = run_closes(RSI_STRATEGY, &uptrend_with_pullbacks(300)).unwrap();
        let last = report.trades.last().unwrap();
        if last.exit_reason == ExitReason::EndOfData {
            assert_eq!(last.exit_date, day(299));
        }
    }

    #[test]
    fn prepare_matches_engine_source() {
        let (_, rules) = prepare(RSI_STRATEGY, "swing").unwrap();
        let report = run_closes(RSI_STRATEGY, &uptrend_with_pullbacks(300)).unwrap();
        assert_eq!(rules.source(), report.generated_source);
    }
}

mod data_errors {
    use super::*;

    #[test]
    fn empty_series_is_no_historical_data() {
        let data = MockDataPort::new().with_bars("TEST", vec![]);
        let result = engine::run(
            &data,
            &request(RSI_STRATEGY, "TEST", 10),
            &EngineSettings::default(),
            &AtomicBool::new(false),
        );
        assert!(matches!(result, Err(EngineError::NoHistoricalData { .. })));
    }

    #[test]
    fn unknown_symbol_is_no_historical_data() {
        let data = MockDataPort::new();
        let result = engine::run(
            &data,
            &request(RSI_STRATEGY, "NOPE", 10),
            &EngineSettings::default(),
            &AtomicBool::new(false),
        );
        assert!(matches!(result, Err(EngineError::NoHistoricalData { ref symbol, .. }) if symbol == "NOPE"));
    }

    #[test]
    fn collaborator_error_propagates() {
        let data = MockDataPort::new().with_error("TEST", "connection refused");
        let result = engine::run(
            &data,
            &request(RSI_STRATEGY, "TEST", 10),
            &EngineSettings::default(),
            &AtomicBool::new(false),
        );
        match result {
            Err(EngineError::Data { reason }) => assert_eq!(reason, "connection refused"),
            other => panic!("expected data error, got {:?}", other.map(|r| r.bars)),
        }
        assert_eq!(data.fetches.get(), 1);
    }
}

mod properties {
    use super::*;

    fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(-3.0..3.0_f64, 210..280).prop_map(|steps| {
            let mut price = 100.0_f64;
            steps
                .into_iter()
                .map(|s| {
                    price = (price + s).max(5.0);
                    price
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn equity_length_and_score_bounds(closes in arb_closes()) {
            let report = run_closes(RSI_STRATEGY, &closes).unwrap();
            prop_assert_eq!(report.equity_curve.len(), closes.len() + 1);
            prop_assert!(report.metrics.composite_score >= 0.0);
            prop_assert!(report.metrics.composite_score <= 100.0);
        }

        #[test]
        fn at_most_one_open_position(closes in arb_closes()) {
            let report = run_closes(RSI_STRATEGY, &closes).unwrap();
            let mut open_until = None;
            for t in &report.trades {
                if let Some(prev_exit) = open_until {
                    prop_assert!(t.entry_date > prev_exit);
                }
                prop_assert!(t.exit_date > t.entry_date);
                open_until = Some(t.exit_date);
            }
        }

        #[test]
        fn score_is_bounded_for_arbitrary_trades(
            profits in prop::collection::vec(-200.0..500.0_f64, 1..40),
        ) {
            let mut equity = vec![10_000.0];
            let trades: Vec<Trade> = profits
                .iter()
                .enumerate()
                .map(|(i, &p)| {
                    let last = *equity.last().unwrap();
                    equity.push(last + p);
                    Trade {
                        entry_date: day(i * 2),
                        exit_date: day(i * 2 + 1),
                        entry_price: 100.0,
                        exit_price: 100.0 + p / 100.0,
                        shares: 100.0,
                        return_pct: p / 100.0,
                        profit: p,
                        exit_reason: ExitReason::Signal,
                        bars_held: 1,
                    }
                })
                .collect();
            let m = Metrics::compute(&trades, &equity, 10_000.0);
            prop_assert!((0.0..=100.0).contains(&m.composite_score));
            prop_assert_eq!(m.quality_grade, QualityGrade::from_score(m.composite_score));
        }
    }
}
