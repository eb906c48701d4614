use chrono::NaiveDate;
use hedgegate::config::AppConfig;
use hedgegate::domain::{Side, SignalType, TradeRequest};
use hedgegate::strategy::{ExitReason, RiskGate, RiskLevel, RiskLimits};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn gate() -> RiskGate {
    let config = AppConfig::default_config(&[]);
    RiskGate::with_date(RiskLimits::from(&config.trading), day())
}

fn buy(market: &str, amount: Decimal, confidence: f64) -> TradeRequest {
    TradeRequest::new(market, Side::Yes, amount, dec!(0.40), SignalType::Momentum, confidence)
}

/// Approve, fill and book the way the engine does
fn fill(gate: &mut RiskGate, request: &TradeRequest) -> bool {
    let decision = gate.assess_risk(request);
    if decision.approved {
        gate.update_position(
            &request.market_id,
            request.side,
            request.amount,
            request.price,
            Decimal::ZERO,
        );
    }
    decision.approved
}

#[test]
fn per_trade_cap_and_confidence() {
    let gate = gate();

    let decision = gate.assess_risk(&buy("m1", dec!(30), 0.9));
    assert!(!decision.approved);
    assert!(decision.reason.contains("exceeds max"));

    assert!(gate.assess_risk(&buy("m1", dec!(20), 0.9)).approved);
    assert!(!gate.assess_risk(&buy("m1", dec!(20), 0.4)).approved);
    assert_eq!(gate.state().daily_trades, 0);
}

#[test]
fn loss_breach_blocks_the_rest_of_the_day() {
    let mut gate = gate();
    assert!(fill(&mut gate, &buy("m1", dec!(10), 0.9)));

    gate.close_position("m1", dec!(-100.01));
    assert_eq!(gate.risk_level(), RiskLevel::Critical);

    for market in ["m1", "m2", "m3"] {
        let decision = gate.assess_risk(&buy(market, dec!(1), 1.0));
        assert!(!decision.approved);
        assert!(decision.reason.contains("Daily loss limit"));
    }
    let summary = gate.daily_summary();
    assert_eq!(summary.status, "stopped");
    assert_eq!(summary.trades, 1);
    assert_eq!(summary.pnl, dec!(-100.01));

    // Counters reset the next day
    gate.roll_day(day().succ_opt().unwrap());
    assert!(gate.assess_risk(&buy("m2", dec!(5), 0.9)).approved);
    assert_eq!(gate.daily_summary().status, "active");
}

#[test]
fn exposure_ceiling_is_aggregate() {
    let mut gate = gate();
    for market in ["a", "b", "c", "d"] {
        assert!(fill(&mut gate, &buy(market, dec!(24), 0.9)));
    }
    assert_eq!(gate.state().total_exposure(), dec!(96));

    // 96 + 5 would pass the 100 ceiling, 96 + 4 does not
    let decision = gate.assess_risk(&buy("e", dec!(5), 0.9));
    assert!(decision.reason.contains("Position limit"));
    assert!(fill(&mut gate, &buy("a", dec!(4), 0.9)));
    assert_eq!(gate.position("a").unwrap().amount, dec!(28));
}

#[test]
fn metrics_are_pure_and_track_fills() {
    let mut gate = gate();
    fill(&mut gate, &buy("m1", dec!(10), 0.9));
    fill(&mut gate, &buy("m2", dec!(6), 0.9));
    gate.record_pnl(dec!(-30));

    let first = gate.get_metrics();
    assert_eq!(first, gate.get_metrics());
    assert_eq!(first.open_positions, 2);
    assert_eq!(first.total_exposure, dec!(16));
    assert_eq!(first.max_position, dec!(10));
    assert_eq!(first.daily_trades, 2);
    assert_eq!(first.risk_level, RiskLevel::Medium);
    assert!(first.warnings.is_empty());
}

#[test]
fn directional_exit_thresholds() {
    let mut gate = gate();
    // 25 contracts for $10
    fill(&mut gate, &buy("m1", dec!(10), 0.9));

    assert_eq!(gate.should_close_position("m1", dec!(0.35), dec!(0.65)), None);
    assert_eq!(
        gate.should_close_position("m1", dec!(0.29), dec!(0.71)),
        Some(ExitReason::StopLoss)
    );
    assert_eq!(
        gate.should_close_position("m1", dec!(0.61), dec!(0.39)),
        Some(ExitReason::TakeProfit)
    );

    let unrealized = gate.unrealized_pnl("m1", dec!(0.29), dec!(0.71));
    assert_eq!(unrealized, dec!(-2.75));
    gate.close_position("m1", unrealized);
    assert_eq!(gate.state().daily_pnl, dec!(-2.75));
    assert!(gate.should_close_position("m1", dec!(0.01), dec!(0.99)).is_none());
}
