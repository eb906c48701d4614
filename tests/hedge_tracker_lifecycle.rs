use hedgegate::domain::Side;
use hedgegate::strategy::{ArbitragePositionTracker, BuyReason, TrackerConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn tracker() -> ArbitragePositionTracker {
    ArbitragePositionTracker::new(TrackerConfig::default())
}

/// Follow every proposal at the quoted price, returning the reasons bought
fn drive(
    tracker: &mut ArbitragePositionTracker,
    market: &str,
    path: &[(Decimal, Decimal)],
) -> Vec<BuyReason> {
    let mut reasons = Vec::new();
    for &(yes, no) in path {
        if let Some(decision) = tracker.analyze_market(yes, no, market) {
            assert!(decision.amount >= tracker.config().min_trade_amount);
            assert!(decision.amount <= tracker.config().max_trade_amount);
            let price = if decision.side == Side::Yes { yes } else { no };
            tracker
                .execute_buy(market, decision.side, decision.amount, price)
                .unwrap();
            reasons.push(decision.reason);
        }

        if let Some(position) = tracker.position(market) {
            assert_eq!(position.locked, position.lock_condition());
            if position.locked {
                assert!(position.guaranteed_profit() >= Decimal::ZERO);
                assert_eq!(position.locked_profit, Some(position.guaranteed_profit()));
            }
        }
    }
    reasons
}

#[test]
fn cheap_side_entry_then_lock_then_resolution() {
    let mut tracker = tracker();

    let entry = tracker.analyze_market(dec!(0.35), dec!(0.65), "m1").unwrap();
    assert_eq!(entry.side, Side::Yes);
    assert!(entry.amount >= dec!(1));
    assert!(entry.expected_profit > Decimal::ZERO);

    let reasons = drive(
        &mut tracker,
        "m1",
        &[(dec!(0.35), dec!(0.65)), (dec!(0.40), dec!(0.64)), (dec!(0.55), dec!(0.50))],
    );
    assert_eq!(reasons, vec![BuyReason::FreshEntry, BuyReason::Rebalance]);

    let position = tracker.position("m1").unwrap().clone();
    assert!(position.locked);
    assert!(position.pair_cost() < Decimal::ONE);

    // Nothing more happens however far prices move
    drive(&mut tracker, "m1", &[(dec!(0.05), dec!(0.05)), (dec!(0.95), dec!(0.02))]);
    assert_eq!(tracker.position("m1").unwrap(), &position);

    let profit = tracker.close_position("m1", Side::No).unwrap();
    assert_eq!(Some(profit), position.locked_profit);
    assert_eq!(tracker.stats().realized_profit, profit);
    assert_eq!(tracker.stats().locked_positions, 0);
}

#[test]
fn locked_positions_pay_at_least_the_guarantee_either_way() {
    for outcome in [Side::Yes, Side::No] {
        let mut tracker = tracker();
        tracker.execute_buy("m1", Side::Yes, dec!(3), dec!(0.30)).unwrap();
        tracker.execute_buy("m1", Side::No, dec!(5.4), dec!(0.60)).unwrap();

        let position = tracker.position("m1").unwrap();
        assert!(position.locked);
        let guaranteed = position.guaranteed_profit();

        let realized = tracker.close_position("m1", outcome).unwrap();
        assert!(realized >= guaranteed);
    }
}

#[test]
fn lock_invariant_holds_on_random_walks() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut locked = 0;

    for walk in 0..200 {
        let mut tracker = tracker();
        let market = format!("walk-{}", walk);
        let mut yes_cents: i64 = rng.gen_range(10..=90);
        let mut path = Vec::with_capacity(40);

        for _ in 0..40 {
            yes_cents = (yes_cents + rng.gen_range(-6..=6)).clamp(2, 98);
            let spread: i64 = rng.gen_range(-8..=4);
            let no_cents = (100 - yes_cents + spread).clamp(2, 98);
            path.push((Decimal::new(yes_cents, 2), Decimal::new(no_cents, 2)));
        }

        drive(&mut tracker, &market, &path);
        if tracker.position(&market).map(|p| p.locked).unwrap_or(false) {
            locked += 1;
        }
    }

    // Walks with a negative spread lock regularly
    assert!(locked > 0);
}

#[test]
fn unhedged_loss_exit_releases_the_market() {
    let mut tracker = tracker();
    drive(&mut tracker, "m1", &[(dec!(0.30), dec!(0.68))]);
    let position = tracker.position("m1").unwrap();
    let cost = position.total_cost();
    let held = position.yes_qty;
    assert!(held > Decimal::ZERO);
    assert_eq!(position.no_qty, Decimal::ZERO);

    // Cheap side collapses while the other side stays too rich to hedge
    assert!(tracker.should_exit("m1", dec!(0.10), dec!(0.95)));
    let pnl = tracker.reduce_leg("m1", Side::Yes, held, held * dec!(0.10)).unwrap();
    assert!(pnl < Decimal::ZERO);
    assert!(-pnl <= cost);

    // A fresh entry is possible again
    assert!(tracker.analyze_market(dec!(0.30), dec!(0.68), "m1").is_some());
    assert_eq!(tracker.stats().closed_positions, 1);
}
