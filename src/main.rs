//! AMM Engine Simulation.
//!
//! Walks a pool through its lifecycle: submission, matching against incoming
//! orders, depth expansion, reduce-only wind down and market close.
//! Set `RUST_LOG=amm_core=debug` to see the engine's own logs.

use amm_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;

type SimEngine = Engine<Ledger, PositionBook>;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("AMM Liquidity Pool Engine Simulation");
    println!("Single Market, Concentrated Liquidity, Full Lifecycle\n");

    scenario_1_submit_and_quote();
    scenario_2_match_incoming_orders();
    scenario_3_orderbook_shape();
    scenario_4_reduce_only_wind_down();
    scenario_5_market_closing();
    scenario_6_estimate();

    println!("\nAll simulations completed successfully.");
}

fn usd() -> AssetId {
    AssetId::new("USD")
}

fn risk() -> RiskInputs {
    RiskInputs {
        risk_factor_long: dec!(0.02),
        risk_factor_short: dec!(0.02),
        initial_margin_scaling: dec!(1.25),
        linear_slippage: dec!(0),
    }
}

fn setup(parties: &[(&str, Decimal)]) -> SimEngine {
    let mut ledger = Ledger::new();
    ledger.enable_asset(usd(), dec!(1));
    for (party, amount) in parties {
        ledger.deposit(&PartyId::new(*party), &usd(), Quote::new(*amount));
    }
    let market = MarketContext::unscaled(MarketId::new("ETH-PERP"), usd());
    Engine::new(EngineConfig::default(), market, ledger, PositionBook::new())
}

fn submit(party: &str, lower: u64, base: u64, upper: u64, commitment: Decimal) -> SubmitAmm {
    SubmitAmm {
        party: PartyId::new(party),
        commitment: Quote::new(commitment),
        parameters: ConcentratedLiquidityParameters {
            base: Price::from_u64(base),
            lower_bound: Some(Price::from_u64(lower)),
            upper_bound: Some(Price::from_u64(upper)),
            leverage_at_lower_bound: Some(dec!(50)),
            leverage_at_upper_bound: Some(dec!(50)),
        },
        proposed_fee: dec!(0.001),
    }
}

// books every fill of a matching pass on both sides
fn settle(engine: &mut SimEngine, taker: &PartyId, fills: &[Order]) {
    for fill in fills {
        engine
            .positions_mut()
            .apply_fill(&fill.party, fill.side, fill.size, fill.price);
        engine
            .positions_mut()
            .apply_fill(taker, fill.side.opposite(), fill.size, fill.price);
    }
}

fn print_best(engine: &SimEngine) {
    let best = engine.best_prices_and_volumes();
    let fmt = |q: Option<(Price, u64)>| q.map_or("none".to_string(), |(p, v)| format!("{} x {}", v, p));
    println!("  Best bid: {}, best ask: {}", fmt(best.bid), fmt(best.ask));
}

/// Pool submission, rejection of a second pool, and top of book.
fn scenario_1_submit_and_quote() {
    println!("Scenario 1: Submit a Pool\n");

    let mut engine = setup(&[("alice", dec!(200000))]);

    let id = engine
        .submit_amm(&submit("alice", 1800, 2000, 2200, dec!(100000)), "tx-1", &risk())
        .unwrap();
    let alice = PartyId::new("alice");
    let sub = engine.get_amm_party(&alice).unwrap();

    println!("  Alice commits $100,000 to 1800 / 2000 / 2200");
    println!("  Pool {} trading as {}", &id.as_str()[..8], &sub.as_str()[..8]);
    println!(
        "  Alice general: ${}, sub-account: ${}",
        engine.collateral().general_balance(&alice, &usd()),
        engine.collateral().general_balance(&sub, &usd())
    );
    print_best(&engine);

    let second = engine.submit_amm(&submit("alice", 1900, 2000, 2100, dec!(1000)), "tx-2", &risk());
    println!("  Second pool from Alice: {}", second.unwrap_err());

    println!();
}

/// An incoming buy walks up the pool's asks; a sell then comes back down.
fn scenario_2_match_incoming_orders() {
    println!("Scenario 2: Match Incoming Orders\n");

    let mut engine = setup(&[("alice", dec!(200000)), ("bob", dec!(100000))]);
    engine
        .submit_amm(&submit("alice", 1800, 2000, 2200, dec!(100000)), "tx-1", &risk())
        .unwrap();
    engine.on_tick(Timestamp::now(), "block-1");

    let bob = PartyId::new("bob");
    let buy = Order::new_market(
        OrderId::new("bob-1"),
        bob.clone(),
        engine.market().id.clone(),
        Side::Buy,
        100,
        engine.time(),
    );
    let fills = engine.begin_matching().submit_order(&buy, None, None);
    for fill in &fills {
        println!("  AMM {:?} {} @ {}", fill.side, fill.size, fill.price);
    }
    settle(&mut engine, &bob, &fills);

    let sub = engine.sub_accounts()[0].clone();
    println!("  Pool position after Bob's buy: {}", engine.position_of(&sub));
    print_best(&engine);

    let sell = Order::new_limit(
        OrderId::new("bob-2"),
        bob.clone(),
        engine.market().id.clone(),
        Side::Sell,
        50,
        Price::from_u64(1990),
        engine.time(),
    );
    let fills = engine.begin_matching().submit_order(&sell, None, None);
    for fill in &fills {
        println!("  AMM {:?} {} @ {}", fill.side, fill.size, fill.price);
    }
    settle(&mut engine, &bob, &fills);
    println!("  Pool position after Bob's sell: {}", engine.position_of(&sub));

    println!();
}

/// Resting depth around the fair price, exact and approximated.
fn scenario_3_orderbook_shape() {
    println!("Scenario 3: Orderbook Shape\n");

    let mut engine = setup(&[("alice", dec!(200000))]);
    engine
        .submit_amm(&submit("alice", 1800, 2000, 2200, dec!(100000)), "tx-1", &risk())
        .unwrap();

    let shapes = engine.orderbook_shape(Some(Price::from_u64(1995)), Some(Price::from_u64(2005)), None);
    for order in &shapes[0].buys {
        println!("  BUY  {} @ {}", order.size, order.price);
    }
    for order in &shapes[0].sells {
        println!("  SELL {} @ {}", order.size, order.price);
    }

    engine.on_max_calculation_levels_update(10);
    let full = engine.orderbook_shape(None, None, None);
    println!(
        "  Full range with 10 levels: {} buys, {} sells",
        full[0].buys.len(),
        full[0].sells.len()
    );

    println!();
}

/// Reduce-only pool trades back to flat and is then removed.
fn scenario_4_reduce_only_wind_down() {
    println!("Scenario 4: Reduce-Only Wind Down\n");

    let mut engine = setup(&[("alice", dec!(200000)), ("bob", dec!(100000))]);
    let alice = PartyId::new("alice");
    let bob = PartyId::new("bob");
    engine
        .submit_amm(&submit("alice", 1800, 2000, 2200, dec!(100000)), "tx-1", &risk())
        .unwrap();
    let sub = engine.get_amm_party(&alice).unwrap();

    let sell = Order::new_market(OrderId::new("bob-1"), bob.clone(), engine.market().id.clone(), Side::Sell, 10, engine.time());
    let fills = engine.begin_matching().submit_order(&sell, None, None);
    settle(&mut engine, &bob, &fills);
    println!("  Pool long {} after Bob sells", engine.position_of(&sub));

    engine
        .cancel_amm(&CancelAmm {
            party: alice.clone(),
            method: CancellationMethod::ReduceOnly,
        })
        .unwrap();
    println!("  Alice cancels reduce-only, status: {:?}", engine.pool(&alice).unwrap().status());
    print_best(&engine);

    let buy = Order::new_market(OrderId::new("bob-2"), bob.clone(), engine.market().id.clone(), Side::Buy, 50, engine.time());
    let fills = engine.begin_matching().submit_order(&buy, None, None);
    let filled: u64 = fills.iter().map(|o| o.size).sum();
    settle(&mut engine, &bob, &fills);
    println!("  Bob buys 50, pool sells only {}", filled);

    engine.on_mtm();
    println!("  After mark-to-market the pool is gone: {}", engine.pool(&alice).is_none());
    println!(
        "  Alice general balance back to ${}",
        engine.collateral().general_balance(&alice, &usd())
    );

    println!();
}

/// Market close returns every commitment.
fn scenario_5_market_closing() {
    println!("Scenario 5: Market Closing\n");

    let mut engine = setup(&[("alice", dec!(200000)), ("carol", dec!(50000))]);
    engine
        .submit_amm(&submit("alice", 1800, 2000, 2200, dec!(100000)), "tx-1", &risk())
        .unwrap();
    engine
        .submit_amm(&submit("carol", 1900, 2000, 2100, dec!(20000)), "tx-2", &risk())
        .unwrap();
    println!("  {} pools live", engine.pools().len());
    print_best(&engine);

    engine.market_closing().unwrap();
    println!("  Market closed, {} pools live", engine.pools().len());
    for party in ["alice", "carol"] {
        println!(
            "  {} general balance: ${}",
            party,
            engine.collateral().general_balance(&PartyId::new(party), &usd())
        );
    }

    let stopped = engine
        .events()
        .iter()
        .filter(|e| matches!(&e.payload, EventPayload::AmmPool(p) if p.status == PoolStatus::Stopped))
        .count();
    println!("  Stopped pool events: {}", stopped);

    println!();
}

/// Preview of a pool's bounds before submitting it.
fn scenario_6_estimate() {
    println!("Scenario 6: Estimate Before Submitting\n");

    let sqrt = Sqrter::new();
    let bounds = estimate(
        &sqrt,
        &EstimateInputs {
            lower: Some(Price::from_u64(1800)),
            base: Price::from_u64(2000),
            upper: Some(Price::from_u64(2200)),
            leverage_lower: Some(dec!(50)),
            leverage_upper: Some(dec!(50)),
            commitment: Quote::new(dec!(100000)),
            linear_slippage: dec!(0),
            initial_margin: dec!(1.25),
            risk_factor_short: dec!(0.02),
            risk_factor_long: dec!(0.02),
            position_factor: dec!(1),
            one_tick: Price::from_u64(1),
            allowed_empty_levels: 0,
        },
    );
    println!("  {:#?}", bounds);
}
