//! Engine integration tests.
//!
//! Drive the engine through its public API with the in-memory ledger and
//! position book standing in for the collateral and position engines.

use amm_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

type TestEngine = Engine<Ledger, PositionBook>;

fn usd() -> AssetId {
    AssetId::new("USD")
}

fn market_id() -> MarketId {
    MarketId::new("ETH-PERP")
}

fn risk() -> RiskInputs {
    RiskInputs {
        risk_factor_long: dec!(0.02),
        risk_factor_short: dec!(0.02),
        initial_margin_scaling: dec!(1.25),
        linear_slippage: dec!(0),
    }
}

fn party(name: &str) -> PartyId {
    PartyId::new(name)
}

fn p(v: u64) -> Price {
    Price::from_u64(v)
}

fn q(v: Decimal) -> Quote {
    Quote::new(v)
}

fn engine_with(config: EngineConfig, parties: &[(&str, Decimal)]) -> TestEngine {
    let mut ledger = Ledger::new();
    ledger.enable_asset(usd(), dec!(1));
    for (name, amount) in parties {
        ledger.deposit(&party(name), &usd(), q(*amount));
    }
    let market = MarketContext::unscaled(market_id(), usd());
    Engine::new(config, market, ledger, PositionBook::new())
}

fn engine(parties: &[(&str, Decimal)]) -> TestEngine {
    engine_with(EngineConfig::default(), parties)
}

fn params(lower: u64, base: u64, upper: u64) -> ConcentratedLiquidityParameters {
    ConcentratedLiquidityParameters {
        base: p(base),
        lower_bound: Some(p(lower)),
        upper_bound: Some(p(upper)),
        leverage_at_lower_bound: Some(dec!(50)),
        leverage_at_upper_bound: Some(dec!(50)),
    }
}

fn submit(name: &str, commitment: Decimal) -> SubmitAmm {
    SubmitAmm {
        party: party(name),
        commitment: q(commitment),
        parameters: params(1800, 2000, 2200),
        proposed_fee: dec!(0.001),
    }
}

fn general(engine: &TestEngine, name: &str) -> Quote {
    engine.collateral().general_balance(&party(name), &usd())
}

fn pool_events(engine: &TestEngine) -> Vec<AmmPoolEvent> {
    engine
        .events()
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::AmmPool(p) => Some(p.clone()),
            _ => None,
        })
        .collect()
}

fn ledger_movements(engine: &TestEngine) -> Vec<LedgerMovement> {
    engine
        .events()
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::LedgerMovements(m) => Some(m.movements.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

fn last_pool_event(engine: &TestEngine) -> AmmPoolEvent {
    pool_events(engine).pop().expect("pool event")
}

/// Submission, funding and rejection.
mod submit_tests {
    use super::*;

    #[test]
    fn submit_funds_sub_account_and_registers_pool() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        let id = engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();

        let sub = derive_amm_party(&party("alice"), &market_id(), 0);
        assert_eq!(engine.get_amm_party(&party("alice")).unwrap(), sub);
        assert!(engine.is_amm_party(&sub));
        assert!(!engine.is_amm_party(&party("alice")));
        assert_eq!(engine.sub_accounts(), vec![sub.clone()]);
        assert_eq!(engine.pool(&party("alice")).unwrap().id(), &id);

        assert_eq!(general(&engine, "alice"), q(dec!(100000)));
        assert_eq!(engine.collateral().general_balance(&sub, &usd()), q(dec!(100000)));

        let movements = ledger_movements(&engine);
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].entries[0].transfer_type, TransferType::AmmLow);
        assert_eq!(movements[0].total(), q(dec!(100000)));

        let event = last_pool_event(&engine);
        assert_eq!(event.status, PoolStatus::Active);
        assert_eq!(event.pool_id, id);
        assert!(event.lower_curve.is_some() && event.upper_curve.is_some());
    }

    #[test]
    fn pool_id_derives_from_transaction() {
        let mut a = engine(&[("alice", dec!(200000))]);
        let mut b = engine(&[("alice", dec!(200000))]);
        let id_a = a.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        let id_b = b.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        assert_eq!(id_a, id_b);
        assert_eq!(id_a.as_str().len(), 64);
    }

    #[test]
    fn second_pool_for_party_rejected() {
        let mut engine = engine(&[("alice", dec!(300000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();

        let err = engine
            .submit_amm(&submit("alice", dec!(100000)), "tx-2", &risk())
            .unwrap_err();
        assert_eq!(err, EngineError::PartyAlreadyOwnsAPool(market_id()));

        let event = last_pool_event(&engine);
        assert_eq!(event.status, PoolStatus::Rejected);
        assert_eq!(event.reason, StatusReason::PartyAlreadyOwnsAPool);
        assert!(event.lower_curve.is_none());
        assert_eq!(engine.pools().len(), 1);
        assert_eq!(general(&engine, "alice"), q(dec!(200000)));
    }

    #[test]
    fn commitment_below_quantum_minimum_rejected() {
        let config = EngineConfig {
            min_commitment_quantum: dec!(1000),
            ..EngineConfig::default()
        };
        let mut engine = engine_with(config, &[("alice", dec!(200000))]);

        let err = engine.submit_amm(&submit("alice", dec!(500)), "tx-1", &risk()).unwrap_err();
        assert_eq!(err, EngineError::CommitmentTooLow);
        assert_eq!(last_pool_event(&engine).reason, StatusReason::CommitmentTooLow);
        assert!(engine.pools().is_empty());

        engine.on_min_commitment_quantum_update(dec!(100));
        assert_eq!(engine.config().min_commitment_quantum, dec!(100));
        assert!(engine.submit_amm(&submit("alice", dec!(100000)), "tx-2", &risk()).is_ok());
    }

    #[test]
    fn insufficient_funds_rejected() {
        let mut engine = engine(&[("alice", dec!(50000))]);
        let err = engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientFunds {
                required: q(dec!(100000)),
                available: q(dec!(50000)),
            }
        );
        assert_eq!(last_pool_event(&engine).reason, StatusReason::CannotFillCommitment);
        assert_eq!(general(&engine, "alice"), q(dec!(50000)));
    }

    #[test]
    fn invalid_parameters_rejected() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        let mut cmd = submit("alice", dec!(100000));
        cmd.parameters.lower_bound = Some(p(2100));

        let err = engine.submit_amm(&cmd, "tx-1", &risk()).unwrap_err();
        assert!(matches!(err, EngineError::Parameters(ParametersError::InvalidLowerBound { .. })));
        assert_eq!(last_pool_event(&engine).status, PoolStatus::Rejected);
        assert!(engine.pools().is_empty());
    }

    #[test]
    fn commitment_too_small_for_curve_rejected() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        let err = engine.submit_amm(&submit("alice", dec!(1)), "tx-1", &risk()).unwrap_err();
        assert!(matches!(err, EngineError::Pool(PoolError::InsufficientCommitment(_))));
        assert_eq!(last_pool_event(&engine).reason, StatusReason::CannotFillCommitment);
        assert!(engine.pools().is_empty());
        assert_eq!(general(&engine, "alice"), q(dec!(200000)));
    }
}

/// Amendment and cancellation.
mod amend_cancel_tests {
    use super::*;

    fn amend(name: &str, commitment: Option<Decimal>) -> AmendAmm {
        AmendAmm {
            party: party(name),
            commitment: commitment.map(q),
            ..AmendAmm::default()
        }
    }

    #[test]
    fn amend_with_same_commitment_moves_nothing() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        engine.drain_events();

        let mut cmd = amend("alice", Some(dec!(100000)));
        cmd.proposed_fee = Some(dec!(0.002));
        engine.amend_amm(&cmd, &risk()).unwrap();

        assert!(ledger_movements(&engine).is_empty());
        assert_eq!(engine.pool(&party("alice")).unwrap().proposed_fee(), dec!(0.002));
        assert_eq!(last_pool_event(&engine).status, PoolStatus::Active);
        assert_eq!(general(&engine, "alice"), q(dec!(100000)));
    }

    #[test]
    fn amend_tops_up_and_releases() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        let sub = engine.get_amm_party(&party("alice")).unwrap();

        engine.drain_events();
        engine.amend_amm(&amend("alice", Some(dec!(150000))), &risk()).unwrap();
        assert_eq!(general(&engine, "alice"), q(dec!(50000)));
        assert_eq!(engine.collateral().general_balance(&sub, &usd()), q(dec!(150000)));
        let movements = ledger_movements(&engine);
        assert_eq!(movements[0].entries[0].transfer_type, TransferType::AmmLow);
        assert_eq!(movements[0].total(), q(dec!(50000)));

        engine.drain_events();
        engine.amend_amm(&amend("alice", Some(dec!(50000))), &risk()).unwrap();
        assert_eq!(general(&engine, "alice"), q(dec!(150000)));
        let movements = ledger_movements(&engine);
        assert_eq!(movements[0].entries[0].transfer_type, TransferType::AmmHigh);
        assert_eq!(movements[0].total(), q(dec!(100000)));

        assert_eq!(engine.pool(&party("alice")).unwrap().commitment(), q(dec!(50000)));
    }

    #[test]
    fn amend_keeps_pool_order_and_sub_account() {
        let mut engine = engine(&[("alice", dec!(200000)), ("carol", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        engine.submit_amm(&submit("carol", dec!(100000)), "tx-2", &risk()).unwrap();
        let before = engine.sub_accounts();

        let mut cmd = amend("alice", None);
        cmd.parameters = Some(params(1900, 2000, 2100));
        engine.amend_amm(&cmd, &risk()).unwrap();

        assert_eq!(engine.pools()[0].owner(), &party("alice"));
        assert_eq!(engine.pools()[0].max_price(), p(2100));
        assert_eq!(engine.sub_accounts(), before);
    }

    #[test]
    fn failed_amend_leaves_pool_untouched() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();

        let err = engine.amend_amm(&amend("alice", Some(dec!(1000000))), &risk()).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds { .. }));
        assert_eq!(engine.pool(&party("alice")).unwrap().commitment(), q(dec!(100000)));
        assert_eq!(engine.pool(&party("alice")).unwrap().status(), PoolStatus::Active);
        assert_eq!(last_pool_event(&engine).status, PoolStatus::Rejected);
    }

    #[test]
    fn amend_unknown_party() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        assert_eq!(
            engine.amend_amm(&amend("alice", None), &risk()).unwrap_err(),
            EngineError::NoPoolMatchingParty
        );
        assert!(engine.events().is_empty());
    }

    #[test]
    fn amend_reactivates_reduce_only_pool() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        engine
            .cancel_amm(&CancelAmm {
                party: party("alice"),
                method: CancellationMethod::ReduceOnly,
            })
            .unwrap();
        assert_eq!(engine.pool(&party("alice")).unwrap().status(), PoolStatus::ReduceOnly);

        engine.amend_amm(&amend("alice", None), &risk()).unwrap();
        assert_eq!(engine.pool(&party("alice")).unwrap().status(), PoolStatus::Active);
    }

    #[test]
    fn immediate_cancel_returns_everything() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        let sub = engine.get_amm_party(&party("alice")).unwrap();

        engine
            .cancel_amm(&CancelAmm {
                party: party("alice"),
                method: CancellationMethod::Immediate,
            })
            .unwrap();

        assert!(engine.pools().is_empty());
        assert!(!engine.is_amm_party(&sub));
        assert_eq!(general(&engine, "alice"), q(dec!(200000)));

        let event = last_pool_event(&engine);
        assert_eq!(event.status, PoolStatus::Cancelled);
        assert_eq!(event.reason, StatusReason::CancelledByParty);
    }

    #[test]
    fn cancel_unknown_party() {
        let mut engine = engine(&[]);
        let err = engine
            .cancel_amm(&CancelAmm {
                party: party("nobody"),
                method: CancellationMethod::Immediate,
            })
            .unwrap_err();
        assert_eq!(err, EngineError::NoPoolMatchingParty);
    }
}

/// Pools leaving the engine outside of a cancel command.
mod removal_tests {
    use super::*;

    fn funded() -> (TestEngine, PartyId) {
        let mut engine = engine(&[("alice", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        let sub = engine.get_amm_party(&party("alice")).unwrap();
        (engine, sub)
    }

    #[test]
    fn reduce_only_pool_leaves_when_flat() {
        let (mut engine, sub) = funded();
        engine.positions_mut().set_size(&sub, 10, p(1996));

        engine
            .cancel_amm(&CancelAmm {
                party: party("alice"),
                method: CancellationMethod::ReduceOnly,
            })
            .unwrap();
        assert_eq!(last_pool_event(&engine).status, PoolStatus::ReduceOnly);

        engine.on_tick(Timestamp::from_millis(1_000), "block-1");
        engine.on_mtm();
        assert!(engine.pool(&party("alice")).is_some());

        engine.positions_mut().set_size(&sub, 0, Price::zero());
        engine.on_mtm();
        assert!(engine.pool(&party("alice")).is_none());
        assert_eq!(general(&engine, "alice"), q(dec!(200000)));

        let event = last_pool_event(&engine);
        assert_eq!(event.status, PoolStatus::Cancelled);
        assert_eq!(event.reason, StatusReason::CancelledByParty);
    }

    #[test]
    fn on_tick_sweeps_flat_reduce_only_pool() {
        let (mut engine, _) = funded();
        engine
            .cancel_amm(&CancelAmm {
                party: party("alice"),
                method: CancellationMethod::ReduceOnly,
            })
            .unwrap();

        engine.on_tick(Timestamp::from_millis(1_000), "block-1");
        assert!(engine.pools().is_empty());
        assert_eq!(engine.time(), Timestamp::from_millis(1_000));
    }

    #[test]
    fn on_tick_stops_pool_with_empty_sub_account() {
        let (mut engine, sub) = funded();
        engine
            .collateral_mut()
            .sub_account_update(&party("alice"), &sub, &usd(), &market_id(), TransferType::AmmHigh, q(dec!(100000)))
            .unwrap();

        engine.on_tick(Timestamp::from_millis(1_000), "block-1");
        assert!(engine.pools().is_empty());
        assert_eq!(last_pool_event(&engine).status, PoolStatus::Stopped);
    }

    #[test]
    fn distressed_sub_account_stops_pool() {
        let (mut engine, sub) = funded();
        let closed = vec![
            MarketPosition::flat(party("bob")),
            MarketPosition {
                party: sub.clone(),
                size: -600,
                average_entry: p(2150),
            },
        ];
        engine.remove_distressed(&closed);

        assert!(engine.pools().is_empty());
        assert!(!engine.is_amm_party(&sub));
        let event = last_pool_event(&engine);
        assert_eq!(event.status, PoolStatus::Stopped);
        assert_eq!(event.reason, StatusReason::PartyClosedOut);
    }

    #[test]
    fn stop_pool_by_sub_account() {
        let (mut engine, sub) = funded();
        assert_eq!(engine.stop_pool(&party("alice")).unwrap_err(), EngineError::NoPoolMatchingParty);

        engine.stop_pool(&sub).unwrap();
        assert!(engine.pools().is_empty());
        assert_eq!(last_pool_event(&engine).status, PoolStatus::Stopped);
    }

    #[test]
    fn market_closing_releases_every_pool() {
        let mut engine = engine(&[("alice", dec!(200000)), ("carol", dec!(50000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        engine.submit_amm(&submit("carol", dec!(40000)), "tx-2", &risk()).unwrap();
        let carol_sub = engine.get_amm_party(&party("carol")).unwrap();
        engine
            .collateral_mut()
            .post_margin(&carol_sub, &usd(), &market_id(), q(dec!(10000)))
            .unwrap();
        engine.drain_events();

        engine.market_closing().unwrap();

        assert!(engine.pools().is_empty());
        assert!(engine.sub_accounts().is_empty());
        assert_eq!(general(&engine, "alice"), q(dec!(200000)));
        assert_eq!(general(&engine, "carol"), q(dec!(50000)));

        let events = pool_events(&engine);
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| e.status == PoolStatus::Stopped && e.reason == StatusReason::MarketClosed));
        assert!(ledger_movements(&engine)
            .iter()
            .flat_map(|m| &m.entries)
            .all(|e| e.transfer_type == TransferType::AmmClose));
    }
}

/// Queries the matching engine makes.
mod matching_tests {
    use super::*;

    fn two_pools() -> TestEngine {
        let mut engine = engine(&[("alice", dec!(200000)), ("carol", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        engine.submit_amm(&submit("carol", dec!(100000)), "tx-2", &risk()).unwrap();
        engine
    }

    fn market_order(name: &str, side: Side, size: u64) -> Order {
        Order::new_market(OrderId::new("agg"), party(name), market_id(), side, size, Timestamp::from_millis(5))
    }

    #[test]
    fn best_prices_sum_equal_quotes() {
        let mut single = engine(&[("alice", dec!(200000))]);
        single.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        let one = single.best_prices_and_volumes();
        assert_eq!(one.bid.map(|b| b.0), Some(p(1999)));
        assert_eq!(one.ask.map(|a| a.0), Some(p(2001)));

        let both = two_pools().best_prices_and_volumes();
        assert_eq!(both.bid.unwrap().1, one.bid.unwrap().1 * 2);
        assert_eq!(both.ask.unwrap().1, one.ask.unwrap().1 * 2);
    }

    #[test]
    fn best_prices_follow_live_position() {
        let mut engine = two_pools();
        let sub = engine.get_amm_party(&party("alice")).unwrap();
        engine.positions_mut().set_size(&sub, 1, p(2000));

        let best = engine.best_prices_and_volumes();
        // alice's pool quotes 1998 / 2000, carol's still 1999 / 2001
        assert_eq!(best.bid.map(|b| b.0), Some(p(1999)));
        assert_eq!(best.ask.map(|a| a.0), Some(p(2000)));
    }

    #[test]
    fn volume_at_price() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();

        assert_eq!(engine.volume_at_price(p(2200), Side::Buy), 635);
        assert_eq!(engine.volume_at_price(p(1800), Side::Sell), 702);
        // nothing crosses below the pool's ask
        assert_eq!(engine.volume_at_price(p(1990), Side::Buy), 0);
        assert_eq!(engine.volume_at_price(p(2010), Side::Sell), 0);
    }

    #[test]
    fn orderbook_shape_for_all_or_one_pool() {
        let engine = two_pools();
        let all = engine.orderbook_shape(Some(p(1800)), Some(p(2000)), None);
        assert_eq!(all.len(), 2);
        assert!(all[0].sells.is_empty());
        assert_eq!(all[0].buys.first().map(|o| o.price), Some(p(1800)));
        assert_eq!(all[0].buys.last().map(|o| o.price), Some(p(1999)));

        let sub = engine.get_amm_party(&party("carol")).unwrap();
        let one = engine.orderbook_shape(None, None, Some(&sub));
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].sub_account, Some(sub));

        assert!(engine.orderbook_shape(None, None, Some(&party("carol"))).is_empty());
    }

    #[test]
    fn market_buy_fills_from_pool() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        let sub = engine.get_amm_party(&party("alice")).unwrap();

        let mut pass = engine.begin_matching();
        let orders = pass.submit_order(&market_order("bob", Side::Buy, 100), None, None);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Sell);
        assert_eq!(orders[0].size, 100);
        assert_eq!(orders[0].price, p(2014));
        assert_eq!(orders[0].party, sub);
        assert_eq!(orders[0].created_at, Timestamp::from_millis(5));
        assert!(orders[0].id.is_some());
        assert_eq!(pass.position(&sub), -100);
        drop(pass);

        // positions recorded in the pass do not outlive it
        assert_eq!(engine.position_of(&sub), 0);
    }

    #[test]
    fn limit_price_caps_the_range() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        let expected = engine.volume_at_price(p(2005), Side::Buy);

        let agg = Order::new_limit(
            OrderId::new("agg"),
            party("bob"),
            market_id(),
            Side::Buy,
            1000,
            p(2005),
            Timestamp::from_millis(5),
        );
        let orders = engine.begin_matching().submit_order(&agg, None, None);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].size, expected);
        assert!(orders[0].price <= p(2005));
    }

    #[test]
    fn volume_shared_pro_rata() {
        let mut engine = two_pools();
        let orders = engine
            .begin_matching()
            .submit_order(&market_order("bob", Side::Buy, 100), None, None);

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].size, 50);
        assert_eq!(orders[1].size, 50);
        assert_eq!(orders[0].price, orders[1].price);
        assert_ne!(orders[0].id, orders[1].id);
    }

    #[test]
    fn sell_trades_across_base_in_two_steps() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        let sub = engine.get_amm_party(&party("alice")).unwrap();
        engine.positions_mut().set_size(&sub, -10, p(2003));

        let mut pass = engine.begin_matching();
        let orders = pass.submit_order(&market_order("bob", Side::Sell, 100), None, None);
        let sizes: Vec<u64> = orders.iter().map(|o| o.size).collect();
        assert_eq!(sizes, vec![10, 90]);
        assert!(orders.iter().all(|o| o.side == Side::Buy));
        assert_eq!(pass.position(&sub), 90);
    }

    #[test]
    fn pool_never_trades_with_itself() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        let sub = engine.get_amm_party(&party("alice")).unwrap();

        let agg = Order::new_market(OrderId::new("agg"), sub, market_id(), Side::Buy, 10, Timestamp::from_millis(5));
        assert!(engine.begin_matching().submit_order(&agg, None, None).is_empty());
    }

    #[test]
    fn no_pools_no_orders() {
        let mut engine = engine(&[]);
        let orders = engine
            .begin_matching()
            .submit_order(&market_order("bob", Side::Buy, 10), None, None);
        assert!(orders.is_empty());
    }

    #[test]
    fn order_ids_follow_block_seed() {
        let run = |hash: &str| {
            let mut engine = engine(&[("alice", dec!(200000))]);
            engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
            engine.on_tick(Timestamp::from_millis(1_000), hash);
            let orders = engine
                .begin_matching()
                .submit_order(&market_order("bob", Side::Buy, 10), None, None);
            orders[0].id.clone()
        };
        assert_eq!(run("block-1"), run("block-1"));
        assert_ne!(run("block-1"), run("block-2"));
    }
}

/// Market with asset precision two decimals finer than the market's.
mod scaled_market_tests {
    use super::*;

    fn scaled_engine() -> TestEngine {
        let mut ledger = Ledger::new();
        ledger.enable_asset(usd(), dec!(1));
        ledger.deposit(&party("alice"), &usd(), q(dec!(20000000)));
        let market = MarketContext::new(market_id(), usd(), dec!(100), dec!(1)).unwrap();
        let mut engine = Engine::new(EngineConfig::default(), market, ledger, PositionBook::new());

        let risk = RiskInputs {
            risk_factor_long: dec!(0.00984363574304481),
            risk_factor_short: dec!(0.009937604878885509),
            initial_margin_scaling: dec!(1.5),
            linear_slippage: dec!(0.001),
        };
        let cmd = SubmitAmm {
            party: party("alice"),
            commitment: q(dec!(10000000)),
            parameters: ConcentratedLiquidityParameters {
                base: p(15),
                lower_bound: Some(p(10)),
                upper_bound: Some(p(20)),
                leverage_at_lower_bound: None,
                leverage_at_upper_bound: None,
            },
            proposed_fee: dec!(0.001),
        };
        engine.submit_amm(&cmd, "tx-1", &risk).unwrap();
        engine
    }

    fn prices(orders: &[Order]) -> Vec<Price> {
        orders.iter().map(|o| o.price).collect()
    }

    #[test]
    fn shape_steps_whole_market_ticks() {
        let mut engine = scaled_engine();
        let sub = engine.get_amm_party(&party("alice")).unwrap();
        engine.positions_mut().set_size(&sub, 1000, p(1490));

        assert_eq!(engine.pool(&party("alice")).unwrap().fair_price(1000), p(1483));

        let shape = engine.orderbook_shape(Some(p(1000)), Some(p(1383)), None);
        assert_eq!(prices(&shape[0].buys), vec![p(1000), p(1100), p(1200), p(1383)]);
        assert!(shape[0].sells.is_empty());
    }

    #[test]
    fn closing_pool_within_a_tick_of_base() {
        let mut engine = scaled_engine();
        let sub = engine.get_amm_party(&party("alice")).unwrap();
        engine
            .cancel_amm(&CancelAmm {
                party: party("alice"),
                method: CancellationMethod::ReduceOnly,
            })
            .unwrap();

        engine.positions_mut().set_size(&sub, 1, p(1500));
        let shape = engine.orderbook_shape(Some(p(1000)), Some(p(2000)), None);
        assert!(shape[0].buys.is_empty());
        assert_eq!(shape[0].sells.len(), 1);
        assert_eq!(shape[0].sells[0].price, p(1499));
        assert_eq!(shape[0].sells[0].original_price, p(14));
        assert_eq!(shape[0].sells[0].size, 1);

        engine.positions_mut().set_size(&sub, -1, p(1500));
        let shape = engine.orderbook_shape(Some(p(1000)), Some(p(2000)), None);
        assert!(shape[0].sells.is_empty());
        assert_eq!(shape[0].buys[0].price, p(1501));
        assert_eq!(shape[0].buys[0].original_price, p(16));
    }
}

/// Snapshot and restore.
mod snapshot_tests {
    use super::*;

    #[test]
    fn snapshot_round_trip_through_json() {
        let mut engine = engine(&[("alice", dec!(200000)), ("carol", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        let mut cmd = submit("carol", dec!(50000));
        cmd.parameters = params(1900, 2000, 2100);
        engine.submit_amm(&cmd, "tx-2", &risk()).unwrap();

        let snapshot = engine.to_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: EngineSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);

        let restored = Engine::from_snapshot(
            EngineConfig::default(),
            engine.market().clone(),
            engine.collateral().clone(),
            engine.positions().clone(),
            &decoded,
        )
        .unwrap();

        assert_eq!(restored.to_snapshot(), snapshot);
        assert_eq!(restored.sub_accounts(), engine.sub_accounts());
        for (a, b) in restored.pools().iter().zip(engine.pools()) {
            assert_eq!(a.owner(), b.owner());
            assert_eq!(a.lower_curve(), b.lower_curve());
            assert_eq!(a.upper_curve(), b.upper_curve());
            assert_eq!(a.fair_price(-10), b.fair_price(-10));
        }
        assert_eq!(restored.best_prices_and_volumes(), engine.best_prices_and_volumes());
    }
}

/// Runtime parameter updates.
mod parameter_tests {
    use super::*;

    #[test]
    fn calculation_levels_reach_existing_pools() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();

        let exact = engine.orderbook_shape(Some(p(1800)), Some(p(2000)), None);
        assert_eq!(exact[0].buys.len(), 200);

        engine.on_max_calculation_levels_update(10);
        assert_eq!(engine.pools()[0].limits().max_calculation_levels, 10);
        let coarse = engine.orderbook_shape(Some(p(1800)), Some(p(2000)), None);
        assert!(coarse[0].buys.len() <= 12);
        assert_eq!(coarse[0].buys.first().map(|o| o.price), Some(p(1800)));
        assert_eq!(coarse[0].buys.last().map(|o| o.price), Some(p(1999)));
    }

    #[test]
    fn allowed_empty_levels_reach_existing_pools() {
        let mut engine = engine(&[("alice", dec!(200000))]);
        engine.submit_amm(&submit("alice", dec!(100000)), "tx-1", &risk()).unwrap();
        engine.update_allowed_empty_levels(3);
        assert_eq!(engine.pools()[0].limits().allowed_empty_levels, 3);
        assert_eq!(engine.config().allowed_empty_levels, 3);
    }
}
