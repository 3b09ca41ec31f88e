use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tiertrader::config::{AppConfig, ExecutionConfig, LadderConfig};
use tiertrader::exchange::{
    AdapterCall, FillState, PaperExchange, PaperSettings, VenueRegistry, VenueSettings,
};
use tiertrader::execution::{FixedSizing, Rejection, SupervisionOutcome, TradeExecutor};
use tiertrader::models::{
    Fund, MarketConfig, MinimalOrder, OrderPrice, OrderStatus, OrderUnit, Signal, Tier,
};
use tokio_test::assert_ok;

fn paper(ask: Decimal, usd: Decimal, btc: Decimal) -> Arc<PaperExchange> {
    Arc::new(PaperExchange::new(PaperSettings {
        name: "Paper".to_string(),
        currency: "USD".to_string(),
        asset: "BTC".to_string(),
        bid: ask - dec!(2),
        ask,
        fee: dec!(0.0025),
        balances: vec![
            Fund {
                name: "USD".to_string(),
                amount: usd,
            },
            Fund {
                name: "BTC".to_string(),
                amount: btc,
            },
        ],
        fill_probability: 0.0,
    }))
}

fn executor_for(exchange: &Arc<PaperExchange>, minimal_order: MinimalOrder) -> TradeExecutor {
    let registry = VenueRegistry::new(vec![VenueSettings {
        slug: "paper".to_string(),
        name: "Paper".to_string(),
        direct: false,
        infinity_order: false,
        markets: vec![MarketConfig {
            pair: ("USD".to_string(), "BTC".to_string()),
            minimal_order,
        }],
    }]);
    let venue = registry.resolve("paper", "USD", "BTC").unwrap();

    TradeExecutor::new(
        exchange.clone(),
        venue,
        ExecutionConfig::default(),
        &LadderConfig::default(),
        Arc::new(FixedSizing::new(dec!(0.01))),
    )
}

fn asset_minimum() -> MinimalOrder {
    MinimalOrder {
        unit: OrderUnit::Asset,
        amount: dec!(0.001),
    }
}

#[tokio::test(start_paused = true)]
async fn test_buy_tier_one_submits_once() {
    let _ = tracing_subscriber::fmt::try_init();

    let exchange = paper(dec!(105), dec!(10.1), dec!(0));
    exchange.script_fills([FillState::Filled]);
    let executor = executor_for(&exchange, asset_minimum());
    assert_ok!(executor.init().await);

    let outcome = executor
        .trade(Signal::buy(Tier::FIRST))
        .unwrap()
        .await
        .unwrap();

    match outcome {
        SupervisionOutcome::Filled { order } => {
            assert_eq!(order.price, OrderPrice::Limit(dec!(101)));
            assert_eq!(order.price.to_string(), "101.00000000");
            assert_eq!(order.amount, dec!(0.01));
            assert_eq!(order.status, OrderStatus::FilledFully);
        }
        other => panic!("expected fill, got {:?}", other),
    }

    assert_eq!(
        exchange.submissions(),
        vec![AdapterCall::Buy {
            amount: dec!(0.01),
            price: OrderPrice::Limit(dec!(101)),
        }]
    );
    assert!(exchange.cancellations().is_empty());
}

#[tokio::test]
async fn test_buy_tier_one_rejected_without_funds() {
    let exchange = paper(dec!(105), dec!(0.5), dec!(0));
    let executor = executor_for(&exchange, asset_minimum());
    assert_ok!(executor.init().await);

    let outcome = executor
        .trade(Signal::buy(Tier::FIRST))
        .unwrap()
        .await
        .unwrap();

    match outcome {
        SupervisionOutcome::Rejected {
            rejection: Rejection::InsufficientFunds { available, .. },
            attempt,
            ..
        } => {
            assert_eq!(attempt, 1);
            assert!(available < dec!(0.01));
        }
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }

    assert!(exchange.submissions().is_empty());
    assert!(executor.orders().is_empty());
}

#[tokio::test]
async fn test_minimum_in_currency_rejects_small_order() {
    // Buy tier 1 at ask 504 prices at 500; 10 USD minimum is 0.02 BTC
    let exchange = paper(dec!(504), dec!(1000), dec!(0));
    let executor = executor_for(
        &exchange,
        MinimalOrder {
            unit: OrderUnit::Currency,
            amount: dec!(10),
        },
    );

    let outcome = executor
        .trade(Signal::buy(Tier::FIRST))
        .unwrap()
        .await
        .unwrap();

    match outcome {
        SupervisionOutcome::Rejected {
            rejection: Rejection::OrderTooSmall { minimum, .. },
            ..
        } => assert_eq!(minimum, dec!(0.02)),
        other => panic!("expected OrderTooSmall, got {:?}", other),
    }
    assert!(exchange.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unfilled_orders_retry_with_the_same_signal() {
    const FORCED_CYCLES: usize = 5;

    let exchange = paper(dec!(105), dec!(1000), dec!(0));
    exchange.script_fills(
        std::iter::repeat(FillState::Unfilled)
            .take(FORCED_CYCLES)
            .chain([FillState::Filled]),
    );
    let executor = executor_for(&exchange, asset_minimum());
    let signal = Signal::buy(Tier::FIRST);

    let outcome = executor.trade(signal).unwrap().await.unwrap();
    assert!(outcome.is_filled());

    let orders = executor.orders();
    assert_eq!(orders.len(), FORCED_CYCLES + 1);
    assert!(orders.iter().all(|o| o.signal == orders[0].signal));
    assert_eq!(orders[FORCED_CYCLES].signal, signal);

    // Each earlier record was cancelled, never rewritten
    for (i, order) in orders.iter().enumerate() {
        assert_eq!(order.attempt as usize, i + 1);
        let expected = if i < FORCED_CYCLES {
            OrderStatus::Cancelled
        } else {
            OrderStatus::FilledFully
        };
        assert_eq!(order.status, expected);
    }

    let cancelled: Vec<String> = orders[..FORCED_CYCLES]
        .iter()
        .map(|o| o.exchange_order_id.clone())
        .collect();
    assert_eq!(exchange.cancellations(), cancelled);

    let submissions = exchange.submissions();
    assert_eq!(submissions.len(), FORCED_CYCLES + 1);
    assert!(submissions.iter().all(|c| *c == submissions[0]));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_precedes_resubmission() {
    let exchange = paper(dec!(105), dec!(1000), dec!(1));
    exchange.script_fills([FillState::Unfilled, FillState::Filled]);
    let executor = executor_for(&exchange, asset_minimum());

    let outcome = executor
        .trade(Signal::sell(Tier::SECOND))
        .unwrap()
        .await
        .unwrap();
    assert!(outcome.is_filled());

    let calls = exchange.calls();
    let cancel_at = calls
        .iter()
        .position(|c| matches!(c, AdapterCall::CancelOrder(_)))
        .unwrap();
    let second_sell_at = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, AdapterCall::Sell { .. }))
        .nth(1)
        .map(|(i, _)| i)
        .unwrap();

    assert!(cancel_at < second_sell_at);
    // The retry refreshes ticker and balances before submitting again
    assert_eq!(calls[cancel_at + 1], AdapterCall::GetTicker);
    assert_eq!(calls[cancel_at + 2], AdapterCall::GetPortfolio);
}

#[tokio::test(start_paused = true)]
async fn test_all_six_tiers_run_side_by_side() {
    let exchange = paper(dec!(105), dec!(1000), dec!(1));
    exchange.script_fills(std::iter::repeat(FillState::Filled).take(6));
    let executor = executor_for(&exchange, asset_minimum());

    let handles: Vec<_> = Signal::all()
        .map(|signal| executor.trade(signal).unwrap())
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_filled());
    }

    let mut prices: Vec<(Signal, OrderPrice)> =
        executor.orders().iter().map(|o| (o.signal, o.price)).collect();
    prices.sort_by_key(|(signal, _)| (signal.side as u8, signal.tier));

    let limits: Vec<Decimal> = prices.iter().map(|(_, p)| p.limit().unwrap()).collect();
    assert_eq!(
        limits,
        vec![
            dec!(101),
            dec!(97),
            dec!(93),
            dec!(105),
            dec!(101),
            dec!(97)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_runs_from_configuration() {
    let config = AppConfig::from_toml(
        r#"
        [trader]
        exchange = "paper"
        currency = "USD"
        asset = "BTC"

        [execution]
        fill_check_delay_secs = 5

        [paper]
        currency = "USD"
        asset = "BTC"
        bid = "103"
        ask = "105"
        fee = "0.002"
        fill_probability = 1.0
        balances = [{ name = "USD", amount = "1000" }, { name = "BTC", amount = "0" }]
        "#,
    )
    .unwrap();

    let venue = VenueRegistry::with_overrides(config.venues.clone())
        .resolve(
            &config.trader.exchange,
            &config.trader.currency,
            &config.trader.asset,
        )
        .unwrap();
    let exchange = Arc::new(PaperExchange::new(config.paper.clone().unwrap()));
    let executor = TradeExecutor::from_config(exchange.clone(), venue, &config);

    assert_ok!(executor.init().await);
    assert_eq!(executor.store().fee(), Some(dec!(0.002)));

    let start = tokio::time::Instant::now();
    let outcome = executor.trade_command("BUY1").unwrap().await.unwrap();
    assert!(outcome.is_filled());
    assert_eq!(start.elapsed(), std::time::Duration::from_secs(5));

    // 0.01 BTC at 101, fee taken from the asset side
    assert_eq!(exchange.balance("USD"), Some(dec!(998.99)));
    assert_eq!(exchange.balance("BTC"), Some(dec!(0.00998)));
}
