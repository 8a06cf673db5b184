use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use spot_grid_bot::exchange::PaperExchange;
use spot_grid_bot::grid::executor::mock::MockExchange;
use spot_grid_bot::grid::{
    ConfigError, EngineState, GridConfig, GridEngine, GridError, GridParamError, OrderSide,
};

type MockEngine = GridEngine<Arc<MockExchange>>;

fn engine_at(price: f64) -> (Arc<MockEngine>, Arc<MockExchange>) {
    let config = GridConfig::new("BTCUSDT", 100.0, 200.0, 5, 1000.0);
    let exchange = Arc::new(MockExchange::new(price));
    let engine = GridEngine::new(exchange.clone(), config).unwrap();
    (Arc::new(engine), exchange)
}

fn sorted_ids(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut ids: Vec<String> = ids.into_iter().collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn buys_below_and_sells_above_current_price() {
    for (price, buys, sells) in [(150.0, 2, 2), (50.0, 0, 5), (250.0, 5, 0), (137.5, 2, 3)] {
        let (engine, _) = engine_at(price);
        engine.start(&CancellationToken::new()).await.unwrap();

        let orders = engine.open_orders().await;
        let count = |side| orders.iter().filter(|(_, o)| o.side == side).count();
        assert_eq!(count(OrderSide::Buy), buys, "buys at {price}");
        assert_eq!(count(OrderSide::Sell), sells, "sells at {price}");

        for (_, order) in &orders {
            let level = order.price.unwrap();
            match order.side {
                OrderSide::Buy => assert!(level < price),
                OrderSide::Sell => assert!(level > price),
            }
            assert!((order.quantity * level - 100.0).abs() < 1e-9);
        }
    }
}

#[tokio::test]
async fn start_then_stop_cancels_each_recorded_order_once() {
    let (engine, exchange) = engine_at(150.0);
    let token = CancellationToken::new();

    engine.start(&token).await.unwrap();
    let recorded = sorted_ids(engine.open_orders().await.into_iter().map(|(id, _)| id));
    assert_eq!(recorded.len(), 4);

    let report = engine.stop(&token).await.unwrap();
    assert_eq!(report.cancelled, 4);
    assert_eq!(exchange.cancel_calls(), 4);
    assert_eq!(sorted_ids(exchange.cancelled.lock().await.clone()), recorded);

    let status = engine.status().await;
    assert!(!status.running);
    assert_eq!(status.open_order_count, 0);
}

#[tokio::test]
async fn second_start_is_rejected_without_side_effects() {
    let (engine, exchange) = engine_at(150.0);
    let token = CancellationToken::new();
    engine.start(&token).await.unwrap();
    let before = engine.open_orders().await.len();

    assert!(matches!(engine.start(&token).await, Err(GridError::AlreadyRunning)));
    assert_eq!(engine.open_orders().await.len(), before);
    assert_eq!(exchange.price_calls(), 1);
    assert_eq!(exchange.placed.lock().await.len(), before);
}

#[tokio::test]
async fn stop_when_idle_is_rejected() {
    let (engine, exchange) = engine_at(150.0);
    assert!(matches!(
        engine.stop(&CancellationToken::new()).await,
        Err(GridError::NotRunning)
    ));
    assert_eq!(exchange.cancel_calls(), 0);
    assert_eq!(engine.state().await, EngineState::Idle);
}

#[tokio::test]
async fn placement_failure_skips_only_that_level() {
    let (engine, exchange) = engine_at(150.0);
    exchange.fail_placement_at(125.0).await;

    let report = engine.start(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.placed, 3);
    assert_eq!(report.failed, 1);
    assert!(report.last_error.is_some());
    assert_eq!(engine.state().await, EngineState::Running);

    let prices: Vec<f64> = engine
        .open_orders()
        .await
        .iter()
        .filter_map(|(_, o)| o.price)
        .collect();
    assert_eq!(prices.len(), 3);
    assert!(!prices.contains(&125.0));
}

#[tokio::test]
async fn engine_can_be_restarted_after_stop() {
    let (engine, exchange) = engine_at(150.0);
    let token = CancellationToken::new();

    engine.start(&token).await.unwrap();
    engine.stop(&token).await.unwrap();
    exchange.set_price(160.0).await;
    let report = engine.start(&token).await.unwrap();

    assert_eq!(report.placed, 5);
    assert_eq!(engine.open_orders().await.len(), 5);
    assert_eq!(exchange.placed.lock().await.len(), 9);
}

#[test]
fn invalid_configurations_are_rejected() {
    let build = |config: GridConfig| GridEngine::new(MockExchange::new(150.0), config).err();

    assert_eq!(
        build(GridConfig::new("BTCUSDT", 100.0, 200.0, 5, 0.0)),
        Some(ConfigError::NonPositiveInvestment(0.0))
    );
    assert_eq!(
        build(GridConfig::new("", 100.0, 200.0, 5, 1000.0)),
        Some(ConfigError::EmptySymbol)
    );
    assert_eq!(
        build(GridConfig::new("BTCUSDT", 200.0, 100.0, 5, 1000.0)),
        Some(ConfigError::InvalidGrid(GridParamError::InvalidRange {
            lower: 200.0,
            upper: 100.0
        }))
    );
    assert_eq!(
        build(GridConfig::new("BTCUSDT", 100.0, 200.0, 1, 1000.0)),
        Some(ConfigError::InvalidGrid(GridParamError::InvalidGridCount(1)))
    );
    assert_eq!(
        build(GridConfig::new("BTCUSDT", 100.0, 200.0, usize::MAX, 1000.0)),
        Some(ConfigError::InvalidGrid(GridParamError::InvalidGridCount(usize::MAX)))
    );

    // Two ulps cannot hold five distinct prices
    let upper = f64::from_bits(100.0f64.to_bits() + 2);
    assert!(matches!(
        build(GridConfig::new("BTCUSDT", 100.0, upper, 5, 1000.0)),
        Some(ConfigError::InvalidGrid(GridParamError::LevelsNotDistinct { grid_num: 5, .. }))
    ));
}

#[tokio::test]
async fn cancellation_during_price_fetch_rolls_back() {
    let (engine, exchange) = engine_at(150.0);
    exchange.set_latency(Duration::from_millis(200)).await;

    let token = CancellationToken::new();
    let task = {
        let engine = engine.clone();
        let token = token.clone();
        tokio::spawn(async move { engine.start(&token).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    assert!(matches!(
        task.await.unwrap(),
        Err(GridError::Cancelled { completed: 0, .. })
    ));
    assert_eq!(engine.state().await, EngineState::Idle);
    assert!(exchange.placed.lock().await.is_empty());
}

#[tokio::test]
async fn cancellation_during_placement_keeps_partial_grid_for_stop() {
    let (engine, exchange) = engine_at(150.0);
    exchange.set_latency(Duration::from_millis(100)).await;

    let token = CancellationToken::new();
    let task = {
        let engine = engine.clone();
        let token = token.clone();
        tokio::spawn(async move { engine.start(&token).await })
    };
    // Price fetch takes 100ms; cancel while the first placements are in flight
    tokio::time::sleep(Duration::from_millis(250)).await;
    token.cancel();

    let (completed, remaining) = match task.await.unwrap() {
        Err(GridError::Cancelled { completed, remaining }) => (completed, remaining),
        other => panic!("expected cancellation, got {other:?}"),
    };
    assert_eq!(completed + remaining, 4);
    assert!(remaining > 0);
    assert_eq!(engine.state().await, EngineState::Running);
    assert_eq!(engine.open_orders().await.len(), completed);
    assert_eq!(exchange.placed.lock().await.len(), completed);

    exchange.set_latency(Duration::ZERO).await;
    let report = engine.stop(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.cancelled, completed);
    assert!(exchange.open_orders.lock().await.is_empty());
    assert_eq!(engine.state().await, EngineState::Idle);
}

#[tokio::test]
async fn cancellation_during_stop_sweep_leaves_engine_idle() {
    let (engine, exchange) = engine_at(150.0);
    engine.start(&CancellationToken::new()).await.unwrap();
    exchange.set_latency(Duration::from_millis(100)).await;

    let token = CancellationToken::new();
    let task = {
        let engine = engine.clone();
        let token = token.clone();
        tokio::spawn(async move { engine.stop(&token).await })
    };
    // First cancellation completes at 100ms; interrupt the second one
    tokio::time::sleep(Duration::from_millis(150)).await;
    token.cancel();

    let (completed, remaining) = match task.await.unwrap() {
        Err(GridError::Cancelled { completed, remaining }) => (completed, remaining),
        other => panic!("expected cancellation, got {other:?}"),
    };
    assert_eq!(completed + remaining, 4);
    assert!(remaining > 0);

    assert_eq!(engine.state().await, EngineState::Idle);
    assert_eq!(engine.status().await.open_order_count, 0);
    assert_eq!(exchange.cancelled.lock().await.len(), completed);
    assert_eq!(exchange.open_orders.lock().await.len(), remaining);

    // The engine is idle, so a second stop has nothing to do
    assert!(matches!(
        engine.stop(&CancellationToken::new()).await,
        Err(GridError::NotRunning)
    ));
}

#[tokio::test]
async fn status_reads_do_not_wait_for_the_venue() {
    let (engine, exchange) = engine_at(150.0);
    exchange.set_latency(Duration::from_millis(30)).await;

    let task = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.start(&CancellationToken::new()).await })
    };

    let mut last = 0;
    while !task.is_finished() {
        let status = tokio::time::timeout(Duration::from_millis(10), engine.status())
            .await
            .expect("status blocked on venue I/O");
        assert!(status.open_order_count >= last);
        assert!(status.open_order_count <= 4);
        last = status.open_order_count;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    task.await.unwrap().unwrap();
    assert_eq!(engine.status().await.open_order_count, 4);
}

#[tokio::test]
async fn paper_exchange_runs_a_full_cycle() {
    let balances = HashMap::from([("USDT".to_string(), 1000.0)]);
    let exchange = Arc::new(PaperExchange::new(MockExchange::new(150.0), balances));
    let config = GridConfig::new("BTCUSDT", 100.0, 200.0, 5, 1000.0);
    let engine = GridEngine::new(exchange.clone(), config).unwrap();
    let token = CancellationToken::new();

    engine.start(&token).await.unwrap();
    assert_eq!(exchange.open_orders().await.len(), 4);

    let report = engine.stop(&token).await.unwrap();
    assert_eq!(report.cancelled, 4);
    assert!(exchange.open_orders().await.is_empty());
}
