//! Visualizer driven end to end against the stub simulation server.

use std::{sync::Arc, time::Duration};

use serde_json::{json, Value};
use traffic_client::{HttpSnapshotClient, Visualizer};
use traffic_shared::{config::ClientConfig, entity::EntityId, net::endpoint};
use traffic_tests::{init_test_tracing, RecordingRenderer, StubResponse, StubServer};

const TICK: Duration = Duration::from_millis(1000);

fn agents(list: &[(u64, f32, f32)]) -> StubResponse {
    let positions: Vec<Value> = list
        .iter()
        .map(|(id, x, z)| json!({ "id": id.to_string(), "x": x, "y": 1.0, "z": z }))
        .collect();
    StubResponse::json(json!({ "positions": positions }))
}

fn empty() -> StubResponse {
    StubResponse::json(json!({ "positions": [] }))
}

async fn setup() -> anyhow::Result<(StubServer, RecordingRenderer, Visualizer)> {
    init_test_tracing();
    let server = StubServer::bind().await?;
    server.route(endpoint::INIT, StubResponse::json(json!({ "message": "ok" })));
    server.route(endpoint::UPDATE, StubResponse::json(json!({ "currentStep": 1 })));
    for path in [endpoint::OBSTACLES, endpoint::ROADS, endpoint::DESTINATIONS, endpoint::TRAFFIC_LIGHTS] {
        server.route(path, empty());
    }

    let cfg = ClientConfig {
        server_url: server.base_url(),
        ..ClientConfig::default()
    };
    let source = HttpSnapshotClient::from_config(&cfg)?;
    let renderer = RecordingRenderer::default();
    let vis = Visualizer::new(cfg, Arc::new(source), Box::new(renderer.clone()));
    Ok((server, renderer, vis))
}

/// Starts a tick fetch and keeps polling until its result is merged or dropped.
async fn run_tick(vis: &mut Visualizer) {
    vis.frame(TICK);
    assert!(vis.fetch_in_flight());
    for _ in 0..400 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        vis.frame(Duration::ZERO);
        if !vis.fetch_in_flight() {
            return;
        }
    }
    panic!("tick fetch never completed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn vehicles_follow_the_latest_snapshot() -> anyhow::Result<()> {
    let (server, renderer, mut vis) = setup().await?;
    server.route(endpoint::AGENTS, agents(&[(1, 0.0, 0.0), (2, 1.0, 0.0), (4, 2.0, 0.0)]));
    vis.startup().await;
    assert_eq!(vis.store().vehicle_ids(), vec![EntityId(1), EntityId(2), EntityId(4)]);

    server.route(endpoint::AGENTS, agents(&[(1, 0.0, 1.0), (2, 1.0, 1.0), (3, 6.0, 6.0)]));
    run_tick(&mut vis).await;

    assert_eq!(vis.store().vehicle_ids(), vec![EntityId(1), EntityId(2), EntityId(3)]);
    assert_eq!(renderer.recording().released, vec![EntityId(4)]);

    let fresh = vis.store().vehicle(EntityId(3)).expect("vehicle 3");
    assert_eq!(fresh.motion.previous, fresh.motion.current);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn frame_halfway_through_a_tick_blends_positions() -> anyhow::Result<()> {
    let (server, renderer, mut vis) = setup().await?;
    server.route(endpoint::AGENTS, agents(&[(7, 2.0, 5.0)]));
    vis.startup().await;

    server.route(endpoint::AGENTS, agents(&[(7, 2.0, 7.0)]));
    run_tick(&mut vis).await;
    vis.frame(Duration::from_millis(500));

    let rec = renderer.recording();
    let car = rec.vehicle(EntityId(7)).expect("vehicle 7 drawn");
    assert!((car.pose.position.x - 2.0).abs() < 1e-5);
    assert_eq!(car.pose.position.y, 0.0);
    assert!((car.pose.position.z - 6.0).abs() < 1e-5);
    assert!(car.pose.rotation.y.abs() < 1e-6);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn outage_freezes_on_last_snapshot() -> anyhow::Result<()> {
    let (server, renderer, mut vis) = setup().await?;
    server.route(endpoint::AGENTS, agents(&[(1, 0.0, 0.0)]));
    vis.startup().await;
    server.route(endpoint::AGENTS, agents(&[(1, 0.0, 2.0)]));
    run_tick(&mut vis).await;

    server.route(endpoint::UPDATE, StubResponse::raw(503, "{}"));
    run_tick(&mut vis).await;
    run_tick(&mut vis).await;
    assert_eq!(vis.consecutive_failures(), 2);
    assert_eq!(vis.clock().fraction(), 1.0);

    vis.frame(Duration::from_millis(16));
    {
        let rec = renderer.recording();
        let car = rec.vehicle(EntityId(1)).expect("vehicle 1 drawn");
        assert!((car.pose.position.z - 2.0).abs() < 1e-5);
    }

    server.route(endpoint::UPDATE, StubResponse::json(json!({ "currentStep": 2 })));
    run_tick(&mut vis).await;
    assert_eq!(vis.consecutive_failures(), 0);
    assert_eq!(vis.last_step().map(|s| s.current_step), Some(2));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reset_reinitializes_the_server() -> anyhow::Result<()> {
    let (server, renderer, mut vis) = setup().await?;
    server.route(endpoint::AGENTS, agents(&[(1, 0.0, 0.0), (2, 0.0, 3.0)]));
    vis.startup().await;

    server.route(endpoint::AGENTS, agents(&[(9, 1.0, 1.0)]));
    vis.reset().await;

    assert_eq!(server.requests_to(endpoint::INIT).len(), 2);
    assert_eq!(vis.store().vehicle_ids(), vec![EntityId(9)]);
    assert_eq!(renderer.recording().released, vec![EntityId(1), EntityId(2)]);
    Ok(())
}
