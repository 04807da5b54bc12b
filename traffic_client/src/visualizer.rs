//! Visualizer.
//!
//! Owns the entity store, the tick clock and the renderer, and drives one
//! frame at a time:
//! 1. merge a finished tick fetch, if any,
//! 2. advance the clock,
//! 3. start the next tick fetch when one is due and none is in flight,
//! 4. build presentation records and hand them to the renderer.
//!
//! Network work runs on spawned tasks. The frame pass never waits on it.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::oneshot::{self, error::TryRecvError},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use traffic_shared::{
    config::ClientConfig,
    entity::Category,
    math::Vec3,
    net::{InitRequest, Snapshot, StepReport},
    render::{Pose, RenderBackend, SignalFrame, StaticFrame, VehicleFrame},
};

use crate::{
    client::{FetchError, SnapshotSource},
    clock::TickClock,
    console::{ControlCommand, HELP},
    crash::{perturbation, CrashState},
    interp::Interpolate,
    lights::{collect_sources, select_lights, LightSource, LightSourceMask},
    reconcile::{load_statics, reconcile, reconcile_lights, reconcile_vehicles, Lifecycle},
    store::{EntityStore, StaticEntity, TrafficLight, Vehicle},
    wheels::wheel_poses,
};

/// Steps between two statistics lines.
pub const STATS_EVERY: u64 = 20;

/// Lateral distance from a signal's position to its pole.
pub const POLE_OFFSET: f32 = 0.35;

/// Height of the bulb above the pole base.
pub const BULB_HEIGHT: f32 = 0.6;

const STATIC_ORDER: [Category; 3] = [Category::Road, Category::Obstacle, Category::Destination];

type TickResult = Result<Snapshot, FetchError>;

/// The tick fetch currently running.
struct PendingTick {
    result: oneshot::Receiver<TickResult>,
    task: JoinHandle<()>,
}

impl PendingTick {
    /// Stops the request so it cannot land after a later `/init`.
    fn cancel(self) {
        self.task.abort();
    }
}

pub struct Visualizer {
    cfg: ClientConfig,
    source: Arc<dyn SnapshotSource>,
    renderer: Box<dyn RenderBackend>,
    store: EntityStore,
    clock: TickClock,
    light_mask: LightSourceMask,
    pending: Option<PendingTick>,
    consecutive_failures: u32,
    last_step: Option<StepReport>,
}

impl Visualizer {
    pub fn new(cfg: ClientConfig, source: Arc<dyn SnapshotSource>, renderer: Box<dyn RenderBackend>) -> Self {
        let clock = TickClock::new(cfg.tick_duration());
        Self {
            cfg,
            source,
            renderer,
            store: EntityStore::default(),
            clock,
            light_mask: LightSourceMask::default(),
            pending: None,
            consecutive_failures: 0,
            last_step: None,
        }
    }

    pub fn with_light_mask(mut self, mask: LightSourceMask) -> Self {
        self.light_mask = mask;
        self
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    pub fn fetch_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_step(&self) -> Option<StepReport> {
        self.last_step
    }

    /// Initializes the server and loads the whole scene.
    ///
    /// Each failed load is logged and leaves its category empty.
    pub async fn startup(&mut self) {
        let request = InitRequest {
            agent_count: self.cfg.agent_count,
            grid_width: self.cfg.grid_width,
            grid_height: self.cfg.grid_height,
        };
        match self.source.init(&request).await {
            Ok(reply) => info!(
                agents = request.agent_count,
                width = request.grid_width,
                height = request.grid_height,
                message = %reply.message,
                "Simulation initialized"
            ),
            Err(e) => warn!(error = %e, "Init request failed"),
        }
        self.load_scene().await;
    }

    async fn load_scene(&mut self) {
        let now = self.clock.now();
        match self.source.agents().await {
            Ok(records) => {
                reconcile_vehicles(&mut self.store, &records, now);
            }
            Err(e) => warn!(error = %e, "Failed to load vehicles"),
        }

        for category in STATIC_ORDER {
            let result = match category {
                Category::Obstacle => self.source.obstacles().await,
                Category::Road => self.source.roads().await,
                _ => self.source.destinations().await,
            };
            match result {
                Ok(records) => load_statics(&mut self.store, category, &records),
                Err(e) => warn!(?category, error = %e, "Failed to load layout"),
            }
        }

        match self.source.traffic_lights().await {
            Ok(records) => {
                reconcile_lights(&mut self.store, &records);
            }
            Err(e) => warn!(error = %e, "Failed to load traffic lights"),
        }

        info!(
            vehicles = self.store.vehicle_count(),
            obstacles = self.store.static_count(Category::Obstacle),
            roads = self.store.static_count(Category::Road),
            destinations = self.store.static_count(Category::Destination),
            lights = self.store.light_count(),
            "Scene loaded"
        );
    }

    /// Re-initializes the server and reloads everything from scratch.
    ///
    /// An in-flight tick fetch is discarded.
    pub async fn reset(&mut self) {
        info!("Resetting simulation");
        if let Some(pending) = self.pending.take() {
            debug!("Cancelling in-flight tick fetch");
            pending.cancel();
        }
        for id in self.store.vehicle_ids() {
            self.renderer.release_vehicle(id);
        }
        self.store.clear();
        self.consecutive_failures = 0;
        self.last_step = None;
        self.startup().await;
        self.clock.restart();
    }

    /// Fire-and-forget spawn rate update.
    pub fn push_spawn_rate(&self, rate: u32) -> JoinHandle<()> {
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            match source.set_spawn_rate(rate).await {
                Ok(reply) => info!(rate, message = %reply.message, "Spawn rate updated"),
                Err(e) => warn!(rate, error = %e, "Failed to update spawn rate"),
            }
        })
    }

    /// Fire-and-forget erratic-driver toggle.
    pub fn push_erratic_mode(&self, enabled: bool) -> JoinHandle<()> {
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            match source.set_erratic_mode(enabled).await {
                Ok(reply) => info!(enabled, message = %reply.message, "Erratic mode updated"),
                Err(e) => warn!(enabled, error = %e, "Failed to update erratic mode"),
            }
        })
    }

    /// Applies a console command and returns the lines to print.
    ///
    /// `Quit` is left to the caller.
    pub async fn exec_command(&mut self, cmd: ControlCommand) -> Vec<String> {
        match cmd {
            ControlCommand::Reset => {
                self.reset().await;
                vec!["Simulation reset".to_string()]
            }
            ControlCommand::SpawnRate(rate) => {
                self.push_spawn_rate(rate);
                vec![format!("Spawning vehicles every {rate} steps")]
            }
            ControlCommand::ErraticMode(enabled) => {
                self.push_erratic_mode(enabled);
                vec![format!("Erratic drivers {}", if enabled { "on" } else { "off" })]
            }
            ControlCommand::Status => self.status_lines(),
            ControlCommand::Help => vec![HELP.to_string()],
            ControlCommand::Quit => Vec::new(),
        }
    }

    pub fn status_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.push(format!("Server: {}", self.cfg.server_url));
        match self.last_step {
            Some(step) => {
                out.push(format!("Step: {}", step.current_step));
                out.push(format!("Spawned: {}  Arrived: {}", step.cars_spawned, step.cars_arrived));
            }
            None => out.push("Step: -".to_string()),
        }
        out.push(format!("Vehicles: {}", self.store.vehicle_count()));
        out.push(format!("Traffic lights: {}", self.store.light_count()));
        out.push(format!(
            "Layout: {} roads, {} obstacles, {} destinations",
            self.store.static_count(Category::Road),
            self.store.static_count(Category::Obstacle),
            self.store.static_count(Category::Destination),
        ));
        out.push(format!("Blend: {:.2}", self.clock.fraction()));
        out.push(format!("Fetch in flight: {}", self.fetch_in_flight()));
        if self.consecutive_failures > 0 {
            out.push(format!("Failed ticks: {}", self.consecutive_failures));
        }
        out
    }

    /// Runs one frame. Must be called from within a tokio runtime.
    pub fn frame(&mut self, dt: Duration) {
        self.poll_fetch();
        self.clock.advance(dt);
        if self.pending.is_none() && self.clock.fetch_due() {
            self.start_fetch();
        }
        self.draw();
    }

    fn start_fetch(&mut self) {
        let (tx, rx) = oneshot::channel();
        let source = Arc::clone(&self.source);
        let task = tokio::spawn(async move {
            let _ = tx.send(source.tick().await);
        });
        self.pending = Some(PendingTick { result: rx, task });
        self.clock.mark_fetch_started();
    }

    fn poll_fetch(&mut self) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let result = match pending.result.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Closed) => {
                self.pending = None;
                warn!("Tick fetch ended without a result");
                self.record_failure(None);
                return;
            }
        };
        self.pending = None;
        match result {
            Ok(snapshot) => self.merge(snapshot),
            Err(e) => self.record_failure(Some(&e)),
        }
    }

    fn merge(&mut self, snapshot: Snapshot) {
        if self.consecutive_failures > 0 {
            info!(failures = self.consecutive_failures, "Snapshot fetch recovered");
            self.consecutive_failures = 0;
        }

        let events = reconcile(&mut self.store, &snapshot, self.clock.now());
        for event in events {
            match event {
                Lifecycle::VehicleRemoved(id) => {
                    debug!(%id, "Vehicle removed");
                    self.renderer.release_vehicle(id);
                }
                Lifecycle::VehicleSpawned(id) => debug!(%id, "Vehicle spawned"),
                Lifecycle::LightAdded(id) => debug!(%id, "Traffic light added"),
            }
        }
        self.clock.on_merge();
        self.record_step(snapshot.step);
    }

    fn record_failure(&mut self, error: Option<&FetchError>) {
        self.consecutive_failures += 1;
        let failures = self.consecutive_failures;
        if let Some(e) = error {
            if failures == 1 {
                warn!(endpoint = e.endpoint(), error = %e, "Tick fetch failed; keeping last snapshot");
            } else {
                debug!(endpoint = e.endpoint(), error = %e, failures, "Tick fetch failed");
            }
        }
        if failures == self.cfg.stale_warn_after {
            warn!(failures, "Server unreachable; display frozen on last snapshot");
        }
    }

    fn record_step(&mut self, step: StepReport) {
        debug!(
            step = step.current_step,
            spawned = step.cars_spawned,
            arrived = step.cars_arrived,
            "Step report"
        );
        if step.current_step > 0 && step.current_step % STATS_EVERY == 0 {
            info!(
                step = step.current_step,
                active = self.store.vehicle_count(),
                spawned = step.cars_spawned,
                arrived = step.cars_arrived,
                arrival_rate = step.arrival_rate().unwrap_or(0.0),
                "Simulation stats"
            );
        }
        self.last_step = Some(step);
    }

    fn draw(&mut self) {
        let f = self.clock.fraction();
        let now = self.clock.now();
        let sources = collect_sources(&self.store, self.light_mask, f);

        self.renderer.begin_frame(f);
        for category in STATIC_ORDER {
            for tile in self.store.statics(category) {
                self.renderer.draw_static(&static_frame(tile, &sources, &self.cfg));
            }
        }
        for light in self.store.lights() {
            self.renderer.draw_signal(&signal_frame(light, f));
        }
        for vehicle in self.store.vehicles() {
            self.renderer.draw_vehicle(&vehicle_frame(vehicle, f, now, &sources, &self.cfg));
        }
        self.renderer.end_frame();
    }
}

fn static_frame(tile: &StaticEntity, sources: &[LightSource], cfg: &ClientConfig) -> StaticFrame {
    StaticFrame {
        id: tile.id,
        category: tile.category,
        pose: Pose {
            position: tile.position,
            rotation: Vec3::new(0.0, tile.yaw, 0.0),
            scale: tile.scale,
            color: tile.color,
        },
        lights: select_lights(tile.position, None, sources, &cfg.lighting),
    }
}

fn signal_frame(light: &TrafficLight, f: f32) -> SignalFrame {
    let (position, yaw) = light.interpolate(f);
    let pole = position.add(Vec3::new(POLE_OFFSET, 0.0, 0.0).rotate_y(yaw));
    SignalFrame {
        id: light.id,
        signal: light.signal,
        pole,
        bulb: pole.add(Vec3::new(0.0, BULB_HEIGHT, 0.0)),
        bulb_color: light.signal.bulb_color(),
    }
}

fn vehicle_frame(vehicle: &Vehicle, f: f32, now: f64, sources: &[LightSource], cfg: &ClientConfig) -> VehicleFrame {
    let (mut position, yaw) = vehicle.interpolate(f);
    if let Some(height) = cfg.vehicle_ground_height {
        position.y = height;
    }

    let crash = vehicle.crash.state(now);
    let shake = perturbation(crash, vehicle.crash.elapsed(now));
    let body = position.add(shake.local_offset.rotate_y(yaw));
    let scale = vehicle.scale * shake.scale;

    VehicleFrame {
        id: vehicle.id,
        kind: vehicle.kind,
        crashed: matches!(crash, CrashState::Crashed { .. }),
        pose: Pose {
            position: body,
            rotation: Vec3::new(shake.wobble.x, yaw, shake.wobble.z),
            scale,
            color: shake.tint_color(vehicle.color),
        },
        wheels: wheel_poses(&vehicle.wheels, &vehicle.motion, body, f, scale, cfg.rolling_rate),
        lights: select_lights(body, Some(vehicle.id), sources, &cfg.lighting),
    }
}
