//! Standalone visualizer binary.
//!
//! Usage:
//!   cargo run -p traffic_client -- [--config client.json] [--url http://localhost:8585/]
//!                                  [--tick-ms 1000] [--agents 20]
//!
//! Initializes the simulation server, loads the scene and polls one snapshot
//! per tick while presenting at the frame rate. There is no window: frames go
//! to a logging renderer.
//!
//! Console commands:
//!   reset              - Re-initialize the simulation
//!   spawn_rate <n>     - Spawn vehicles every n steps
//!   erratic on|off     - Toggle erratic drivers
//!   status             - Show visualizer status
//!   help               - List commands
//!   quit               - Exit

use std::env;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{debug, info};
use traffic_client::{
    console::{ControlCommand, ControlConsole},
    HttpSnapshotClient, Visualizer,
};
use traffic_shared::{
    config::ClientConfig,
    entity::EntityId,
    render::{RenderBackend, SignalFrame, StaticFrame, VehicleFrame},
};

/// Counts what each frame draws and logs a summary once a second.
#[derive(Default)]
struct LogRenderer {
    frame: u64,
    fraction: f32,
    statics: usize,
    signals: usize,
    vehicles: usize,
    erratic: usize,
    crashed: usize,
}

impl RenderBackend for LogRenderer {
    fn begin_frame(&mut self, fraction: f32) {
        self.fraction = fraction;
        self.statics = 0;
        self.signals = 0;
        self.vehicles = 0;
        self.erratic = 0;
        self.crashed = 0;
    }

    fn draw_static(&mut self, _item: &StaticFrame) {
        self.statics += 1;
    }

    fn draw_signal(&mut self, _item: &SignalFrame) {
        self.signals += 1;
    }

    fn draw_vehicle(&mut self, item: &VehicleFrame) {
        self.vehicles += 1;
        if item.kind.is_erratic() {
            self.erratic += 1;
        }
        if item.crashed {
            self.crashed += 1;
        }
    }

    fn release_vehicle(&mut self, id: EntityId) {
        debug!(%id, "Released vehicle resources");
    }

    fn end_frame(&mut self) {
        self.frame += 1;
        if self.frame % 60 == 0 {
            debug!(
                frame = self.frame,
                fraction = self.fraction,
                statics = self.statics,
                signals = self.signals,
                vehicles = self.vehicles,
                erratic = self.erratic,
                crashed = self.crashed,
                "Frame"
            );
        }
    }
}

fn parse_args() -> anyhow::Result<ClientConfig> {
    let args: Vec<String> = env::args().collect();

    // The config file is the base; flags override it wherever they appear.
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = &args[i + 1];
            let text = std::fs::read_to_string(path).with_context(|| format!("read config {path}"))?;
            ClientConfig::from_json_str(&text).with_context(|| format!("parse config {path}"))?
        }
        _ => ClientConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--url" if i + 1 < args.len() => {
                cfg.server_url = args[i + 1].clone();
                i += 2;
            }
            "--tick-ms" if i + 1 < args.len() => {
                cfg.tick_ms = args[i + 1].parse().context("--tick-ms expects milliseconds")?;
                i += 2;
            }
            "--agents" if i + 1 < args.len() => {
                cfg.agent_count = args[i + 1].parse().context("--agents expects a count")?;
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(server = %cfg.server_url, tick_ms = cfg.tick_ms, frame_hz = cfg.frame_hz, "Starting visualizer");

    let source = HttpSnapshotClient::from_config(&cfg).context("create snapshot client")?;
    let frame_interval = cfg.frame_interval();
    let mut vis = Visualizer::new(cfg, Arc::new(source), Box::new(LogRenderer::default()));
    vis.startup().await;

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("> ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Visualizer running. Type 'help' for commands, 'quit' to exit.");
    println!();

    let mut console = ControlConsole::new();
    let mut ticker = tokio::time::interval(frame_interval);
    let mut last = Instant::now();

    'frames: loop {
        // Process console commands.
        while let Ok(line) = console_rx.try_recv() {
            match console.parse(&line) {
                Ok(Some(ControlCommand::Quit)) => break 'frames,
                Ok(Some(cmd)) => {
                    for line in vis.exec_command(cmd).await {
                        println!("{}", line);
                    }
                }
                Ok(None) => {}
                Err(e) => println!("Error: {:#}", e),
            }
        }

        let now = Instant::now();
        vis.frame(now - last);
        last = now;

        ticker.tick().await;
    }

    info!("Visualizer stopped");
    Ok(())
}
