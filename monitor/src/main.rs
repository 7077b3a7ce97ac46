use anyhow::Context;
use clap::Parser;
use gui_bridge::bridge::{handle_rejection, routes, BridgeState};
use log::{debug, info};
use skywatchcore::processing::ControllerEvent;
use skywatchcore::Coordinate;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use upstream::client::HistoryClient;
use upstream::sync::HistorySync;
use warp::Filter;
use workflow::config::{MonitorConfig, UpstreamConfig};
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod upstream;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Drone-detection situational awareness service")]
struct Args {
    /// Run a synthetic scenario once and emit a summary
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load the monitor config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Defended point latitude
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    lat: Option<f64>,
    /// Defended point longitude
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lng: Option<f64>,
    #[arg(long, default_value_t = 1500.0)]
    radius: f64,
    #[arg(long, default_value_t = 13.0)]
    zoom: f64,
    /// Base URL of the upstream detection API
    #[arg(long, requires = "token")]
    upstream: Option<String>,
    #[arg(long, env = "SKYWATCH_TOKEN")]
    token: Option<String>,
    /// Keep the HTTP bridge alive for live pushes
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = if let Some(path) = args.config {
        MonitorConfig::load(path)?
    } else {
        let defended_point = args.lat.zip(args.lng).map(|(lat, lng)| Coordinate::new(lat, lng));
        let upstream = args.upstream.zip(args.token).map(|(base_url, token)| UpstreamConfig {
            base_url,
            token,
            poll_secs: 30,
            backoff_initial_ms: 500,
            backoff_max_ms: 30_000,
            timeout_secs: 10,
        });
        MonitorConfig::from_args(defended_point, args.radius, args.zoom, upstream)
    };

    let runner = Runner::new(&config)?;

    if args.offline {
        let result = runner.execute(&config.scenario)?;
        let nearest = result
            .intruders
            .first()
            .map(|hit| {
                format!(
                    "{} at {} (ETA {})",
                    hit.object.obj_id,
                    hit.distance_label(),
                    hit.eta_label()
                )
            })
            .unwrap_or_else(|| "none".to_string());

        println!(
            "Offline run -> events {}, objects {}, markers {} ({} clusters), intruders {}, nearest {}",
            result.event_count,
            result.object_count,
            result.marker_count,
            result.cluster_count,
            result.intruders.len(),
            nearest
        );

        let report = format!(
            "events={} objects={} markers={} clusters={} intruders={} nearest={}\n",
            result.event_count,
            result.object_count,
            result.marker_count,
            result.cluster_count,
            result.intruders.len(),
            nearest
        );
        if let Some(parent) = config.report_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.report_path)
            .with_context(|| format!("opening report {}", config.report_path.display()))?;
        file.write_all(report.as_bytes())?;
    }

    if args.serve {
        let runtime = TokioBuilder::new_multi_thread()
            .enable_all()
            .build()
            .context("creating runtime for the HTTP bridge")?;
        runtime.block_on(serve(config, runner))?;
    }

    Ok(())
}

async fn serve(config: MonitorConfig, runner: Runner) -> anyhow::Result<()> {
    let upstream = match config.upstream.as_ref() {
        Some(upstream_config) => {
            let client = Arc::new(HistoryClient::new(upstream_config)?);
            let sync = HistorySync::new(client.clone(), runner.clone(), upstream_config);
            tokio::spawn(sync.run());
            Some(client)
        }
        None => None,
    };

    let mut events = runner.with_controller(|ctl| ctl.subscribe());
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ControllerEvent::DefendedPointChanged { point, radius_m }) => {
                    info!("defended point now {:?}, radius {} m", point, radius_m);
                }
                Ok(ControllerEvent::SelectionChanged(selected)) => {
                    debug!("selection changed to {:?}", selected);
                }
                Ok(ControllerEvent::MarkersChanged(diff)) => {
                    debug!(
                        "markers: +{} -{} ={}",
                        diff.added.len(),
                        diff.removed.len(),
                        diff.retained.len()
                    );
                }
                Ok(ControllerEvent::SnapshotPublished(_)) => {}
                Err(RecvError::Lagged(skipped)) => debug!("event listener skipped {}", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let api = routes(BridgeState::new(runner, upstream)).recover(handle_rejection);
    let (addr, server) = warp::serve(api)
        .try_bind_with_graceful_shutdown(config.bind, async {
            let _ = signal::ctrl_c().await;
        })
        .with_context(|| format!("binding HTTP bridge on {}", config.bind))?;
    info!("HTTP bridge listening on {} (Ctrl+C to stop)", addr);
    server.await;
    Ok(())
}
