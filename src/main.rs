use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};
use tokio::signal;
use tokio::sync::mpsc;

use sensorfw_proxy::config::Config;
use sensorfw_proxy::error::Result;
use sensorfw_proxy::proxy::SensorProxyCore;
use sensorfw_proxy::proxy::notify::BusEmitter;
use sensorfw_proxy::proxy::service::{BUS_NAME, CompassInterface, SensorProxyInterface};
use sensorfw_proxy::proxy::state::SensorClass;
use sensorfw_proxy::sensorfw::{Plugin, Sample, SensorBackend, SensorfwSensor};

/// Bridge sensorfw sensors onto the net.hadess.SensorProxy interface.
#[derive(Parser, Debug)]
#[command(name = "sensorfw-proxy")]
struct Args {
    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,

    /// Override the sensord telemetry socket path.
    #[arg(long, env = "SENSORFW_SOCKET")]
    socket: Option<String>,
}

fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    info!("Starting sensorfw-proxy");

    let mut config = Config::from_env();
    if let Some(socket) = args.socket {
        config.sensorfw.socket_path = socket;
    }
    info!("  sensord socket: {}", config.sensorfw.socket_path);

    if let Err(e) = run(config).await {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

async fn connect_sensor(
    conn: &zbus::Connection,
    plugin: Plugin,
    config: &Config,
) -> Option<SensorfwSensor> {
    match SensorfwSensor::connect(conn.clone(), plugin, &config.sensorfw).await {
        Ok(sensor) => {
            info!("{} backend ready", plugin);
            Some(sensor)
        }
        Err(e) => {
            warn!("Failed to create {} backend: {}", plugin, e);
            None
        }
    }
}

async fn run(config: Config) -> Result<()> {
    // One connection serves our objects, one talks to sensorfw.
    let service_conn = zbus::Connection::system().await?;
    let sensorfw_conn = zbus::Connection::system().await?;

    // Bring the four backends up; a failed construction leaves that
    // class permanently unavailable for this run.
    let (accel, light, compass, proximity) = tokio::join!(
        connect_sensor(&sensorfw_conn, Plugin::Orientation, &config),
        connect_sensor(&sensorfw_conn, Plugin::Light, &config),
        connect_sensor(&sensorfw_conn, Plugin::Compass, &config),
        connect_sensor(&sensorfw_conn, Plugin::Proximity, &config),
    );

    let mut backends: HashMap<SensorClass, Arc<dyn SensorBackend>> = HashMap::new();
    let mut sensors: Vec<(SensorClass, Arc<SensorfwSensor>)> = Vec::new();
    for (class, sensor) in [
        (SensorClass::Accelerometer, accel),
        (SensorClass::AmbientLight, light),
        (SensorClass::Compass, compass),
        (SensorClass::Proximity, proximity),
    ] {
        if let Some(sensor) = sensor {
            let sensor = Arc::new(sensor);
            backends.insert(class, Arc::clone(&sensor) as Arc<dyn SensorBackend>);
            sensors.push((class, sensor));
        }
    }

    let emitter = Arc::new(BusEmitter::new(service_conn.clone()));
    let core = Arc::new(SensorProxyCore::new(emitter, backends));

    // Read threads push decoded samples into this channel; one task
    // folds them into the core.
    let (sample_tx, mut sample_rx) = mpsc::unbounded_channel::<(SensorClass, Sample)>();
    let mut registrations = Vec::new();
    for (class, sensor) in &sensors {
        let class = *class;
        let tx = sample_tx.clone();
        registrations.push(sensor.register_handler(move |sample| {
            let _ = tx.send((class, sample));
        }));
    }
    drop(sample_tx);

    let sample_core = Arc::clone(&core);
    let sample_task = tokio::spawn(async move {
        while let Some((class, sample)) = sample_rx.recv().await {
            sample_core.handle_sample(class, sample).await;
        }
    });

    // Export both objects, then take the well-known name. Losing the
    // name race means another proxy is already running.
    service_conn
        .object_server()
        .at(
            SensorProxyInterface::path(),
            SensorProxyInterface::new(Arc::clone(&core)),
        )
        .await?;
    service_conn
        .object_server()
        .at(
            CompassInterface::path(),
            CompassInterface::new(Arc::clone(&core)),
        )
        .await?;
    service_conn.request_name(BUS_NAME).await?;

    core.announce_available().await;
    info!("sensorfw-proxy is running");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    // Orderly teardown: stop sample delivery, turn the backends off,
    // then let each session release itself with sensorfw.
    drop(registrations);
    sample_task.abort();
    core.shutdown().await;
    for (_, sensor) in &sensors {
        sensor.shutdown().await;
    }

    info!("sensorfw-proxy stopped");
    Ok(())
}
