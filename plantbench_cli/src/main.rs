mod cli;
mod rt;
mod sinks;

use clap::Parser;
use eyre::{Result, WrapErr};
use plantbench_config::{Config, Logging, UpdateRecord};
use plantbench_core::{ChannelBroadcast, ConfigUpdate, SharedState, System, apply_update};
use plantbench_hardware::SimPlant;
#[cfg(not(feature = "hardware"))]
use plantbench_hardware::SimMux;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = cli::Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(ms) = args.sample_time_ms {
        config.control.sample_time_ms = ms;
    }
    if let Some(ms) = args.discharge_ms {
        config.startup.discharge_ms = ms;
    }
    if args.profile {
        config.setpoint.enabled = true;
    }
    config.validate().wrap_err("config after CLI overrides")?;

    let _log_guard = init_tracing(&config.logging)?;
    rt::setup_rt_once(args.rt, args.rt_prio);

    let broadcast = ChannelBroadcast::new();
    let json_writer = args
        .telemetry_json
        .as_deref()
        .map(|path| spawn_json_writer(&broadcast, path))
        .transpose()?;

    if !args.quiet {
        // Header for the serial-plotter CSV stream.
        println!("Setpoint(V),Output(V)");
    }

    let builder = System::builder()
        .with_plant(SimPlant::new())
        .with_config(config)
        .with_broadcast(broadcast);

    #[cfg(feature = "hardware")]
    let builder = match (args.mux_pin_a, args.mux_pin_b) {
        (Some(a), Some(b)) => builder.with_mux(plantbench_hardware::GpioMux::new(a, b)?),
        _ => builder.with_mux(plantbench_hardware::SimMux::new()),
    };
    #[cfg(not(feature = "hardware"))]
    let builder = builder.with_mux(SimMux::new());

    let builder = if args.quiet {
        builder
    } else {
        builder.with_plotter_sink(sinks::CsvStdoutSink::new())
    };
    let builder = if args.cycle_selection {
        builder.with_selection_cycler(Duration::from_millis(args.cycle_period_ms))
    } else {
        builder
    };

    let system = builder.start()?;

    // Inbound transport: JSON update records, one per stdin line. The thread
    // parks on stdin and dies with the process.
    let state = system.state().clone();
    std::thread::spawn(move || stdin_update_loop(&state));

    match args.run_ms {
        Some(ms) => std::thread::sleep(Duration::from_millis(ms)),
        None => wait_for_ctrl_c()?,
    }
    system.stop();
    if let Some(handle) = json_writer {
        let _ = handle.join();
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let p = PathBuf::from("plantbench.toml");
            p.exists().then_some(p)
        }
    };
    match path {
        Some(p) => {
            let text = fs::read_to_string(&p)
                .wrap_err_with(|| format!("reading config {}", p.display()))?;
            let cfg: Config = toml::from_str(&text)
                .wrap_err_with(|| format!("parsing config {}", p.display()))?;
            cfg.validate()
                .wrap_err_with(|| format!("validating config {}", p.display()))?;
            Ok(cfg)
        }
        None => Ok(Config::default()),
    }
}

fn init_tracing(logging: &Logging) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_deref().unwrap_or("info")));
    match logging.file.as_deref() {
        Some(path) => {
            let p = Path::new(path);
            let dir = p
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = p
                .file_name()
                .map(std::ffi::OsStr::to_os_string)
                .unwrap_or_else(|| "plantbench.log".into());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

/// Drain broadcast frames into a JSON-lines file. The thread exits when the
/// system (and with it every broadcast sender) is gone.
fn spawn_json_writer(
    broadcast: &ChannelBroadcast,
    path: &Path,
) -> Result<std::thread::JoinHandle<()>> {
    let rx = broadcast.subscribe();
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .wrap_err_with(|| format!("opening telemetry file {}", path.display()))?;
    Ok(std::thread::spawn(move || {
        while let Ok(frame) = rx.recv() {
            if writeln!(file, "{}", sinks::frame_to_json(&frame)).is_err() {
                break;
            }
        }
    }))
}

fn stdin_update_loop(state: &Arc<SharedState>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<UpdateRecord>(line) {
            Ok(rec) => {
                tracing::info!(?rec, "applying remote update");
                apply_update(state, &ConfigUpdate::from(rec));
            }
            Err(e) => tracing::warn!(error = %e, "ignoring malformed update line"),
        }
    }
}

fn wait_for_ctrl_c() -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .wrap_err("installing ctrl-c handler")?;
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(50));
    }
    Ok(())
}
