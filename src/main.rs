#![forbid(unsafe_code)]

//! Sample console client driving the library against the simulated display
//! subsystem. Each subcommand exercises one slice of the query or
//! transaction surface; `--json` emits the read models as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use displayctl::os::{
    ChangeStatus, PathDescriptor, PathScope, PreferredMode, SignalMode, SourceModeDescriptor, TargetDescriptor,
    TargetDeviceInfo,
};
use displayctl::sim::SimulatedOs;
use displayctl::types::{Rotation, Scaling};
use displayctl::{
    DisplaySetting, DisplayTopologyReader, DpiScale, GammaRamp, Luid, PixelFormat, Point, Rational, ScaleSteps,
    Size, TopologyId,
};

#[derive(Parser)]
#[command(name = "displayctl", about = "Inspect and reconfigure the simulated display topology")]
struct Cli {
    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List display adapters from both enumeration families
    Adapters,
    /// List attached and unattached displays with their current settings
    Displays,
    /// List display paths
    Paths {
        /// Only paths currently driving desktop pixels
        #[arg(long)]
        active: bool,
    },
    /// List path sources with display names and DPI scale state
    Sources,
    /// List path targets with device info and preferred modes
    Targets,
    /// Apply a well-known topology
    Topology {
        #[arg(value_enum)]
        kind: TopologyKind,
    },
    /// Run a multi-display batch with an engineered failure and watch the
    /// rollback restore the previous state
    Rollback,
    /// Synthesize a gamma ramp and apply it to the primary display
    Gamma {
        #[arg(long, default_value_t = 0.5)]
        brightness: f64,
        #[arg(long, default_value_t = 0.5)]
        contrast: f64,
        #[arg(long, default_value_t = 1.0)]
        gamma: f64,
    },
    /// Change the DPI scale of the first path source
    Scale {
        /// Desired percentage (100, 125, 150, ...)
        percent: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TopologyKind {
    Internal,
    Clone,
    Extend,
    External,
}

impl From<TopologyKind> for TopologyId {
    fn from(kind: TopologyKind) -> Self {
        match kind {
            TopologyKind::Internal => TopologyId::Internal,
            TopologyKind::Clone => TopologyId::Clone,
            TopologyKind::Extend => TopologyId::Extend,
            TopologyKind::External => TopologyId::External,
        }
    }
}

const GPU: Luid = Luid { low: 0x1002, high: 0 };

/// A machine with one GPU, two attached displays and one spare monitor.
fn sample_machine() -> SimulatedOs {
    let mut os = SimulatedOs::new();
    let gpu_path = "PCI\\VEN_10DE&DEV_2206\\4&278a3e39";
    os.add_adapter("\\\\.\\DISPLAY1", "Sample GPU", gpu_path);
    os.add_adapter("\\\\.\\DISPLAY2", "Sample GPU", gpu_path);
    os.add_adapter("\\\\.\\DISPLAY3", "Sample GPU", gpu_path);
    os.add_monitor("\\\\.\\DISPLAY1", "MONITOR\\DEL40A9\\0001", "\\Registry\\Machine\\System\\Video\\DEL40A9", true);
    os.add_monitor("\\\\.\\DISPLAY2", "MONITOR\\GSM5B09\\0002", "\\Registry\\Machine\\System\\Video\\GSM5B09", true);
    os.add_monitor("\\\\.\\DISPLAY3", "MONITOR\\ACR0520\\0003", "\\Registry\\Machine\\System\\Video\\ACR0520", false);
    os.set_current_mode("\\\\.\\DISPLAY1", Size::new(2560, 1440), Point::new(0, 0), 144);
    os.set_current_mode("\\\\.\\DISPLAY2", Size::new(1920, 1080), Point::new(2560, 0), 60);
    for (frequency, bits) in [(144, 32), (60, 32), (60, 16)] {
        os.add_supported_mode("\\\\.\\DISPLAY1", Size::new(2560, 1440), frequency, bits);
    }
    os.add_supported_mode("\\\\.\\DISPLAY1", Size::new(1920, 1080), 120, 32);

    os.set_adapter_device_path(GPU, "\\\\?\\PCI#VEN_10DE&DEV_2206#4&278a3e39#{5b45201d-f2f2-4f3b-85bb-30ff1f953599}");
    for (source_id, name) in [(0, "\\\\.\\DISPLAY1"), (1, "\\\\.\\DISPLAY2")] {
        os.set_source_name(GPU, source_id, name);
    }
    os.set_target_device(
        GPU,
        1,
        TargetDeviceInfo {
            friendly_name: "Dell U2719D".to_string(),
            device_path: "MONITOR\\DEL40A9\\0001".to_string(),
        },
    );
    os.set_target_preferred_mode(
        GPU,
        1,
        PreferredMode {
            resolution: Size::new(2560, 1440),
            signal: SignalMode {
                active_size: Size::new(2560, 1440),
                total_size: Size::new(2720, 1481),
                pixel_rate: 241_500_000,
                h_sync_freq: Rational::new(88_787, 1, false),
                v_sync_freq: Rational::new(241_500_000, 4_028_320, true),
            },
        },
    );
    os.set_source_scale(GPU, 0, ScaleSteps::new(-1, 0, 3));

    for (source_id, position, resolution) in [
        (0, Point::new(0, 0), Size::new(2560, 1440)),
        (1, Point::new(2560, 0), Size::new(1920, 1080)),
    ] {
        os.add_path(PathDescriptor {
            source_adapter: GPU,
            source_id,
            source_mode: Some(SourceModeDescriptor {
                position,
                resolution,
                pixel_format: PixelFormat::Bpp32,
            }),
            targets: vec![TargetDescriptor {
                adapter: GPU,
                target_id: source_id + 1,
                rotation: Rotation::Identity,
                scaling: Scaling::Identity,
                refresh_rate: Rational::new(60, 1, false),
                available: true,
            }],
            active: true,
        });
    }
    os
}

fn run(cli: &Cli, os: &SimulatedOs) -> Result<()> {
    let reader = DisplayTopologyReader::new(os, os, os);
    match &cli.command {
        Command::Adapters => {
            let legacy = reader.display_adapters();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&legacy)?);
                return Ok(());
            }
            for adapter in &legacy {
                println!("{adapter} [{}]", adapter.identity.path);
                if let Some(path_adapter) = reader.to_path_adapter(adapter)? {
                    let device_path = reader.path_adapter_device_path(&path_adapter)?;
                    println!("  path adapter {}: {device_path}", path_adapter.adapter_id);
                }
            }
        }
        Command::Displays => {
            let displays = reader.displays();
            let unattached = reader.unattached_displays();
            if cli.json {
                let document = serde_json::json!({ "attached": displays, "unattached": unattached });
                println!("{}", serde_json::to_string_pretty(&document)?);
                return Ok(());
            }
            for display in &displays {
                let setting = reader.current_setting(display);
                let primary = if reader.is_gdi_primary(display) { " (primary)" } else { "" };
                println!("{}: {setting}{primary}", display.device.display_full_name);
            }
            for display in &unattached {
                println!("{}: unattached", display.device.display_full_name);
            }
        }
        Command::Paths { active } => {
            let scope = if *active { PathScope::Active } else { PathScope::All };
            let paths = reader.path_infos(scope)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&paths)?);
                return Ok(());
            }
            for path in &paths {
                println!(
                    "source {} @ ({}, {}) {} targets={} active={}",
                    path.source.source_id,
                    path.position.x,
                    path.position.y,
                    path.resolution,
                    path.targets.len(),
                    path.active
                );
            }
        }
        Command::Sources => {
            let sources = reader.path_sources()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&sources)?);
                return Ok(());
            }
            for source in &sources {
                let name = reader.path_source_display_name(source)?;
                match reader.source_scale_steps(source) {
                    Ok(steps) => {
                        let current = steps.current_scale().map(|scale| scale.to_string());
                        println!("{name}: scale {}", current.as_deref().unwrap_or("unknown"));
                    }
                    Err(err) => warn!(%err, name, "source has no dpi scale state"),
                }
            }
        }
        Command::Targets => {
            let targets = reader.path_targets()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&targets)?);
                return Ok(());
            }
            for target in &targets {
                match reader.path_target_device(target) {
                    Ok(info) => {
                        let preferred = reader
                            .path_target_preferred_mode(target)
                            .map(|mode| mode.resolution.to_string())
                            .unwrap_or_else(|_| "unknown".to_string());
                        println!("{} [{}] preferred {preferred}", info.friendly_name, info.device_path);
                    }
                    Err(err) => warn!(%err, target_id = target.target_id, "target has no device info"),
                }
            }
        }
        Command::Topology { kind } => {
            reader.apply_topology((*kind).into(), false)?;
            println!("applied topology: {:?}", os.last_topology());
        }
        Command::Rollback => {
            os.reject_resolution("\\\\.\\DISPLAY2", Size::new(1024, 768), ChangeStatus::BadMode);
            let displays = reader.displays();
            let batch: Vec<_> = displays
                .iter()
                .map(|display| {
                    (
                        display.device.clone(),
                        DisplaySetting::new(Size::new(1024, 768), reader.current_setting(display).position, 60),
                    )
                })
                .collect();
            match reader.save_display_settings(&batch, true) {
                Ok(()) => println!("batch applied (unexpected with the engineered rejection)"),
                Err(err) => println!("batch failed and rolled back: {err}"),
            }
            for display in reader.displays() {
                println!(
                    "{}: {}",
                    display.device.display_full_name,
                    reader.current_setting(&display)
                );
            }
        }
        Command::Gamma {
            brightness,
            contrast,
            gamma,
        } => {
            let ramp = GammaRamp::synthesize(*brightness, *contrast, *gamma);
            let display = reader
                .displays()
                .into_iter()
                .find(|display| reader.is_gdi_primary(display))
                .context("no primary display")?;
            reader.set_display_gamma_ramp(&display, &ramp)?;
            let applied = reader.display_gamma_ramp(&display)?;
            println!(
                "applied ramp to {}: first={} mid={} last={}",
                display.device.display_full_name,
                applied.red[0],
                applied.red[128],
                applied.red[255]
            );
        }
        Command::Scale { percent } => {
            let desired = DpiScale::ALL
                .into_iter()
                .find(|scale| scale.percent() == *percent)
                .with_context(|| format!("{percent}% is not a named DPI scale"))?;
            let source = reader.path_sources()?.into_iter().next().context("no path sources")?;
            reader.set_source_scale(&source, desired)?;
            let steps = reader.source_scale_steps(&source)?;
            println!(
                "scale now {} (steps {:?})",
                steps.current_scale().map(|scale| scale.to_string()).unwrap_or_default(),
                steps
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber).context("installing tracing subscriber")?;

    let cli = Cli::parse();
    let os = sample_machine();
    run(&cli, &os)
}
