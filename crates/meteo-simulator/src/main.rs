//! Desktop simulator for the meteo-rs deep-sleep environmental logger.
//!
//! Drives `meteo_core`'s wake cycle against virtual peripherals: a virtual
//! clock advanced by the sleep durations the logger asks for, synthetic
//! sensors, a host directory standing in for the SD card and an in-memory
//! OLED.
//!
//! ```text
//! meteo-simulator run --cycles 144 --press 20 --press 20.5 --ascii
//! meteo-simulator run --offline --faulty outside
//! meteo-simulator inspect meteo-out/sync_1700001080.csv
//! ```
//!
//! Build with `--features window` to look at the final screen in an SDL
//! window (`run --window`).

mod board;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, eyre};
use embassy_futures::block_on;
use log::info;

use meteo_core::config::LoggerConfig;
use meteo_core::retained::RetainedSlot;
use meteo_core::sample::{Climate, Location};
use meteo_core::storage::csv;
use meteo_core::wake::{FlushStatus, Logger, WakeCause};

use crate::board::{SimSetup, VirtualTime};

/// Same batch length as the firmware.
const BATCH_LEN: usize = 72;

#[derive(Parser)]
#[command(name = "meteo-simulator")]
#[command(version)]
#[command(about = "runs the meteo logger's wake cycle against virtual hardware")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run measurement cycles, writing batch files to a host directory
    Run(RunArgs),
    /// Print the samples stored in a batch file
    Inspect {
        file: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Number of measurement cycles before stopping
    #[arg(short, long, default_value_t = 2 * BATCH_LEN as u32)]
    cycles: u32,
    /// Seconds after power-on at which the screen button is pressed, repeatable
    #[arg(short, long = "press", value_name = "SECS")]
    presses: Vec<f64>,
    /// Keep the time server unreachable for the whole run
    #[arg(long)]
    offline: bool,
    /// Location whose sensor never answers
    #[arg(long, value_enum)]
    faulty: Option<LocationArg>,
    /// Directory the batch files are written to
    #[arg(short, long, default_value = "meteo-out")]
    output: PathBuf,
    /// Print the panel to the terminal on every update
    #[arg(long)]
    ascii: bool,
    /// Show the final panel contents in a window
    #[cfg(feature = "window")]
    #[arg(long)]
    window: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum LocationArg {
    Room,
    Wall,
    Outside,
    Ceiling,
}

impl From<LocationArg> for Location {
    fn from(arg: LocationArg) -> Self {
        match arg {
            LocationArg::Room => Location::Room,
            LocationArg::Wall => Location::Wall,
            LocationArg::Outside => Location::Outside,
            LocationArg::Ceiling => Location::Ceiling,
        }
    }
}

#[derive(Debug)]
struct RunSummary {
    cycles: u32,
    button_wakes: u32,
    files: Vec<String>,
    error_latched: bool,
    simulated: Duration,
}

fn run(args: &RunArgs) -> color_eyre::Result<RunSummary> {
    let mut presses = args
        .presses
        .iter()
        .map(|secs| Duration::try_from_secs_f64(*secs))
        .collect::<Result<Vec<_>, _>>()
        .wrap_err("button press times must be non-negative seconds")?;
    presses.sort();
    let mut presses = presses.into_iter().peekable();

    let epoch_at_boot = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .wrap_err("host clock is set before 1970")?;

    let time = VirtualTime::default();
    let devices = board::devices(
        &time,
        SimSetup {
            output: args.output.clone(),
            online: !args.offline,
            epoch_at_boot,
            faulty: args.faulty.map(Location::from),
            ascii: args.ascii,
        },
    );
    let mut logger = Logger::new(LoggerConfig::DEFAULT, devices);
    let mut slot: Box<RetainedSlot<BATCH_LEN>> = Box::new(RetainedSlot::vacant());

    let mut summary = RunSummary {
        cycles: 0,
        button_wakes: 0,
        files: Vec::new(),
        error_latched: false,
        simulated: Duration::ZERO,
    };
    let mut cause = WakeCause::ColdBoot;

    loop {
        let (resumed, state) = slot.resume(cause);
        let outcome = block_on(logger.wake(resumed, state));
        summary.error_latched = outcome.error_latched;

        match &outcome.report {
            Some(report) => {
                summary.cycles += 1;
                if let FlushStatus::Written(name) = &report.flush {
                    summary.files.push(name.to_string());
                }
            }
            None => summary.button_wakes += 1,
        }
        if summary.cycles >= args.cycles {
            break;
        }

        let alarm = time.get() + outcome.sleep_for;
        cause = match presses.next_if(|press| *press < alarm) {
            Some(press) => {
                time.advance_to(press);
                WakeCause::Button
            }
            None => {
                time.advance_to(alarm);
                WakeCause::Timer
            }
        };
    }

    summary.simulated = time.get();

    #[cfg(feature = "window")]
    if args.window {
        show_window(logger.devices().panel.display());
    }

    Ok(summary)
}

#[cfg(feature = "window")]
fn show_window(
    display: &embedded_graphics_simulator::SimulatorDisplay<embedded_graphics::pixelcolor::BinaryColor>,
) {
    use embedded_graphics_simulator::{
        BinaryColorTheme, OutputSettingsBuilder, SimulatorEvent, Window,
    };

    let settings = OutputSettingsBuilder::new()
        .theme(BinaryColorTheme::OledBlue)
        .scale(4)
        .build();
    let mut window = Window::new("Meteo Simulator", &settings);

    'open: loop {
        window.update(display);
        for event in window.events() {
            if matches!(event, SimulatorEvent::Quit) {
                break 'open;
            }
        }
        std::thread::sleep(Duration::from_millis(33));
    }
}

fn cell(climate: Climate) -> String {
    if climate.is_valid() {
        format!("{:>6.2} {:>6.2}", climate.temperature, climate.humidity)
    } else {
        format!("{:>6} {:>6}", "--", "--")
    }
}

fn inspect(file: &Path) -> color_eyre::Result<()> {
    let text = fs::read_to_string(file)
        .wrap_err_with(|| format!("could not read {}", file.display()))?;
    let samples = csv::decode_batch(&text)
        .map_err(|e| eyre!("{e}"))
        .wrap_err_with(|| format!("{} is not a batch file", file.display()))?;

    println!("{}: {} samples", file.display(), samples.len());
    print!("{:>4} {:>5} {:>5}", "#", "co2", "tvoc");
    for location in Location::ALL {
        print!("  {:>13}", location.label());
    }
    println!();

    for (row, sample) in samples.iter().enumerate() {
        print!(
            "{:>4} {:>5} {:>5}",
            row, sample.air.eco2_ppm, sample.air.tvoc_ppb
        );
        for location in Location::ALL {
            print!("  {}", cell(sample.at(location)));
        }
        println!();
    }

    for location in Location::ALL {
        let missing = samples.iter().filter(|s| !s.at(location).is_valid()).count();
        if missing > 0 {
            println!("{}: {} of {} readings missing", location.label(), missing, samples.len());
        }
    }
    Ok(())
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            let summary = run(&args)?;
            info!(
                "{} measurement cycles and {} button wakes over {:.0} s of simulated time",
                summary.cycles,
                summary.button_wakes,
                summary.simulated.as_secs_f64()
            );
            for name in &summary.files {
                info!("Wrote {}", args.output.join(name).display());
            }
            if summary.error_latched {
                info!("Error LED is lit");
            }
            Ok(())
        }
        Command::Inspect { file } => inspect(&file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("meteo-sim-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn args(output: PathBuf) -> RunArgs {
        RunArgs {
            cycles: 2 * BATCH_LEN as u32,
            presses: Vec::new(),
            offline: false,
            faulty: None,
            output,
            ascii: false,
            #[cfg(feature = "window")]
            window: false,
        }
    }

    #[test]
    fn test_online_run_writes_synced_batches() {
        let dir = scratch_dir("online");
        let summary = run(&args(dir.clone())).unwrap();

        assert_eq!(summary.cycles, 2 * BATCH_LEN as u32);
        assert_eq!(summary.files.len(), 2);
        assert!(summary.files.iter().all(|f| f.starts_with("sync_")));
        assert!(!summary.error_latched);

        let text = fs::read_to_string(dir.join(&summary.files[0])).unwrap();
        assert_eq!(csv::decode_batch(&text).unwrap().len(), BATCH_LEN);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_offline_run_uses_one_session() {
        let dir = scratch_dir("offline");
        let mut args = args(dir.clone());
        args.offline = true;
        let summary = run(&args).unwrap();

        assert_eq!(summary.files.len(), 2);
        assert!(summary.files.iter().all(|f| f.starts_with("nosync_1_")));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_faulty_sensor_latches_and_leaves_gaps() {
        let dir = scratch_dir("faulty");
        let mut args = args(dir.clone());
        args.cycles = BATCH_LEN as u32;
        args.faulty = Some(LocationArg::Wall);
        let summary = run(&args).unwrap();

        assert!(summary.error_latched);
        let text = fs::read_to_string(dir.join(&summary.files[0])).unwrap();
        let samples = csv::decode_batch(&text).unwrap();
        assert!(samples.iter().all(|s| !s.at(Location::Wall).is_valid()));
        assert!(samples.iter().all(|s| s.at(Location::Room).is_valid()));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_presses_become_button_wakes() {
        let dir = scratch_dir("presses");
        let mut args = args(dir.clone());
        args.cycles = 3;
        // The second press is a bounce.
        args.presses = vec![5.0, 5.5, 20.0];
        let summary = run(&args).unwrap();

        assert_eq!(summary.button_wakes, 3);
        assert_eq!(summary.cycles, 3);
        let _ = fs::remove_dir_all(&dir);
    }
}
