use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};

use crate::db::Database;
use crate::export::build_export;
use crate::models::stats::format_duration;
use crate::models::Pose;
use crate::monitor::{run_replay, PostureMonitor};
use crate::notify::LogNotifier;
use crate::scoring::{score_pose, ScoringConfig, ScoringPreset};
use crate::sensing::{load_model, read_pose_lines, warm_up, ReplaySource};
use crate::settings::{Settings, SettingsStore};
use crate::stats::SessionAggregator;
use crate::storage::{persist_quietly, KeyValueStore, BASELINE_KEY};
use crate::utils::{Clock, ManualClock};

const ENABLE_LOGS: bool = true;

use crate::log_info;

const DATABASE_FILE: &str = "posturewatch.sqlite3";

#[derive(Parser)]
#[command(name = "posturewatch")]
#[command(about = "Posture scoring, session tracking and break reminders", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the local database
    #[arg(long, global = true, env = "POSTUREWATCH_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single pose read from a JSON file
    Score {
        /// Pose JSON file
        pose: PathBuf,

        /// Scoring variant
        #[arg(long, value_enum, default_value_t = PresetArg::Classic)]
        preset: PresetArg,
    },

    /// Run a monitoring session over recorded poses (one JSON pose per line)
    Replay {
        /// Pose JSON lines file
        poses: PathBuf,

        /// Simulated milliseconds between frames
        #[arg(long, default_value = "33")]
        step_ms: u64,

        /// Wait out each step in wall time
        #[arg(long)]
        realtime: bool,
    },

    /// Print stats, achievements and settings as JSON
    Export,

    /// Manage settings
    #[command(subcommand)]
    Settings(SettingsSubcommands),

    /// Clear today's activity log
    ClearLogs,

    /// Save a baseline posture from a pose JSON file
    CalibrateFrom {
        /// Pose JSON file
        pose: PathBuf,
    },
}

#[derive(Subcommand)]
enum SettingsSubcommands {
    /// Show current settings
    Show,

    /// Restore defaults
    Reset,

    /// Set the display frame rate
    SetFps {
        /// Frames per second (1-60)
        fps: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PresetArg {
    Classic,
    Extended,
}

impl From<PresetArg> for ScoringPreset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::Classic => ScoringPreset::Classic,
            PresetArg::Extended => ScoringPreset::Extended,
        }
    }
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Score { pose, preset } => score_command(&pose, preset.into()),
            Commands::Replay {
                poses,
                step_ms,
                realtime,
            } => {
                let store = open_store(self.data_dir)?;
                replay_command(store, &poses, step_ms, realtime).await
            }
            Commands::Export => {
                let store = open_store(self.data_dir)?;
                let document = build_export(store.as_ref(), Local::now());
                println!("{}", serde_json::to_string_pretty(&document)?);
                Ok(())
            }
            Commands::Settings(command) => {
                let store = open_store(self.data_dir)?;
                settings_command(store.as_ref(), command)
            }
            Commands::ClearLogs => {
                let store = open_store(self.data_dir)?;
                let mut aggregator =
                    SessionAggregator::load(store.as_ref(), Local::now().date_naive());
                aggregator.clear_logs(store.as_ref());
                println!("Activity log cleared");
                Ok(())
            }
            Commands::CalibrateFrom { pose } => {
                let store = open_store(self.data_dir)?;
                let pose = read_pose(&pose)?;
                persist_quietly(store.as_ref(), BASELINE_KEY, &pose);
                let mut aggregator =
                    SessionAggregator::load(store.as_ref(), Local::now().date_naive());
                aggregator.log_activity(
                    store.as_ref(),
                    chrono::Utc::now(),
                    "Baseline posture calibrated",
                );
                println!("Baseline saved ({} keypoints)", pose.keypoints.len());
                Ok(())
            }
        }
    }
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("posturewatch"))
        .context("could not determine a data directory; pass --data-dir")
}

fn open_store(data_dir: Option<PathBuf>) -> Result<Rc<dyn KeyValueStore>> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let database = Database::new(dir.join(DATABASE_FILE))?;
    Ok(Rc::new(database))
}

fn read_pose(path: &Path) -> Result<Pose> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read pose from {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("invalid pose in {}", path.display()))
}

fn score_command(path: &Path, preset: ScoringPreset) -> Result<()> {
    let pose = read_pose(path)?;
    let result = score_pose(&pose, &ScoringConfig::for_preset(preset));
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn replay_command(
    store: Rc<dyn KeyValueStore>,
    path: &Path,
    step_ms: u64,
    realtime: bool,
) -> Result<()> {
    let poses = read_pose_lines(path)?;
    log_info!("replaying {} poses from {}", poses.len(), path.display());

    let settings = SettingsStore::load(store.as_ref()).get().clone();
    let source = ReplaySource::new(poses);
    let mut loader = source.loader();
    let (estimator, _profile) = load_model(&mut loader, settings.model_type).await?;
    warm_up(&estimator).await;

    let clock = ManualClock::new(Local::now());
    let notifier = Rc::new(LogNotifier {
        sound_enabled: settings.sound_enabled,
    });
    let mut monitor = PostureMonitor::new(store, notifier, source, estimator, clock.now());
    monitor.override_cadence(step_ms.max(1), step_ms.max(1));
    monitor.start(clock.now())?;

    let summary = run_replay(&mut monitor, &clock, step_ms, realtime).await;

    let stats = monitor.stats();
    println!("Frames processed:  {}", summary.ticks);
    println!("Fresh inferences:  {}", summary.fresh_inferences);
    println!("Reminders sent:    {}", summary.reminders);
    println!("Good posture:      {}", format_duration(stats.good_seconds));
    println!("Poor posture:      {}", format_duration(stats.poor_seconds));
    if let Some(ratio) = stats.good_ratio() {
        println!("Good ratio:        {:.0}%", ratio * 100.0);
    }
    if let Some(result) = monitor.last_result() {
        println!("Last score:        {} ({})", result.score, result.category.as_str());
    }
    let performance = monitor.performance_snapshot();
    println!(
        "Detection health:  {} ({} frames, {:.1} MB)",
        performance.status.as_str(),
        performance.frame_count,
        performance.system.memory_mb
    );
    for title in &summary.unlocked {
        println!("Unlocked:          {title}");
    }
    Ok(())
}

fn settings_command(store: &dyn KeyValueStore, command: SettingsSubcommands) -> Result<()> {
    let mut settings = SettingsStore::load(store);
    match command {
        SettingsSubcommands::Show => {}
        SettingsSubcommands::Reset => settings.reset(store)?,
        SettingsSubcommands::SetFps { fps } => {
            let updated = Settings {
                target_fps: fps,
                ..settings.get().clone()
            };
            settings.update(store, updated)?;
        }
    }
    println!("{}", serde_json::to_string_pretty(settings.get())?);
    Ok(())
}
