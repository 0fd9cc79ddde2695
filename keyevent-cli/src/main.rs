mod board;
mod replay;
mod trace;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use keyevent::config::{
    DEBOUNCE_MS, DOUBLE_CLICK_MS, LONG_PRESS_MS, MATRIX_MAX_COL, MATRIX_MAX_ROW, POOL_SIZE,
    REPEAT_PERIOD_MS, REPEAT_START_MS,
};
use keyevent::{Config, Level, MatrixBounds, Polarity, Timing};
use log::info;
use std::fs;

#[derive(Parser)]
#[command(name = "keyevent-cli")]
#[command(about = "Replay recorded key traces through the key event driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a trace and print every event the driver dispatches
    Replay {
        /// Path to the trace file
        trace: String,
        /// Poll period in milliseconds
        #[arg(long, default_value_t = 10)]
        tick: u32,
        /// Draw a progress bar over the replay
        #[arg(long)]
        progress: bool,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Parse a trace and register its keys without replaying it
    Check {
        /// Path to the trace file
        trace: String,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the default driver configuration
    Defaults,
}

#[derive(Args)]
struct ConfigArgs {
    /// Debounce time in milliseconds
    #[arg(long, default_value_t = DEBOUNCE_MS)]
    debounce: u32,
    /// Hold time before a long press, in milliseconds
    #[arg(long, default_value_t = LONG_PRESS_MS)]
    long_press: u32,
    /// Hold time before repeats start, in milliseconds
    #[arg(long, default_value_t = REPEAT_START_MS)]
    repeat_start: u32,
    /// Time between repeats, in milliseconds
    #[arg(long, default_value_t = REPEAT_PERIOD_MS)]
    repeat_period: u32,
    /// Window for the second click of a double click, in milliseconds
    #[arg(long, default_value_t = DOUBLE_CLICK_MS)]
    double_click: u32,
    /// Keys and matrix lines read low when active
    #[arg(long)]
    active_low: bool,
    /// Matrix rows
    #[arg(long, default_value_t = MATRIX_MAX_ROW)]
    rows: u8,
    /// Matrix columns
    #[arg(long, default_value_t = MATRIX_MAX_COL)]
    cols: u8,
    /// Matrix rows are wired in reverse order
    #[arg(long)]
    reverse_rows: bool,
    /// Matrix columns are wired in reverse order
    #[arg(long)]
    reverse_cols: bool,
    /// Bytes reserved for the key registry
    #[arg(long, default_value_t = POOL_SIZE)]
    pool_bytes: usize,
}

impl ConfigArgs {
    fn config(&self) -> Config {
        let active = if self.active_low { Level::Low } else { Level::High };
        Config::new()
            .with_timing(Timing {
                debounce_ms: self.debounce,
                long_press_ms: self.long_press,
                repeat_start_ms: self.repeat_start,
                repeat_period_ms: self.repeat_period,
                double_click_ms: self.double_click,
            })
            .with_polarity(Polarity {
                pin_active: active,
                col_active: active,
                row_active: active,
            })
            .with_matrix(MatrixBounds {
                rows: self.rows,
                cols: self.cols,
                reverse_rows: self.reverse_rows,
                reverse_cols: self.reverse_cols,
            })
            .with_pool_bytes(self.pool_bytes)
    }
}

fn load(path: &str) -> Result<trace::Trace> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    trace::parse_trace(&contents).with_context(|| format!("parsing trace {}", path))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            trace,
            tick,
            progress,
            config,
        } => {
            let parsed = load(&trace)?;
            info!(
                "{}: {:?} trace, {} keys, {} steps, ends at {} ms",
                trace,
                parsed.mode,
                parsed.keys.len(),
                parsed.steps.len(),
                parsed.end_ms
            );

            let pb = if progress {
                let pb = ProgressBar::new(replay::tick_count(&parsed, tick));
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ticks")?
                        .progress_chars("#>-"),
                );
                Some(pb)
            } else {
                None
            };

            let result = replay::replay(&parsed, config.config(), tick, pb.as_ref())?;
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }

            for e in &result.events {
                println!("t={} {} ({}) {}", e.at_ms, e.name, e.id, e.event);
            }
            for at in &result.dropped_ticks {
                println!("t={} tick dropped", at);
            }
            println!(
                "{} events over {} ticks, {} dropped",
                result.events.len(),
                result.ticks,
                result.dropped_ticks.len()
            );
        }
        Command::Check { trace, config } => {
            let parsed = load(&trace)?;
            let check = replay::check(&parsed, config.config())?;
            println!("Trace: {:?} mode, {} keys", parsed.mode, check.keys);
            println!(
                "Pool: {} of {} blocks in use",
                check.pool_used, check.pool_capacity
            );
        }
        Command::Defaults => {
            let config = Config::new();
            let t = &config.timing;
            println!("backend        {:?}", config.backend);
            println!("debounce       {} ms", t.debounce_ms);
            println!("long press     {} ms", t.long_press_ms);
            println!("repeat start   {} ms", t.repeat_start_ms);
            println!("repeat period  {} ms", t.repeat_period_ms);
            println!("double click   {} ms", t.double_click_ms);
            println!(
                "matrix         {}x{}",
                config.matrix.rows, config.matrix.cols
            );
            println!("pool           {} bytes", config.pool_bytes);
        }
    }

    Ok(())
}
