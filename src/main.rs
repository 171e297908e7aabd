//! Deferral CLI
//!
//! Runs a deferred or repeating callback on the virtual-time event loop and
//! prints one JSON line per invocation.

use anyhow::Context;
use clap::{Parser, Subcommand};
use deferral::config::TimerConfig;
use deferral::event_loop::EventLoop;
use deferral::{schedule_callback, DeferredCallback, Receiver, Value, VERSION};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deferral")]
#[command(author, version, about = "Deferred and repeating callbacks on a virtual-time event loop", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON file with timer configuration
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule a callback and report every invocation
    Simulate {
        /// Delay (or interval with --every) in milliseconds
        #[arg(short, long, allow_negative_numbers = true)]
        delay: i64,

        /// Repeat at a fixed interval instead of firing once
        #[arg(long)]
        every: bool,

        /// JSON array of arguments passed to the callback
        #[arg(long, default_value = "[]")]
        args: String,

        /// JSON value used as the callback's receiver
        #[arg(long = "this", value_name = "JSON")]
        this_arg: Option<String>,

        /// How long to run the event loop, in milliseconds (default: three delays)
        #[arg(long, value_name = "MS")]
        run_for: Option<u64>,

        /// Cancel the schedule from inside the callback after this many timer firings
        #[arg(long, value_name = "N")]
        cancel_after: Option<u64>,

        /// Invoke the callback manually right after scheduling
        #[arg(long)]
        exec_now: bool,

        /// With --exec-now, leave the scheduled timer armed
        #[arg(long, requires = "exec_now")]
        keep_pending: bool,

        /// Wait on the wall clock instead of jumping the virtual clock
        #[arg(long)]
        realtime: bool,
    },

    /// Print the effective timer configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    tracing::debug!(version = VERSION, "deferral starting");

    let outcome = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Simulate {
            delay,
            every,
            args,
            this_arg,
            run_for,
            cancel_after,
            exec_now,
            keep_pending,
            realtime,
        } => simulate(
            config,
            SimulateOptions {
                delay,
                every,
                args,
                this_arg,
                run_for,
                cancel_after,
                exec_now,
                keep_pending,
                realtime,
            },
        ),
        Commands::Config => show_config(&config),
    });

    if let Err(e) = outcome {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn setup_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TimerConfig> {
    match path {
        Some(path) => TimerConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(TimerConfig::default()),
    }
}

fn show_config(config: &TimerConfig) -> anyhow::Result<()> {
    println!("{}", config.to_json_pretty()?);
    Ok(())
}

struct SimulateOptions {
    delay: i64,
    every: bool,
    args: String,
    this_arg: Option<String>,
    run_for: Option<u64>,
    cancel_after: Option<u64>,
    exec_now: bool,
    keep_pending: bool,
    realtime: bool,
}

fn parse_json(label: &str, text: &str) -> anyhow::Result<Value> {
    let json: serde_json::Value =
        serde_json::from_str(text).with_context(|| format!("--{} is not valid JSON", label))?;
    Ok(Value::from(json))
}

fn simulate(config: TimerConfig, opts: SimulateOptions) -> anyhow::Result<()> {
    let args = match parse_json("args", &opts.args)? {
        Value::Array(items) => {
            let items = items.borrow().clone();
            items
        }
        other => anyhow::bail!("--args must be a JSON array, got {}", other.type_of()),
    };
    let this_arg = opts
        .this_arg
        .as_deref()
        .map(|text| parse_json("this", text))
        .transpose()?;

    let host = Rc::new(EventLoop::with_config(config));
    let clock = Rc::downgrade(&host);
    let firings = Rc::new(Cell::new(0u64));
    let manual = Rc::new(Cell::new(false));
    // Filled in after scheduling so the callback can cancel itself even with a bound receiver
    let slot: Rc<RefCell<Option<DeferredCallback>>> = Rc::new(RefCell::new(None));

    let (f, m, s, cancel_after) = (firings.clone(), manual.clone(), slot.clone(), opts.cancel_after);
    let handle = schedule_callback(
        &host,
        move |this: &Receiver<'_>, args: &[Value]| -> anyhow::Result<()> {
            let source = if m.get() { "manual" } else { "timer" };
            if !m.get() {
                f.set(f.get() + 1);
            }
            let receiver = match this {
                Receiver::Handle(_) => json!("handle"),
                Receiver::Value(v) => serde_json::to_value(v)?,
            };
            let time = clock.upgrade().map(|h| h.current_time()).unwrap_or_default();
            println!(
                "{}",
                json!({ "time": time, "tick": f.get(), "source": source, "args": args, "this": receiver })
            );

            if cancel_after.is_some_and(|n| !m.get() && f.get() >= n) {
                if let Some(handle) = s.borrow().as_ref() {
                    handle.cancel();
                }
            }
            Ok(())
        },
        opts.delay,
        args,
        this_arg,
        opts.every,
    )?;
    *slot.borrow_mut() = Some(handle.clone());

    if opts.exec_now {
        manual.set(true);
        let exec = handle.exec_with(!opts.keep_pending);
        manual.set(false);
        exec?;
    }

    let window = opts.run_for.unwrap_or_else(|| handle.delay_ms().saturating_mul(3));
    let result = if opts.realtime {
        host.run_for_realtime(Duration::from_millis(window))
    } else {
        host.run_for(window)
    };

    for uncaught in host.drain_uncaught_errors() {
        eprintln!("uncaught error from timer {}: {:#}", uncaught.timer_id, uncaught.error);
    }

    println!(
        "{}",
        json!({
            "fired": result.timers_fired,
            "final_time": result.final_time,
            "truncated": result.truncated,
            "has_executed": handle.has_executed(),
            "pending": handle.is_pending(),
        })
    );

    slot.borrow_mut().take();
    handle.cancel();
    Ok(())
}
