// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use integrity_watch::check::{
    interval_label, BoxError, ChangeEvent, CommandTokenIssuer, FileTokenIssuer, IDisplaySurface,
    INotifier, ITokenIssuer, Orchestrator, Scheduler,
};
use integrity_watch::store::{
    format_relative_time, now_millis, FileKeyValueStore, IKeyValueStore, Settings,
    VerdictSnapshot, VerdictStore,
};
use integrity_watch::token::{self, IntegrityStatement, KeyConfig};
use std::error::Error;
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(author, version, about = "Play Integrity verdict checker")]
struct IntegrityWatchCli {
    /// Log debug information to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    Check(CheckArgs),
    Status(StatusArgs),
    Decode(DecodeArgs),
    Nonce(NonceArgs),
    Watch(WatchArgs),
    Settings(SettingsArgs),
}

#[derive(Debug, clap::Args)]
struct KeyArgs {
    /// JSON key configuration; the environment is used when absent
    #[arg(short, long)]
    keys: Option<String>,
}

#[derive(Debug, clap::Args)]
struct StateArgs {
    #[arg(short, long, default_value = "integrity-state")]
    state_dir: String,
}

#[derive(Debug, clap::Args)]
#[group(required = true, multiple = false)]
struct IssuerArgs {
    /// Read the token from a file
    #[arg(long)]
    token_file: Option<String>,

    /// Run a program with the nonce as argument and read the token from its
    /// standard output
    #[arg(long)]
    issuer_cmd: Option<String>,
}

#[derive(Debug, clap::Args)]
#[command(about = "Run one integrity check and record its outcome")]
struct CheckArgs {
    #[command(flatten)]
    keys: KeyArgs,

    #[command(flatten)]
    state: StateArgs,

    #[command(flatten)]
    issuer: IssuerArgs,
}

#[derive(Debug, clap::Args)]
#[command(about = "Show the outcome of the last check")]
struct StatusArgs {
    #[command(flatten)]
    state: StateArgs,
}

#[derive(Debug, clap::Args)]
#[command(about = "Decrypt and verify a token, then print its statement")]
struct DecodeArgs {
    #[arg(short, long, default_value = "token.jwe")]
    token: String,

    #[command(flatten)]
    keys: KeyArgs,
}

#[derive(Debug, clap::Args)]
#[command(about = "Print a fresh request nonce")]
struct NonceArgs {
    #[arg(short, long, default_value_t = token::DEFAULT_NONCE_LENGTH)]
    length: usize,
}

#[derive(Debug, clap::Args)]
#[command(about = "Check periodically until interrupted")]
struct WatchArgs {
    #[command(flatten)]
    keys: KeyArgs,

    #[command(flatten)]
    state: StateArgs,

    #[command(flatten)]
    issuer: IssuerArgs,
}

#[derive(Debug, clap::Args)]
#[command(about = "Show or change the settings")]
struct SettingsArgs {
    #[command(flatten)]
    state: StateArgs,

    #[arg(long)]
    alerts: Option<bool>,

    #[arg(long)]
    failure_alerts: Option<bool>,

    #[arg(long)]
    widget_refresh: Option<bool>,

    /// Minutes between background checks
    #[arg(long)]
    interval: Option<u32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = IntegrityWatchCli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let res = match cli.command {
        Command::Check(args) => check(&args).await,
        Command::Status(args) => status(&args).await,
        Command::Decode(args) => decode(&args),
        Command::Nonce(args) => nonce(&args),
        Command::Watch(args) => watch(&args).await,
        Command::Settings(args) => settings(&args).await,
    };

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn load_keys(args: &KeyArgs) -> Result<KeyConfig, Box<dyn Error>> {
    match &args.keys {
        Some(path) => Ok(KeyConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(KeyConfig::from_env()),
    }
}

fn issuer(args: &IssuerArgs) -> Result<Arc<dyn ITokenIssuer>, Box<dyn Error>> {
    let issuer: Arc<dyn ITokenIssuer> = match (&args.token_file, &args.issuer_cmd) {
        (Some(f), _) => Arc::new(FileTokenIssuer::new(f)),
        (None, Some(c)) => Arc::new(CommandTokenIssuer::new(c)),
        (None, None) => return Err("either --token-file or --issuer-cmd is needed".into()),
    };

    Ok(issuer)
}

async fn orchestrator(
    keys: &KeyArgs,
    state: &StateArgs,
    issuer_args: &IssuerArgs,
) -> Result<(Orchestrator, Arc<dyn IKeyValueStore>), Box<dyn Error>> {
    let kv: Arc<dyn IKeyValueStore> = Arc::new(FileKeyValueStore::new(&state.state_dir));
    let store = Arc::new(VerdictStore::open(kv.clone()).await?);

    let o = Orchestrator::new(store, kv.clone(), load_keys(keys)?, issuer(issuer_args)?)
        .with_notifier(Arc::new(ConsoleNotifier));

    Ok((o, kv))
}

async fn check(args: &CheckArgs) -> Result<(), Box<dyn Error>> {
    let (o, _) = orchestrator(&args.keys, &args.state, &args.issuer).await?;
    let o = o.with_display(Arc::new(ConsoleDisplay));

    o.run().await?;

    Ok(())
}

async fn status(args: &StatusArgs) -> Result<(), Box<dyn Error>> {
    let kv = Arc::new(FileKeyValueStore::new(&args.state.state_dir));
    let store = VerdictStore::open(kv.clone()).await?;
    let settings = Settings::load(kv.as_ref()).await?;

    let s = store.latest();

    println!("{}", s.summary());
    println!(
        "last check: {}",
        format_relative_time(s.last_check_timestamp, now_millis())
    );
    println!(
        "checking every {}",
        interval_label(settings.check_interval_minutes)
    );

    Ok(())
}

fn decode(args: &DecodeArgs) -> Result<(), Box<dyn Error>> {
    let keys = load_keys(&args.keys)?.load()?;
    let compact = fs::read_to_string(&args.token)?;

    let payload = token::unseal(compact.trim(), &keys)?;
    let statement = IntegrityStatement::decode(&payload)?;

    println!("{}", serde_json::to_string_pretty(&statement)?);
    eprintln!("device tier: {}", statement.verdicts().device_tier());

    Ok(())
}

fn nonce(args: &NonceArgs) -> Result<(), Box<dyn Error>> {
    println!("{}", token::nonce::generate(args.length)?);

    Ok(())
}

async fn watch(args: &WatchArgs) -> Result<(), Box<dyn Error>> {
    let (o, kv) = orchestrator(&args.keys, &args.state, &args.issuer).await?;
    let settings = Settings::load(kv.as_ref()).await?;

    let mut updates = o.store().subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let s = updates.borrow_and_update().clone();
            println!("{}", s.summary());
        }
    });

    let (scheduler, handle) = Scheduler::new(Arc::new(o), &settings);
    let task = tokio::spawn(scheduler.run());

    tokio::signal::ctrl_c().await?;

    handle.shutdown();
    task.await?;
    printer.abort();

    Ok(())
}

async fn settings(args: &SettingsArgs) -> Result<(), Box<dyn Error>> {
    let kv = FileKeyValueStore::new(&args.state.state_dir);
    let mut s = Settings::load(&kv).await?;

    let changed = args.alerts.is_some()
        || args.failure_alerts.is_some()
        || args.widget_refresh.is_some()
        || args.interval.is_some();

    if let Some(v) = args.alerts {
        s.alerts_enabled = v;
    }
    if let Some(v) = args.failure_alerts {
        s.failure_alerts_enabled = v;
    }
    if let Some(v) = args.widget_refresh {
        s.widget_refresh_enabled = v;
    }
    if let Some(v) = args.interval {
        s.check_interval_minutes = v;
    }

    if changed {
        s.save(&kv).await?;
    }

    println!("{}", serde_json::to_string_pretty(&s)?);

    Ok(())
}

struct ConsoleDisplay;

#[async_trait]
impl IDisplaySurface for ConsoleDisplay {
    async fn refresh(&self, snapshot: &VerdictSnapshot) -> Result<(), BoxError> {
        println!("{}", snapshot.summary());
        Ok(())
    }
}

struct ConsoleNotifier;

#[async_trait]
impl INotifier for ConsoleNotifier {
    async fn notify_change(&self, event: &ChangeEvent) -> Result<(), BoxError> {
        let polarity = if event.is_improvement {
            "improved"
        } else {
            "changed"
        };
        eprintln!("{} ({polarity}): {}", event.title, event.message);
        Ok(())
    }

    async fn notify_failure(&self, message: &str) -> Result<(), BoxError> {
        eprintln!("Integrity check failed: {message}");
        Ok(())
    }
}
