use std::{str::FromStr, sync::Arc};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use procurement_api::{
    auth::{Actor, AuthService, Role},
    clock::{Clock, FixedClock, SystemClock},
    config::{self, AppConfig},
    store::{EntityStore, InMemoryStore},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    match cli.command {
        Commands::Token(args) => handle_token(&cfg, args, cli.json)?,
        Commands::CheckConfig => handle_check_config(&cfg, cli.json)?,
        Commands::Sweep(args) => handle_sweep(cfg, args, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "procurement-cli",
    about = "Procurement API tokens, configuration checks and sweeps",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a bearer token for an actor
    Token(TokenArgs),
    /// Validate the configuration and print a summary
    CheckConfig,
    /// Run the deadline and overdue sweeps once against the configured snapshot
    Sweep(SweepArgs),
}

#[derive(Args)]
struct TokenArgs {
    #[arg(long, help = "Actor id carried in the `sub` claim")]
    actor_id: Uuid,
    #[arg(long, value_parser = parse_role, help = "admin, purchaser, finance or provider")]
    role: Role,
    #[arg(long, help = "Display name carried in the token")]
    name: Option<String>,
}

#[derive(Args)]
struct SweepArgs {
    #[arg(long, help = "Sweep as of this date (YYYY-MM-DD) instead of today")]
    date: Option<NaiveDate>,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::from_str(raw).map_err(|_| format!("unknown role '{}'", raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_token(cfg: &AppConfig, args: TokenArgs, json: bool) -> Result<()> {
    let auth = AuthService::new(cfg.auth_config());
    let mut actor = Actor::new(args.actor_id, args.role);
    if let Some(name) = args.name {
        actor = actor.with_name(name);
    }
    let token = auth
        .issue_token(&actor)
        .map_err(|e| anyhow!("failed to issue token: {}", e))?;

    if json {
        print_json(&serde_json::json!({
            "actor": actor,
            "token": token,
            "expires_in_secs": cfg.jwt_expiration_secs,
        }))
    } else {
        println!("{}", token);
        Ok(())
    }
}

#[derive(Serialize)]
struct ConfigSummary<'a> {
    environment: &'a str,
    listen: String,
    log_level: &'a str,
    jwt_issuer: &'a str,
    jwt_audience: &'a str,
    default_currency: &'a str,
    sweep_interval_secs: u64,
    snapshot_path: Option<String>,
}

fn handle_check_config(cfg: &AppConfig, json: bool) -> Result<()> {
    cfg.validate_all().context("configuration is invalid")?;
    let summary = ConfigSummary {
        environment: &cfg.environment,
        listen: format!("{}:{}", cfg.host, cfg.port),
        log_level: cfg.log_level(),
        jwt_issuer: &cfg.jwt_issuer,
        jwt_audience: &cfg.jwt_audience,
        default_currency: &cfg.default_currency,
        sweep_interval_secs: cfg.sweep_interval_secs,
        snapshot_path: cfg
            .store
            .snapshot_path
            .as_ref()
            .map(|p| p.display().to_string()),
    };

    if json {
        return print_json(&summary);
    }
    println!("configuration OK");
    println!("  environment       {}", summary.environment);
    println!("  listen            {}", summary.listen);
    println!("  log level         {}", summary.log_level);
    println!("  jwt issuer        {}", summary.jwt_issuer);
    println!("  jwt audience      {}", summary.jwt_audience);
    println!("  default currency  {}", summary.default_currency);
    println!("  sweep interval    {}s", summary.sweep_interval_secs);
    println!(
        "  snapshot          {}",
        summary.snapshot_path.as_deref().unwrap_or("(in-memory only)")
    );
    Ok(())
}

async fn handle_sweep(cfg: AppConfig, args: SweepArgs, json: bool) -> Result<()> {
    let path = cfg
        .store
        .snapshot_path
        .clone()
        .ok_or_else(|| anyhow!("store.snapshot_path is not configured; nothing to sweep"))?;
    let store: Arc<dyn EntityStore> = Arc::new(
        InMemoryStore::open(&path)
            .await
            .with_context(|| format!("failed to open snapshot {}", path.display()))?,
    );
    let clock: Arc<dyn Clock> = match args.date {
        Some(date) => Arc::new(FixedClock::on(date)),
        None => Arc::new(SystemClock),
    };

    let state = AppState::bootstrap(cfg, store, clock);
    let report = state
        .workflow
        .run_sweeps()
        .await
        .map_err(|e| anyhow!("sweep failed: {}", e))?;

    if json {
        return print_json(&serde_json::json!({
            "today": report.today,
            "closed_rfqs": report.closed_rfqs,
            "overdue_payments": report.overdue_payments,
        }));
    }
    println!(
        "{}: closed {} RFQs, flagged {} overdue installments",
        report.today,
        report.closed_rfqs.len(),
        report.overdue_payments.len()
    );
    Ok(())
}
