//! CLI definition and dispatch.

use clap::{ArgAction, Parser, Subcommand};
use rust_decimal::Decimal;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::{write_records, CsvBarSource};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::asset::AssetId;
use crate::domain::config::{
    build_strategy_config, StrategyConfig, DEFAULT_BASE_PRECISION, DEFAULT_QUOTE_PRECISION,
};
use crate::domain::engine::ValueAveraging;
use crate::domain::error::VatraderError;
use crate::domain::feed::{replay, FeedSummary};
use crate::domain::rounding::round;
use crate::domain::schedule;
use crate::ports::bar_port::BarSource;
use crate::ports::config_port::ConfigPort;
use crate::ports::record_port::RecordStore;

#[derive(Parser, Debug)]
#[command(name = "vatrader", about = "Value averaging planner")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay historical bars through a ledger and persist every interval
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        /// Trading pair, e.g. BTC/USD (overrides [strategy] symbol)
        #[arg(long)]
        symbol: Option<String>,
        /// Directory holding <BASE>_<QUOTE>.csv bar files (overrides [feed] path)
        #[arg(long)]
        bars: Option<PathBuf>,
    },
    /// Print the persisted ledger of an asset as CSV
    History {
        #[arg(short, long)]
        config: PathBuf,
        /// Trading pair; lists recorded assets when omitted
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the target schedule for the first N intervals
    Target {
        #[arg(long)]
        principal: Decimal,
        #[arg(long)]
        rate: Decimal,
        #[arg(long, default_value_t = 365)]
        frequency: u32,
        #[arg(long, default_value_t = 12)]
        intervals: u32,
        #[arg(long, default_value_t = DEFAULT_QUOTE_PRECISION)]
        quote_precision: u32,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Simulate {
            config,
            symbol,
            bars,
        } => run_simulate(&config, symbol.as_deref(), bars),
        Command::History {
            config,
            symbol,
            output,
        } => run_history(&config, symbol.as_deref(), output.as_ref()),
        Command::Target {
            principal,
            rate,
            frequency,
            intervals,
            quote_precision,
        } => run_target(principal, rate, frequency, intervals, quote_precision),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = VatraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// `--symbol` if given, otherwise `[strategy] symbol`.
pub fn resolve_symbol(
    symbol_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<String, VatraderError> {
    symbol_override
        .map(str::to_string)
        .or_else(|| config.get_string("strategy", "symbol"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| VatraderError::ConfigMissing {
            section: "strategy".into(),
            key: "symbol".into(),
        })
}

/// Open the record store named by `[database] backend` (default `sqlite`)
/// and make sure its schema exists.
pub fn open_record_store(config: &dyn ConfigPort) -> Result<Box<dyn RecordStore>, VatraderError> {
    let backend = config
        .get_string("database", "backend")
        .map(|b| b.trim().to_lowercase())
        .unwrap_or_else(|| "sqlite".to_string());

    match backend.as_str() {
        "sqlite" => open_sqlite(config),
        "postgres" => open_postgres(config),
        other => Err(VatraderError::ConfigInvalid {
            section: "database".into(),
            key: "backend".into(),
            reason: format!("unknown backend {other:?} (expected sqlite or postgres)"),
        }),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<Box<dyn RecordStore>, VatraderError> {
    use crate::adapters::sqlite_adapter::SqliteRecordStore;

    let store = SqliteRecordStore::from_config(config)?;
    store.initialize_schema()?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<Box<dyn RecordStore>, VatraderError> {
    Err(backend_unavailable("sqlite"))
}

#[cfg(feature = "postgres")]
fn open_postgres(config: &dyn ConfigPort) -> Result<Box<dyn RecordStore>, VatraderError> {
    use crate::adapters::postgres_adapter::PostgresRecordStore;

    let store = PostgresRecordStore::from_config(config)?;
    store.initialize_schema()?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(_config: &dyn ConfigPort) -> Result<Box<dyn RecordStore>, VatraderError> {
    Err(backend_unavailable("postgres"))
}

#[allow(dead_code)]
fn backend_unavailable(feature: &str) -> VatraderError {
    VatraderError::ConfigInvalid {
        section: "database".into(),
        key: "backend".into(),
        reason: format!("{feature} feature is required for this backend"),
    }
}

/// Resume the ledger for `symbol` from `store` and replay every bar `source`
/// has for it.
pub fn run_simulation(
    store: &dyn RecordStore,
    source: &dyn BarSource,
    symbol: &str,
    config: StrategyConfig,
) -> Result<FeedSummary, VatraderError> {
    let asset = AssetId::from_symbol(symbol)?;
    let bars = source.fetch_bars(symbol)?;
    if bars.is_empty() {
        return Err(VatraderError::Feed {
            reason: format!("no bars for {symbol}"),
        });
    }

    let mut engine = ValueAveraging::resume(asset, config, store)?;
    tracing::info!(
        asset = %engine.asset(),
        interval = engine.interval(),
        bars = bars.len(),
        "starting replay"
    );
    replay(&mut engine, bars)
}

fn run_simulate(
    config_path: &PathBuf,
    symbol_override: Option<&str>,
    bars_override: Option<PathBuf>,
) -> ExitCode {
    // Stage 1: Load and validate config
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let strategy = match build_strategy_config(&adapter) {
        Ok(s) => s,
        Err(e) => return report(&e),
    };
    let symbol = match resolve_symbol(symbol_override, &adapter) {
        Ok(s) => s,
        Err(e) => return report(&e),
    };

    // Stage 2: Resolve bar source
    let bars_path = match bars_override
        .or_else(|| adapter.get_string("feed", "path").map(PathBuf::from))
    {
        Some(p) => p,
        None => {
            return report(&VatraderError::ConfigMissing {
                section: "feed".into(),
                key: "path".into(),
            })
        }
    };
    let source = CsvBarSource::new(bars_path);

    // Stage 3: Open store and replay
    let store = match open_record_store(&adapter) {
        Ok(s) => s,
        Err(e) => return report(&e),
    };

    eprintln!(
        "Simulating {} with principal {} at {} ({}x per year)",
        symbol, strategy.principal_amount, strategy.interest_rate, strategy.frequency
    );

    let summary = match run_simulation(store.as_ref(), &source, &symbol, strategy) {
        Ok(s) => s,
        Err(e) => return report(&e),
    };

    // Stage 4: Print summary
    println!(
        "{:>8}  {:<25}  {:>14}  {:>12}  {:>12}  {:>12}  {:>14}  {:>14}",
        "interval", "date", "price", "target", "value", "trade", "order_size", "total_size"
    );
    for r in &summary.records {
        println!(
            "{:>8}  {:<25}  {:>14}  {:>12}  {:>12}  {:>12}  {:>14}  {:>14}",
            r.interval,
            r.date.to_rfc3339(),
            r.market_price,
            r.current_target,
            r.current_value,
            r.trade_amount,
            r.order_size,
            r.total_order_size,
        );
    }

    for s in &summary.skipped {
        eprintln!("warning: skipped bar {} ({})", s.index, s.reason);
    }
    eprintln!(
        "\n{} intervals recorded, {} bars skipped",
        summary.records.len(),
        summary.skipped.len()
    );
    if let Some(last) = summary.records.last() {
        eprintln!(
            "Position after interval {}: {} units, {} traded",
            last.interval, last.total_order_size, last.total_trade_amount
        );
    }

    ExitCode::SUCCESS
}

pub fn run_history(
    config_path: &PathBuf,
    symbol: Option<&str>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let store = match open_record_store(&adapter) {
        Ok(s) => s,
        Err(e) => return report(&e),
    };

    let Some(symbol) = symbol else {
        return match store.assets() {
            Ok(assets) if assets.is_empty() => {
                eprintln!("No ledgers recorded");
                ExitCode::SUCCESS
            }
            Ok(assets) => {
                for asset in &assets {
                    println!("{asset}");
                }
                eprintln!("{} ledgers found", assets.len());
                ExitCode::SUCCESS
            }
            Err(e) => report(&e),
        };
    };

    let records = match AssetId::from_symbol(symbol).and_then(|asset| store.history(&asset)) {
        Ok(r) => r,
        Err(e) => return report(&e),
    };
    if records.is_empty() {
        eprintln!("No records for {symbol}");
        return ExitCode::SUCCESS;
    }

    let written = match output_path {
        Some(path) => fs::File::create(path)
            .map_err(VatraderError::from)
            .and_then(|file| write_records(file, &records)),
        None => write_records(io::stdout().lock(), &records),
    };
    match written {
        Ok(()) => {
            if let Some(path) = output_path {
                eprintln!("{} records written to: {}", records.len(), path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => report(&e),
    }
}

pub fn run_target(
    principal: Decimal,
    rate: Decimal,
    frequency: u32,
    intervals: u32,
    quote_precision: u32,
) -> ExitCode {
    let written = write_schedule(
        io::stdout().lock(),
        principal,
        rate,
        frequency,
        intervals,
        quote_precision,
    );
    match written {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

/// Validate the schedule parameters and write the target table to `out`,
/// one row per interval as it is computed.
pub fn write_schedule<W: io::Write>(
    mut out: W,
    principal: Decimal,
    rate: Decimal,
    frequency: u32,
    intervals: u32,
    quote_precision: u32,
) -> Result<(), VatraderError> {
    StrategyConfig::new(principal, rate, frequency)
        .with_precision(DEFAULT_BASE_PRECISION, quote_precision)
        .validate()?;

    let principal = round(principal, quote_precision);
    writeln!(out, "{:>8}  {:>16}", "interval", "target")?;
    for row in schedule::schedule(intervals, principal, rate, frequency, quote_precision) {
        let (interval, target) = row?;
        writeln!(out, "{:>8}  {:>16}", interval, target)?;
    }
    out.flush()?;
    Ok(())
}

pub fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let strategy = match build_strategy_config(&adapter) {
        Ok(s) => s,
        Err(e) => return report(&e),
    };
    let asset = match resolve_symbol(None, &adapter).and_then(|s| AssetId::from_symbol(&s)) {
        Ok(a) => a,
        Err(e) => return report(&e),
    };

    eprintln!("\nStrategy:");
    eprintln!("  asset:             {}", asset);
    eprintln!("  exchange:          {}", strategy.exchange);
    eprintln!("  principal_amount:  {}", strategy.principal_amount);
    eprintln!("  interest_rate:     {}", strategy.interest_rate);
    eprintln!("  frequency:         {}", strategy.frequency);
    eprintln!("  base_precision:    {}", strategy.base_precision);
    eprintln!("  quote_precision:   {}", strategy.quote_precision);
    eprintln!("  starting_interval: {}", strategy.starting_interval);

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn report(err: &VatraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}
