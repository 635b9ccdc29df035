//! CLI definition and dispatch.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::bar::{Granularity, IndexName};
use crate::domain::config_validation::{
    data_source, parse_date, read_bool, read_inverse_pricing, read_number,
    validate_backtest_config, validate_data_config, validate_strategy_config,
};
use crate::domain::engine::{self, Ledger};
use crate::domain::error::KrxError;
use crate::domain::metrics::LedgerSummary;
use crate::domain::projection::{project, SortOrder};
use crate::domain::session::BacktestRequest;
use crate::domain::strategy::{StrategyConfig, TriggerRule};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "krx-rebalancer", about = "KRX index / inverse rebalancing backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest for one or more indices
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated index list, e.g. KOSPI,KOSDAQ
        #[arg(short, long)]
        index: Option<String>,
        /// D, W or M
        #[arg(short, long)]
        granularity: Option<String>,
        /// First date to include (YYYY-MM-DD)
        #[arg(short, long)]
        start: Option<String>,
        /// asc or desc
        #[arg(long)]
        order: Option<String>,
        /// Output file; a directory when several indices are given
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file without touching the data source
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show stored data range per index
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        index: Option<String>,
    },
}

/// Command-line values that take precedence over `[backtest]`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub index: Option<String>,
    pub granularity: Option<String>,
    pub start: Option<String>,
    pub order: Option<String>,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            index,
            granularity,
            start,
            order,
            output,
            dry_run,
        } => {
            let overrides = Overrides {
                index,
                granularity,
                start,
                order,
            };
            run_backtest(&config, &overrides, output.as_deref(), dry_run)
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, index } => run_info(&config, index.as_deref()),
    }
}

fn fail(err: KrxError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, KrxError> {
    FileConfigAdapter::from_file(path)
}

/// Load and validate every section a backtest reads.
pub fn load_validated(path: &Path) -> Result<FileConfigAdapter, KrxError> {
    let adapter = load_config(path)?;
    validate_backtest_config(&adapter)?;
    validate_strategy_config(&adapter)?;
    validate_data_config(&adapter)?;
    Ok(adapter)
}

pub fn build_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, KrxError> {
    let defaults = StrategyConfig::default();
    let num = |key: &str, default: f64| read_number(config, "strategy", key, default);

    let initial_entry_ratio = num("initial_entry_ratio", defaults.initial_entry_ratio)?;
    let mut strategy = StrategyConfig::new(
        num("initial_capital", defaults.initial_capital)?,
        initial_entry_ratio,
        num("main_buy_ratio", defaults.main_buy_ratio)?,
        num("main_sell_ratio", defaults.main_sell_ratio)?,
        num("inverse_buy_ratio", defaults.inverse_buy_ratio)?,
        num("inverse_sell_ratio", defaults.inverse_sell_ratio)?,
        num("buy_fee_rate", defaults.buy_fee_rate)?,
        num("sell_fee_rate", defaults.sell_fee_rate)?,
    )?;
    strategy.use_initial_entry =
        read_bool(config, "strategy", "use_initial_entry", initial_entry_ratio > 0.0)?;
    strategy.inverse_pricing = read_inverse_pricing(config)?;

    let trigger = match config
        .get_string("strategy", "trigger")
        .map(|t| t.trim().to_lowercase())
        .as_deref()
    {
        None | Some("price_move") => TriggerRule::PriceMove {
            threshold_pct: num("trigger_threshold", 0.0)?,
        },
        Some("drift") => TriggerRule::Drift {
            target_main_weight_pct: num("target_main_weight", 50.0)?,
            band_pct: num("drift_band", 5.0)?,
        },
        Some(other) => {
            return Err(KrxError::ConfigValue {
                section: "strategy".into(),
                key: "trigger".into(),
                reason: format!("unknown trigger '{other}'"),
            });
        }
    };
    strategy.with_trigger(trigger)
}

/// 1 January of `today`'s year.
pub fn default_start_date(today: NaiveDate) -> NaiveDate {
    today.with_ordinal(1).unwrap_or(today)
}

pub fn parse_indices(raw: &str) -> Result<Vec<IndexName>, KrxError> {
    let mut indices = Vec::new();
    for name in raw.split(',').filter(|s| !s.trim().is_empty()) {
        let index = name.parse::<IndexName>().map_err(|reason| KrxError::ConfigValue {
            section: "backtest".into(),
            key: "index".into(),
            reason,
        })?;
        if !indices.contains(&index) {
            indices.push(index);
        }
    }
    if indices.is_empty() {
        return Err(KrxError::ConfigValue {
            section: "backtest".into(),
            key: "index".into(),
            reason: "no index given".into(),
        });
    }
    Ok(indices)
}

/// One request per index, with command-line overrides applied.
pub fn build_requests(
    config: &dyn ConfigPort,
    overrides: &Overrides,
    today: NaiveDate,
) -> Result<Vec<BacktestRequest>, KrxError> {
    let setting = |cli: &Option<String>, key: &str| {
        cli.clone().or_else(|| config.get_string("backtest", key))
    };

    let indices = parse_indices(
        &setting(&overrides.index, "index").unwrap_or_else(|| IndexName::Kospi.to_string()),
    )?;

    let granularity = match setting(&overrides.granularity, "granularity") {
        Some(raw) => raw.parse::<Granularity>().map_err(|reason| KrxError::ConfigValue {
            section: "backtest".into(),
            key: "granularity".into(),
            reason,
        })?,
        None => Granularity::default(),
    };

    let start_date = match setting(&overrides.start, "start_date") {
        Some(raw) => parse_date(&raw, "backtest", "start_date")?,
        None => default_start_date(today),
    };

    let strategy = build_strategy_config(config)?;

    Ok(indices
        .into_iter()
        .map(|index| BacktestRequest {
            index,
            granularity,
            start_date,
            strategy: strategy.clone(),
        })
        .collect())
}

pub fn resolve_order(config: &dyn ConfigPort, cli: Option<&str>) -> Result<SortOrder, KrxError> {
    match cli
        .map(str::to_string)
        .or_else(|| config.get_string("backtest", "order"))
    {
        Some(raw) => raw.parse::<SortOrder>().map_err(|reason| KrxError::ConfigValue {
            section: "backtest".into(),
            key: "order".into(),
            reason,
        }),
        None => Ok(SortOrder::default()),
    }
}

/// `{INDEX}_result_data_{YYYYMMDD_HHMMSS}.csv`
pub fn default_output_name(index: IndexName, now: NaiveDateTime) -> String {
    format!("{}_result_data_{}.csv", index, now.format("%Y%m%d_%H%M%S"))
}

pub fn output_path(
    index: IndexName,
    output: Option<&Path>,
    multiple: bool,
    now: NaiveDateTime,
) -> PathBuf {
    match output {
        Some(dir) if multiple => dir.join(default_output_name(index, now)),
        Some(file) => file.to_path_buf(),
        None => PathBuf::from(default_output_name(index, now)),
    }
}

pub fn open_data_port(config: &dyn ConfigPort) -> Result<Box<dyn MarketDataPort>, KrxError> {
    match data_source(config).as_str() {
        #[cfg(feature = "postgres")]
        "postgres" => Ok(Box::new(
            crate::adapters::postgres_adapter::PostgresAdapter::from_config(config)?,
        )),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Box::new(
            crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?,
        )),
        "csv" => {
            let path = config
                .get_string("csv", "path")
                .ok_or_else(|| KrxError::ConfigMissing {
                    section: "csv".into(),
                    key: "path".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(path))))
        }
        other => Err(KrxError::ConfigValue {
            section: "data".into(),
            key: "source".into(),
            reason: format!("data source '{other}' is not enabled in this build"),
        }),
    }
}

/// Fetch every request's bars in turn, then replay them on scoped threads.
/// Results come back in request order.
pub fn run_requests(
    data_port: &dyn MarketDataPort,
    requests: &[BacktestRequest],
) -> Vec<Result<Ledger, KrxError>> {
    let inputs: Vec<_> = requests
        .iter()
        .map(|req| data_port.fetch(req.index, req.start_date, req.granularity))
        .collect();

    std::thread::scope(|scope| {
        let handles: Vec<_> = requests
            .iter()
            .zip(inputs)
            .map(|(req, bars)| {
                scope.spawn(move || bars.and_then(|bars| engine::run(&bars, &req.strategy)))
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    })
}

fn print_summary(request: &BacktestRequest, summary: &LedgerSummary) {
    eprintln!(
        "\n=== {} ({}, from {}) ===",
        request.index, request.granularity, request.start_date
    );
    eprintln!("Bars:             {}", summary.bars);
    eprintln!("Initial Capital:  {:.0}", summary.initial_capital);
    eprintln!("Final Value:      {:.0}", summary.final_value);
    eprintln!("Total Return:     {:.2}%", summary.total_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", summary.max_drawdown * 100.0);
    eprintln!("Trades:           {} buys, {} sells", summary.buys, summary.sells);
    eprintln!("Fees Paid:        {:.0}", summary.total_fees);
    if summary.clipped_trades > 0 || summary.skipped_trades > 0 {
        eprintln!(
            "Adjusted:         {} clipped, {} skipped",
            summary.clipped_trades, summary.skipped_trades
        );
    }
}

fn run_backtest(
    config_path: &Path,
    overrides: &Overrides,
    output: Option<&Path>,
    dry_run: bool,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_validated(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let now = Local::now().naive_local();
    let requests = match build_requests(&config, overrides, now.date()) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let order = match resolve_order(&config, overrides.order.as_deref()) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };

    if dry_run {
        for req in &requests {
            eprintln!(
                "  {} {} from {} ({:?})",
                req.index, req.granularity, req.start_date, req.strategy.trigger
            );
        }
        eprintln!("\nDry run complete: configuration is valid");
        return ExitCode::SUCCESS;
    }

    let data_port = match open_data_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    eprintln!("Running {} backtest(s)...", requests.len());
    let results = run_requests(data_port.as_ref(), &requests);

    let report = CsvReportAdapter::new();
    let multiple = requests.len() > 1;
    let mut status = ExitCode::SUCCESS;
    let mut failed = false;

    for (req, result) in requests.iter().zip(results) {
        let written = result.and_then(|ledger| {
            let summary = LedgerSummary::compute(&ledger)?;
            print_summary(req, &summary);

            let path = output_path(req.index, output, multiple, now);
            report.write(&project(&ledger, order), &path)?;
            eprintln!("Results written to: {}", path.display());
            Ok(())
        });

        if let Err(e) = written {
            eprintln!("error: {}: {e}", req.index);
            if !failed {
                status = (&e).into();
                failed = true;
            }
        }
    }
    status
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_validated(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let today = Local::now().date_naive();
    let requests = match build_requests(&config, &Overrides::default(), today) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    if let Some(first) = requests.first() {
        let s = &first.strategy;
        let names: Vec<&str> = requests.iter().map(|r| r.index.as_str()).collect();
        eprintln!("\nIndices:          {}", names.join(", "));
        eprintln!("Granularity:      {}", first.granularity);
        eprintln!("Start Date:       {}", first.start_date);
        eprintln!("Data Source:      {}", data_source(&config));
        eprintln!("Initial Capital:  {:.0}", s.initial_capital);
        eprintln!(
            "Initial Entry:    {}% ({})",
            s.initial_entry_ratio,
            if s.use_initial_entry { "on" } else { "off" }
        );
        eprintln!("Main Buy/Sell:    {}% / {}%", s.main_buy_ratio, s.main_sell_ratio);
        eprintln!("Inverse Buy/Sell: {}% / {}%", s.inverse_buy_ratio, s.inverse_sell_ratio);
        eprintln!("Fees Buy/Sell:    {}% / {}%", s.buy_fee_rate, s.sell_fee_rate);
        eprintln!("Trigger:          {:?}", s.trigger);
        eprintln!("Inverse Pricing:  {:?}", s.inverse_pricing);
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path, index: Option<&str>) -> ExitCode {
    let config = match load_config(config_path).and_then(|c| {
        validate_data_config(&c)?;
        Ok(c)
    }) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let indices = match index {
        Some(raw) => match parse_indices(raw) {
            Ok(i) => i,
            Err(e) => return fail(e),
        },
        None => IndexName::ALL.to_vec(),
    };

    let data_port = match open_data_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    for index in indices {
        match data_port.data_range(index) {
            Ok(Some((first, last, count))) => {
                println!("{}: {} bars, {} to {}", index, count, first, last);
            }
            Ok(None) => eprintln!("{}: no data found", index),
            Err(e) => eprintln!("error querying {}: {}", index, e),
        }
    }
    ExitCode::SUCCESS
}
