//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::codegen::generate;
use crate::domain::config_validation::{self, build_settings, RunSettings};
use crate::domain::engine::{self, BacktestReport, BacktestRequest, EngineSettings, IntentSummary};
use crate::domain::error::{EngineError, RejectReason};
use crate::domain::interpreter::interpret;
use crate::domain::sandbox;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "stratsim", about = "Natural-language strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest a plain-English strategy against one symbol
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy description, e.g. "Buy when RSI below 30, sell when RSI above 70"
        #[arg(short, long)]
        strategy: String,
        #[arg(long, default_value = "swing")]
        category: String,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
        #[arg(long)]
        initial_capital: Option<f64>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Print the full report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Show how a strategy description is understood and the rules it generates
    Interpret {
        text: String,
        #[arg(long, default_value = "swing")]
        category: String,
    },
    /// Compile a rule source file and report where it is rejected
    Check { file: PathBuf },
    /// List symbols available in the data directory
    Symbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Flags that replace values read from the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub symbol: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub initial_capital: Option<f64>,
    pub data_dir: Option<PathBuf>,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            category,
            symbol,
            start_date,
            end_date,
            initial_capital,
            data_dir,
            json,
        } => {
            let overrides = Overrides {
                symbol,
                start_date,
                end_date,
                initial_capital,
                data_dir,
            };
            run_backtest(&config, &strategy, &category, &overrides, json)
        }
        Command::Interpret { text, category } => run_interpret(&text, &category),
        Command::Symbols { config } => run_symbols(&config),
        Command::Check { file } => run_check(&file),
    }
}

fn report_error(err: &EngineError) -> ExitCode {
    match err {
        EngineError::ClarificationNeeded { clarifications } => {
            eprintln!("The strategy needs more detail:");
            for prompt in clarifications {
                eprintln!("  - {prompt}");
            }
        }
        _ => eprintln!("error: {err}"),
    }
    err.into()
}

/// Describe a sandbox rejection. Parse failures quote the offending line.
pub fn rejection_message(reason: &RejectReason, source: &str) -> String {
    match reason {
        RejectReason::Parse(e) => e.display_with_context(source),
        other => other.to_string(),
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

pub fn load_config(path: &Path, overrides: &Overrides) -> Result<FileConfigAdapter, EngineError> {
    let mut adapter = FileConfigAdapter::from_file(path)?;
    if let Some(symbol) = &overrides.symbol {
        adapter.set(config_validation::BACKTEST, "symbol", symbol.as_str());
    }
    if let Some(start) = &overrides.start_date {
        adapter.set(config_validation::BACKTEST, "start_date", start.as_str());
    }
    if let Some(end) = &overrides.end_date {
        adapter.set(config_validation::BACKTEST, "end_date", end.as_str());
    }
    if let Some(capital) = overrides.initial_capital {
        adapter.set(config_validation::BACKTEST, "initial_capital", capital.to_string());
    }
    if let Some(dir) = &overrides.data_dir {
        adapter.set(config_validation::BACKTEST, "data_dir", dir.display().to_string());
    }
    Ok(adapter)
}

fn run_backtest(
    config_path: &Path,
    strategy_text: &str,
    category: &str,
    overrides: &Overrides,
    json: bool,
) -> ExitCode {
    let adapter = match load_config(config_path, overrides) {
        Ok(a) => a,
        Err(e) => return report_error(&e),
    };
    init_logging(&config_validation::log_level(&adapter));

    let settings = match build_settings(&adapter) {
        Ok(s) => s,
        Err(e) => return report_error(&e),
    };

    let data = CsvAdapter::new(settings.data_dir.clone());
    let cancel = AtomicBool::new(false);
    match run_pipeline(&data, strategy_text, category, &settings, &cancel) {
        Ok(report) => {
            if json {
                match serde_json::to_string_pretty(&report) {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        eprintln!("error: failed to serialize report: {e}");
                        return ExitCode::from(1);
                    }
                }
            } else {
                print_summary(&report);
            }
            ExitCode::SUCCESS
        }
        Err(e) => report_error(&e),
    }
}

pub fn run_pipeline(
    data: &dyn DataPort,
    strategy_text: &str,
    category: &str,
    settings: &RunSettings,
    cancel: &AtomicBool,
) -> Result<BacktestReport, EngineError> {
    let request = BacktestRequest {
        strategy_text: strategy_text.to_string(),
        category: category.to_string(),
        symbol: settings.symbol.clone(),
        start_date: settings.start_date,
        end_date: settings.end_date,
        initial_capital: settings.initial_capital,
    };
    let engine_settings = EngineSettings {
        commission_per_trade: settings.commission_per_trade,
        call_budget: settings.call_budget,
    };
    engine::run(data, &request, &engine_settings, cancel)
}

fn print_summary(report: &BacktestReport) {
    let m = &report.metrics;
    eprintln!(
        "Backtest: {} ({}), {} to {}, {} bars",
        report.symbol, report.category, report.start_date, report.end_date, report.bars
    );
    print_intent(&report.intent);

    eprintln!("\n=== Results ===");
    eprintln!("Initial Capital:  ${:.2}", report.initial_capital);
    eprintln!("Final Equity:     ${:.2}", m.final_equity);
    eprintln!("Total Return:     {:.2}%", m.total_return);
    eprintln!("Annualized:       {:.2}%", m.annualized_return);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    eprintln!("Max Drawdown:     {:.1}%", m.max_drawdown);
    eprintln!("Total Trades:     {}", m.total_trades);
    eprintln!("Win Rate:         {:.1}%", m.win_rate);
    eprintln!("Profit Factor:    {:.2}", m.profit_factor);
    eprintln!("p-value:          {:.4}", m.p_value);
    eprintln!("Score:            {:.1} ({})", m.composite_score, m.quality_grade);

    if !report.trades.is_empty() {
        eprintln!("\n=== Trades ===");
        for t in &report.trades {
            let sign = if t.profit >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {} -> {}  {:.2} -> {:.2}  {}{:.2}%  {}${:.0}  ({:?})",
                t.entry_date,
                t.exit_date,
                t.entry_price,
                t.exit_price,
                sign,
                t.return_pct,
                sign,
                t.profit,
                t.exit_reason,
            );
        }
    }

    if report.evaluation_failures > 0 {
        eprintln!("\nwarning: {} condition evaluations failed and were treated as no signal", report.evaluation_failures);
    }
    if report.cancelled {
        eprintln!("\nwarning: run was cancelled before the end of data");
    }
}

fn print_intent(intent: &IntentSummary) {
    eprintln!("Indicators: {}", intent.indicators.join(", "));
    for phrase in &intent.entry_conditions {
        eprintln!("  entry: {phrase}");
    }
    for phrase in &intent.exit_conditions {
        eprintln!("  exit:  {phrase}");
    }
    if let Some(sl) = intent.stop_loss_pct {
        eprintln!("  stop loss:   {sl}%");
    }
    if let Some(tp) = intent.take_profit_pct {
        eprintln!("  take profit: {tp}%");
    }
}

fn run_interpret(text: &str, category: &str) -> ExitCode {
    init_logging("warn");
    let intent = interpret(text, category);
    match generate(&intent) {
        Ok(source) => {
            print_intent(&IntentSummary::from(&intent));
            println!("{source}");
            ExitCode::SUCCESS
        }
        Err(e) => report_error(&e),
    }
}

fn run_check(path: &Path) -> ExitCode {
    init_logging("warn");
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => return report_error(&EngineError::Io(e)),
    };
    match sandbox::compile(&source) {
        Ok(rules) => {
            println!("entry_condition = {}", rules.entry_rule());
            println!("exit_condition = {}", rules.exit_rule());
            println!("warmup: {} bars", rules.warmup());
            ExitCode::SUCCESS
        }
        Err(reason) => {
            eprintln!("error: generated rules rejected:");
            eprintln!("{}", rejection_message(&reason, &source));
            (&EngineError::from(reason)).into()
        }
    }
}

fn run_symbols(config_path: &Path) -> ExitCode {
    let adapter = match FileConfigAdapter::from_file(config_path) {
        Ok(a) => a,
        Err(e) => return report_error(&e),
    };
    init_logging(&config_validation::log_level(&adapter));

    let dir = adapter.get_string_or(
        config_validation::BACKTEST,
        "data_dir",
        config_validation::DEFAULT_DATA_DIR,
    );
    match CsvAdapter::new(PathBuf::from(dir)).list_symbols() {
        Ok(symbols) => {
            for symbol in symbols {
                println!("{symbol}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => report_error(&e),
    }
}
