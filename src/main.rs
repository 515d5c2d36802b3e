use anyhow::{anyhow, Context};
use backtester::{BacktestReport, BacktestRequest, BacktestRunner, SyntheticHistory};
use chrono::{NaiveDate, NaiveTime, Weekday};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use configuration::{Config, LogFormat};
use core_types::{
    BotConfiguration, Clock, ParamValue, ParameterMap, RiskManagement, SystemClock, TradingSchedule,
};
use engine::{spawn_random_walk, BotSupervisor, ChannelFeed};
use events::EngineEvent;
use executor::SimulatedExecutor;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use strategies::StrategyCatalog;
use tokio::sync::{broadcast, watch};
use tracing::info;

/// The main entry point for the Botfleet trading bot engine.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file, if there is one.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    let mut config = configuration::load_config_from(&cli.config)?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    // The guard flushes the file writer on drop and must outlive the command.
    let _log_guard = configuration::init_tracing(&config.logging)?;

    // Execute the appropriate command
    match cli.command {
        Commands::Strategies => handle_strategies(),
        Commands::Backtest(args) => handle_backtest(args, config).await,
        Commands::Demo(args) => handle_demo(args, config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// An engine for supervising automated trading bots.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file stem or path.
    #[arg(long, global = true, default_value = "config")]
    config: String,

    /// Overrides the configured log format.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in strategy catalog.
    Strategies,
    /// Backtest a strategy against synthetic history.
    Backtest(BacktestArgs),
    /// Run the demo bots against a random-walk market for a while.
    Demo(DemoArgs),
}

#[derive(Parser)]
struct BacktestArgs {
    /// The catalog id of the strategy (e.g., "sma-crossover").
    #[arg(long)]
    strategy: String,

    /// The symbol to backtest (e.g., "EURUSD").
    #[arg(long)]
    symbol: String,

    /// The start date of the period (format: YYYY-MM-DD).
    #[arg(long)]
    from: NaiveDate,

    /// The end date of the period (format: YYYY-MM-DD).
    #[arg(long)]
    to: NaiveDate,

    /// Strategy parameter overrides as key=value; may be repeated.
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, ParamValue)>,

    /// Print the report as JSON instead of tables.
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct DemoArgs {
    /// How long to let the bots run.
    #[arg(long, default_value_t = 10)]
    seconds: u64,

    /// Stream engine events as JSON lines.
    #[arg(long)]
    json: bool,
}

/// `key=value`, where the value is read as a boolean, then a number, then text.
fn parse_param(raw: &str) -> Result<(String, ParamValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value = match value {
        "true" => ParamValue::Bool(true),
        "false" => ParamValue::Bool(false),
        other => match Decimal::from_str(other) {
            Ok(number) => ParamValue::Number(number),
            Err(_) => ParamValue::Text(other.to_string()),
        },
    };
    Ok((key.trim().to_string(), value))
}

// ==============================================================================
// Strategies Command Logic
// ==============================================================================

fn handle_strategies() -> anyhow::Result<()> {
    let catalog = StrategyCatalog::builtin();
    let mut table = Table::new();
    table.set_header(vec!["Id", "Name", "Category", "Risk", "Min balance", "Parameters"]);
    for definition in catalog.list() {
        let parameters = definition
            .parameters
            .iter()
            .map(|p| format!("{}={}", p.key, p.default))
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            definition.id.clone(),
            definition.name.clone(),
            definition.category.to_string(),
            definition.risk_level.to_string(),
            definition.min_balance.to_string(),
            parameters,
        ]);
    }
    println!("{table}");
    Ok(())
}

// ==============================================================================
// Backtest Command Logic
// ==============================================================================

async fn handle_backtest(args: BacktestArgs, config: Config) -> anyhow::Result<()> {
    let start = args.from.and_time(NaiveTime::MIN).and_utc();
    let end = args
        .to
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| anyhow!("invalid end date {}", args.to))?
        .and_utc();

    let runner = BacktestRunner::new(
        Arc::new(StrategyCatalog::builtin()),
        Arc::new(SyntheticHistory::new(&config.backtest)),
        config.backtest.clone(),
    )
    .with_progress(!args.json);

    let request = BacktestRequest {
        strategy_id: args.strategy,
        symbol: args.symbol,
        parameters: args.params.into_iter().collect(),
        start,
        end,
    };
    let report = runner.run(request).await.context("Backtest failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &BacktestReport) {
    let summary = &report.summary;
    let optional = |value: Option<Decimal>| value.map_or_else(|| "n/a".to_string(), |v| v.round_dp(4).to_string());

    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Strategy".to_string(), report.strategy_id.clone()]);
    table.add_row(vec!["Symbol".to_string(), report.symbol.clone()]);
    table.add_row(vec!["Period".to_string(), format!("{} .. {}", report.start, report.end)]);
    table.add_row(vec!["Total return %".to_string(), summary.total_return_pct.round_dp(4).to_string()]);
    table.add_row(vec!["Annualized return %".to_string(), optional(summary.annualized_return_pct)]);
    table.add_row(vec!["Sharpe ratio".to_string(), optional(summary.sharpe_ratio)]);
    table.add_row(vec!["Max drawdown %".to_string(), summary.max_drawdown_pct.round_dp(4).to_string()]);
    table.add_row(vec!["Win rate %".to_string(), summary.win_rate.round_dp(2).to_string()]);
    table.add_row(vec!["Trades".to_string(), summary.total_trades.to_string()]);
    table.add_row(vec!["Profit factor".to_string(), optional(summary.profit_factor)]);
    println!("{table}");

    let parameters = report
        .parameters
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");
    println!("Parameters: {parameters}");
}

// ==============================================================================
// Demo Command Logic
// ==============================================================================

async fn handle_demo(args: DemoArgs, config: Config) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let feed = Arc::new(ChannelFeed::new(config.engine.feed_buffer));
    let executor = Arc::new(SimulatedExecutor::new(config.simulation.clone(), clock.clone()));
    let supervisor = BotSupervisor::builder(
        config.engine.clone(),
        Arc::new(StrategyCatalog::builtin()),
        executor,
        feed.clone(),
    )
    .clock(clock.clone())
    .build();

    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    progress.enable_steady_tick(Duration::from_millis(100));

    let printer = tokio::spawn(print_events(supervisor.subscribe_events(), progress.clone(), args.json));

    let mut symbols = Vec::new();
    for configuration in demo_bots() {
        let symbol = configuration.symbol.clone();
        let bot = supervisor.create(configuration)?;
        supervisor.start(bot.id)?;
        if !symbols.iter().any(|(s, _)| *s == symbol) {
            let price = SyntheticHistory::reference_price(&symbol);
            symbols.push((symbol, price));
        }
    }

    let (stop_feed, feed_shutdown) = watch::channel(false);
    let walk = spawn_random_walk(
        feed.clone(),
        symbols,
        Duration::from_millis(200),
        config.backtest.volatility,
        clock,
        feed_shutdown,
    );

    info!(bots = supervisor.total_bots(), seconds = args.seconds, "Demo fleet started");
    progress.set_message(format!("Running {} bots for {}s", supervisor.total_bots(), args.seconds));
    tokio::time::sleep(Duration::from_secs(args.seconds)).await;

    progress.set_message("Stopping bots...");
    supervisor.shutdown().await;
    let _ = stop_feed.send(true);
    if let Err(e) = walk.await {
        eprintln!("Feed task failed: {e}");
    }
    printer.abort();
    progress.finish_and_clear();

    let mut table = Table::new();
    table.set_header(vec!["Bot", "Strategy", "Symbol", "Status", "Signals", "Trades", "Win rate %", "Net profit"]);
    for bot in supervisor.bots() {
        table.add_row(vec![
            bot.name().to_string(),
            bot.strategy_id().to_string(),
            bot.symbol().to_string(),
            bot.status.to_string(),
            supervisor.signals_for(bot.id).len().to_string(),
            bot.statistics.total_trades.to_string(),
            bot.statistics.win_rate.round_dp(2).to_string(),
            bot.statistics.net_profit.round_dp(4).to_string(),
        ]);
    }
    println!("{table}");
    println!("Total net profit: {}", supervisor.total_net_profit().round_dp(4));
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<EngineEvent>, progress: ProgressBar, json: bool) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let line = if json {
                    match event.to_json() {
                        Ok(line) => line,
                        Err(e) => format!("unserialisable event: {e}"),
                    }
                } else {
                    describe(&event)
                };
                progress.println(line);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                progress.println(format!("... {skipped} events skipped"));
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn describe(event: &EngineEvent) -> String {
    match event {
        EngineEvent::BotCreated { name, strategy_id, symbol, .. } => {
            format!("created   {name} ({strategy_id} on {symbol})")
        }
        EngineEvent::BotStatusChanged { bot_id, from, to, error_message } => match error_message {
            Some(message) => format!("status    {bot_id}: {from} -> {to} ({message})"),
            None => format!("status    {bot_id}: {from} -> {to}"),
        },
        EngineEvent::BotDeleted { bot_id } => format!("deleted   {bot_id}"),
        EngineEvent::SignalRecorded(signal) => format!(
            "signal    {} {} @ {} ({}%): {}",
            signal.kind, signal.symbol, signal.price, signal.confidence, signal.reason
        ),
        EngineEvent::SignalExecuted { signal_id, .. } => format!("executed  {signal_id}"),
        EngineEvent::TradeOpened { trade, .. } => format!(
            "opened    {:?} {} {} @ {}",
            trade.side, trade.quantity, trade.symbol, trade.entry_price
        ),
        EngineEvent::TradeClosed { trade, .. } => format!(
            "closed    {} @ {} profit {}",
            trade.symbol,
            trade.exit_price().unwrap_or_default(),
            trade.realized_profit().unwrap_or_default()
        ),
        EngineEvent::StatisticsUpdated { bot_id, statistics } => format!(
            "stats     {bot_id}: {} trades, net {}",
            statistics.total_trades, statistics.net_profit
        ),
    }
}

/// The bots the platform ships as examples.
fn demo_bots() -> Vec<BotConfiguration> {
    fn params(values: &[(&str, ParamValue)]) -> ParameterMap {
        values.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }
    let weekdays = vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri];
    let every_day = vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
    vec![
        BotConfiguration {
            strategy_id: "grid-trading".to_string(),
            name: "EUR/USD Grid Bot".to_string(),
            symbol: "EURUSD".to_string(),
            parameters: params(&[
                ("gridSpacing", ParamValue::from(dec!(0.001))),
                ("gridLevels", ParamValue::from(dec!(15))),
                ("positionSize", ParamValue::from(dec!(100))),
            ]),
            risk_management: RiskManagement {
                max_position_size: dec!(1000),
                stop_loss: Some(dec!(0.01)),
                take_profit: Some(dec!(0.02)),
                max_daily_loss: dec!(200),
                max_concurrent_trades: 10,
            },
            schedule: TradingSchedule {
                enabled: true,
                start_time: NaiveTime::from_hms_opt(9, 0, 0),
                end_time: NaiveTime::from_hms_opt(17, 0, 0),
                trading_days: weekdays,
            },
        },
        BotConfiguration {
            strategy_id: "dca-bot".to_string(),
            name: "BTC DCA Strategy".to_string(),
            symbol: "BTCUSD".to_string(),
            parameters: params(&[
                ("interval", ParamValue::from("daily")),
                ("amount", ParamValue::from(dec!(50))),
                ("priceDeviation", ParamValue::from(dec!(3))),
            ]),
            risk_management: RiskManagement {
                max_position_size: dec!(500),
                stop_loss: None,
                take_profit: None,
                max_daily_loss: dec!(100),
                max_concurrent_trades: 1,
            },
            schedule: TradingSchedule {
                enabled: true,
                start_time: None,
                end_time: None,
                trading_days: every_day,
            },
        },
        BotConfiguration {
            strategy_id: "sma-crossover".to_string(),
            name: "GBP/USD SMA Bot".to_string(),
            symbol: "GBPUSD".to_string(),
            parameters: params(&[
                ("fastPeriod", ParamValue::from(dec!(9))),
                ("slowPeriod", ParamValue::from(dec!(21))),
            ]),
            risk_management: RiskManagement {
                max_position_size: dec!(1000),
                stop_loss: None,
                take_profit: None,
                max_daily_loss: dec!(200),
                max_concurrent_trades: 1,
            },
            schedule: TradingSchedule::always(),
        },
    ]
}
