use market_snapshot::config::Config;
use market_snapshot::data_provider::MarketDataClient;
use market_snapshot::delivery::outbox::OutboxDelivery;
use market_snapshot::delivery::telegram::TelegramDelivery;
use market_snapshot::delivery::{ChatId, Delivery};
use market_snapshot::models::ranking::VolumeMode;
use market_snapshot::providers::yahoo::YahooChartSource;
use market_snapshot::services::commands::Command;
use market_snapshot::services::market_close::{watch_market_close, MarketCloseSchedule};
use market_snapshot::services::messages;
use market_snapshot::services::snapshot_service::SnapshotService;
use market_snapshot::services::watchlist::WatchlistStore;

use anyhow::Context;
use clap::{App, Arg, ArgMatches, SubCommand};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

fn build_app() -> App<'static> {
    App::new("MarketSnapshot")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Watch-list market snapshots delivered over chat")
        .arg(
            Arg::with_name("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("work-dir")
                .long("work-dir")
                .value_name("DIR")
                .help("Directory for temporary report artifacts")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("chat-id")
                .long("chat-id")
                .value_name("CHAT_ID")
                .help("Chat that receives replies")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("telegram-token")
                .long("telegram-token")
                .value_name("TOKEN")
                .help("Telegram bot token (defaults to TELEGRAM_BOT_TOKEN)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("outbox")
                .long("outbox")
                .value_name("DIR")
                .help("Directory that receives replies when no bot token is set")
                .takes_value(true)
                .default_value("outbox"),
        )
        .subcommand(SubCommand::with_name("snapshot").about("Ranked latest returns (/dados)"))
        .subcommand(
            SubCommand::with_name("volume")
                .about("Traded volume per ticker (/volume)")
                .arg(
                    Arg::with_name("mean")
                        .long("mean")
                        .help("Average volume over the history window instead of the latest day")
                        .takes_value(false),
                ),
        )
        .subcommand(SubCommand::with_name("report").about("Charts and PDF report (/relatorio)"))
        .subcommand(
            SubCommand::with_name("add-ticker")
                .about("Track a ticker for this run")
                .arg(Arg::with_name("ticker").required(true).takes_value(true)),
        )
        .subcommand(
            SubCommand::with_name("remove-ticker")
                .about("Stop tracking a ticker for this run")
                .arg(Arg::with_name("ticker").required(true).takes_value(true)),
        )
        .subcommand(SubCommand::with_name("list-tickers").about("Show tracked tickers"))
        .subcommand(
            SubCommand::with_name("watch")
                .about("Notify the chat when the market closes")
                .arg(
                    Arg::with_name("commands")
                        .long("commands")
                        .help("Also answer chat commands read from stdin, one per line")
                        .takes_value(false),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<Config> {
    let mut config = match matches.value_of("config") {
        Some(path) => Config::from_file(path).with_context(|| format!("loading config {}", path))?,
        None => Config::new(),
    };
    if let Some(dir) = matches.value_of("work-dir") {
        config = config.with_work_dir(dir);
    }
    let token = matches
        .value_of("telegram-token")
        .map(str::to_string)
        .or_else(|| std::env::var("TELEGRAM_BOT_TOKEN").ok());
    Ok(config
        .with_telegram_token(token)
        .with_chat_id(matches.value_of("chat-id").map(str::to_string)))
}

fn build_delivery(config: &Config, outbox: &str) -> anyhow::Result<Arc<dyn Delivery + Send + Sync>> {
    match &config.telegram_token {
        Some(token) => {
            info!("Delivering through Telegram");
            Ok(Arc::new(TelegramDelivery::new(token.clone())?))
        }
        None => {
            info!("No bot token set, delivering into {}", outbox);
            Ok(Arc::new(
                OutboxDelivery::new(outbox).with_context(|| format!("creating outbox {}", outbox))?,
            ))
        }
    }
}

async fn answer_stdin_commands(service: Arc<SnapshotService>, delivery: Arc<dyn Delivery + Send + Sync>, chat: ChatId) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match Command::parse(&line) {
                Some(command) => service.handle(&command, &chat, delivery.as_ref()).await,
                None => warn!("Ignoring input: {}", line.trim()),
            },
            Ok(None) => break,
            Err(e) => {
                error!("Reading commands failed: {}", e);
                break;
            }
        }
    }
    info!("Command input closed");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = build_app().get_matches();
    let config = load_config(&matches)?;
    let delivery = build_delivery(&config, matches.value_of("outbox").unwrap_or("outbox"))?;
    let chat = ChatId(config.chat_id.clone().unwrap_or_else(|| "local".to_string()));

    let watchlist = Arc::new(
        WatchlistStore::with_symbols(config.suffix_policy.clone(), &config.initial_tickers)
            .context("initial watch-list")?,
    );
    let source = Arc::new(YahooChartSource::new(config.fetch_timeout())?);
    let market_data = MarketDataClient::new(source, config.fetch_timeout());
    let service = Arc::new(SnapshotService::new(config.clone(), watchlist, market_data));

    match matches.subcommand() {
        Some(("snapshot", _)) => service.handle(&Command::Returns, &chat, delivery.as_ref()).await,
        Some(("volume", sub)) if sub.is_present("mean") => {
            let reply = match service.volume_snapshot(VolumeMode::Mean).await {
                Ok(summary) => messages::format_volume_message(&summary),
                Err(e) => {
                    error!("Volume snapshot failed: {}", e);
                    e.user_message().to_string()
                }
            };
            delivery.send_text(&chat, &reply).await?;
        }
        Some(("volume", _)) => service.handle(&Command::Volume, &chat, delivery.as_ref()).await,
        Some(("report", _)) => service.handle(&Command::Report, &chat, delivery.as_ref()).await,
        Some(("add-ticker", sub)) => {
            let ticker = sub.value_of("ticker").map(str::to_string);
            service.handle(&Command::AddTicker(ticker), &chat, delivery.as_ref()).await;
            service.handle(&Command::ListTickers, &chat, delivery.as_ref()).await;
        }
        Some(("remove-ticker", sub)) => {
            let ticker = sub.value_of("ticker").map(str::to_string);
            service.handle(&Command::RemoveTicker(ticker), &chat, delivery.as_ref()).await;
            service.handle(&Command::ListTickers, &chat, delivery.as_ref()).await;
        }
        Some(("list-tickers", _)) => service.handle(&Command::ListTickers, &chat, delivery.as_ref()).await,
        Some(("watch", sub)) => {
            let schedule = MarketCloseSchedule::from_config(&config);
            let poll = Duration::from_secs(config.poll_interval_secs.max(1));
            let watcher = tokio::spawn(watch_market_close(schedule, delivery.clone(), chat.clone(), poll));

            if sub.is_present("commands") {
                tokio::spawn(answer_stdin_commands(service.clone(), delivery.clone(), chat.clone()));
            }

            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            info!("Shutting down");
            watcher.abort();
        }
        _ => info!("No command specified. Use --help for usage information."),
    }

    Ok(())
}
