use async_trait::async_trait;
use market_snapshot::config::Config;
use market_snapshot::data_provider::MarketDataClient;
use market_snapshot::delivery::{ChatId, Delivery};
use market_snapshot::errors::{Result, SnapshotError};
use market_snapshot::models::ranking::{RankingLimits, VolumeMode};
use market_snapshot::models::ticker::SuffixPolicy;
use market_snapshot::providers::base::{Lookback, QuoteSource, RawChart};
use market_snapshot::render::chart::ChartRenderer;
use market_snapshot::services::commands::Command;
use market_snapshot::services::snapshot_service::{FailureKind, RequestStage, SnapshotService};
use market_snapshot::services::watchlist::WatchlistStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DAY: i64 = 86_400;
const T0: i64 = 1_729_080_000;

/// Serves fixed closes per symbol; unknown symbols are absent from the answer.
struct MemorySource {
    closes: HashMap<String, Vec<f64>>,
    delay: Option<Duration>,
    with_volumes: bool,
}

impl MemorySource {
    fn new(series: &[(&str, &[f64])]) -> Self {
        Self {
            closes: series.iter().map(|(s, c)| (s.to_string(), c.to_vec())).collect(),
            delay: None,
            with_volumes: true,
        }
    }

    fn without_volumes(mut self) -> Self {
        self.with_volumes = false;
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl QuoteSource for MemorySource {
    fn source_name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_history(&self, symbols: &[String], _lookback: &Lookback) -> Result<Vec<RawChart>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(symbols
            .iter()
            .filter_map(|symbol| {
                let closes = self.closes.get(symbol)?;
                Some(RawChart {
                    symbol: Some(symbol.clone()),
                    utc_offset_secs: 0,
                    timestamps: (0..closes.len() as i64).map(|i| T0 + i * DAY).collect(),
                    closes: closes.iter().copied().map(Some).collect(),
                    adj_closes: None,
                    volumes: if self.with_volumes {
                        closes.iter().map(|c| Some(c * 1_000.0)).collect()
                    } else {
                        Vec::new()
                    },
                })
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Text(String),
    Photo(String),
    Document(String),
}

#[derive(Default)]
struct RecordingDelivery {
    sent: Mutex<Vec<Sent>>,
    documents: Mutex<Vec<Vec<u8>>>,
    fail_files: bool,
}

impl RecordingDelivery {
    fn failing_files() -> Self {
        Self {
            fail_files: true,
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn files(&self) -> Vec<Sent> {
        self.sent().into_iter().filter(|s| !matches!(s, Sent::Text(_))).collect()
    }

    fn document_pages(&self) -> Vec<usize> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .map(|bytes| lopdf::Document::load_mem(bytes).unwrap().get_pages().len())
            .collect()
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn send_text(&self, _chat: &ChatId, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
        Ok(())
    }

    async fn send_photo(&self, _chat: &ChatId, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        assert!(!bytes.is_empty());
        if self.fail_files {
            return Err(SnapshotError::DeliveryError("upload rejected".to_string()));
        }
        self.sent.lock().unwrap().push(Sent::Photo(file_name.to_string()));
        Ok(())
    }

    async fn send_document(&self, _chat: &ChatId, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        assert!(bytes.starts_with(b"%PDF"));
        if self.fail_files {
            return Err(SnapshotError::DeliveryError("upload rejected".to_string()));
        }
        self.sent.lock().unwrap().push(Sent::Document(file_name.to_string()));
        self.documents.lock().unwrap().push(bytes);
        Ok(())
    }
}

fn work_dir() -> PathBuf {
    std::env::temp_dir().join(format!("market_snapshot_it_{}", uuid::Uuid::new_v4()))
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

fn config(symbols: &[&str], dir: &Path) -> Config {
    Config::new()
        .with_work_dir(dir)
        .with_suffix_policy(SuffixPolicy::disabled())
        .with_initial_tickers(symbols.iter().map(|s| s.to_string()).collect())
}

fn service_with(source: MemorySource, config: Config, timeout: Duration) -> SnapshotService {
    let watchlist =
        Arc::new(WatchlistStore::with_symbols(config.suffix_policy.clone(), &config.initial_tickers).unwrap());
    let market_data = MarketDataClient::new(Arc::new(source), timeout);
    SnapshotService::new(config, watchlist, market_data).with_chart_renderer(ChartRenderer::new(640, 320))
}

fn service(source: MemorySource, symbols: &[&str], dir: &Path, timeout: Duration) -> SnapshotService {
    service_with(source, config(symbols, dir), timeout)
}

fn chat() -> ChatId {
    ChatId("42".to_string())
}

#[tokio::test]
async fn end_to_end_report_delivers_and_cleans_up() {
    let dir = work_dir();
    let source = MemorySource::new(&[("AAA", &[100.0, 110.0]), ("BBB", &[50.0, 45.0])]);
    let service = service(source, &["AAA", "BBB"], &dir, Duration::from_secs(5));

    let rankings = service.returns_snapshot().await.unwrap();
    assert_eq!(rankings.gainers.len(), 1);
    assert_eq!(rankings.gainers[0].ticker.as_str(), "AAA");
    assert!((rankings.gainers[0].percent - 10.0).abs() < 1e-9);
    assert_eq!(rankings.losers.len(), 1);
    assert_eq!(rankings.losers[0].ticker.as_str(), "BBB");
    assert!((rankings.losers[0].percent + 10.0).abs() < 1e-9);

    let delivery = RecordingDelivery::default();
    let outcome = service.full_report(&chat(), &delivery).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.final_stage, RequestStage::Idle);
    assert_eq!(
        outcome.stages,
        vec![
            RequestStage::Idle,
            RequestStage::Fetching,
            RequestStage::Analyzing,
            RequestStage::Rendering,
            RequestStage::Composing,
            RequestStage::Delivering,
            RequestStage::CleaningUp,
            RequestStage::Idle,
        ]
    );
    assert!(outcome.absorbed.is_empty(), "{:?}", outcome.absorbed);
    assert_eq!(outcome.delivered, vec!["bar_chart.png", "financial_report.pdf"]);
    assert_eq!(
        delivery.files(),
        vec![
            Sent::Photo("bar_chart.png".to_string()),
            Sent::Document("financial_report.pdf".to_string()),
        ]
    );
    assert_eq!(delivery.document_pages(), vec![2]);
    assert_eq!(files_in(&dir), 0);
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn no_data_fails_without_artifacts() {
    let dir = work_dir();
    let service = service(MemorySource::new(&[]), &["AAA", "BBB"], &dir, Duration::from_secs(5));
    let delivery = RecordingDelivery::default();

    let outcome = service.full_report(&chat(), &delivery).await;

    assert_eq!(outcome.final_stage, RequestStage::Failed(FailureKind::NoData));
    assert_eq!(
        outcome.stages,
        vec![
            RequestStage::Idle,
            RequestStage::Fetching,
            RequestStage::CleaningUp,
            RequestStage::Failed(FailureKind::NoData),
        ]
    );
    assert!(!outcome.stages.contains(&RequestStage::Rendering));
    assert!(outcome.delivered.is_empty());
    assert_eq!(delivery.sent(), vec![Sent::Text("Could not retrieve market data.".to_string())]);
    assert_eq!(files_in(&dir), 0);
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn unrenderable_charts_are_left_out_of_the_report() {
    let dir = work_dir();
    // A zero first close cannot be normalized and there are no volumes.
    let source = MemorySource::new(&[("AAA", &[0.0, 100.0, 110.0])]).without_volumes();
    let service = service(source, &["AAA"], &dir, Duration::from_secs(5));
    let delivery = RecordingDelivery::default();

    let outcome = service.full_report(&chat(), &delivery).await;

    assert_eq!(outcome.final_stage, RequestStage::Idle);
    assert_eq!(outcome.absorbed.len(), 2, "{:?}", outcome.absorbed);
    assert!(outcome.absorbed[0].starts_with("volume_chart.png"));
    assert!(outcome.absorbed[1].starts_with("comparison_chart.png"));
    assert_eq!(
        delivery.files(),
        vec![
            Sent::Photo("bar_chart.png".to_string()),
            Sent::Document("financial_report.pdf".to_string()),
        ]
    );
    assert_eq!(delivery.document_pages(), vec![1]);
    assert_eq!(files_in(&dir), 0);
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn slow_provider_times_out() {
    let dir = work_dir();
    let source = MemorySource::new(&[("AAA", &[1.0, 2.0])]).slow(Duration::from_secs(5));
    let service = service(source, &["AAA"], &dir, Duration::from_millis(20));
    let delivery = RecordingDelivery::default();

    let outcome = service.full_report(&chat(), &delivery).await;

    assert_eq!(outcome.final_stage, RequestStage::Failed(FailureKind::Timeout));
    assert_eq!(files_in(&dir), 0);
    assert!(matches!(
        service.returns_snapshot().await,
        Err(SnapshotError::Timeout(_))
    ));
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn failed_delivery_still_cleans_up() {
    let dir = work_dir();
    let source = MemorySource::new(&[("AAA", &[100.0, 110.0]), ("BBB", &[50.0, 45.0])]);
    let service = service(source, &["AAA", "BBB"], &dir, Duration::from_secs(5));
    let delivery = RecordingDelivery::failing_files();

    let outcome = service.full_report(&chat(), &delivery).await;

    assert_eq!(outcome.final_stage, RequestStage::Idle);
    assert!(outcome.delivered.is_empty());
    assert!(outcome.absorbed.iter().any(|a| a.starts_with("financial_report.pdf")));
    assert_eq!(files_in(&dir), 0);
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn partial_provider_answer_ranks_resolved_tickers() {
    let dir = work_dir();
    let source = MemorySource::new(&[
        ("A", &[10.0, 11.0]),
        ("C", &[10.0, 9.0]),
        ("E", &[10.0, 10.5]),
    ]);
    let limits = RankingLimits { gainers: 10, losers: 10, top_performers: 2 };
    let config = config(&["A", "B", "C", "D", "E"], &dir).with_ranking_limits(limits);
    let service = service_with(source, config, Duration::from_secs(5));

    let rankings = service.returns_snapshot().await.unwrap();
    let top: Vec<&str> = rankings.top_performers.iter().map(|s| s.ticker.as_str()).collect();
    assert_eq!(top, vec!["A", "E"]);
    assert_eq!(rankings.gainers.len(), 2);
    assert_eq!(rankings.losers.len(), 1);

    let volumes = service.volume_snapshot(VolumeMode::Latest).await.unwrap();
    assert_eq!(volumes.len(), 3);
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn commands_update_the_shared_watchlist() {
    let dir = work_dir();
    let service = service(MemorySource::new(&[]), &["AAA"], &dir, Duration::from_secs(5));
    let delivery = RecordingDelivery::default();

    for text in ["/addticker bbb", "/addticker BBB", "/removeticker zzz", "/listtickers"] {
        let command = Command::parse(text).unwrap();
        service.handle(&command, &chat(), &delivery).await;
    }

    assert_eq!(
        delivery.sent(),
        vec![
            Sent::Text("Ticker BBB added.".to_string()),
            Sent::Text("Ticker BBB is already tracked.".to_string()),
            Sent::Text("Ticker ZZZ is not in the list.".to_string()),
            Sent::Text("Tracked tickers: AAA, BBB".to_string()),
        ]
    );
    assert_eq!(service.watchlist().len(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn report_rendering_leaves_the_runtime_responsive() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let dir = work_dir();
    let source = MemorySource::new(&[("AAA", &[100.0, 110.0]), ("BBB", &[50.0, 45.0])]);
    let service = service(source, &["AAA", "BBB"], &dir, Duration::from_secs(5));
    let delivery = RecordingDelivery::default();

    let polls = Arc::new(AtomicUsize::new(0));
    let counter = polls.clone();
    let background = tokio::spawn(async move {
        loop {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
        }
    });

    let outcome = service.full_report(&chat(), &delivery).await;
    background.abort();

    assert!(outcome.is_success());
    assert!(polls.load(Ordering::SeqCst) > 0);
    std::fs::remove_dir_all(&dir).ok();
}
