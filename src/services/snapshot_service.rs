use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::artifacts::ArtifactScope;
use crate::config::Config;
use crate::data_provider::MarketDataClient;
use crate::delivery::{ChatId, Delivery};
use crate::errors::{Result, SnapshotError};
use crate::models::ranking::{Rankings, VolumeMode, VolumeSummary};
use crate::models::series::{MarketSnapshot, TickerHistory};
use crate::providers::base::Lookback;
use crate::render::chart::{ChartRenderer, LineChartLabels, Metric};
use crate::render::pdf::{RankedTable, ReportComposer, ReportSection};
use crate::services::analytics;
use crate::services::commands::Command;
use crate::services::messages;
use crate::services::watchlist::WatchlistStore;

const BAR_CHART: &str = "bar_chart.png";
const PRICE_CHART: &str = "price_chart.png";
const VOLUME_CHART: &str = "volume_chart.png";
const COMPARISON_CHART: &str = "comparison_chart.png";
const REPORT_PDF: &str = "financial_report.pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NoData,
    Timeout,
    Internal,
}

impl FailureKind {
    fn from_error(e: &SnapshotError) -> Self {
        match e {
            SnapshotError::Timeout(_) => FailureKind::Timeout,
            SnapshotError::IoError(_) => FailureKind::Internal,
            _ => FailureKind::NoData,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Idle,
    Fetching,
    Analyzing,
    Rendering,
    Composing,
    Delivering,
    CleaningUp,
    Failed(FailureKind),
}

/// What happened to one report request.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub request_id: Uuid,
    /// Every stage entered, in order.
    pub stages: Vec<RequestStage>,
    /// `Idle` after a completed request, `Failed(_)` after an early abort.
    pub final_stage: RequestStage,
    /// File names handed to the delivery collaborator, in delivery order.
    pub delivered: Vec<String>,
    /// Per-artifact failures that were absorbed instead of aborting.
    pub absorbed: Vec<String>,
}

impl ReportOutcome {
    pub fn is_success(&self) -> bool {
        self.final_stage == RequestStage::Idle
    }
}

struct RequestTrace {
    request_id: Uuid,
    stages: Vec<RequestStage>,
}

impl RequestTrace {
    fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            stages: vec![RequestStage::Idle],
        }
    }

    fn enter(&mut self, stage: RequestStage) {
        info!("Request {}: {:?}", self.request_id, stage);
        self.stages.push(stage);
    }
}

/// A rendered artifact kept in memory for delivery and on disk for composition.
struct Rendered {
    name: &'static str,
    bytes: Vec<u8>,
}

/// Renders the four report charts; each entry fails or succeeds on its own.
fn render_charts(
    renderer: &ChartRenderer,
    rankings: &Rankings,
    histories: &[TickerHistory],
) -> Vec<(&'static str, Result<Vec<u8>>)> {
    vec![
        (BAR_CHART, renderer.render_ranked_bar_chart(&rankings.gainers, &rankings.losers)),
        (
            PRICE_CHART,
            renderer.render_time_series_line_chart(
                histories,
                Metric::AdjustedClose,
                &LineChartLabels::new("Stock price evolution", "Adjusted close"),
            ),
        ),
        (
            VOLUME_CHART,
            renderer.render_time_series_line_chart(
                histories,
                Metric::Volume,
                &LineChartLabels::new("Traded volume", "Volume"),
            ),
        ),
        (
            COMPARISON_CHART,
            renderer.render_time_series_line_chart(
                histories,
                Metric::NormalizedClose,
                &LineChartLabels::new("Asset comparison", "Normalized price"),
            ),
        ),
    ]
}

/// Runs snapshot requests one at a time against a shared watch-list.
pub struct SnapshotService {
    config: Config,
    watchlist: Arc<WatchlistStore>,
    market_data: MarketDataClient,
    charts: ChartRenderer,
    composer: ReportComposer,
    worker: Mutex<()>,
}

impl SnapshotService {
    pub fn new(config: Config, watchlist: Arc<WatchlistStore>, market_data: MarketDataClient) -> Self {
        Self {
            config,
            watchlist,
            market_data,
            charts: ChartRenderer::default(),
            composer: ReportComposer::default(),
            worker: Mutex::new(()),
        }
    }

    pub fn with_chart_renderer(mut self, charts: ChartRenderer) -> Self {
        self.charts = charts;
        self
    }

    pub fn watchlist(&self) -> &Arc<WatchlistStore> {
        &self.watchlist
    }

    fn returns_lookback(&self) -> Lookback {
        Lookback::new(&self.config.returns_range, &self.config.interval)
    }

    fn history_lookback(&self) -> Lookback {
        Lookback::new(&self.config.history_range, &self.config.interval)
    }

    async fn fetch(&self, lookback: &Lookback) -> Result<MarketSnapshot> {
        let tickers = self.watchlist.snapshot();
        self.market_data.fetch(&tickers, lookback).await
    }

    /// Ranked latest returns for the current watch-list.
    pub async fn returns_snapshot(&self) -> Result<Rankings> {
        let _worker = self.worker.lock().await;
        let snapshot = self.fetch(&self.returns_lookback()).await?;
        analytics::compute_returns(&snapshot, &self.config.ranking_limits)
    }

    /// Volume per ticker over the history window.
    pub async fn volume_snapshot(&self, mode: VolumeMode) -> Result<VolumeSummary> {
        let _worker = self.worker.lock().await;
        let snapshot = self.fetch(&self.history_lookback()).await?;
        let summary = analytics::compute_volume_summary(&snapshot, mode);
        if summary.is_empty() {
            return Err(SnapshotError::NoData);
        }
        Ok(summary)
    }

    /// Fetch, analyze, render, compose, deliver, and always clean up.
    pub async fn full_report(&self, chat: &ChatId, delivery: &(dyn Delivery + Send + Sync)) -> ReportOutcome {
        let _worker = self.worker.lock().await;

        let mut scope = match ArtifactScope::new(&self.config.work_dir) {
            Ok(scope) => scope,
            Err(e) => {
                error!("Cannot prepare work dir {}: {}", self.config.work_dir.display(), e);
                let mut trace = RequestTrace::new(Uuid::new_v4());
                trace.enter(RequestStage::Failed(FailureKind::Internal));
                return ReportOutcome {
                    request_id: trace.request_id,
                    stages: trace.stages,
                    final_stage: RequestStage::Failed(FailureKind::Internal),
                    delivered: Vec::new(),
                    absorbed: vec![e.to_string()],
                };
            }
        };

        let mut trace = RequestTrace::new(scope.request_id());
        let mut delivered = Vec::new();
        let mut absorbed = Vec::new();

        let result = self
            .run_report(chat, delivery, &mut scope, &mut trace, &mut delivered, &mut absorbed)
            .await;

        trace.enter(RequestStage::CleaningUp);
        scope.cleanup();

        let final_stage = match result {
            Ok(()) => RequestStage::Idle,
            Err(kind) => RequestStage::Failed(kind),
        };
        trace.enter(final_stage);

        ReportOutcome {
            request_id: trace.request_id,
            stages: trace.stages,
            final_stage,
            delivered,
            absorbed,
        }
    }

    async fn run_report(
        &self,
        chat: &ChatId,
        delivery: &(dyn Delivery + Send + Sync),
        scope: &mut ArtifactScope,
        trace: &mut RequestTrace,
        delivered: &mut Vec<String>,
        absorbed: &mut Vec<String>,
    ) -> std::result::Result<(), FailureKind> {
        trace.enter(RequestStage::Fetching);
        let snapshot = match self.fetch(&self.history_lookback()).await {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.abort(chat, delivery, trace, e).await),
        };

        trace.enter(RequestStage::Analyzing);
        let rankings = match analytics::compute_returns(&snapshot, &self.config.ranking_limits) {
            Ok(rankings) => rankings,
            Err(e) => return Err(self.abort(chat, delivery, trace, e).await),
        };

        trace.enter(RequestStage::Rendering);
        let renderer = self.charts.clone();
        let ranked = rankings.clone();
        let histories = snapshot.histories().to_vec();
        let rendering = tokio::task::spawn_blocking(move || render_charts(&renderer, &ranked, &histories));
        let attempts = match rendering.await {
            Ok(attempts) => attempts,
            Err(e) => {
                warn!("Request {}: chart rendering aborted: {}", trace.request_id, e);
                absorbed.push(format!("charts: {}", e));
                Vec::new()
            }
        };

        let mut charts: Vec<(Rendered, std::path::PathBuf)> = Vec::new();
        for (name, attempt) in attempts {
            match attempt.and_then(|bytes| scope.write(name, &bytes).map(|path| (bytes, path))) {
                Ok((bytes, path)) => charts.push((Rendered { name, bytes }, path)),
                Err(e) => {
                    warn!("Request {}: omitting {}: {}", trace.request_id, name, e);
                    absorbed.push(format!("{}: {}", name, e));
                }
            }
        }
        let chart_path = |name: &str| charts.iter().find(|(r, _)| r.name == name).map(|(_, p)| p.clone());

        trace.enter(RequestStage::Composing);
        let mut sections = Vec::new();
        for (name, title) in [(BAR_CHART, "Top gainers and losers"), (PRICE_CHART, "Stock price evolution")] {
            if let Some(path) = chart_path(name) {
                sections.push(ReportSection::new(title).with_image(path));
            }
        }
        sections.push(
            ReportSection::new(format!("Top {} performers", self.config.ranking_limits.top_performers))
                .with_table(RankedTable::from_ranked(&rankings.top_performers)),
        );
        let mut page_two = true;
        for (name, title) in [(VOLUME_CHART, "Traded volume"), (COMPARISON_CHART, "Asset comparison")] {
            if let Some(path) = chart_path(name) {
                let mut section = ReportSection::new(title).with_image(path);
                if page_two {
                    section = section.on_new_page();
                    page_two = false;
                }
                sections.push(section);
            }
        }

        let composer = self.composer.clone();
        let composed = tokio::task::spawn_blocking(move || composer.compose(&sections))
            .await
            .unwrap_or_else(|e| Err(SnapshotError::ComposeError(e.to_string())));
        let document = match composed.and_then(|bytes| scope.write(REPORT_PDF, &bytes).map(|_| bytes)) {
            Ok(bytes) => Some(Rendered { name: REPORT_PDF, bytes }),
            Err(e) => {
                warn!("Request {}: report document omitted: {}", trace.request_id, e);
                absorbed.push(format!("{}: {}", REPORT_PDF, e));
                None
            }
        };

        trace.enter(RequestStage::Delivering);
        if let Some((bar, _)) = charts.into_iter().find(|(r, _)| r.name == BAR_CHART) {
            match delivery.send_photo(chat, bar.name, bar.bytes).await {
                Ok(()) => delivered.push(bar.name.to_string()),
                Err(e) => {
                    error!("Request {}: delivering {} failed: {}", trace.request_id, bar.name, e);
                    absorbed.push(format!("{}: {}", bar.name, e));
                }
            }
        }
        if let Some(doc) = document {
            match delivery.send_document(chat, doc.name, doc.bytes).await {
                Ok(()) => delivered.push(doc.name.to_string()),
                Err(e) => {
                    error!("Request {}: delivering {} failed: {}", trace.request_id, doc.name, e);
                    absorbed.push(format!("{}: {}", doc.name, e));
                }
            }
        }

        Ok(())
    }

    /// Reports an early failure to the requester and maps it to a terminal kind.
    async fn abort(
        &self,
        chat: &ChatId,
        delivery: &(dyn Delivery + Send + Sync),
        trace: &mut RequestTrace,
        e: SnapshotError,
    ) -> FailureKind {
        let kind = FailureKind::from_error(&e);
        error!("Request {} aborted: {}", trace.request_id, e);
        if let Err(send_err) = delivery.send_text(chat, e.user_message()).await {
            error!("Request {}: could not report failure: {}", trace.request_id, send_err);
        }
        kind
    }

    /// Executes one front-end command and replies through `delivery`.
    pub async fn handle(&self, command: &Command, chat: &ChatId, delivery: &(dyn Delivery + Send + Sync)) {
        let reply = match command {
            Command::Start => messages::HELP_TEXT.to_string(),
            Command::Returns => match self.returns_snapshot().await {
                Ok(rankings) => messages::format_returns_message(&rankings),
                Err(e) => {
                    error!("Returns snapshot failed: {}", e);
                    e.user_message().to_string()
                }
            },
            Command::Volume => match self.volume_snapshot(VolumeMode::Latest).await {
                Ok(summary) => messages::format_volume_message(&summary),
                Err(e) => {
                    error!("Volume snapshot failed: {}", e);
                    e.user_message().to_string()
                }
            },
            Command::Report => {
                if let Err(e) = delivery.send_text(chat, "Generating report...").await {
                    warn!("Could not acknowledge report request: {}", e);
                }
                let outcome = self.full_report(chat, delivery).await;
                info!(
                    "Report {} finished as {:?}; delivered {:?}",
                    outcome.request_id, outcome.final_stage, outcome.delivered
                );
                return;
            }
            Command::AddTicker(None) => "Usage: /addticker <TICKER>".to_string(),
            Command::RemoveTicker(None) => "Usage: /removeticker <TICKER>".to_string(),
            Command::AddTicker(Some(symbol)) => match self.watchlist.add(symbol) {
                Ok(outcome) => messages::format_add_outcome(&outcome),
                Err(e) => e.user_message().to_string(),
            },
            Command::RemoveTicker(Some(symbol)) => match self.watchlist.remove(symbol) {
                Ok(outcome) => messages::format_remove_outcome(&outcome),
                Err(e) => e.user_message().to_string(),
            },
            Command::ListTickers => messages::format_watchlist(&self.watchlist.list()),
        };

        if let Err(e) = delivery.send_text(chat, &reply).await {
            error!("Reply to chat {} failed: {}", chat, e);
        }
    }
}
