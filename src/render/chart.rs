use chrono::{Duration, NaiveDate};
use log::debug;
use plotters::prelude::*;
use std::io::Cursor;

use crate::errors::{Result, SnapshotError};
use crate::models::ranking::RankedList;
use crate::models::series::TickerHistory;
use crate::util::format_percent;

const UP_COLOR: RGBColor = RGBColor(46, 139, 87);
const DOWN_COLOR: RGBColor = RGBColor(200, 50, 50);
const FONT: &str = "sans-serif";

/// Value plotted per ticker on a time-series chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    AdjustedClose,
    Volume,
    /// Close divided by the first close of the window, so every line starts at 1.0.
    NormalizedClose,
}

#[derive(Debug, Clone)]
pub struct LineChartLabels {
    pub title: String,
    pub y_label: String,
}

impl LineChartLabels {
    pub fn new(title: impl Into<String>, y_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            y_label: y_label.into(),
        }
    }
}

/// One bar of the ranked chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
}

/// Bars in drawing order: gainers first, then losers, each in its ranked order.
pub fn ranked_bars(gainers: &RankedList, losers: &RankedList) -> Vec<Bar> {
    gainers
        .iter()
        .chain(losers.iter())
        .map(|s| Bar {
            label: s.ticker.to_string(),
            value: s.percent,
        })
        .collect()
}

/// `(date, value)` pairs for `metric`. Empty when the ticker has nothing to plot.
pub fn select_points(history: &TickerHistory, metric: Metric) -> Vec<(NaiveDate, f64)> {
    match metric {
        Metric::AdjustedClose => history.prices.iter().map(|p| (p.date, p.close)).collect(),
        Metric::Volume => history.volumes.iter().map(|v| (v.date, v.volume)).collect(),
        Metric::NormalizedClose => match history.prices.first() {
            Some(first) if first.close != 0.0 => history
                .prices
                .iter()
                .map(|p| (p.date, p.close / first.close))
                .collect(),
            _ => Vec::new(),
        },
    }
}

/// Axis bounds covering every value, padded by 10% of the span.
fn padded_range<I: IntoIterator<Item = f64>>(values: I, include_zero: bool) -> (f64, f64) {
    let (mut lo, mut hi) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    let pad = if hi > lo { (hi - lo) * 0.1 } else { hi.abs().max(1.0) * 0.1 };
    (lo - pad, hi + pad)
}

fn render_err<E: std::fmt::Debug>(e: E) -> SnapshotError {
    SnapshotError::RenderError(format!("{:?}", e))
}

/// Renders charts to PNG bytes.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    width: u32,
    height: u32,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new(1200, 600)
    }
}

impl ChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// One bar per sample, colored by sign and labelled with its percent value.
    pub fn render_ranked_bar_chart(&self, gainers: &RankedList, losers: &RankedList) -> Result<Vec<u8>> {
        let bars = ranked_bars(gainers, losers);
        if bars.is_empty() {
            return Err(SnapshotError::NothingToRender);
        }
        let (y_min, y_max) = padded_range(bars.iter().map(|b| b.value), true);
        let count = bars.len() as i32;
        let mut buffer = vec![0u8; (self.width * self.height * 3) as usize];

        {
            let root = BitMapBackend::with_buffer(&mut buffer, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE).map_err(render_err)?;

            let mut chart = ChartBuilder::on(&root)
                .caption("Top gainers and losers", (FONT, 24))
                .margin(15)
                .x_label_area_size(50)
                .y_label_area_size(60)
                .build_cartesian_2d((0..count).into_segmented(), y_min..y_max)
                .map_err(render_err)?;

            let label_of = |v: &SegmentValue<i32>| match v {
                SegmentValue::CenterOf(i) => bars.get(*i as usize).map(|b| b.label.clone()).unwrap_or_default(),
                _ => String::new(),
            };
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(bars.len())
                .x_label_formatter(&label_of)
                .x_desc("Ticker")
                .y_desc("Change (%)")
                .draw()
                .map_err(render_err)?;

            for (up, color, name) in [(true, UP_COLOR, "Up"), (false, DOWN_COLOR, "Down")] {
                let series: Vec<(i32, f64)> = bars
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| (b.value >= 0.0) == up)
                    .map(|(i, b)| (i as i32, b.value))
                    .collect();
                if series.is_empty() {
                    continue;
                }
                chart
                    .draw_series(series.into_iter().map(|(x, value)| {
                        let mut bar = Rectangle::new(
                            [(SegmentValue::Exact(x), 0.0), (SegmentValue::Exact(x + 1), value)],
                            color.filled(),
                        );
                        bar.set_margin(0, 0, 4, 4);
                        bar
                    }))
                    .map_err(render_err)?
                    .label(name)
                    .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
            }

            chart
                .draw_series(bars.iter().enumerate().map(|(i, b)| {
                    Text::new(
                        format_percent(b.value),
                        (SegmentValue::CenterOf(i as i32), b.value),
                        (FONT, 12).into_font(),
                    )
                }))
                .map_err(render_err)?;

            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(render_err)?;

            root.present().map_err(render_err)?;
        }

        debug!("Rendered bar chart with {} bars", bars.len());
        self.encode_png(buffer)
    }

    /// One line per ticker with data; tickers with nothing to plot are skipped.
    pub fn render_time_series_line_chart(
        &self,
        histories: &[TickerHistory],
        metric: Metric,
        labels: &LineChartLabels,
    ) -> Result<Vec<u8>> {
        let series: Vec<(String, Vec<(NaiveDate, f64)>)> = histories
            .iter()
            .map(|h| (h.ticker.to_string(), select_points(h, metric)))
            .filter(|(_, points)| !points.is_empty())
            .collect();
        if series.is_empty() {
            return Err(SnapshotError::NothingToRender);
        }

        let all_points = || series.iter().flat_map(|(_, points)| points.iter());
        let start = all_points().map(|(d, _)| *d).min().ok_or(SnapshotError::NothingToRender)?;
        let end = all_points().map(|(d, _)| *d).max().ok_or(SnapshotError::NothingToRender)?;
        let span_days = (end - start).num_days().max(1) as i32;
        let (y_min, y_max) = padded_range(all_points().map(|(_, v)| *v), false);

        let mut buffer = vec![0u8; (self.width * self.height * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE).map_err(render_err)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(labels.title.as_str(), (FONT, 24))
                .margin(15)
                .x_label_area_size(50)
                .y_label_area_size(90)
                .build_cartesian_2d(0..span_days, y_min..y_max)
                .map_err(render_err)?;

            let date_label = |offset: &i32| (start + Duration::days(*offset as i64)).format("%Y-%m-%d").to_string();
            chart
                .configure_mesh()
                .x_labels(8)
                .x_label_formatter(&date_label)
                .x_desc("Date")
                .y_desc(labels.y_label.as_str())
                .draw()
                .map_err(render_err)?;

            for (idx, (name, points)) in series.iter().enumerate() {
                let style = Palette99::pick(idx).stroke_width(2);
                chart
                    .draw_series(LineSeries::new(
                        points.iter().map(|(d, v)| ((*d - start).num_days() as i32, *v)),
                        style,
                    ))
                    .map_err(render_err)?
                    .label(name.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
            }

            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(render_err)?;

            root.present().map_err(render_err)?;
        }

        debug!("Rendered line chart '{}' with {} series", labels.title, series.len());
        self.encode_png(buffer)
    }

    fn encode_png(&self, buffer: Vec<u8>) -> Result<Vec<u8>> {
        let image = image::RgbImage::from_raw(self.width, self.height, buffer)
            .ok_or_else(|| SnapshotError::RenderError("pixel buffer does not match chart size".to_string()))?;
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .map_err(render_err)?;
        Ok(bytes)
    }
}
