use log::{debug, warn};
use printpdf::image_crate::{self, DynamicImage, GenericImageView};
use printpdf::{BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, Pt};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Result, SnapshotError};
use crate::models::ranking::{RankedList, VolumeSummary};
use crate::util::{format_percent, group_thousands};

// US Letter, in points.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN_X: f32 = 50.0;
const MARGIN_TOP: f32 = 50.0;
const MARGIN_BOTTOM: f32 = 40.0;

const HEADING_SIZE: f32 = 16.0;
const HEADING_GAP: f32 = 25.0;
const TITLE_SIZE: f32 = 12.0;
const TITLE_HEIGHT: f32 = 18.0;
const BODY_SIZE: f32 = 10.0;
const LINE_PITCH: f32 = 15.0;
const IMAGE_WIDTH: f32 = 360.0;
const IMAGE_HEIGHT: f32 = 180.0;
const IMAGE_GAP: f32 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableUnit {
    Percent,
    Plain,
}

/// Ranked `<ticker>: <value>` lines.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedTable {
    pub rows: Vec<(String, f64)>,
    pub unit: TableUnit,
}

impl RankedTable {
    pub fn from_ranked(list: &RankedList) -> Self {
        Self {
            rows: list.iter().map(|s| (s.ticker.to_string(), s.percent)).collect(),
            unit: TableUnit::Percent,
        }
    }

    pub fn from_volume(summary: &VolumeSummary) -> Self {
        Self {
            rows: summary.iter().map(|(t, v)| (t.to_string(), *v)).collect(),
            unit: TableUnit::Plain,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|(label, value)| match self.unit {
                TableUnit::Percent => format!("{}: {}", label, format_percent(*value)),
                TableUnit::Plain => format!("{}: {}", label, group_thousands(*value)),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportSection {
    pub title: String,
    pub image: Option<PathBuf>,
    pub table: Option<RankedTable>,
    /// Start this section on a fresh page.
    pub page_break_before: bool,
}

impl ReportSection {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.image = Some(path.into());
        self
    }

    pub fn with_table(mut self, table: RankedTable) -> Self {
        self.table = Some(table);
        self
    }

    pub fn on_new_page(mut self) -> Self {
        self.page_break_before = true;
        self
    }
}

/// What a section's image resolved to before layout.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSlot {
    None,
    Embedded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSection {
    pub title: String,
    pub image: ImageSlot,
    pub lines: Vec<String>,
    pub page_break_before: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Heading { text: String, y: f32 },
    Title { text: String, y: f32 },
    Line { text: String, y: f32 },
    /// Bottom-left corner of the image box of section `section`.
    Image { section: usize, y: f32 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub placements: Vec<Placement>,
}

struct Planner {
    heading: String,
    pages: Vec<PageLayout>,
    cursor: f32,
    page_has_body: bool,
}

impl Planner {
    fn new(heading: &str) -> Self {
        let mut planner = Self {
            heading: heading.to_string(),
            pages: Vec::new(),
            cursor: 0.0,
            page_has_body: false,
        };
        planner.new_page();
        planner
    }

    fn new_page(&mut self) {
        let number = self.pages.len() + 1;
        let top = PAGE_HEIGHT - MARGIN_TOP;
        self.pages.push(PageLayout {
            placements: vec![Placement::Heading {
                text: format!("{} - Page {}", self.heading, number),
                y: top,
            }],
        });
        self.cursor = top - HEADING_GAP;
        self.page_has_body = false;
    }

    /// Moves to a new page unless `height` still fits above the bottom margin.
    fn reserve(&mut self, height: f32) -> f32 {
        if self.page_has_body && self.cursor - height < MARGIN_BOTTOM {
            self.new_page();
        }
        self.page_has_body = true;
        let top = self.cursor;
        self.cursor -= height;
        top
    }

    fn place(&mut self, placement: Placement) {
        if let Some(page) = self.pages.last_mut() {
            page.placements.push(placement);
        }
    }
}

/// Lays sections out top to bottom, breaking pages on overflow and where requested.
pub fn plan_pages(heading: &str, sections: &[PlannedSection]) -> Vec<PageLayout> {
    let mut planner = Planner::new(heading);

    for (idx, section) in sections.iter().enumerate() {
        if section.page_break_before && planner.page_has_body {
            planner.new_page();
        }

        let top = planner.reserve(TITLE_HEIGHT);
        planner.place(Placement::Title {
            text: section.title.clone(),
            y: top - TITLE_SIZE,
        });

        match &section.image {
            ImageSlot::None => {}
            ImageSlot::Embedded => {
                let top = planner.reserve(IMAGE_HEIGHT + IMAGE_GAP);
                planner.place(Placement::Image {
                    section: idx,
                    y: top - IMAGE_HEIGHT,
                });
            }
            ImageSlot::Failed(reason) => {
                let top = planner.reserve(LINE_PITCH);
                planner.place(Placement::Line {
                    text: format!("[chart unavailable: {}]", reason),
                    y: top - BODY_SIZE,
                });
            }
        }

        for line in &section.lines {
            let top = planner.reserve(LINE_PITCH);
            planner.place(Placement::Line {
                text: line.clone(),
                y: top - BODY_SIZE,
            });
        }
    }

    planner.pages
}

fn load_image(path: &Path) -> std::result::Result<DynamicImage, String> {
    let bytes = fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    image_crate::load_from_memory(&bytes).map_err(|e| format!("{}: {}", path.display(), e))
}

fn compose_err<E: std::fmt::Debug>(e: E) -> SnapshotError {
    SnapshotError::ComposeError(format!("{:?}", e))
}

fn mm(points: f32) -> Mm {
    Mm::from(Pt(points))
}

/// Assembles report sections into a paginated PDF.
#[derive(Debug, Clone)]
pub struct ReportComposer {
    heading: String,
}

impl Default for ReportComposer {
    fn default() -> Self {
        Self::new("Financial Report")
    }
}

impl ReportComposer {
    pub fn new(heading: impl Into<String>) -> Self {
        Self { heading: heading.into() }
    }

    /// Renders `sections` to PDF bytes.
    ///
    /// An image that cannot be read or decoded is replaced by an inline note;
    /// only a failure of the document itself is an error.
    pub fn compose(&self, sections: &[ReportSection]) -> Result<Vec<u8>> {
        let mut images: Vec<Option<DynamicImage>> = Vec::with_capacity(sections.len());
        let mut planned = Vec::with_capacity(sections.len());

        for section in sections {
            let (slot, image) = match &section.image {
                None => (ImageSlot::None, None),
                Some(path) => match load_image(path) {
                    Ok(image) => (ImageSlot::Embedded, Some(image)),
                    Err(reason) => {
                        warn!("Could not embed image for '{}': {}", section.title, reason);
                        (ImageSlot::Failed("image could not be loaded".to_string()), None)
                    }
                },
            };
            images.push(image);
            planned.push(PlannedSection {
                title: section.title.clone(),
                image: slot,
                lines: section.table.as_ref().map(RankedTable::lines).unwrap_or_default(),
                page_break_before: section.page_break_before,
            });
        }

        let pages = plan_pages(&self.heading, &planned);
        debug!("Composing {} sections over {} pages", sections.len(), pages.len());

        let (doc, first_page, first_layer) =
            PdfDocument::new(self.heading.as_str(), mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1");
        let bold: IndirectFontRef = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(compose_err)?;
        let regular: IndirectFontRef = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(compose_err)?;

        for (page_no, page) in pages.iter().enumerate() {
            let (page_idx, layer_idx) = if page_no == 0 {
                (first_page, first_layer)
            } else {
                doc.add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1")
            };
            let layer = doc.get_page(page_idx).get_layer(layer_idx);

            for placement in &page.placements {
                match placement {
                    Placement::Heading { text, y } => {
                        layer.use_text(text.as_str(), HEADING_SIZE, mm(MARGIN_X), mm(*y), &bold)
                    }
                    Placement::Title { text, y } => {
                        layer.use_text(text.as_str(), TITLE_SIZE, mm(MARGIN_X), mm(*y), &bold)
                    }
                    Placement::Line { text, y } => {
                        layer.use_text(text.as_str(), BODY_SIZE, mm(MARGIN_X), mm(*y), &regular)
                    }
                    Placement::Image { section, y } => {
                        let Some(Some(image)) = images.get(*section) else {
                            continue;
                        };
                        let (width_px, height_px) = image.dimensions();
                        if width_px == 0 || height_px == 0 {
                            continue;
                        }
                        // At 72 dpi one pixel is one point; scale into the image box.
                        Image::from_dynamic_image(image).add_to_layer(
                            layer.clone(),
                            ImageTransform {
                                translate_x: Some(mm(MARGIN_X)),
                                translate_y: Some(mm(*y)),
                                scale_x: Some(IMAGE_WIDTH / width_px as f32),
                                scale_y: Some(IMAGE_HEIGHT / height_px as f32),
                                dpi: Some(72.0),
                                ..Default::default()
                            },
                        );
                    }
                }
            }
        }

        doc.save_to_bytes().map_err(compose_err)
    }
}
