//! PDF report renderer.
//!
//! Layout is computed first as plain page/element data, then drawn with
//! printpdf. Page numbers are stamped once the real page count is known.

use image::GenericImageView;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference,
    Point,
};

use crate::error::{ReportError, ReportResult};
use crate::format::FormatTemplate;
use crate::models::{CustomerInfo, ReportImage};
use crate::report::{self, ReportView};

pub const PAGE_WIDTH: f32 = 215.9;
pub const PAGE_HEIGHT: f32 = 279.4;
const MARGIN: f32 = 19.0;
const FOOTER_Y: f32 = 10.0;
const CONTENT_BOTTOM: f32 = 20.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const BODY_SIZE: f32 = 10.5;
const BODY_LINE: f32 = 5.5;
const TABLE_SIZE: f32 = 9.0;
const TABLE_LINE: f32 = 4.4;
const CELL_PAD: f32 = 1.5;
const HEADING_SIZE: f32 = 15.0;

const UNIT_COLUMN_WIDTH: f32 = 28.0;
const NOTE_UNIT_WIDTH: f32 = 28.0;

pub const PHOTO_COLUMNS: usize = 2;
pub const PHOTO_ROWS: usize = 3;
const PHOTOS_PER_PAGE: usize = PHOTO_COLUMNS * PHOTO_ROWS;
const PHOTO_GAP: f32 = 6.0;
const PHOTO_CAPTION_SPACE: f32 = 12.0;
const PHOTO_INSET: f32 = 1.5;
const IMAGE_DPI: f32 = 300.0;

// rough per-page capacities used only for the up-front estimate
const NOTE_ROWS_PER_PAGE_ESTIMATE: usize = 30;
const DETAIL_ROWS_PER_PAGE_ESTIMATE: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text {
        x: f32,
        y: f32,
        size: f32,
        bold: bool,
        text: String,
    },
    Rule {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
    Frame {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    /// Bitmap drawn from `path`, already scaled to `width` x `height`.
    Image {
        path: String,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub elements: Vec<Element>,
}

impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|e| match e {
            Element::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfLayout {
    pub pages: Vec<Page>,
    pub estimated_pages: usize,
}

impl PdfLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Page count guess made before layout, from item counts alone.
pub fn estimate_page_count(notes: usize, units: usize, photos: usize) -> usize {
    let notes_pages = notes.div_ceil(NOTE_ROWS_PER_PAGE_ESTIMATE);
    let detail_pages = units.div_ceil(DETAIL_ROWS_PER_PAGE_ESTIMATE).max(1);
    let photo_pages = photos.div_ceil(PHOTOS_PER_PAGE);
    2 + notes_pages + detail_pages + photo_pages
}

fn max_chars(width: f32, size: f32) -> usize {
    // Helvetica averages about half an em per glyph
    let glyph_mm = 0.5 * size * 0.3528;
    ((width / glyph_mm).floor() as usize).max(1)
}

/// Greedy word wrap that honours explicit newlines.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word.to_string();
            while word.chars().count() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let head: String = word.chars().take(width).collect();
                word = word.chars().skip(width).collect();
                lines.push(head);
            }
            if current.is_empty() {
                current = word;
            } else if current.chars().count() + 1 + word.chars().count() <= width {
                current.push(' ');
                current.push_str(&word);
            } else {
                lines.push(std::mem::replace(&mut current, word));
            }
        }
        lines.push(current);
    }
    while lines.len() > 1 && lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

struct PageBuilder {
    pages: Vec<Page>,
    y: f32,
}

impl PageBuilder {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn push(&mut self, element: Element) {
        if self.pages.is_empty() {
            self.pages.push(Page::default());
        }
        if let Some(page) = self.pages.last_mut() {
            page.elements.push(element);
        }
    }

    fn text(&mut self, x: f32, size: f32, bold: bool, text: impl Into<String>) {
        let y = self.y;
        self.push(Element::Text {
            x,
            y,
            size,
            bold,
            text: text.into(),
        });
    }

    fn rule(&mut self) {
        let y = self.y;
        self.push(Element::Rule {
            x1: MARGIN,
            y1: y,
            x2: PAGE_WIDTH - MARGIN,
            y2: y,
        });
    }

    fn room(&self) -> f32 {
        self.y - CONTENT_BOTTOM
    }

    fn paragraph(&mut self, text: &str) {
        for line in wrap_text(text, max_chars(CONTENT_WIDTH, BODY_SIZE)) {
            if self.room() < BODY_LINE {
                self.new_page();
            }
            self.y -= BODY_LINE;
            self.text(MARGIN, BODY_SIZE, false, line);
        }
        self.y -= BODY_LINE * 0.6;
    }

    fn heading(&mut self, title: &str) {
        self.y -= HEADING_SIZE * 0.3528 + 2.0;
        self.text(MARGIN, HEADING_SIZE, true, title);
        self.y -= 4.0;
    }

    /// One table row; `cells` are pre-wrapped lines per column.
    fn table_row(&mut self, widths: &[f32], cells: &[Vec<String>], bold: bool) {
        let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
        let top = self.y;
        let mut x = MARGIN;
        for (width, cell) in widths.iter().zip(cells) {
            for (i, line) in cell.iter().enumerate() {
                self.push(Element::Text {
                    x: x + CELL_PAD,
                    y: top - TABLE_LINE * (i as f32 + 1.0),
                    size: TABLE_SIZE,
                    bold,
                    text: line.clone(),
                });
            }
            x += width;
        }
        self.y = top - TABLE_LINE * lines as f32 - CELL_PAD;
        self.rule();
    }
}

/// Splits wrapped cells after `lines` lines: (this page, next page).
fn split_cells(cells: &[Vec<String>], lines: usize) -> (Vec<Vec<String>>, Vec<Vec<String>>) {
    cells
        .iter()
        .map(|cell| {
            let at = lines.min(cell.len());
            (cell[..at].to_vec(), cell[at..].to_vec())
        })
        .unzip()
}

fn row_height(cells: &[Vec<String>]) -> f32 {
    let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
    TABLE_LINE * lines as f32 + CELL_PAD
}

fn wrap_cells(widths: &[f32], texts: &[&str]) -> Vec<Vec<String>> {
    widths
        .iter()
        .zip(texts)
        .map(|(width, text)| wrap_text(text, max_chars(width - 2.0 * CELL_PAD, TABLE_SIZE)))
        .collect()
}

/// Paginated table with the heading and header row repeated on each page.
fn paginated_table(
    builder: &mut PageBuilder,
    title: &str,
    widths: &[f32],
    headers: &[&str],
    rows: &[Vec<String>],
) {
    let header_cells = wrap_cells(widths, headers);
    let start_page = |builder: &mut PageBuilder| {
        builder.new_page();
        builder.heading(title);
        builder.rule();
        builder.table_row(widths, &header_cells, true);
    };

    start_page(builder);
    let page_capacity = builder.room();
    for row in rows {
        let texts: Vec<&str> = row.iter().map(String::as_str).collect();
        let mut cells = wrap_cells(widths, &texts);
        loop {
            let height = row_height(&cells);
            if height <= builder.room() {
                builder.table_row(widths, &cells, false);
                break;
            }
            let fits = ((builder.room() - CELL_PAD) / TABLE_LINE).floor().max(0.0) as usize;
            // rows that fit on a fresh page move there whole
            if fits == 0 || height <= page_capacity {
                start_page(builder);
                continue;
            }
            let (head, rest) = split_cells(&cells, fits);
            builder.table_row(widths, &head, false);
            start_page(builder);
            cells = rest;
        }
    }
}

fn cover_page(builder: &mut PageBuilder, customer: &CustomerInfo) {
    builder.new_page();
    builder.y = PAGE_HEIGHT * 0.62;
    builder.text(MARGIN, 24.0, true, "Water Conservation");
    builder.y -= 11.0;
    builder.text(MARGIN, 24.0, true, "Installation Report");
    builder.y -= 16.0;
    builder.rule();
    builder.y -= 10.0;

    let mut lines: Vec<String> = Vec::new();
    if !customer.display_name().is_empty() {
        lines.push(customer.display_name().to_string());
    }
    for line in [customer.address.trim().to_string(), customer.city_line()] {
        if !line.is_empty() {
            lines.push(line);
        }
    }
    if let Some(date) = customer.date {
        lines.push(date.format("%B %-d, %Y").to_string());
    }
    for line in lines {
        builder.text(MARGIN, 13.0, false, line);
        builder.y -= 7.0;
    }
    if !customer.customer_name.trim().is_empty() {
        builder.y -= 6.0;
        builder.text(
            MARGIN,
            BODY_SIZE,
            false,
            format!("Prepared for {}", customer.customer_name.trim()),
        );
    }
}

fn letter_page(builder: &mut PageBuilder, view: &ReportView<'_>, customer: &CustomerInfo) {
    builder.new_page();
    if let Some(date) = customer.date {
        builder.y -= BODY_LINE;
        builder.text(MARGIN, BODY_SIZE, false, date.format("%B %-d, %Y").to_string());
        builder.y -= BODY_LINE;
    }
    for line in [
        customer.customer_name.trim().to_string(),
        customer.property_name.trim().to_string(),
        customer.address.trim().to_string(),
        customer.city_line(),
    ] {
        if !line.is_empty() {
            builder.y -= BODY_LINE;
            builder.text(MARGIN, BODY_SIZE, false, line);
        }
    }
    builder.y -= BODY_LINE * 2.0;

    for paragraph in report::letter_paragraphs(customer, &view.totals()) {
        builder.paragraph(&paragraph);
    }
    let report_notes = view.session.report_notes.trim();
    if !report_notes.is_empty() {
        builder.paragraph(report_notes);
    }
}

/// Largest size with the image's aspect ratio that fits the box, in mm.
pub fn fit_within(px_width: u32, px_height: u32, box_width: f32, box_height: f32) -> (f32, f32) {
    if px_width == 0 || px_height == 0 {
        return (0.0, 0.0);
    }
    let scale = (box_width / px_width as f32).min(box_height / px_height as f32);
    (px_width as f32 * scale, px_height as f32 * scale)
}

fn photo_pages(builder: &mut PageBuilder, view: &ReportView<'_>, images: &[ReportImage]) {
    let cell_width = (CONTENT_WIDTH - PHOTO_GAP) / PHOTO_COLUMNS as f32;
    for chunk in images.chunks(PHOTOS_PER_PAGE) {
        builder.new_page();
        builder.heading("Photos");
        let grid_top = builder.y - 2.0;
        let cell_height = (grid_top - CONTENT_BOTTOM) / PHOTO_ROWS as f32;
        let frame_height = cell_height - PHOTO_CAPTION_SPACE - PHOTO_GAP;

        for (i, photo) in chunk.iter().enumerate() {
            let col = i % PHOTO_COLUMNS;
            let row = i / PHOTO_COLUMNS;
            let x = MARGIN + col as f32 * (cell_width + PHOTO_GAP);
            let top = grid_top - row as f32 * cell_height;
            let frame_bottom = top - frame_height;

            if let Some(path) = photo.path.as_deref() {
                match image::image_dimensions(path) {
                    Ok((px_width, px_height)) => {
                        let (width, height) = fit_within(
                            px_width,
                            px_height,
                            cell_width - 2.0 * PHOTO_INSET,
                            frame_height - 2.0 * PHOTO_INSET,
                        );
                        builder.push(Element::Image {
                            path: path.to_string(),
                            x: x + (cell_width - width) / 2.0,
                            y: frame_bottom + (frame_height - height) / 2.0,
                            width,
                            height,
                        });
                    }
                    Err(err) => {
                        tracing::warn!(file = %photo.file_name, error = %err, "photo left out of the grid");
                    }
                }
            }
            builder.push(Element::Frame {
                x,
                y: frame_bottom,
                width: cell_width,
                height: frame_height,
            });
            let caption = photo
                .caption
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or("Photo");
            builder.push(Element::Text {
                x,
                y: frame_bottom - 5.0,
                size: TABLE_SIZE,
                bold: true,
                text: format!("Unit {}: {}", view.session.display_unit(&photo.unit), caption),
            });
            builder.push(Element::Text {
                x,
                y: frame_bottom - 9.5,
                size: 8.0,
                bold: false,
                text: photo.file_name.clone(),
            });
        }
    }
}

/// Computes every page of the report.
pub fn layout(
    view: &ReportView<'_>,
    customer: &CustomerInfo,
    template: &FormatTemplate,
) -> PdfLayout {
    let notes = view.notes();
    let images = &view.session.images;
    let estimated_pages = estimate_page_count(notes.len(), view.units().len(), images.len());

    let mut builder = PageBuilder::new();
    cover_page(&mut builder, customer);
    letter_page(&mut builder, view, customer);

    if !notes.is_empty() {
        let widths = [NOTE_UNIT_WIDTH, CONTENT_WIDTH - NOTE_UNIT_WIDTH];
        let rows: Vec<Vec<String>> = notes
            .into_iter()
            .map(|(unit, note)| vec![unit, note])
            .collect();
        paginated_table(&mut builder, "Notes", &widths, &["Unit", "Notes"], &rows);
    }

    let fixtures = view.visible_fixtures();
    let fixture_width = if fixtures.is_empty() {
        0.0
    } else {
        (CONTENT_WIDTH - UNIT_COLUMN_WIDTH) / fixtures.len() as f32
    };
    let mut widths = vec![UNIT_COLUMN_WIDTH];
    widths.extend(fixtures.iter().map(|_| fixture_width));
    let mut headers = vec!["Unit"];
    headers.extend(fixtures.iter().map(|f| f.heading()));
    let rows: Vec<Vec<String>> = view
        .unit_rows(template)
        .into_iter()
        .map(|row| {
            let mut cells = vec![row.unit];
            cells.extend(row.cells.into_iter().map(|(_, text)| text));
            cells
        })
        .collect();
    paginated_table(&mut builder, "Installation Details", &widths, &headers, &rows);

    if !images.is_empty() {
        photo_pages(&mut builder, view, images);
    }

    let mut pages = builder.pages;
    let total = pages.len();
    if total != estimated_pages {
        tracing::debug!(estimated_pages, total, "corrected page estimate");
    }
    for (i, page) in pages.iter_mut().enumerate() {
        page.elements.push(Element::Text {
            x: PAGE_WIDTH / 2.0 - 10.0,
            y: FOOTER_Y,
            size: 8.0,
            bold: false,
            text: format!("Page {} of {}", i + 1, total),
        });
    }

    PdfLayout {
        pages,
        estimated_pages,
    }
}

fn pdf_error(err: impl std::fmt::Display) -> ReportError {
    ReportError::Pdf(err.to_string())
}

fn draw_polyline(layer: &PdfLayerReference, points: &[(f32, f32)], closed: bool) {
    let line = Line {
        points: points
            .iter()
            .map(|(x, y)| (Point::new(Mm(*x), Mm(*y)), false))
            .collect(),
        is_closed: closed,
    };
    layer.add_line(line);
}

fn draw_image(
    layer: &PdfLayerReference,
    path: &str,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
) -> ReportResult<()> {
    let decoded = image::open(path)
        .map_err(|e| ReportError::ResourceNotReady(format!("cannot read photo {path}: {e}")))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Ok(());
    }
    // printpdf sizes bitmaps by pixel count at the given dpi
    let natural_width = decoded.width() as f32 / IMAGE_DPI * 25.4;
    let natural_height = decoded.height() as f32 / IMAGE_DPI * 25.4;
    Image::from_dynamic_image(&decoded).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x)),
            translate_y: Some(Mm(y)),
            scale_x: Some(width / natural_width),
            scale_y: Some(height / natural_height),
            dpi: Some(IMAGE_DPI),
            ..ImageTransform::default()
        },
    );
    Ok(())
}

fn draw_page(
    layer: &PdfLayerReference,
    page: &Page,
    regular: &IndirectFontRef,
    bold: &IndirectFontRef,
) -> ReportResult<()> {
    for element in &page.elements {
        match element {
            Element::Text {
                x,
                y,
                size,
                bold: is_bold,
                text,
            } => {
                let font = if *is_bold { bold } else { regular };
                layer.use_text(text.clone(), *size, Mm(*x), Mm(*y), font);
            }
            Element::Rule { x1, y1, x2, y2 } => {
                draw_polyline(layer, &[(*x1, *y1), (*x2, *y2)], false);
            }
            Element::Frame {
                x,
                y,
                width,
                height,
            } => {
                draw_polyline(
                    layer,
                    &[
                        (*x, *y),
                        (*x + *width, *y),
                        (*x + *width, *y + *height),
                        (*x, *y + *height),
                    ],
                    true,
                );
            }
            Element::Image {
                path,
                x,
                y,
                width,
                height,
            } => draw_image(layer, path, *x, *y, *width, *height)?,
        }
    }
    Ok(())
}

/// Draws a computed layout into PDF bytes.
pub fn render_layout(title: &str, layout: &PdfLayout) -> ReportResult<Vec<u8>> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;

    for (i, page) in layout.pages.iter().enumerate() {
        let (page_index, layer_index) = if i == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1")
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);
        draw_page(&layer, page, &regular, &bold)?;
    }

    doc.save_to_bytes().map_err(pdf_error)
}

/// Refuses to start while a photo referenced by path is missing or unreadable.
pub fn ensure_assets_ready(images: &[ReportImage]) -> ReportResult<()> {
    for photo in images {
        if let Some(path) = photo.path.as_deref() {
            if !std::path::Path::new(path).exists() {
                return Err(ReportError::ResourceNotReady(format!(
                    "waiting for photo {} ({path})",
                    photo.file_name
                )));
            }
            image::image_dimensions(path).map_err(|e| {
                ReportError::ResourceNotReady(format!(
                    "cannot read photo {} ({path}): {e}",
                    photo.file_name
                ))
            })?;
        }
    }
    Ok(())
}

pub fn render_to_bytes(
    view: &ReportView<'_>,
    customer: &CustomerInfo,
    template: &FormatTemplate,
) -> ReportResult<Vec<u8>> {
    ensure_assets_ready(&view.session.images)?;
    let layout = layout(view, customer, template);
    let title = format!("Installation Report - {}", customer.display_name());
    let bytes = render_layout(title.trim_end_matches(" - "), &layout)?;
    tracing::info!(pages = layout.page_count(), bytes = bytes.len(), "rendered PDF report");
    Ok(bytes)
}
