//! Excel workbook renderer.
//!
//! Sheets, in order:
//! - Summary: customer block and installed totals
//! - Installation Details: one row per consolidated unit
//! - Notes: only when some unit has a note
//! - Pictures: only when the session has images

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};

use crate::error::ReportResult;
use crate::format::{self, FormatTemplate};
use crate::models::{CustomerInfo, ReportImage};
use crate::report::{InstallTotals, ReportView};

struct ExcelFormats {
    title: Format,
    header: Format,
    label: Format,
    text: Format,
    wrapped: Format,
}

fn create_formats() -> ExcelFormats {
    ExcelFormats {
        title: Format::new().set_bold().set_font_size(14),
        header: Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_background_color(0x1F6F8B)
            .set_font_color(0xFFFFFF)
            .set_border(FormatBorder::Thin),
        label: Format::new().set_bold(),
        text: Format::new().set_border(FormatBorder::Thin),
        wrapped: Format::new()
            .set_text_wrap()
            .set_align(FormatAlign::Top)
            .set_border(FormatBorder::Thin),
    }
}

#[derive(Clone, Debug)]
pub struct ExcelRenderer {
    pub template: FormatTemplate,
}

impl Default for ExcelRenderer {
    fn default() -> Self {
        Self {
            template: FormatTemplate::excel(),
        }
    }
}

impl ExcelRenderer {
    pub fn new(template: FormatTemplate) -> Self {
        Self { template }
    }

    pub fn render_to_bytes(
        &self,
        view: &ReportView<'_>,
        customer: &CustomerInfo,
    ) -> ReportResult<Vec<u8>> {
        let mut workbook = Workbook::new();
        let formats = create_formats();

        let totals = view.totals();
        add_summary_sheet(
            workbook.add_worksheet(),
            customer,
            &totals,
            &view.session.report_notes,
            &formats,
        )?;
        self.add_details_sheet(workbook.add_worksheet(), view, &formats)?;

        let notes = view.notes();
        if !notes.is_empty() {
            add_notes_sheet(workbook.add_worksheet(), &notes, &formats)?;
        }
        if !view.session.images.is_empty() {
            add_pictures_sheet(workbook.add_worksheet(), view, &view.session.images, &formats)?;
        }

        let buffer = workbook.save_to_buffer()?;
        tracing::info!(bytes = buffer.len(), "rendered Excel workbook");
        Ok(buffer)
    }

    fn add_details_sheet(
        &self,
        sheet: &mut Worksheet,
        view: &ReportView<'_>,
        formats: &ExcelFormats,
    ) -> ReportResult<()> {
        sheet.set_name("Installation Details")?;

        let fixtures = view.visible_fixtures();
        let mut headers: Vec<&str> = vec!["Unit"];
        headers.extend(fixtures.iter().map(|f| f.heading()));
        headers.push("Notes");

        for (col, header) in headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *header, &formats.header)?;
        }
        sheet.set_column_width(0, 14.0)?;
        for col in 1..=fixtures.len() {
            sheet.set_column_width(col as u16, 24.0)?;
        }
        sheet.set_column_width((fixtures.len() + 1) as u16, 60.0)?;

        for (i, row) in view.unit_rows(&self.template).iter().enumerate() {
            let r = (i + 1) as u32;
            sheet.write_string_with_format(r, 0, &row.unit, &formats.text)?;
            for (c, (_, text)) in row.cells.iter().enumerate() {
                sheet.write_string_with_format(r, (c + 1) as u16, text, &formats.wrapped)?;
            }
            sheet.write_string_with_format(
                r,
                (row.cells.len() + 1) as u16,
                &row.note,
                &formats.wrapped,
            )?;
        }
        Ok(())
    }
}

fn add_summary_sheet(
    sheet: &mut Worksheet,
    customer: &CustomerInfo,
    totals: &InstallTotals,
    report_notes: &str,
    formats: &ExcelFormats,
) -> ReportResult<()> {
    sheet.set_name("Summary")?;
    sheet.set_column_width(0, 34.0)?;
    sheet.set_column_width(1, 48.0)?;

    sheet.write_string_with_format(0, 0, "Water Conservation Installation Report", &formats.title)?;

    let date = customer
        .date
        .map(|d| d.format("%B %-d, %Y").to_string())
        .unwrap_or_default();
    let city = customer.city_line();
    let customer_rows = [
        ("Customer", customer.customer_name.as_str()),
        ("Property", customer.property_name.as_str()),
        ("Address", customer.address.as_str()),
        ("City", city.as_str()),
        ("Date", date.as_str()),
    ];
    let mut row = 2u32;
    for (label, value) in customer_rows {
        sheet.write_string_with_format(row, 0, label, &formats.label)?;
        sheet.write_string(row, 1, value)?;
        row += 1;
    }

    row += 1;
    sheet.write_string_with_format(row, 0, "Installed", &formats.header)?;
    sheet.write_string_with_format(row, 1, "Quantity", &formats.header)?;
    row += 1;

    let kitchen = format!("Kitchen aerators ({})", format::AERATOR_RATE);
    let bathroom = format!("Bathroom aerators ({})", format::AERATOR_RATE);
    let ada = format!("ADA shower heads ({})", format::ADA_SHOWER_RATE);
    let regular = format!("Shower heads ({})", format::REGULAR_SHOWER_RATE);
    let toilets = format!("Toilets ({})", format::TOILET_RATE);
    let total_rows: [(&str, f64); 7] = [
        ("Units", totals.units as f64),
        ("Units serviced", totals.units_serviced as f64),
        (kitchen.as_str(), f64::from(totals.kitchen_aerators)),
        (bathroom.as_str(), f64::from(totals.bathroom_aerators)),
        (ada.as_str(), f64::from(totals.ada_shower_heads)),
        (regular.as_str(), f64::from(totals.regular_shower_heads)),
        (toilets.as_str(), f64::from(totals.toilets)),
    ];
    for (label, value) in total_rows {
        sheet.write_string_with_format(row, 0, label, &formats.text)?;
        sheet.write_number_with_format(row, 1, value, &formats.text)?;
        row += 1;
    }

    if totals.toilets > 0 {
        row += 1;
        sheet.write_string_with_format(row, 0, "Toilet replacement", &formats.label)?;
        sheet.write_string(row, 1, format::toilet_narrative(totals.toilets))?;
        row += 1;
    }

    if !report_notes.trim().is_empty() {
        row += 1;
        sheet.write_string_with_format(row, 0, "Report notes", &formats.label)?;
        sheet.write_string_with_format(row, 1, report_notes.trim(), &formats.wrapped)?;
    }
    Ok(())
}

fn add_notes_sheet(
    sheet: &mut Worksheet,
    notes: &[(String, String)],
    formats: &ExcelFormats,
) -> ReportResult<()> {
    sheet.set_name("Notes")?;
    sheet.set_column_width(0, 14.0)?;
    sheet.set_column_width(1, 90.0)?;
    sheet.write_string_with_format(0, 0, "Unit", &formats.header)?;
    sheet.write_string_with_format(0, 1, "Note", &formats.header)?;
    for (i, (unit, note)) in notes.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_string_with_format(r, 0, unit, &formats.text)?;
        sheet.write_string_with_format(r, 1, note, &formats.wrapped)?;
    }
    Ok(())
}

fn add_pictures_sheet(
    sheet: &mut Worksheet,
    view: &ReportView<'_>,
    images: &[ReportImage],
    formats: &ExcelFormats,
) -> ReportResult<()> {
    sheet.set_name("Pictures")?;
    for (col, (header, width)) in [("Unit", 14.0), ("File Name", 30.0), ("Caption", 30.0), ("Link", 60.0)]
        .into_iter()
        .enumerate()
    {
        sheet.write_string_with_format(0, col as u16, header, &formats.header)?;
        sheet.set_column_width(col as u16, width)?;
    }
    for (i, image) in images.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_string_with_format(r, 0, view.session.display_unit(&image.unit), &formats.text)?;
        sheet.write_string_with_format(r, 1, &image.file_name, &formats.text)?;
        sheet.write_string_with_format(
            r,
            2,
            image.caption.as_deref().unwrap_or(""),
            &formats.text,
        )?;
        if let Some(url) = image.url.as_deref().filter(|u| !u.trim().is_empty()) {
            sheet.write_url(r, 3, url)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fixture, InstallationRecord};
    use crate::session::ReportSession;

    fn session() -> ReportSession {
        ReportSession {
            customer_info: Some(CustomerInfo {
                customer_name: "Dana Reyes".to_string(),
                ..CustomerInfo::default()
            }),
            installation_data: vec![
                InstallationRecord::from_pairs([
                    ("Unit", "A01"),
                    ("Kitchen Aerator", "1"),
                    ("Toilets Installed", "2"),
                    ("Notes", "Running toilet"),
                ]),
                InstallationRecord::from_pairs([
                    ("Unit", "A02"),
                    ("Kitchen Aerator", ""),
                    ("Toilets Installed", "1"),
                    ("Notes", ""),
                ]),
            ],
            images: vec![ReportImage {
                unit: "A01".to_string(),
                file_name: "a01-kitchen.jpg".to_string(),
                caption: Some("Kitchen Sink".to_string()),
                url: Some("https://example.com/a01-kitchen.jpg".to_string()),
                ..ReportImage::default()
            }],
            ..ReportSession::default()
        }
    }

    #[test]
    fn renders_workbook_bytes() {
        let session = session();
        let view = ReportView::build(&session).unwrap();
        let customer = session.ensure_exportable().unwrap();
        let bytes = ExcelRenderer::default()
            .render_to_bytes(&view, customer)
            .unwrap();
        // xlsx files are zip archives
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn details_use_toilet_narration() {
        let session = session();
        let view = ReportView::build(&session).unwrap();
        let rows = view.unit_rows(&ExcelRenderer::default().template);
        assert_eq!(rows[0].cell(Fixture::Toilet), Some("We replaced both toilets."));
        assert_eq!(rows[1].cell(Fixture::Toilet), Some("We replaced one toilet."));
        assert_eq!(rows[1].cell(Fixture::Kitchen), Some("Unable"));
    }

    #[test]
    fn summary_sheet_narrates_toilets() {
        use calamine::{Data, Reader, Xlsx};

        let session = session();
        let view = ReportView::build(&session).unwrap();
        let customer = session.ensure_exportable().unwrap();
        let bytes = ExcelRenderer::default()
            .render_to_bytes(&view, customer)
            .unwrap();

        let mut workbook: Xlsx<_> = Xlsx::new(std::io::Cursor::new(bytes)).unwrap();
        let summary = workbook.worksheet_range("Summary").unwrap();
        let narrative = summary
            .rows()
            .find(|row| {
                matches!(row.first(), Some(Data::String(label)) if label == "Toilet replacement")
            })
            .and_then(|row| row.get(1).cloned());
        assert_eq!(
            narrative,
            Some(Data::String("We replaced 3 toilets.".to_string()))
        );
    }
}
