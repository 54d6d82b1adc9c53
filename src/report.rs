use std::fmt::Write;

use crate::consolidate::{self, Consolidation};
use crate::error::{ReportError, ReportResult};
use crate::format::{self, FormatTemplate};
use crate::models::{ConsolidatedUnit, CustomerInfo, Fixture};
use crate::resolver::{self, ColumnMap};
use crate::session::ReportSession;

/// Installed counts across all units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallTotals {
    pub units: usize,
    pub units_serviced: usize,
    pub kitchen_aerators: u32,
    pub bathroom_aerators: u32,
    pub ada_shower_heads: u32,
    pub regular_shower_heads: u32,
    pub toilets: u32,
}

impl InstallTotals {
    pub fn shower_heads(&self) -> u32 {
        self.ada_shower_heads + self.regular_shower_heads
    }
}

pub fn summarize(units: &[ConsolidatedUnit]) -> InstallTotals {
    let mut totals = InstallTotals {
        units: units.len(),
        ..InstallTotals::default()
    };
    for unit in units {
        if unit.has_installations() {
            totals.units_serviced += 1;
        }
        totals.kitchen_aerators += unit.kitchen_quantity;
        totals.bathroom_aerators += unit.bathroom_quantity;
        totals.ada_shower_heads += unit.shower_ada_quantity;
        totals.regular_shower_heads += unit.shower_regular_quantity;
        totals.toilets += unit.toilet_quantity;
    }
    totals
}

/// One rendered unit line: display id, fixture cells and unified note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRow {
    pub unit: String,
    pub cells: Vec<(Fixture, String)>,
    pub note: String,
}

impl UnitRow {
    pub fn cell(&self, fixture: Fixture) -> Option<&str> {
        self.cells
            .iter()
            .find(|(f, _)| *f == fixture)
            .map(|(_, text)| text.as_str())
    }
}

/// Resolved and consolidated view of a session, shared by every renderer.
pub struct ReportView<'a> {
    pub session: &'a ReportSession,
    pub columns: ColumnMap,
    pub consolidation: Consolidation,
}

impl<'a> ReportView<'a> {
    pub fn build(session: &'a ReportSession) -> ReportResult<Self> {
        let rows = session.rows();
        let columns = resolver::resolve(&rows).ok_or_else(|| {
            ReportError::MissingInput("no installation rows to consolidate".to_string())
        })?;
        let consolidation = consolidate::consolidate(&rows, &columns, &session.note_selection);
        Ok(Self {
            session,
            columns,
            consolidation,
        })
    }

    pub fn units(&self) -> &[ConsolidatedUnit] {
        self.consolidation.units()
    }

    /// Fixture columns worth showing: some unit has data or an override.
    pub fn visible_fixtures(&self) -> Vec<Fixture> {
        Fixture::ALL
            .into_iter()
            .filter(|fixture| {
                self.units().iter().any(|unit| {
                    unit.quantity(*fixture) > 0
                        || self.session.override_for(&unit.unit, *fixture).is_some()
                })
            })
            .collect()
    }

    pub fn note_for(&self, unit: &ConsolidatedUnit) -> String {
        consolidate::unified_note(unit, self.session.note_override(&unit.unit))
    }

    pub fn unit_rows(&self, template: &FormatTemplate) -> Vec<UnitRow> {
        let fixtures = self.visible_fixtures();
        self.units()
            .iter()
            .map(|unit| UnitRow {
                unit: self.session.display_unit(&unit.unit).to_string(),
                cells: fixtures
                    .iter()
                    .map(|fixture| {
                        let text = format::format_cell(
                            unit,
                            *fixture,
                            self.session.override_for(&unit.unit, *fixture),
                            template,
                        );
                        (*fixture, text)
                    })
                    .collect(),
                note: self.note_for(unit),
            })
            .collect()
    }

    /// Units with a non-empty unified note, as (display unit, note).
    pub fn notes(&self) -> Vec<(String, String)> {
        self.units()
            .iter()
            .filter_map(|unit| {
                let note = self.note_for(unit);
                if note.is_empty() {
                    None
                } else {
                    Some((self.session.display_unit(&unit.unit).to_string(), note))
                }
            })
            .collect()
    }

    pub fn totals(&self) -> InstallTotals {
        let mut totals = summarize(self.units());
        if self.session.toilet_count > 0 {
            totals.toilets = self.session.toilet_count;
        }
        totals
    }
}

fn plural(count: u32, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 {singular}")
    } else {
        format!("{count} {plural}")
    }
}

/// Paragraphs for the cover letter.
pub fn letter_paragraphs(customer: &CustomerInfo, totals: &InstallTotals) -> Vec<String> {
    let greeting = if customer.customer_name.trim().is_empty() {
        "To whom it may concern,".to_string()
    } else {
        format!("Dear {},", customer.customer_name.trim())
    };
    let site = if customer.display_name().is_empty() {
        "your property".to_string()
    } else {
        customer.display_name().to_string()
    };

    let mut installed = vec![
        plural(totals.kitchen_aerators, "kitchen aerator", "kitchen aerators"),
        plural(totals.bathroom_aerators, "bathroom aerator", "bathroom aerators"),
        plural(totals.shower_heads(), "shower head", "shower heads"),
    ];
    if totals.toilets > 0 {
        installed.push(plural(totals.toilets, "toilet", "toilets"));
    }

    vec![
        greeting,
        format!(
            "This report summarizes the water conservation retrofit completed at {site}. \
             We visited {} units and serviced {} of them.",
            totals.units, totals.units_serviced
        ),
        format!(
            "In total we installed {}. Kitchen and bathroom aerators are rated at {}, \
             shower heads at {} ({} for ADA units) and toilets at {}.",
            installed.join(", "),
            format::AERATOR_RATE,
            format::REGULAR_SHOWER_RATE,
            format::ADA_SHOWER_RATE,
            format::TOILET_RATE
        ),
        "Unit-level details, notes on leaks found during the visit and photos \
         follow on the next pages."
            .to_string(),
    ]
}

/// Plain-text detail table for the terminal.
pub fn build_detail_view(view: &ReportView<'_>, template: &FormatTemplate) -> String {
    let fixtures = view.visible_fixtures();
    let rows = view.unit_rows(template);

    let mut headers: Vec<&str> = vec!["Unit"];
    headers.extend(fixtures.iter().map(|f| f.heading()));
    headers.push("Notes");

    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let mut line = vec![row.unit.clone()];
            line.extend(fixtures.iter().map(|f| {
                row.cell(*f).unwrap_or("").replace('\n', " ")
            }));
            line.push(row.note.clone());
            line
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for line in &table {
        for (i, cell) in line.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let render = |cells: Vec<&str>, out: &mut String| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<w$}", w = *width))
            .collect();
        let _ = writeln!(out, "{}", padded.join(" | ").trim_end());
    };

    render(headers.clone(), &mut output);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(output, "{}", rule.join("-+-"));

    if table.is_empty() {
        let _ = writeln!(output, "No units found in the installation data.");
    }
    for line in &table {
        render(line.iter().map(String::as_str).collect(), &mut output);
    }

    let totals = view.totals();
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} units, {} serviced ({} rows read, {} skipped)",
        totals.units,
        totals.units_serviced,
        view.consolidation.rows_read,
        view.consolidation.rows_skipped
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstallationRecord;

    fn sample_session() -> ReportSession {
        ReportSession {
            installation_data: vec![
                InstallationRecord::from_pairs([
                    ("Unit", "A01"),
                    ("Kitchen Aerator", "2"),
                    ("Bathroom aerator", "2"),
                    ("Shower Head", "1"),
                ]),
                InstallationRecord::from_pairs([
                    ("Unit", "A02"),
                    ("Kitchen Aerator", "1"),
                    ("Bathroom aerator", "1"),
                    ("Shower Head", "2"),
                ]),
            ],
            ..ReportSession::default()
        }
    }

    #[test]
    fn sample_scenario_formats_as_documented() {
        let session = sample_session();
        let view = ReportView::build(&session).unwrap();
        let rows = view.unit_rows(&FormatTemplate::pdf());

        assert_eq!(rows[0].unit, "A01");
        assert_eq!(rows[0].cell(Fixture::Kitchen), Some("1.0 GPM"));
        assert_eq!(rows[0].cell(Fixture::Bathroom), Some("1.0 GPM"));
        assert_eq!(rows[0].cell(Fixture::Shower), Some("1.75 GPM"));
        assert_eq!(rows[1].cell(Fixture::Shower), Some("1.75 GPM (2)"));
        // no toilet column anywhere, so it is not shown
        assert_eq!(rows[0].cell(Fixture::Toilet), None);
    }

    #[test]
    fn overrides_and_renames_flow_into_rows() {
        let mut session = sample_session();
        session.set_override("A02", Fixture::Kitchen, Some("Tenant refused".to_string()));
        session.set_override("A01", Fixture::Toilet, Some("Scheduled".to_string()));
        session.rename_unit("A01", "Bldg 1 / A01");
        session.set_note("A02", Some("Dog in unit".to_string()));

        let view = ReportView::build(&session).unwrap();
        let rows = view.unit_rows(&FormatTemplate::detail());
        assert_eq!(rows[0].unit, "Bldg 1 / A01");
        assert_eq!(rows[0].cell(Fixture::Toilet), Some("Scheduled"));
        assert_eq!(rows[1].cell(Fixture::Toilet), Some("No Touch."));
        assert_eq!(rows[1].cell(Fixture::Kitchen), Some("Tenant refused"));
        assert_eq!(view.notes(), vec![("A02".to_string(), "Dog in unit".to_string())]);
    }

    #[test]
    fn totals_prefer_report_toilet_count() {
        let mut session = sample_session();
        let view = ReportView::build(&session).unwrap();
        let totals = view.totals();
        assert_eq!(totals.units, 2);
        assert_eq!(totals.units_serviced, 2);
        assert_eq!(totals.kitchen_aerators, 2);
        assert_eq!(totals.regular_shower_heads, 3);
        assert_eq!(totals.toilets, 0);

        session.toilet_count = 4;
        let view = ReportView::build(&session).unwrap();
        assert_eq!(view.totals().toilets, 4);
    }

    #[test]
    fn empty_session_cannot_build_a_view() {
        let session = ReportSession::default();
        assert!(matches!(
            ReportView::build(&session),
            Err(ReportError::MissingInput(_))
        ));
    }

    #[test]
    fn detail_view_lists_units_and_hides_empty_columns() {
        let session = sample_session();
        let view = ReportView::build(&session).unwrap();
        let text = build_detail_view(&view, &FormatTemplate::detail());
        assert!(text.contains("Kitchen Aerator"));
        assert!(!text.contains("Toilet"));
        assert!(text.contains("1.75 GPM (2)"));
        assert!(text.contains("2 units, 2 serviced (2 rows read, 0 skipped)"));
    }

    #[test]
    fn letter_mentions_totals() {
        let customer = CustomerInfo {
            customer_name: "Dana Reyes".to_string(),
            property_name: "Maple Court".to_string(),
            ..CustomerInfo::default()
        };
        let totals = InstallTotals {
            units: 3,
            units_serviced: 2,
            kitchen_aerators: 1,
            bathroom_aerators: 2,
            regular_shower_heads: 2,
            ..InstallTotals::default()
        };
        let paragraphs = letter_paragraphs(&customer, &totals);
        assert_eq!(paragraphs[0], "Dear Dana Reyes,");
        assert!(paragraphs[1].contains("Maple Court"));
        assert!(paragraphs[2].contains("1 kitchen aerator, 2 bathroom aerators, 2 shower heads"));
    }
}
