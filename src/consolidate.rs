use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{ConsolidatedUnit, InstallationRecord};
use crate::resolver::{is_meaningful, ColumnMap, NoteColumns, RoleColumns};

/// Unit values that mark spreadsheet summary rows rather than real units.
pub const SUMMARY_KEYWORDS: [&str; 8] = [
    "total",
    "sum",
    "average",
    "avg",
    "count",
    "header",
    "grand total",
    "subtotal",
];

const LEAK_SEVERITIES: [&str; 3] = ["light", "moderate", "heavy"];

/// A single spreadsheet cell picked by the operator as note text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    /// Index into the session's installation rows, before filtering.
    pub row: usize,
    pub column: String,
}

/// Manually selected note sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteSelection {
    pub columns: Vec<String>,
    pub cells: Vec<CellRef>,
}

/// Units in first-seen order, plus pass statistics.
#[derive(Debug, Clone, Default)]
pub struct Consolidation {
    units: Vec<ConsolidatedUnit>,
    index: HashMap<String, usize>,
    pub rows_read: usize,
    pub rows_skipped: usize,
}

impl Consolidation {
    pub fn get(&self, unit: &str) -> Option<&ConsolidatedUnit> {
        self.index.get(unit).map(|i| &self.units[*i])
    }

    pub fn units(&self) -> &[ConsolidatedUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn entry(&mut self, unit: &str) -> &mut ConsolidatedUnit {
        let next = self.units.len();
        let i = *self.index.entry(unit.to_string()).or_insert(next);
        if i == next {
            self.units.push(ConsolidatedUnit::new(unit));
        }
        &mut self.units[i]
    }
}

/// Leading-integer parse: `"2 heads"` is 2, `"abc"` and negatives are 0.
pub fn parse_integer(value: &str) -> u32 {
    let trimmed = value.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits: String = unsigned.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Presence rule for aerators: anything but empty or `"0"`.
pub fn is_installed(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed != "0"
}

fn matches_summary_keyword(unit_value: &str) -> bool {
    let normalized = unit_value.trim().to_lowercase();
    SUMMARY_KEYWORDS
        .iter()
        .any(|keyword| normalized == *keyword || normalized.contains(keyword))
}

fn carries_data(row: &InstallationRecord, roles: &RoleColumns, notes: &NoteColumns) -> bool {
    roles
        .all()
        .into_iter()
        .chain(notes.leak_columns())
        .any(|column| is_meaningful(row.get(column).unwrap_or("")))
}

/// Whether a row is dropped before consolidation.
///
/// Blank unit values are always dropped. Summary-looking unit values are
/// dropped unless the row carries installation or leak data.
pub fn is_skipped_row(row: &InstallationRecord, columns: &ColumnMap) -> bool {
    let Some(unit_value) = row.get(&columns.unit) else {
        return true;
    };
    if unit_value.trim().is_empty() {
        return true;
    }
    matches_summary_keyword(unit_value) && !carries_data(row, &columns.roles, &columns.notes)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Note fragment for a leak-severity cell, e.g. `"Heavy leak from kitchen faucet."`.
pub fn leak_fragment(value: &str, location: &str) -> Option<String> {
    if !is_meaningful(value) {
        return None;
    }
    let normalized = value.trim().to_lowercase();
    let fragment = match LEAK_SEVERITIES.iter().find(|s| normalized.contains(*s)) {
        Some(severity) => format!("{} leak from {location}.", capitalize(severity)),
        None => format!("Leak from {location}."),
    };
    Some(fragment)
}

/// Note fragments a single row contributes, in unified-note order.
pub fn row_notes(
    index: usize,
    row: &InstallationRecord,
    notes: &NoteColumns,
    selection: &NoteSelection,
) -> Vec<String> {
    let mut fragments = Vec::new();

    for (column, location) in [
        (&notes.kitchen_leak, "kitchen faucet"),
        (&notes.bathroom_leak, "bathroom faucet"),
        (&notes.tub_leak, "tub spout/diverter"),
    ] {
        if let Some(fragment) = leak_fragment(row.value(column.as_deref()), location) {
            fragments.push(fragment);
        }
    }

    let selected_columns = selection.columns.iter().map(String::as_str);
    let selected_cells = selection
        .cells
        .iter()
        .filter(|cell| cell.row == index)
        .map(|cell| cell.column.as_str());
    for column in selected_columns.chain(selected_cells) {
        if notes.notes.as_deref() == Some(column) {
            continue;
        }
        let text = row.get(column).unwrap_or("").trim();
        if !text.is_empty() {
            fragments.push(text.to_string());
        }
    }

    let free_text = row.value(notes.notes.as_deref()).trim();
    if !free_text.is_empty() {
        fragments.push(free_text.to_string());
    }

    fragments
}

/// Groups rows by unit and accumulates fixture quantities and notes.
pub fn consolidate(
    rows: &[InstallationRecord],
    columns: &ColumnMap,
    selection: &NoteSelection,
) -> Consolidation {
    let roles = &columns.roles;
    let mut result = Consolidation {
        rows_read: rows.len(),
        ..Consolidation::default()
    };

    for (index, row) in rows.iter().enumerate() {
        if is_skipped_row(row, columns) {
            result.rows_skipped += 1;
            continue;
        }
        let unit_id = row.value(Some(columns.unit.as_str())).trim().to_string();
        let unit = result.entry(&unit_id);

        if is_installed(row.value(roles.kitchen.as_deref())) {
            unit.kitchen_quantity = 1;
        }

        let bathroom = if roles.bathroom_generic.is_some() {
            u32::from(is_installed(row.value(roles.bathroom_generic.as_deref())))
        } else {
            u32::from(is_installed(row.value(roles.bathroom_guest.as_deref())))
                + u32::from(is_installed(row.value(roles.bathroom_master.as_deref())))
        };
        if bathroom > 0 {
            unit.bathroom_quantity = bathroom;
        }

        let ada = row.value(roles.ada_shower.as_deref());
        if !ada.trim().is_empty() {
            unit.shower_ada_quantity = parse_integer(ada);
        }
        let regular = row.value(roles.regular_shower.as_deref());
        if !regular.trim().is_empty() {
            unit.shower_regular_quantity = parse_integer(regular);
        }
        let toilets = row.value(roles.toilets.as_deref());
        if !toilets.trim().is_empty() {
            unit.toilet_quantity = parse_integer(toilets);
        }

        for note in row_notes(index, row, &columns.notes, selection) {
            unit.add_note(&note);
        }
    }

    tracing::info!(
        rows = result.rows_read,
        skipped = result.rows_skipped,
        units = result.units.len(),
        "consolidated installation rows"
    );
    result
}

/// The note shown for a unit: the user's edit if any, else the derived fragments.
pub fn unified_note(unit: &ConsolidatedUnit, note_override: Option<&str>) -> String {
    if let Some(text) = note_override {
        return text.trim().to_string();
    }
    unit.notes.join(" ").trim().to_string()
}
