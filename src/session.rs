//! Operator edits for one report, persisted as a JSON file between commands.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consolidate::{CellRef, NoteSelection};
use crate::error::{ReportError, ReportResult};
use crate::models::{CustomerInfo, Fixture, InstallationRecord, ReportData, ReportImage};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSession {
    pub report_id: Option<Uuid>,
    pub title: String,
    pub customer_info: Option<CustomerInfo>,
    pub installation_data: Vec<InstallationRecord>,
    /// Original column header to the header the operator typed.
    pub header_renames: BTreeMap<String, String>,
    /// Unit id as consolidated to the id shown in reports.
    pub unit_renames: BTreeMap<String, String>,
    pub overrides: BTreeMap<String, BTreeMap<Fixture, String>>,
    pub note_overrides: BTreeMap<String, String>,
    pub note_selection: NoteSelection,
    pub images: Vec<ReportImage>,
    pub report_notes: String,
    pub toilet_count: u32,
}

impl ReportSession {
    /// Reads a session file. A missing or unreadable file yields an empty session.
    pub fn load_or_default(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no session file yet");
                return Self::default();
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "could not read session, starting empty");
                return Self::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "corrupt session state, starting empty");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> ReportResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Installation rows with the operator's header renames applied.
    pub fn rows(&self) -> Vec<InstallationRecord> {
        self.installation_data
            .iter()
            .map(|row| {
                let mut row = row.clone();
                for (from, to) in &self.header_renames {
                    row.rename_column(from, to);
                }
                row
            })
            .collect()
    }

    /// Blocks rendering when there is nothing to report on.
    pub fn ensure_exportable(&self) -> ReportResult<&CustomerInfo> {
        if self.installation_data.is_empty() {
            return Err(ReportError::MissingInput(
                "no installation data loaded; import a spreadsheet first".to_string(),
            ));
        }
        self.customer_info.as_ref().ok_or_else(|| {
            ReportError::MissingInput("customer information has not been entered".to_string())
        })
    }

    pub fn override_for(&self, unit: &str, fixture: Fixture) -> Option<&str> {
        self.overrides
            .get(unit)
            .and_then(|cells| cells.get(&fixture))
            .map(String::as_str)
    }

    pub fn note_override(&self, unit: &str) -> Option<&str> {
        self.note_overrides.get(unit).map(String::as_str)
    }

    pub fn display_unit<'a>(&'a self, unit: &'a str) -> &'a str {
        self.unit_renames.get(unit).map(String::as_str).unwrap_or(unit)
    }

    pub fn set_override(&mut self, unit: &str, fixture: Fixture, value: Option<String>) {
        match value {
            Some(text) => {
                self.overrides
                    .entry(unit.to_string())
                    .or_default()
                    .insert(fixture, text);
            }
            None => {
                if let Some(cells) = self.overrides.get_mut(unit) {
                    cells.remove(&fixture);
                    if cells.is_empty() {
                        self.overrides.remove(unit);
                    }
                }
            }
        }
    }

    pub fn set_note(&mut self, unit: &str, text: Option<String>) {
        match text {
            Some(text) => {
                self.note_overrides.insert(unit.to_string(), text);
            }
            None => {
                self.note_overrides.remove(unit);
            }
        }
    }

    pub fn rename_unit(&mut self, unit: &str, display: &str) {
        if unit == display || display.trim().is_empty() {
            self.unit_renames.remove(unit);
        } else {
            self.unit_renames
                .insert(unit.to_string(), display.trim().to_string());
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> ReportResult<()> {
        let known = self
            .installation_data
            .first()
            .map(|row| row.get(from).is_some())
            .unwrap_or(false);
        if !known {
            return Err(ReportError::InvalidInput(format!("no column named '{from}'")));
        }
        if from == to || to.trim().is_empty() {
            self.header_renames.remove(from);
        } else {
            self.header_renames
                .insert(from.to_string(), to.trim().to_string());
        }
        Ok(())
    }

    /// Toggles a whole column as a note source.
    pub fn toggle_note_column(&mut self, column: &str) -> bool {
        let columns = &mut self.note_selection.columns;
        if let Some(pos) = columns.iter().position(|c| c == column) {
            columns.remove(pos);
            false
        } else {
            columns.push(column.to_string());
            true
        }
    }

    /// Toggles a single cell as a note source.
    pub fn toggle_note_cell(&mut self, row: usize, column: &str) -> ReportResult<bool> {
        if row >= self.installation_data.len() {
            return Err(ReportError::InvalidInput(format!(
                "row {row} is out of range ({} rows loaded)",
                self.installation_data.len()
            )));
        }
        let cell = CellRef {
            row,
            column: column.to_string(),
        };
        let cells = &mut self.note_selection.cells;
        if let Some(pos) = cells.iter().position(|c| *c == cell) {
            cells.remove(pos);
            Ok(false)
        } else {
            cells.push(cell);
            Ok(true)
        }
    }

    pub fn add_image(&mut self, image: ReportImage) {
        self.images.push(image);
    }

    pub fn to_report_data(&self, saved_at: DateTime<Utc>) -> ReportData {
        ReportData {
            customer_info: self.customer_info.clone(),
            installation_data: self.installation_data.clone(),
            toilet_count: self.toilet_count,
            report_notes: self.report_notes.clone(),
            saved_at,
        }
    }

    /// Session restored from a stored snapshot. Local-only edits start empty.
    pub fn from_report_data(id: Uuid, title: &str, data: ReportData) -> Self {
        Self {
            report_id: Some(id),
            title: title.to_string(),
            customer_info: data.customer_info,
            installation_data: data.installation_data,
            toilet_count: data.toilet_count,
            report_notes: data.report_notes,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_rows() -> ReportSession {
        ReportSession {
            installation_data: vec![InstallationRecord::from_pairs([
                ("Apt", "101"),
                ("Kit", "1"),
            ])],
            ..ReportSession::default()
        }
    }

    #[test]
    fn corrupt_file_falls_back_to_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(ReportSession::load_or_default(&path), ReportSession::default());

        let missing = dir.path().join("missing.json");
        assert_eq!(ReportSession::load_or_default(&missing), ReportSession::default());
    }

    #[test]
    fn save_and_load_keep_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut session = session_with_rows();
        session.set_override("101", Fixture::Shower, Some("Tenant declined".to_string()));
        session.rename_unit("101", "Apt 101");
        session.save(&path).unwrap();

        let loaded = ReportSession::load_or_default(&path);
        assert_eq!(loaded, session);
        assert_eq!(loaded.override_for("101", Fixture::Shower), Some("Tenant declined"));
        assert_eq!(loaded.display_unit("101"), "Apt 101");
        assert_eq!(loaded.display_unit("102"), "102");
    }

    #[test]
    fn clearing_last_override_drops_the_unit_entry() {
        let mut session = session_with_rows();
        session.set_override("101", Fixture::Kitchen, Some("x".to_string()));
        session.set_override("101", Fixture::Kitchen, None);
        assert!(session.overrides.is_empty());
    }

    #[test]
    fn header_renames_apply_to_rows() {
        let mut session = session_with_rows();
        session.rename_column("Kit", "Kitchen Aerator").unwrap();
        assert!(session.rename_column("Missing", "X").is_err());
        let rows = session.rows();
        assert_eq!(rows[0].get("Kitchen Aerator"), Some("1"));
        assert_eq!(session.installation_data[0].get("Kit"), Some("1"));
    }

    #[test]
    fn export_requires_rows_and_customer() {
        let mut session = ReportSession::default();
        assert!(matches!(
            session.ensure_exportable(),
            Err(ReportError::MissingInput(_))
        ));
        session = session_with_rows();
        assert!(matches!(
            session.ensure_exportable(),
            Err(ReportError::MissingInput(_))
        ));
        session.customer_info = Some(CustomerInfo::default());
        assert!(session.ensure_exportable().is_ok());
    }

    #[test]
    fn note_cells_toggle_and_validate_rows() {
        let mut session = session_with_rows();
        assert!(session.toggle_note_cell(0, "Kit").unwrap());
        assert!(!session.toggle_note_cell(0, "Kit").unwrap());
        assert!(session.toggle_note_cell(5, "Kit").is_err());
        assert!(session.toggle_note_column("Kit"));
        assert_eq!(session.note_selection.columns, vec!["Kit".to_string()]);
    }
}
