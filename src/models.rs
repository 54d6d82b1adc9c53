use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// One spreadsheet row. Column order is kept as read from the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallationRecord {
    fields: Vec<(String, String)>,
}

impl InstallationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Self::new();
        for (column, value) in pairs {
            record.insert(column, value);
        }
        record
    }

    /// Sets a column value, replacing an existing column of the same name in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Value of an optionally resolved column, empty when either is missing.
    pub fn value(&self, column: Option<&str>) -> &str {
        column.and_then(|name| self.get(name)).unwrap_or("")
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn first_column(&self) -> Option<&str> {
        self.fields.first().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        if from == to || self.get(to).is_some() {
            return;
        }
        if let Some(entry) = self.fields.iter_mut().find(|(name, _)| name == from) {
            entry.0 = to.to_string();
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for InstallationRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for InstallationRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = InstallationRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column names to cell values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut record = InstallationRecord::new();
                while let Some((name, value)) =
                    access.next_entry::<String, serde_json::Value>()?
                {
                    let text = match value {
                        serde_json::Value::Null => String::new(),
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    record.insert(name, text);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    UnitId,
    KitchenAerator,
    BathroomAeratorGuest,
    BathroomAeratorMaster,
    AdaShowerHead,
    RegularShowerHead,
    ToiletsInstalled,
}

impl ColumnRole {
    pub fn label(self) -> &'static str {
        match self {
            ColumnRole::UnitId => "unit id",
            ColumnRole::KitchenAerator => "kitchen aerator",
            ColumnRole::BathroomAeratorGuest => "bathroom aerator (guest)",
            ColumnRole::BathroomAeratorMaster => "bathroom aerator (master)",
            ColumnRole::AdaShowerHead => "ADA shower head",
            ColumnRole::RegularShowerHead => "regular shower head",
            ColumnRole::ToiletsInstalled => "toilets installed",
        }
    }
}

/// Report cell a user can override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fixture {
    Kitchen,
    Bathroom,
    Shower,
    Toilet,
}

impl Fixture {
    pub const ALL: [Fixture; 4] = [
        Fixture::Kitchen,
        Fixture::Bathroom,
        Fixture::Shower,
        Fixture::Toilet,
    ];

    pub fn heading(self) -> &'static str {
        match self {
            Fixture::Kitchen => "Kitchen Aerator",
            Fixture::Bathroom => "Bathroom Aerator",
            Fixture::Shower => "Shower Head",
            Fixture::Toilet => "Toilet",
        }
    }
}

impl std::str::FromStr for Fixture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kitchen" => Ok(Fixture::Kitchen),
            "bathroom" | "bath" => Ok(Fixture::Bathroom),
            "shower" => Ok(Fixture::Shower),
            "toilet" => Ok(Fixture::Toilet),
            other => Err(format!(
                "unknown fixture '{other}' (expected kitchen, bathroom, shower or toilet)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedUnit {
    pub unit: String,
    pub kitchen_quantity: u32,
    pub bathroom_quantity: u32,
    pub shower_ada_quantity: u32,
    pub shower_regular_quantity: u32,
    pub toilet_quantity: u32,
    pub notes: Vec<String>,
}

impl ConsolidatedUnit {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            ..Self::default()
        }
    }

    /// Appends a note unless an identical one is already recorded.
    pub fn add_note(&mut self, note: &str) {
        let note = note.trim();
        if note.is_empty() || self.notes.iter().any(|existing| existing == note) {
            return;
        }
        self.notes.push(note.to_string());
    }

    pub fn quantity(&self, fixture: Fixture) -> u32 {
        match fixture {
            Fixture::Kitchen => self.kitchen_quantity,
            Fixture::Bathroom => self.bathroom_quantity,
            Fixture::Shower => self.shower_ada_quantity + self.shower_regular_quantity,
            Fixture::Toilet => self.toilet_quantity,
        }
    }

    pub fn has_installations(&self) -> bool {
        Fixture::ALL.iter().any(|fixture| self.quantity(*fixture) > 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerInfo {
    pub customer_name: String,
    pub property_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub date: Option<NaiveDate>,
}

impl CustomerInfo {
    pub fn city_line(&self) -> String {
        let mut line = self.city.trim().to_string();
        if !self.state.trim().is_empty() {
            if !line.is_empty() {
                line.push_str(", ");
            }
            line.push_str(self.state.trim());
        }
        if !self.zip.trim().is_empty() {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(self.zip.trim());
        }
        line
    }

    pub fn display_name(&self) -> &str {
        if self.property_name.trim().is_empty() {
            self.customer_name.trim()
        } else {
            self.property_name.trim()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportImage {
    pub unit: String,
    pub file_name: String,
    pub path: Option<String>,
    pub caption: Option<String>,
    pub url: Option<String>,
}

/// Snapshot persisted by the report store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub customer_info: Option<CustomerInfo>,
    #[serde(default)]
    pub installation_data: Vec<InstallationRecord>,
    #[serde(default)]
    pub toilet_count: u32,
    #[serde(default)]
    pub report_notes: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SavedReportSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub success: bool,
    pub id: Option<Uuid>,
    pub message: Option<String>,
}

impl SaveOutcome {
    pub fn saved(id: Uuid) -> Self {
        Self {
            success: true,
            id: Some(id),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            id: None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_column_order_through_json() {
        let json = r#"{"Unit":"A01","Kitchen Aerator":2,"Notes":null}"#;
        let record: InstallationRecord = serde_json::from_str(json).unwrap();
        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(columns, vec!["Unit", "Kitchen Aerator", "Notes"]);
        assert_eq!(record.get("Kitchen Aerator"), Some("2"));
        assert_eq!(record.get("Notes"), Some(""));

        let back = serde_json::to_string(&record).unwrap();
        assert_eq!(back, r#"{"Unit":"A01","Kitchen Aerator":"2","Notes":""}"#);
    }

    #[test]
    fn rename_column_keeps_position() {
        let mut record = InstallationRecord::from_pairs([("Apt", "1"), ("Kit", "1")]);
        record.rename_column("Kit", "Kitchen Aerator");
        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(columns, vec!["Apt", "Kitchen Aerator"]);
    }

    #[test]
    fn add_note_skips_duplicates() {
        let mut unit = ConsolidatedUnit::new("A01");
        unit.add_note("Heavy leak from kitchen faucet.");
        unit.add_note("Heavy leak from kitchen faucet.");
        unit.add_note("  ");
        assert_eq!(unit.notes.len(), 1);
    }

    #[test]
    fn fixture_parses_case_insensitively() {
        assert_eq!("Shower".parse::<Fixture>(), Ok(Fixture::Shower));
        assert!("sink".parse::<Fixture>().is_err());
    }
}
