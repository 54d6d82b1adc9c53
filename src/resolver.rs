//! Column discovery for spreadsheets with inconsistent headers.
//!
//! Fixture columns are ranked by how much real data they carry, so an empty
//! decoy column with a similar name loses to the populated one. The unit
//! column uses a strict priority search and always resolves when the rows
//! have any columns at all.

use crate::models::{ColumnRole, InstallationRecord};

/// Cell contents that count as "nothing recorded".
pub const PLACEHOLDER_VALUES: [&str; 6] = ["", "0", "no", "n/a", "na", "none"];

pub const UNIT_COMPOUND_NAME: &str = "BLDG/UNIT";
const UNIT_COMPOUND_TOKENS: [&str; 2] = ["bldg", "unit"];
const UNIT_KEYWORDS: [&str; 5] = ["unit", "apt", "apartment", "room", "number"];

pub const TOILET_COLUMN_PREFIX: &str = "Toilets Installed";

/// How a semantic role is looked up by name.
#[derive(Debug, Clone, Copy)]
pub struct RoleSpec {
    pub candidates: &'static [&'static str],
    /// The column name must contain a word starting with one of these.
    pub require_any: &'static [&'static str],
    /// The column name must not contain a word starting with any of these.
    pub forbid: &'static [&'static str],
}

pub const KITCHEN_AERATOR: RoleSpec = RoleSpec {
    candidates: &["Kitchen Aerator", "kitchen aerator", "kitchen"],
    require_any: &[],
    forbid: &["leak"],
};

pub const BATHROOM_AERATOR_GUEST: RoleSpec = RoleSpec {
    candidates: &[
        "Bathroom Aerator Guest",
        "Guest Bathroom Aerator",
        "bathroom aerator guest",
        "guest bath",
    ],
    require_any: &["guest"],
    forbid: &["leak"],
};

pub const BATHROOM_AERATOR_MASTER: RoleSpec = RoleSpec {
    candidates: &[
        "Bathroom Aerator Master",
        "Master Bathroom Aerator",
        "bathroom aerator master",
        "master bath",
    ],
    require_any: &["master"],
    forbid: &["leak"],
};

/// Used presence-only when a sheet has neither guest nor master columns.
pub const BATHROOM_AERATOR_GENERIC: RoleSpec = RoleSpec {
    candidates: &["Bathroom Aerator", "bathroom aerator", "bath aerator", "bathroom"],
    require_any: &[],
    forbid: &["leak", "guest", "master"],
};

pub const ADA_SHOWER_HEAD: RoleSpec = RoleSpec {
    candidates: &["ADA Shower Head", "ada shower head", "ada shower", "ada"],
    require_any: &["ada"],
    forbid: &["leak"],
};

pub const REGULAR_SHOWER_HEAD: RoleSpec = RoleSpec {
    candidates: &["Shower Head", "shower head", "showerhead", "shower"],
    require_any: &[],
    forbid: &["ada", "leak"],
};

pub const KITCHEN_LEAK: RoleSpec = RoleSpec {
    candidates: &["Kitchen Leak", "Leak Kitchen", "kitchen faucet leak"],
    require_any: &["leak"],
    forbid: &[],
};

pub const BATHROOM_LEAK: RoleSpec = RoleSpec {
    candidates: &["Bathroom Leak", "Leak Bathroom", "bath faucet leak"],
    require_any: &["leak"],
    forbid: &[],
};

pub const TUB_LEAK: RoleSpec = RoleSpec {
    candidates: &["Tub Spout", "Diverter", "tub leak"],
    require_any: &[],
    forbid: &[],
};

pub const NOTES: RoleSpec = RoleSpec {
    candidates: &["Notes", "notes", "Note", "Comments"],
    require_any: &[],
    forbid: &[],
};

/// Whether a cell holds real data rather than a placeholder.
pub fn is_meaningful(value: &str) -> bool {
    let normalized = value.trim().to_lowercase();
    !PLACEHOLDER_VALUES.contains(&normalized.as_str())
}

fn name_matches(column: &str, candidate: &str) -> bool {
    if column == candidate {
        return true;
    }
    let column = column.to_lowercase();
    let candidate = candidate.to_lowercase();
    column == candidate || column.contains(&candidate) || candidate.contains(&column)
}

fn has_word(column: &str, prefix: &str) -> bool {
    column
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word.to_lowercase().starts_with(prefix))
}

fn meaningful_count(rows: &[InstallationRecord], column: &str) -> usize {
    rows.iter()
        .filter(|row| is_meaningful(row.get(column).unwrap_or("")))
        .count()
}

/// Best column for any of `candidates`, ranked by meaningful-value count.
///
/// Only the first row's columns are considered. Ties keep column order, and a
/// lone match with no data is still returned.
pub fn resolve_column(rows: &[InstallationRecord], candidates: &[&str]) -> Option<String> {
    resolve_column_where(rows, candidates, |_| true)
}

/// [`resolve_column`] restricted to columns accepted by `accept`.
pub fn resolve_column_where<F>(
    rows: &[InstallationRecord],
    candidates: &[&str],
    accept: F,
) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    let first = rows.first()?;
    let mut matches: Vec<(&str, usize)> = first
        .columns()
        .filter(|column| !column.trim().is_empty())
        .filter(|column| accept(*column))
        .filter(|column| candidates.iter().any(|c| name_matches(column, c)))
        .map(|column| (column, meaningful_count(rows, column)))
        .collect();

    // sort_by is stable, so equal counts keep first-encountered order
    matches.sort_by(|a, b| b.1.cmp(&a.1));
    matches.first().map(|(column, _)| column.to_string())
}

/// Resolves a [`RoleSpec`], skipping any column already claimed.
pub fn resolve_role(
    rows: &[InstallationRecord],
    spec: &RoleSpec,
    claimed: &[&str],
) -> Option<String> {
    resolve_column_where(rows, spec.candidates, |column| {
        !claimed.contains(&column)
            && (spec.require_any.is_empty()
                || spec.require_any.iter().any(|word| has_word(column, word)))
            && !spec.forbid.iter().any(|word| has_word(column, word))
    })
}

/// Finds the unit column by priority rather than by data volume.
pub fn resolve_unit_column(rows: &[InstallationRecord]) -> Option<String> {
    let first = rows.first()?;

    if let Some(column) = first.columns().find(|c| *c == UNIT_COMPOUND_NAME) {
        return Some(column.to_string());
    }

    if let Some(column) = first.columns().find(|c| {
        let lower = c.to_lowercase();
        UNIT_COMPOUND_TOKENS.iter().all(|token| lower.contains(token))
    }) {
        return Some(column.to_string());
    }

    for keyword in UNIT_KEYWORDS {
        if let Some(column) = first
            .columns()
            .find(|c| c.to_lowercase().contains(keyword))
        {
            return Some(column.to_string());
        }
    }

    first.first_column().map(str::to_string)
}

/// First column whose name starts with the toilets-installed prefix.
pub fn find_toilet_column(rows: &[InstallationRecord]) -> Option<String> {
    let prefix = TOILET_COLUMN_PREFIX.to_lowercase();
    rows.first()?
        .columns()
        .find(|c| c.trim().to_lowercase().starts_with(&prefix))
        .map(str::to_string)
}

/// Fixture columns for one batch. `None` means the sheet has no such column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleColumns {
    pub kitchen: Option<String>,
    pub bathroom_guest: Option<String>,
    pub bathroom_master: Option<String>,
    /// Set only when neither guest nor master resolved.
    pub bathroom_generic: Option<String>,
    pub ada_shower: Option<String>,
    pub regular_shower: Option<String>,
    pub toilets: Option<String>,
}

impl RoleColumns {
    pub fn column(&self, role: ColumnRole) -> Option<&str> {
        match role {
            ColumnRole::UnitId => None,
            ColumnRole::KitchenAerator => self.kitchen.as_deref(),
            ColumnRole::BathroomAeratorGuest => self
                .bathroom_guest
                .as_deref()
                .or(self.bathroom_generic.as_deref()),
            ColumnRole::BathroomAeratorMaster => self.bathroom_master.as_deref(),
            ColumnRole::AdaShowerHead => self.ada_shower.as_deref(),
            ColumnRole::RegularShowerHead => self.regular_shower.as_deref(),
            ColumnRole::ToiletsInstalled => self.toilets.as_deref(),
        }
    }

    pub fn all(&self) -> Vec<&str> {
        [
            &self.kitchen,
            &self.bathroom_guest,
            &self.bathroom_master,
            &self.bathroom_generic,
            &self.ada_shower,
            &self.regular_shower,
            &self.toilets,
        ]
        .into_iter()
        .filter_map(|c| c.as_deref())
        .collect()
    }
}

/// Columns that feed the unified note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteColumns {
    pub kitchen_leak: Option<String>,
    pub bathroom_leak: Option<String>,
    pub tub_leak: Option<String>,
    pub notes: Option<String>,
}

impl NoteColumns {
    pub fn leak_columns(&self) -> Vec<&str> {
        [&self.kitchen_leak, &self.bathroom_leak, &self.tub_leak]
            .into_iter()
            .filter_map(|c| c.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub unit: String,
    pub roles: RoleColumns,
    pub notes: NoteColumns,
}

pub fn resolve_roles(rows: &[InstallationRecord], unit_column: &str) -> RoleColumns {
    let mut claimed: Vec<String> = vec![unit_column.to_string()];
    let take = |spec: &RoleSpec, claimed_cols: &mut Vec<String>| {
        let refs: Vec<&str> = claimed_cols.iter().map(String::as_str).collect();
        let found = resolve_role(rows, spec, &refs);
        if let Some(column) = &found {
            claimed_cols.push(column.clone());
        }
        found
    };

    let toilets = find_toilet_column(rows);
    if let Some(column) = &toilets {
        claimed.push(column.clone());
    }

    let kitchen = take(&KITCHEN_AERATOR, &mut claimed);
    let bathroom_guest = take(&BATHROOM_AERATOR_GUEST, &mut claimed);
    let bathroom_master = take(&BATHROOM_AERATOR_MASTER, &mut claimed);
    let bathroom_generic = if bathroom_guest.is_none() && bathroom_master.is_none() {
        take(&BATHROOM_AERATOR_GENERIC, &mut claimed)
    } else {
        None
    };
    let ada_shower = take(&ADA_SHOWER_HEAD, &mut claimed);
    let regular_shower = take(&REGULAR_SHOWER_HEAD, &mut claimed);

    RoleColumns {
        kitchen,
        bathroom_guest,
        bathroom_master,
        bathroom_generic,
        ada_shower,
        regular_shower,
        toilets,
    }
}

pub fn resolve_note_columns(
    rows: &[InstallationRecord],
    unit_column: &str,
    roles: &RoleColumns,
) -> NoteColumns {
    let mut claimed: Vec<&str> = roles.all();
    claimed.push(unit_column);

    let kitchen_leak = resolve_role(rows, &KITCHEN_LEAK, &claimed);
    if let Some(column) = kitchen_leak.as_deref() {
        claimed.push(column);
    }
    let bathroom_leak = resolve_role(rows, &BATHROOM_LEAK, &claimed);
    if let Some(column) = bathroom_leak.as_deref() {
        claimed.push(column);
    }
    let tub_leak = resolve_role(rows, &TUB_LEAK, &claimed);
    if let Some(column) = tub_leak.as_deref() {
        claimed.push(column);
    }
    let notes = resolve_role(rows, &NOTES, &claimed);

    NoteColumns {
        kitchen_leak,
        bathroom_leak,
        tub_leak,
        notes,
    }
}

/// Resolves every role for a batch. `None` when there are no rows or columns.
pub fn resolve(rows: &[InstallationRecord]) -> Option<ColumnMap> {
    let unit = resolve_unit_column(rows)?;
    let roles = resolve_roles(rows, &unit);
    let notes = resolve_note_columns(rows, &unit, &roles);

    tracing::debug!(column = %unit, "resolved {}", ColumnRole::UnitId.label());
    for role in [
        ColumnRole::KitchenAerator,
        ColumnRole::BathroomAeratorGuest,
        ColumnRole::BathroomAeratorMaster,
        ColumnRole::AdaShowerHead,
        ColumnRole::RegularShowerHead,
        ColumnRole::ToiletsInstalled,
    ] {
        match roles.column(role) {
            Some(column) => tracing::debug!(column, "resolved {}", role.label()),
            None => tracing::debug!("no column for {}", role.label()),
        }
    }

    Some(ColumnMap { unit, roles, notes })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> InstallationRecord {
        InstallationRecord::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn empty_rows_resolve_nothing() {
        assert_eq!(resolve_column(&[], &["Kitchen Aerator"]), None);
        assert_eq!(resolve_unit_column(&[]), None);
    }

    #[test]
    fn matches_exact_case_insensitive_and_substring() {
        let rows = vec![row(&[("kitchen aerator qty", "1"), ("Other", "x")])];
        assert_eq!(
            resolve_column(&rows, &["Kitchen Aerator"]),
            Some("kitchen aerator qty".to_string())
        );

        let rows = vec![row(&[("Kitchen", "1")])];
        // candidate contains column name
        assert_eq!(
            resolve_column(&rows, &["Kitchen Aerator"]),
            Some("Kitchen".to_string())
        );
    }

    #[test]
    fn no_match_returns_none() {
        let rows = vec![row(&[("Unit", "A01"), ("Toilet", "1")])];
        assert_eq!(resolve_column(&rows, &["Shower Head"]), None);
    }

    #[test]
    fn prefers_column_with_more_meaningful_values() {
        let rows = vec![
            row(&[("Kitchen Aerator", "N/A"), ("Kitchen Aerator Installed", "1")]),
            row(&[("Kitchen Aerator", "0"), ("Kitchen Aerator Installed", "yes")]),
        ];
        assert_eq!(
            resolve_column(&rows, &["Kitchen Aerator"]),
            Some("Kitchen Aerator Installed".to_string())
        );
    }

    #[test]
    fn ties_keep_column_order() {
        let rows = vec![row(&[("Shower A", "1"), ("Shower B", "1")])];
        assert_eq!(resolve_column(&rows, &["shower"]), Some("Shower A".to_string()));

        let rows = vec![row(&[("Shower B", "1"), ("Shower A", "1")])];
        assert_eq!(resolve_column(&rows, &["shower"]), Some("Shower B".to_string()));
    }

    #[test]
    fn lone_empty_match_is_still_returned() {
        let rows = vec![row(&[("Unit", "A01"), ("Shower Head", "")])];
        assert_eq!(
            resolve_column(&rows, &["Shower Head"]),
            Some("Shower Head".to_string())
        );
    }

    #[test]
    fn only_first_row_columns_are_considered() {
        let rows = vec![row(&[("Unit", "A01")]), row(&[("Unit", "A02"), ("Shower", "1")])];
        assert_eq!(resolve_column(&rows, &["Shower"]), None);
    }

    #[test]
    fn unit_column_priority_order() {
        let rows = vec![row(&[("Apt", "1"), ("BLDG/UNIT", "B-1")])];
        assert_eq!(resolve_unit_column(&rows), Some("BLDG/UNIT".to_string()));

        let rows = vec![row(&[("Apt", "1"), ("Bldg Unit No", "B-1")])];
        assert_eq!(resolve_unit_column(&rows), Some("Bldg Unit No".to_string()));

        let rows = vec![row(&[("Room Number", "1"), ("Unit", "B-1")])];
        assert_eq!(resolve_unit_column(&rows), Some("Unit".to_string()));

        let rows = vec![row(&[("Code", "X1"), ("Kitchen", "1")])];
        assert_eq!(resolve_unit_column(&rows), Some("Code".to_string()));
    }

    #[test]
    fn toilet_column_found_by_prefix() {
        let rows = vec![row(&[("Unit", "A01"), ("Toilets Installed: 0.8 GPF", "2")])];
        assert_eq!(
            find_toilet_column(&rows),
            Some("Toilets Installed: 0.8 GPF".to_string())
        );
        let rows = vec![row(&[("Unit", "A01"), ("Toilet", "2")])];
        assert_eq!(find_toilet_column(&rows), None);
    }

    #[test]
    fn generic_headers_do_not_leak_into_split_roles() {
        let rows = vec![row(&[
            ("Unit", "A01"),
            ("Kitchen Aerator", "2"),
            ("Bathroom aerator", "2"),
            ("Shower Head", "1"),
        ])];
        let map = resolve(&rows).unwrap();
        assert_eq!(map.unit, "Unit");
        assert_eq!(map.roles.kitchen.as_deref(), Some("Kitchen Aerator"));
        assert_eq!(map.roles.bathroom_guest, None);
        assert_eq!(map.roles.bathroom_master, None);
        assert_eq!(map.roles.bathroom_generic.as_deref(), Some("Bathroom aerator"));
        assert_eq!(map.roles.ada_shower, None);
        assert_eq!(map.roles.regular_shower.as_deref(), Some("Shower Head"));
    }

    #[test]
    fn split_roles_resolve_to_distinct_columns() {
        let rows = vec![row(&[
            ("Unit", "A01"),
            ("Guest Bathroom Aerator", "1"),
            ("Master Bathroom Aerator", "1"),
            ("ADA Shower Head", "1"),
            ("Shower Head", "1"),
            ("Kitchen Leak", "Light"),
            ("Notes", "checked"),
        ])];
        let map = resolve(&rows).unwrap();
        assert_eq!(
            map.roles.bathroom_guest.as_deref(),
            Some("Guest Bathroom Aerator")
        );
        assert_eq!(
            map.roles.bathroom_master.as_deref(),
            Some("Master Bathroom Aerator")
        );
        assert_eq!(map.roles.bathroom_generic, None);
        assert_eq!(map.roles.ada_shower.as_deref(), Some("ADA Shower Head"));
        assert_eq!(map.roles.regular_shower.as_deref(), Some("Shower Head"));
        assert_eq!(map.roles.kitchen, None);
        assert_eq!(map.notes.kitchen_leak.as_deref(), Some("Kitchen Leak"));
        assert_eq!(map.notes.notes.as_deref(), Some("Notes"));
    }

    #[test]
    fn meaningful_values_ignore_placeholders() {
        for value in ["", " 0 ", "No", "N/A", "na", "NONE"] {
            assert!(!is_meaningful(value), "{value:?}");
        }
        assert!(is_meaningful("1"));
        assert!(is_meaningful("installed"));
    }
}
