//! Display strings for consolidated fixture quantities.
//!
//! Each renderer carries its own [`FormatTemplate`]. The defaults reproduce the
//! wording each output has always used, and a TOML file can replace them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReportResult;
use crate::models::{ConsolidatedUnit, Fixture};

pub const AERATOR_RATE: &str = "1.0 GPM";
pub const REGULAR_SHOWER_RATE: &str = "1.75 GPM";
pub const ADA_SHOWER_RATE: &str = "1.5 GPM";
pub const TOILET_RATE: &str = "0.8 GPF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureKind {
    KitchenAerator,
    BathroomAerator,
    AdaShowerHead,
    RegularShowerHead,
    Toilet,
}

impl FixtureKind {
    pub fn rate(self) -> &'static str {
        match self {
            FixtureKind::KitchenAerator | FixtureKind::BathroomAerator => AERATOR_RATE,
            FixtureKind::AdaShowerHead => ADA_SHOWER_RATE,
            FixtureKind::RegularShowerHead => REGULAR_SHOWER_RATE,
            FixtureKind::Toilet => TOILET_RATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToiletPhrasing {
    /// `0.8 GPF (2)`
    Rate,
    /// `We replaced both toilets.`
    Narrative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatTemplate {
    pub placeholder: String,
    pub shower_separator: String,
    pub toilet_phrasing: ToiletPhrasing,
}

impl FormatTemplate {
    pub fn pdf() -> Self {
        Self {
            placeholder: "Unable".to_string(),
            shower_separator: ",\n".to_string(),
            toilet_phrasing: ToiletPhrasing::Rate,
        }
    }

    pub fn excel() -> Self {
        Self {
            toilet_phrasing: ToiletPhrasing::Narrative,
            ..Self::pdf()
        }
    }

    pub fn detail() -> Self {
        Self {
            placeholder: "No Touch.".to_string(),
            shower_separator: "; ".to_string(),
            toilet_phrasing: ToiletPhrasing::Rate,
        }
    }
}

impl Default for FormatTemplate {
    fn default() -> Self {
        Self::pdf()
    }
}

/// Templates for every renderer, loadable from TOML:
///
/// ```toml
/// [detail]
/// placeholder = "Not serviced"
/// ```
///
/// Fields left out of a section keep that renderer's own preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TemplateSetToml")]
pub struct TemplateSet {
    pub pdf: FormatTemplate,
    pub excel: FormatTemplate,
    pub detail: FormatTemplate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TemplateToml {
    placeholder: Option<String>,
    shower_separator: Option<String>,
    toilet_phrasing: Option<ToiletPhrasing>,
}

impl TemplateToml {
    fn apply_to(self, preset: FormatTemplate) -> FormatTemplate {
        FormatTemplate {
            placeholder: self.placeholder.unwrap_or(preset.placeholder),
            shower_separator: self.shower_separator.unwrap_or(preset.shower_separator),
            toilet_phrasing: self.toilet_phrasing.unwrap_or(preset.toilet_phrasing),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TemplateSetToml {
    pdf: TemplateToml,
    excel: TemplateToml,
    detail: TemplateToml,
}

impl From<TemplateSetToml> for TemplateSet {
    fn from(raw: TemplateSetToml) -> Self {
        Self {
            pdf: raw.pdf.apply_to(FormatTemplate::pdf()),
            excel: raw.excel.apply_to(FormatTemplate::excel()),
            detail: raw.detail.apply_to(FormatTemplate::detail()),
        }
    }
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self {
            pdf: FormatTemplate::pdf(),
            excel: FormatTemplate::excel(),
            detail: FormatTemplate::detail(),
        }
    }
}

impl TemplateSet {
    pub fn from_toml(text: &str) -> ReportResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> ReportResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

fn rate_with_count(kind: FixtureKind, quantity: u32) -> String {
    if quantity == 1 {
        kind.rate().to_string()
    } else {
        format!("{} ({quantity})", kind.rate())
    }
}

/// Override, else placeholder for zero, else the rate with a count suffix above one.
pub fn format_fixture(
    kind: FixtureKind,
    quantity: u32,
    override_value: Option<&str>,
    template: &FormatTemplate,
) -> String {
    if let Some(text) = override_value {
        return text.to_string();
    }
    if quantity == 0 {
        return template.placeholder.clone();
    }
    rate_with_count(kind, quantity)
}

pub fn format_shower(
    ada: u32,
    regular: u32,
    override_value: Option<&str>,
    template: &FormatTemplate,
) -> String {
    if let Some(text) = override_value {
        return text.to_string();
    }
    let mut clauses = Vec::with_capacity(2);
    if ada > 0 {
        clauses.push(rate_with_count(FixtureKind::AdaShowerHead, ada));
    }
    if regular > 0 {
        clauses.push(rate_with_count(FixtureKind::RegularShowerHead, regular));
    }
    if clauses.is_empty() {
        return template.placeholder.clone();
    }
    clauses.join(&template.shower_separator)
}

pub fn toilet_narrative(quantity: u32) -> String {
    match quantity {
        1 => "We replaced one toilet.".to_string(),
        2 => "We replaced both toilets.".to_string(),
        n => format!("We replaced {n} toilets."),
    }
}

pub fn format_toilet(
    quantity: u32,
    override_value: Option<&str>,
    template: &FormatTemplate,
) -> String {
    if let Some(text) = override_value {
        return text.to_string();
    }
    if quantity == 0 {
        return template.placeholder.clone();
    }
    match template.toilet_phrasing {
        ToiletPhrasing::Rate => rate_with_count(FixtureKind::Toilet, quantity),
        ToiletPhrasing::Narrative => toilet_narrative(quantity),
    }
}

/// Display text for one unit's fixture cell.
pub fn format_cell(
    unit: &ConsolidatedUnit,
    fixture: Fixture,
    override_value: Option<&str>,
    template: &FormatTemplate,
) -> String {
    match fixture {
        Fixture::Kitchen => format_fixture(
            FixtureKind::KitchenAerator,
            unit.kitchen_quantity,
            override_value,
            template,
        ),
        Fixture::Bathroom => format_fixture(
            FixtureKind::BathroomAerator,
            unit.bathroom_quantity,
            override_value,
            template,
        ),
        Fixture::Shower => format_shower(
            unit.shower_ada_quantity,
            unit.shower_regular_quantity,
            override_value,
            template,
        ),
        Fixture::Toilet => format_toilet(unit.toilet_quantity, override_value, template),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_everything() {
        let template = FormatTemplate::pdf();
        assert_eq!(
            format_fixture(FixtureKind::KitchenAerator, 0, Some("Tenant refused"), &template),
            "Tenant refused"
        );
        assert_eq!(
            format_shower(1, 1, Some("Replaced both"), &template),
            "Replaced both"
        );
    }

    #[test]
    fn zero_uses_the_renderer_placeholder() {
        assert_eq!(
            format_fixture(FixtureKind::BathroomAerator, 0, None, &FormatTemplate::pdf()),
            "Unable"
        );
        assert_eq!(
            format_fixture(FixtureKind::BathroomAerator, 0, None, &FormatTemplate::detail()),
            "No Touch."
        );
    }

    #[test]
    fn count_suffix_only_above_one() {
        let template = FormatTemplate::pdf();
        assert_eq!(
            format_fixture(FixtureKind::RegularShowerHead, 1, None, &template),
            "1.75 GPM"
        );
        assert_eq!(
            format_fixture(FixtureKind::AdaShowerHead, 3, None, &template),
            "1.5 GPM (3)"
        );
        assert_eq!(format_toilet(2, None, &template), "0.8 GPF (2)");
    }

    #[test]
    fn shower_joins_differ_by_renderer() {
        assert_eq!(
            format_shower(1, 2, None, &FormatTemplate::pdf()),
            "1.5 GPM,\n1.75 GPM (2)"
        );
        assert_eq!(
            format_shower(1, 2, None, &FormatTemplate::detail()),
            "1.5 GPM; 1.75 GPM (2)"
        );
        assert_eq!(format_shower(0, 0, None, &FormatTemplate::detail()), "No Touch.");
    }

    #[test]
    fn excel_narrates_toilets() {
        let template = FormatTemplate::excel();
        assert_eq!(format_toilet(1, None, &template), "We replaced one toilet.");
        assert_eq!(format_toilet(2, None, &template), "We replaced both toilets.");
        assert_eq!(format_toilet(0, None, &template), "Unable");
    }

    #[test]
    fn partial_sections_keep_their_renderer_preset() {
        let set = TemplateSet::from_toml(
            "[excel]\nplaceholder = \"N/A\"\n\n[detail]\nplaceholder = \"Not serviced\"\n",
        )
        .unwrap();

        assert_eq!(set.excel.placeholder, "N/A");
        assert_eq!(set.excel.toilet_phrasing, ToiletPhrasing::Narrative);
        assert_eq!(format_toilet(2, None, &set.excel), "We replaced both toilets.");

        assert_eq!(set.detail.placeholder, "Not serviced");
        assert_eq!(format_shower(1, 1, None, &set.detail), "1.5 GPM; 1.75 GPM");

        assert_eq!(set.pdf, FormatTemplate::pdf());
    }

    #[test]
    fn empty_template_file_is_the_default_set() {
        assert_eq!(TemplateSet::from_toml("").unwrap(), TemplateSet::default());
        assert!(TemplateSet::from_toml("[excel]\nplaceholdr = \"x\"\n").is_err());
    }
}
