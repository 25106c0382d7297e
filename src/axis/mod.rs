//! Sweepable parameters ("axes") and their resolved value lists

pub mod apply;
pub mod order;
pub mod parse;
pub mod registry;

pub use apply::{Apply, Choices, Confirm, Field, Format};
pub use order::{choose_order, Axis, LoopOrder};
pub use parse::{csv_to_list, list_to_csv, resolve_axis, values_to_csv};
pub use registry::{AxisRegistry, ModelCatalog, StaticCatalog};

use crate::error::Result;
use crate::pipeline::{GenerationConfig, GenerationMode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of the placeholder axis used for unused dimensions.
pub const NOTHING: &str = "Nothing";

/// How raw tokens of an axis are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Float,
    Str,
    /// The whole list is replaced by every ordering of itself.
    Permutation,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Int => "integer",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
            ValueKind::Permutation => "permutation",
        }
    }
}

/// A single resolved axis value.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisValue {
    Nothing,
    Int(i64),
    Float(f64),
    Str(String),
    Tokens(Vec<String>),
}

impl AxisValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AxisValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AxisValue::Float(v) => Some(*v),
            AxisValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AxisValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisValue::Nothing => Ok(()),
            AxisValue::Int(v) => write!(f, "{}", v),
            AxisValue::Float(v) => write!(f, "{}", format_float(*v)),
            AxisValue::Str(v) => write!(f, "{}", v),
            AxisValue::Tokens(v) => write!(f, "{}", v.join(", ")),
        }
    }
}

/// Floats rounded to 8 decimals, integral values keep a trailing `.0`.
pub fn format_float(value: f64) -> String {
    let rounded = (value * 1e8).round() / 1e8;
    if rounded.is_finite() && rounded.fract() == 0.0 && rounded.abs() < 1e15 {
        format!("{:.1}", rounded)
    } else {
        format!("{}", rounded)
    }
}

/// Which generation modes offer an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    Both,
    Txt2Img,
    Img2Img,
}

impl Applicability {
    pub fn allows(&self, mode: GenerationMode) -> bool {
        match self {
            Applicability::Both => true,
            Applicability::Txt2Img => mode == GenerationMode::Txt2Img,
            Applicability::Img2Img => mode == GenerationMode::Img2Img,
        }
    }
}

/// Immutable descriptor of one sweepable parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisOption {
    pub label: &'static str,
    pub kind: ValueKind,
    pub apply: Apply,
    pub format: Format,
    pub confirm: Option<Confirm>,
    /// Relative cost of changing this value between consecutive cells.
    pub cost: f64,
    pub choices: Option<Choices>,
    pub applicability: Applicability,
}

impl AxisOption {
    pub const fn new(label: &'static str, kind: ValueKind, apply: Apply) -> Self {
        Self {
            label,
            kind,
            apply,
            format: Format::AddLabel,
            confirm: None,
            cost: 0.0,
            choices: None,
            applicability: Applicability::Both,
        }
    }

    pub const fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub const fn confirm(mut self, confirm: Confirm) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub const fn cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub const fn choices(mut self, choices: Choices) -> Self {
        self.choices = Some(choices);
        self
    }

    pub const fn txt2img(mut self) -> Self {
        self.applicability = Applicability::Txt2Img;
        self
    }

    pub const fn img2img(mut self) -> Self {
        self.applicability = Applicability::Img2Img;
        self
    }

    pub fn is_nothing(&self) -> bool {
        self.label == NOTHING
    }

    /// Seed-like axes get their `-1` values fixed before the sweep.
    pub fn is_seed(&self) -> bool {
        matches!(self.label, "Seed" | "Var. seed")
    }

    pub fn apply_value(
        &self,
        config: &mut GenerationConfig,
        value: &AxisValue,
        all: &[AxisValue],
        catalog: &dyn ModelCatalog,
    ) -> Result<()> {
        self.apply.run(config, value, all, catalog)
    }

    pub fn format_value(&self, value: &AxisValue) -> String {
        self.format.render(self.label, value)
    }

    pub fn validate(
        &self,
        config: &GenerationConfig,
        values: &[AxisValue],
        catalog: &dyn ModelCatalog,
    ) -> Result<()> {
        match &self.confirm {
            Some(confirm) => confirm.check(self.label, config, values, catalog),
            None => Ok(()),
        }
    }

    /// Enumerated legal values, if the axis declares any.
    pub fn choice_list(&self, catalog: &dyn ModelCatalog) -> Option<Vec<String>> {
        self.choices.map(|choices| choices.list(catalog))
    }

    /// The choice list rendered for a free-text box.
    pub fn choices_csv(&self, catalog: &dyn ModelCatalog) -> Result<Option<String>> {
        match self.choice_list(catalog) {
            Some(list) => Ok(Some(list_to_csv(&list)?)),
            None => Ok(None),
        }
    }
}

/// One axis option paired with its resolved values for the current run.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisInfo {
    pub option: AxisOption,
    pub values: Vec<AxisValue>,
    /// Value text as the user gave it, echoed into the grid infotext.
    pub raw: String,
}

impl AxisInfo {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.values.iter().map(|v| self.option.format_value(v)).collect()
    }
}

/// Axis selection as collected from the front end or a sweep file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisSpec {
    #[serde(rename = "type")]
    pub axis_type: String,
    /// Free-text values (CSV, with range shorthands for numeric axes).
    pub values: String,
    /// Values picked from the choice list when not in CSV mode.
    pub selected: Vec<String>,
}

impl AxisSpec {
    pub fn new(axis_type: &str, values: &str) -> Self {
        Self {
            axis_type: axis_type.to_string(),
            values: values.to_string(),
            selected: Vec::new(),
        }
    }

    pub fn nothing() -> Self {
        Self::new(NOTHING, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float_matches_host_display() {
        assert_eq!(format_float(7.0), "7.0");
        assert_eq!(format_float(7.5), "7.5");
        assert_eq!(format_float(0.1 + 0.2), "0.3");
        assert_eq!(format_float(-2.0), "-2.0");
    }

    #[test]
    fn test_applicability() {
        assert!(Applicability::Both.allows(GenerationMode::Img2Img));
        assert!(Applicability::Txt2Img.allows(GenerationMode::Txt2Img));
        assert!(!Applicability::Txt2Img.allows(GenerationMode::Img2Img));
        assert!(!Applicability::Img2Img.allows(GenerationMode::Txt2Img));
    }

    #[test]
    fn test_axis_value_accessors() {
        assert_eq!(AxisValue::Int(3).as_float(), Some(3.0));
        assert_eq!(AxisValue::Float(3.5).as_int(), None);
        assert_eq!(AxisValue::Str("a".into()).as_str(), Some("a"));
        assert_eq!(AxisValue::Tokens(vec!["a".into(), "b".into()]).to_string(), "a, b");
    }
}
