use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

/// Final rounding applied to a computed column score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Rounding {
    #[default]
    None,
    Floor,
    Ceil,
    Round,
}

/// How a formula variable reads its referenced column: the raw computed
/// value, or a rank/tie transform of it across the whole roster.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VariableMode {
    #[default]
    Value,
    RankScore,
    RankPlayer,
    TieCount,
}

/// Input widget family for a column. Presentational, but migration keys off
/// it to detect already-current column shapes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InputType {
    #[default]
    Numpad,
    Clicker,
}

/// One entry of an auto column's `variableMap`: which column (or sentinel)
/// the variable reads, and through which mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mode: VariableMode,
}

/// Upper bound of a mapping rule. `Next` borrows the following rule's
/// `min - 1`; it round-trips as the JSON string `"next"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleMax {
    Value(f64),
    Next,
}

impl Serialize for RuleMax {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RuleMax::Value(v) => serializer.serialize_f64(*v),
            RuleMax::Next => serializer.serialize_str("next"),
        }
    }
}

impl<'de> Deserialize<'de> for RuleMax {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(f64),
            Text(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Num(v) => Ok(RuleMax::Value(v)),
            Repr::Text(s) if s == "next" => Ok(RuleMax::Next),
            Repr::Text(s) => s
                .parse::<f64>()
                .map(RuleMax::Value)
                .map_err(|_| DeError::custom(format!("invalid rule max '{s}'"))),
        }
    }
}

/// One interval of a range-based lookup table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MappingRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<RuleMax>,
    pub score: f64,
    pub is_linear: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_score: Option<f64>,
}

/// A one-tap increment button on clicker columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuickAction {
    pub id: String,
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Constants {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c1: Option<f64>,
}

/// Definition of one scoring dimension of a template.
///
/// `formula` selects the computation mode: `"a1"` (identity), `"a1×c1"`
/// (constant multiply), `"a1×a2"` (product), `"a1+next"` (running sum),
/// `"f1(a1)"` (lookup), or, when `is_auto` is set, any expression over the
/// declared `variable_map`/`functions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreColumn {
    pub id: String,
    pub name: String,
    pub formula: String,
    pub input_type: InputType,
    pub is_auto: bool,
    pub is_scoring: bool,
    pub variable_map: BTreeMap<String, VariableRef>,
    pub functions: BTreeMap<String, Vec<MappingRule>>,
    /// Legacy alias for `functions["f1"]`, kept in sync by migration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f1: Option<Vec<MappingRule>>,
    pub constants: Constants,
    pub rounding: Rounding,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quick_actions: Vec<QuickAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_units: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Default for ScoreColumn {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            formula: "a1".to_string(),
            input_type: InputType::Numpad,
            is_auto: false,
            is_scoring: true,
            variable_map: BTreeMap::new(),
            functions: BTreeMap::new(),
            f1: None,
            constants: Constants::default(),
            rounding: Rounding::None,
            quick_actions: Vec::new(),
            unit: None,
            sub_units: Vec::new(),
            color: None,
        }
    }
}

impl ScoreColumn {
    /// Rules backing the legacy `f1(a1)` path: the `f1` alias wins, the
    /// named table is the fallback.
    pub fn lookup_rules(&self) -> Option<&[MappingRule]> {
        self.f1
            .as_deref()
            .or_else(|| self.functions.get("f1").map(Vec::as_slice))
    }
}

/// A player's stored input for one column. `parts` is always a flat list of
/// finished numbers; in-progress text input never reaches this shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreValue {
    #[serde(default)]
    pub parts: Vec<f64>,
}

impl ScoreValue {
    pub fn scalar(value: f64) -> Self {
        Self { parts: vec![value] }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Player {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub scores: BTreeMap<String, ScoreValue>,
    /// Derived. Always recomputed from `(scores, columns, roster)`, never
    /// mutated independently.
    pub total_score: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameTemplate {
    pub id: String,
    pub name: String,
    pub columns: Vec<ScoreColumn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgg_id: Option<String>,
    pub supported_colors: Vec<String>,
    pub has_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl GameTemplate {
    pub fn column(&self, id: &str) -> Option<&ScoreColumn> {
        self.columns.iter().find(|c| c.id == id)
    }
}

/// Auxiliary state auto columns need: the full column list for dependency
/// lookups, the current player's sheet, the roster for rank/tie modes, and
/// the recursion depth guard.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub all_columns: &'a [ScoreColumn],
    pub player_scores: &'a BTreeMap<String, ScoreValue>,
    pub all_players: Option<&'a [Player]>,
    pub depth: u8,
}

impl<'a> ScoringContext<'a> {
    pub fn new(
        all_columns: &'a [ScoreColumn],
        player_scores: &'a BTreeMap<String, ScoreValue>,
    ) -> Self {
        Self {
            all_columns,
            player_scores,
            all_players: None,
            depth: 0,
        }
    }

    pub fn with_players(mut self, players: &'a [Player]) -> Self {
        self.all_players = Some(players);
        self
    }

    /// Context for evaluating a referenced column one level deeper, against
    /// the given player's sheet.
    pub fn descend(&self, scores: &'a BTreeMap<String, ScoreValue>) -> Self {
        Self {
            player_scores: scores,
            depth: self.depth + 1,
            ..*self
        }
    }
}
