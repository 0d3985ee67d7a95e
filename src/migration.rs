//! Backward-compatible normalization of historical template and score
//! shapes.
//!
//! Older sessions stored columns with `type`/`calculationType`/`mappingRules`
//! fields and scores as bare scalars or `{value, factors, history}` objects.
//! Everything entering the engine passes through here first and comes out in
//! the current `formula` + `ScoreValue { parts }` model. These functions are
//! total: malformed fields degrade to defaults, they never abort a load.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::model::{
    Constants, GameTemplate, InputType, MappingRule, QuickAction, RuleMax, ScoreColumn,
    ScoreValue, VariableRef,
};

/// Normalize one column definition, inferring the formula DSL from legacy
/// fields when the current shape markers (`formula` + `inputType`) are not
/// both present.
pub fn migrate_column(raw: &Value) -> ScoreColumn {
    let formula = string_field(raw, "formula").unwrap_or_default();
    let has_input_type = obj_get(raw, "inputType").is_some();

    let mut column = ScoreColumn {
        id: string_field(raw, "id").unwrap_or_default(),
        name: string_field(raw, "name").unwrap_or_default(),
        formula,
        input_type: string_field(raw, "inputType")
            .and_then(|t| t.parse().ok())
            .unwrap_or_default(),
        is_auto: bool_field(raw, "isAuto").unwrap_or(false),
        is_scoring: bool_field(raw, "isScoring").unwrap_or(true),
        variable_map: parse_variable_map(obj_get(raw, "variableMap")),
        functions: parse_functions(obj_get(raw, "functions")),
        f1: non_empty(parse_rules(obj_get(raw, "f1"))),
        constants: Constants {
            c1: obj_get(raw, "constants").and_then(|c| number_field(c, "c1")),
        },
        rounding: string_field(raw, "rounding")
            .and_then(|r| r.parse().ok())
            .unwrap_or_default(),
        quick_actions: parse_quick_actions(obj_get(raw, "quickActions")),
        unit: string_field(raw, "unit"),
        sub_units: string_list(raw, "subUnits"),
        color: string_field(raw, "color"),
    };

    if !column.formula.is_empty() && has_input_type {
        // Already current; just normalize the lookup tables.
        normalize_tables(&mut column);
        return column;
    }

    infer_legacy_shape(raw, &mut column);
    normalize_tables(&mut column);
    column
}

/// Normalize a whole template: every column migrated, presentation fields
/// defaulted, `updatedAt` backfilled from `createdAt`.
pub fn migrate_template(raw: &Value) -> GameTemplate {
    let columns = obj_get(raw, "columns")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(migrate_column).collect())
        .unwrap_or_default();

    let created_at = int_field(raw, "createdAt");
    GameTemplate {
        id: string_field(raw, "id").unwrap_or_default(),
        name: string_field(raw, "name").unwrap_or_default(),
        columns,
        bgg_id: string_field(raw, "bggId"),
        supported_colors: string_list(raw, "supportedColors"),
        has_image: bool_field(raw, "hasImage").unwrap_or(false),
        created_at,
        updated_at: int_field(raw, "updatedAt").or(created_at),
    }
}

/// Rebuild a player's score map against a migrated template. Scores for
/// columns that no longer exist are dropped; value shapes from any era are
/// reduced to `parts`.
pub fn migrate_scores(raw: &Value, template: &GameTemplate) -> BTreeMap<String, ScoreValue> {
    let mut scores = BTreeMap::new();
    let Some(map) = raw.as_object() else {
        return scores;
    };

    for (column_id, value) in map {
        if value.is_null() {
            continue;
        }
        let Some(column) = template.column(column_id) else {
            debug!("dropping score for unknown column '{}'", column_id);
            continue;
        };
        scores.insert(column_id.clone(), migrate_score_value(value, column));
    }
    scores
}

/// Pull a single scalar out of any historical score shape.
pub fn get_raw_value(value: &Value) -> f64 {
    match value {
        Value::Number(_) | Value::Bool(_) | Value::String(_) => {
            value_as_number(value).unwrap_or(0.0)
        }
        Value::Object(_) => {
            if let Some(inner) = obj_get(value, "value") {
                get_raw_value(inner)
            } else if let Some(first) = obj_get(value, "parts")
                .and_then(Value::as_array)
                .and_then(|parts| parts.first())
            {
                value_as_number(first).unwrap_or(0.0)
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// The increment history of a sum-parts value, as the UI displays it.
pub fn get_score_history(value: &Value) -> Vec<String> {
    if let Some(history) = obj_get(value, "history").and_then(Value::as_array) {
        return history
            .iter()
            .filter_map(|entry| match entry {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect();
    }
    if let Some(parts) = obj_get(value, "parts").and_then(Value::as_array) {
        return parts
            .iter()
            .filter_map(value_as_number)
            .map(|n| n.to_string())
            .collect();
    }
    Vec::new()
}

fn migrate_score_value(value: &Value, column: &ScoreColumn) -> ScoreValue {
    // Already current shape.
    if let Some(parts) = obj_get(value, "parts").and_then(Value::as_array) {
        return ScoreValue {
            parts: parts.iter().filter_map(value_as_number).collect(),
        };
    }

    if column.formula.contains("+next") {
        if let Some(history) = obj_get(value, "history").and_then(Value::as_array) {
            return ScoreValue {
                parts: history.iter().filter_map(value_as_number).collect(),
            };
        }
    } else if column.formula == "a1×a2" {
        if let Some(factors) = obj_get(value, "factors").and_then(Value::as_array) {
            return ScoreValue {
                parts: factors.iter().filter_map(value_as_number).collect(),
            };
        }
    }

    ScoreValue::scalar(get_raw_value(value))
}

fn infer_legacy_shape(raw: &Value, column: &mut ScoreColumn) {
    let legacy_type = string_field(raw, "type").unwrap_or_default();
    let calculation = string_field(raw, "calculationType").unwrap_or_default();
    let mapping_rules = parse_rules(obj_get(raw, "mappingRules"));
    let weight = number_field(raw, "weight").unwrap_or(1.0);

    if legacy_type == "select" || legacy_type == "boolean" {
        column.input_type = InputType::Clicker;
        column.formula = "a1".to_string();
        column.quick_actions = synthesize_option_actions(raw, &column.id);
        return;
    }

    match calculation.as_str() {
        "sum-parts" => {
            column.formula = "a1+next".to_string();
            if !column.quick_actions.is_empty() {
                column.input_type = InputType::Clicker;
            }
            return;
        }
        "product" => {
            column.formula = "a1×a2".to_string();
            return;
        }
        _ => {}
    }

    if !mapping_rules.is_empty() {
        column.formula = "f1(a1)".to_string();
        column.f1 = Some(mapping_rules);
        return;
    }

    if weight != 1.0 {
        column.formula = "a1×c1".to_string();
        column.constants.c1 = Some(weight);
    }

    // Pre-formula clicker columns stored their increments as quickButtons.
    if obj_get(raw, "inputType").is_none() {
        if let Some(buttons) = obj_get(raw, "quickButtons").and_then(Value::as_array) {
            column.input_type = InputType::Clicker;
            column.formula = "a1+next".to_string();
            column.quick_actions = buttons
                .iter()
                .enumerate()
                .filter_map(|(idx, button)| {
                    let value = value_as_number(button)?;
                    Some(QuickAction {
                        id: format!("{}-qb{}", column.id, idx + 1),
                        label: format!("{value:+}"),
                        value,
                    })
                })
                .collect();
        }
    }

    if column.formula.is_empty() {
        column.formula = "a1".to_string();
    }
}

/// Clicker actions for legacy select/boolean columns: one per option, or the
/// implicit YES/NO pair.
fn synthesize_option_actions(raw: &Value, column_id: &str) -> Vec<QuickAction> {
    let options = obj_get(raw, "options").and_then(Value::as_array);
    let actions: Vec<QuickAction> = options
        .into_iter()
        .flatten()
        .enumerate()
        .filter_map(|(idx, option)| {
            let (label, value) = match option {
                Value::String(s) => (s.clone(), 0.0),
                Value::Object(_) => (
                    string_field(option, "label")
                        .or_else(|| string_field(option, "name"))
                        .unwrap_or_else(|| format!("Option {}", idx + 1)),
                    number_field(option, "value")
                        .or_else(|| number_field(option, "weight"))
                        .or_else(|| number_field(option, "score"))
                        .unwrap_or(0.0),
                ),
                _ => return None,
            };
            Some(QuickAction {
                id: format!("{column_id}-opt{}", idx + 1),
                label,
                value,
            })
        })
        .collect();

    if !actions.is_empty() {
        return actions;
    }

    let weight = number_field(raw, "weight").unwrap_or(1.0);
    vec![
        QuickAction {
            id: format!("{column_id}-yes"),
            label: "YES".to_string(),
            value: weight,
        },
        QuickAction {
            id: format!("{column_id}-no"),
            label: "NO".to_string(),
            value: 0.0,
        },
    ]
}

/// Backfill `unitScore` on linear rules and keep the `f1` alias and the
/// named table in sync, both directions.
fn normalize_tables(column: &mut ScoreColumn) {
    if let Some(rules) = column.f1.as_mut() {
        backfill_unit_score(rules);
    }
    for rules in column.functions.values_mut() {
        backfill_unit_score(rules);
    }

    if let Some(rules) = &column.f1 {
        if !column.functions.contains_key("f1") {
            let rules = rules.clone();
            column.functions.insert("f1".to_string(), rules);
        }
    } else if let Some(rules) = column.functions.get("f1").cloned() {
        column.f1 = Some(rules);
    }
}

/// Linear rules authored before `unitScore` existed step by `score`.
fn backfill_unit_score(rules: &mut [MappingRule]) {
    for rule in rules {
        if rule.is_linear && rule.unit_score.is_none() {
            rule.unit_score = Some(rule.score);
        }
    }
}

fn parse_rules(value: Option<&Value>) -> Vec<MappingRule> {
    value
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(parse_rule).collect())
        .unwrap_or_default()
}

fn parse_rule(value: &Value) -> Option<MappingRule> {
    value.as_object()?;
    let max = match obj_get(value, "max") {
        Some(Value::String(s)) if s == "next" => Some(RuleMax::Next),
        Some(other) => value_as_number(other).map(RuleMax::Value),
        None => None,
    };
    Some(MappingRule {
        min: number_field(value, "min"),
        max,
        score: number_field(value, "score").unwrap_or(0.0),
        is_linear: bool_field(value, "isLinear").unwrap_or(false),
        unit: number_field(value, "unit"),
        unit_score: number_field(value, "unitScore"),
    })
}

fn parse_variable_map(value: Option<&Value>) -> BTreeMap<String, VariableRef> {
    let Some(map) = value.and_then(Value::as_object) else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(name, var)| {
            let id = string_field(var, "id")?;
            Some((
                name.clone(),
                VariableRef {
                    id,
                    name: string_field(var, "name").unwrap_or_default(),
                    mode: string_field(var, "mode")
                        .and_then(|m| m.parse().ok())
                        .unwrap_or_default(),
                },
            ))
        })
        .collect()
}

fn parse_functions(value: Option<&Value>) -> BTreeMap<String, Vec<MappingRule>> {
    let Some(map) = value.and_then(Value::as_object) else {
        return BTreeMap::new();
    };
    map.iter()
        .map(|(name, rules)| (name.clone(), parse_rules(Some(rules))))
        .collect()
}

fn parse_quick_actions(value: Option<&Value>) -> Vec<QuickAction> {
    let Some(list) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    list.iter()
        .enumerate()
        .filter_map(|(idx, action)| {
            action.as_object()?;
            let label = string_field(action, "label").or_else(|| string_field(action, "name"))?;
            Some(QuickAction {
                id: string_field(action, "id").unwrap_or_else(|| format!("qa{}", idx + 1)),
                label,
                value: number_field(action, "value")
                    .or_else(|| number_field(action, "weight"))
                    .unwrap_or(0.0),
            })
        })
        .collect()
}

// --- tolerant field access ---

fn obj_get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.as_object().and_then(|obj| obj.get(key))
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    obj_get(value, key).and_then(Value::as_str).map(str::to_string)
}

fn number_field(value: &Value, key: &str) -> Option<f64> {
    obj_get(value, key).and_then(value_as_number)
}

fn bool_field(value: &Value, key: &str) -> Option<bool> {
    obj_get(value, key).and_then(Value::as_bool)
}

fn int_field(value: &Value, key: &str) -> Option<i64> {
    obj_get(value, key).and_then(|v| match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    })
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    obj_get(value, key)
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Numbers, booleans and numeric strings all count as numbers in legacy
/// data.
fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty(rules: Vec<MappingRule>) -> Option<Vec<MappingRule>> {
    if rules.is_empty() {
        None
    } else {
        Some(rules)
    }
}
