//! Column score computation.
//!
//! [`calculate_column_score`] is the central dispatcher: given a column
//! definition and either raw input parts or (for auto columns) a scoring
//! context, it produces the final numeric score. Every function here is
//! total and synchronous; a misconfigured template degrades to a wrong but
//! stable number, never a panic, so the render path can call in freely.

pub mod formula;
pub mod lookup;
pub mod ranking;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{debug, warn};

use crate::consts::{MAX_AUTO_DEPTH, PLAYER_COUNT_ID};
use crate::model::{
    GameTemplate, Player, Rounding, ScoreColumn, ScoreValue, ScoringContext, VariableMode,
};
use self::formula::{FunctionMap, NamedFunction};
use self::lookup::LookupTable;

/// Why an auto column cannot produce a trustworthy number. Reported by
/// [`get_auto_column_error`] only; the live calculator keeps rendering a
/// degraded score so the scoreboard never blanks out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AutoColumnError {
    MissingDependency,
    MathError,
}

/// Compute one column's final score (after rounding).
///
/// Auto columns ignore `parts` and read everything through `context`;
/// calling one without a context yields 0. Non-auto columns dispatch on the
/// formula DSL: `"a1+next"` sums the parts, `"a1×a2"` multiplies the first
/// two, `"f1..."` runs the legacy lookup, anything else reads `parts[0]`
/// (times `c1` when the formula is exactly `"a1×c1"`).
pub fn calculate_column_score(
    column: &ScoreColumn,
    parts: &[f64],
    context: Option<&ScoringContext>,
) -> f64 {
    if column.is_auto {
        return match context {
            Some(ctx) => auto_score(column, ctx),
            None => 0.0,
        };
    }

    // No input, no score.
    if parts.is_empty() {
        return 0.0;
    }

    let raw = if column.formula.contains("+next") {
        parts.iter().sum()
    } else if column.formula == "a1×a2" {
        // A missing second factor is an identity multiplier, not zero.
        let a1 = parts.first().copied().unwrap_or(0.0);
        let a2 = parts.get(1).copied().unwrap_or(1.0);
        a1 * a2
    } else if column.formula.starts_with("f1") {
        let table = column
            .lookup_rules()
            .map(LookupTable::new)
            .unwrap_or_default();
        table.apply(parts.first().copied().unwrap_or(0.0))
    } else {
        let base = parts.first().copied().unwrap_or(0.0);
        if column.formula == "a1×c1" {
            base * column.constants.c1.unwrap_or(1.0)
        } else {
            base
        }
    };

    apply_rounding(raw, column.rounding)
}

/// Read-only diagnostic for auto columns; never mutates, never panics.
///
/// `MissingDependency` when any non-sentinel variable points at a column id
/// absent from the context. Otherwise the formula is dry-run with every
/// variable at 1 and every function as identity; a formula that cannot
/// produce a finite number from that input is broken regardless of live
/// inputs and reports `MathError`.
pub fn get_auto_column_error(
    column: &ScoreColumn,
    context: Option<&ScoringContext>,
) -> Option<AutoColumnError> {
    if !column.is_auto {
        return None;
    }
    let ctx = context?;

    for var in column.variable_map.values() {
        if var.id != PLAYER_COUNT_ID && !ctx.all_columns.iter().any(|c| c.id == var.id) {
            return Some(AutoColumnError::MissingDependency);
        }
    }

    let idents = self::formula::extract_identifiers(&column.formula);
    let mut variables: BTreeMap<String, f64> = column
        .variable_map
        .keys()
        .map(|name| (name.clone(), 1.0))
        .collect();
    for name in &idents.vars {
        variables.entry(name.clone()).or_insert(1.0);
    }

    let mut functions = FunctionMap::new();
    for name in column.functions.keys().chain(idents.funcs.iter()) {
        functions
            .entry(name.clone())
            .or_insert_with(|| Box::new(|v| v) as NamedFunction);
    }

    match formula::try_evaluate(&column.formula, &variables, &functions) {
        Ok(value) if value.is_finite() => None,
        _ => Some(AutoColumnError::MathError),
    }
}

/// Sum a player's scoring columns. `totalScore` is always this, recomputed,
/// never cached.
pub fn calculate_player_total(
    player: &Player,
    template: &GameTemplate,
    all_players: Option<&[Player]>,
) -> f64 {
    template
        .columns
        .iter()
        .filter(|column| column.is_scoring)
        .map(|column| {
            let parts = player
                .scores
                .get(&column.id)
                .map(|v| v.parts.as_slice())
                .unwrap_or(&[]);
            let mut ctx = ScoringContext::new(&template.columns, &player.scores);
            if let Some(players) = all_players {
                ctx = ctx.with_players(players);
            }
            calculate_column_score(column, parts, Some(&ctx))
        })
        .sum()
}

fn auto_score(column: &ScoreColumn, ctx: &ScoringContext) -> f64 {
    if ctx.depth > MAX_AUTO_DEPTH {
        warn!(
            "column '{}' exceeded auto recursion depth {}",
            column.id, MAX_AUTO_DEPTH
        );
        return 0.0;
    }
    let variables = resolve_variables(column, ctx);
    let functions = build_functions(column);
    let value = formula::evaluate_formula(&column.formula, &variables, &functions);
    apply_rounding(value, column.rounding)
}

fn resolve_variables(column: &ScoreColumn, ctx: &ScoringContext) -> BTreeMap<String, f64> {
    let mut variables = BTreeMap::new();
    for (name, var) in &column.variable_map {
        let value = if var.id == PLAYER_COUNT_ID {
            ctx.all_players.map_or(0.0, |players| players.len() as f64)
        } else {
            match ctx.all_columns.iter().find(|c| c.id == var.id) {
                Some(target) => resolve_column_variable(target, var.mode, ctx),
                None => {
                    // Dangling reference: compute with 0, the diagnostic
                    // surfaces it separately.
                    debug!(
                        "column '{}' variable '{}' references missing column '{}'",
                        column.id, name, var.id
                    );
                    0.0
                }
            }
        };
        variables.insert(name.clone(), value);
    }
    variables
}

fn resolve_column_variable(target: &ScoreColumn, mode: VariableMode, ctx: &ScoringContext) -> f64 {
    let own = score_for_sheet(target, ctx.player_scores, ctx);
    if mode == VariableMode::Value {
        return own;
    }

    // Rank/tie modes need the roster; without one everyone is rank 1.
    let Some(players) = ctx.all_players else {
        return 1.0;
    };
    let all: Vec<f64> = players
        .iter()
        .map(|p| score_for_sheet(target, &p.scores, ctx))
        .collect();
    match mode {
        VariableMode::RankScore => ranking::score_rank(own, &all),
        VariableMode::RankPlayer => ranking::player_rank(own, &all),
        VariableMode::TieCount => ranking::tie_count(own, &all),
        VariableMode::Value => own,
    }
}

/// Score `target` against a specific player's sheet, one recursion level
/// down.
fn score_for_sheet<'a>(
    target: &ScoreColumn,
    scores: &'a BTreeMap<String, ScoreValue>,
    ctx: &ScoringContext<'a>,
) -> f64 {
    let child = ctx.descend(scores);
    let parts = scores
        .get(&target.id)
        .map(|v| v.parts.as_slice())
        .unwrap_or(&[]);
    calculate_column_score(target, parts, Some(&child))
}

fn build_functions(column: &ScoreColumn) -> FunctionMap {
    let mut functions = FunctionMap::new();
    for (name, rules) in &column.functions {
        let table = LookupTable::new(rules);
        functions.insert(name.clone(), Box::new(move |v| table.apply(v)) as NamedFunction);
    }
    // Legacy columns only carry the f1 alias.
    if !functions.contains_key("f1") {
        if let Some(rules) = &column.f1 {
            let table = LookupTable::new(rules);
            functions.insert("f1".to_string(), Box::new(move |v| table.apply(v)));
        }
    }
    functions
}

fn apply_rounding(value: f64, rounding: Rounding) -> f64 {
    match rounding {
        Rounding::None => value,
        Rounding::Floor => value.floor(),
        Rounding::Ceil => value.ceil(),
        Rounding::Round => value.round(),
    }
}
