use rstest::rstest;
use std::collections::BTreeMap;
use tallyforge::consts::{MAX_AUTO_DEPTH, PLAYER_COUNT_ID};
use tallyforge::model::{
    GameTemplate, MappingRule, Player, Rounding, RuleMax, ScoreColumn, ScoreValue,
    ScoringContext, VariableMode, VariableRef,
};
use tallyforge::scoring::{
    calculate_column_score, calculate_player_total, get_auto_column_error, AutoColumnError,
};

fn column(id: &str, formula: &str) -> ScoreColumn {
    ScoreColumn {
        id: id.to_string(),
        name: id.to_uppercase(),
        formula: formula.to_string(),
        ..ScoreColumn::default()
    }
}

fn auto_column(id: &str, formula: &str, vars: &[(&str, &str, VariableMode)]) -> ScoreColumn {
    let mut col = column(id, formula);
    col.is_auto = true;
    for (name, target, mode) in vars {
        col.variable_map.insert(
            name.to_string(),
            VariableRef {
                id: target.to_string(),
                name: String::new(),
                mode: *mode,
            },
        );
    }
    col
}

fn sheet(entries: &[(&str, &[f64])]) -> BTreeMap<String, ScoreValue> {
    entries
        .iter()
        .map(|(id, parts)| (id.to_string(), ScoreValue { parts: parts.to_vec() }))
        .collect()
}

fn player(id: &str, entries: &[(&str, &[f64])]) -> Player {
    Player {
        id: id.to_string(),
        name: id.to_string(),
        scores: sheet(entries),
        ..Player::default()
    }
}

// --- non-auto dispatch ---

#[rstest]
#[case("a1", &[7.0], 7.0)]
#[case("a1", &[], 0.0)]
#[case("a1+next", &[10.0, 5.0, 3.0], 18.0)]
#[case("a1+next", &[], 0.0)]
#[case("a1×a2", &[5.0], 5.0)]
#[case("a1×a2", &[5.0, 3.0], 15.0)]
#[case("a1×a2", &[], 0.0)]
fn dispatch(#[case] formula: &str, #[case] parts: &[f64], #[case] expected: f64) {
    assert_eq!(calculate_column_score(&column("c", formula), parts, None), expected);
}

#[test]
fn sum_parts_is_order_independent() {
    let col = column("s", "a1+next");
    assert_eq!(calculate_column_score(&col, &[3.0, 10.0, 5.0], None), 18.0);
    assert_eq!(calculate_column_score(&col, &[10.0, 5.0, 3.0], None), 18.0);
}

#[test]
fn constant_multiplier_only_applies_to_its_formula() {
    let mut weighted = column("wood", "a1×c1");
    weighted.constants.c1 = Some(2.5);
    assert_eq!(calculate_column_score(&weighted, &[4.0], None), 10.0);

    let mut plain = column("wood", "a1");
    plain.constants.c1 = Some(2.5);
    assert_eq!(calculate_column_score(&plain, &[4.0], None), 4.0);
}

#[test]
fn missing_c1_defaults_to_identity() {
    let col = column("wood", "a1×c1");
    assert_eq!(calculate_column_score(&col, &[4.0], None), 4.0);
}

#[rstest]
#[case(Rounding::Round, 4.0)]
#[case(Rounding::Floor, 3.0)]
#[case(Rounding::Ceil, 4.0)]
#[case(Rounding::None, 3.5)]
fn rounding_applies_last(#[case] rounding: Rounding, #[case] expected: f64) {
    let mut col = column("r", "a1");
    col.rounding = rounding;
    assert_eq!(calculate_column_score(&col, &[3.5], None), expected);
}

#[test]
fn legacy_lookup_uses_f1_rules() {
    let mut col = column("herd", "f1(a1)");
    col.f1 = Some(vec![
        MappingRule {
            max: Some(RuleMax::Value(0.0)),
            score: -1.0,
            ..MappingRule::default()
        },
        MappingRule {
            min: Some(1.0),
            score: 2.0,
            ..MappingRule::default()
        },
    ]);
    assert_eq!(calculate_column_score(&col, &[0.0], None), -1.0);
    assert_eq!(calculate_column_score(&col, &[5.0], None), 2.0);
}

#[test]
fn legacy_lookup_falls_back_to_named_table() {
    let mut col = column("herd", "f1(a1)");
    col.functions.insert(
        "f1".to_string(),
        vec![MappingRule {
            min: Some(0.0),
            score: 3.0,
            ..MappingRule::default()
        }],
    );
    assert_eq!(calculate_column_score(&col, &[1.0], None), 3.0);
}

#[test]
fn negative_zero_survives_the_calculator() {
    let col = column("c", "a1");
    let score = calculate_column_score(&col, &[-0.0], None);
    assert!(score == 0.0 && score.is_sign_negative());
}

// --- auto columns ---

#[test]
fn auto_without_context_scores_zero() {
    let col = auto_column("d", "x1*2", &[("x1", "wood", VariableMode::Value)]);
    assert_eq!(calculate_column_score(&col, &[], None), 0.0);
}

#[test]
fn auto_reads_referenced_column() {
    let auto = auto_column("double", "x1*2", &[("x1", "wood", VariableMode::Value)]);
    let columns = vec![column("wood", "a1"), auto.clone()];
    let scores = sheet(&[("wood", &[6.0])]);
    let ctx = ScoringContext::new(&columns, &scores);
    assert_eq!(calculate_column_score(&auto, &[], Some(&ctx)), 12.0);
}

#[test]
fn auto_column_reads_other_auto_columns() {
    let doubled = auto_column("doubled", "x1*2", &[("x1", "base", VariableMode::Value)]);
    let quad = auto_column("quad", "x1*2", &[("x1", "doubled", VariableMode::Value)]);
    let columns = vec![column("base", "a1"), doubled, quad.clone()];
    let scores = sheet(&[("base", &[3.0])]);
    let ctx = ScoringContext::new(&columns, &scores);
    assert_eq!(calculate_column_score(&quad, &[], Some(&ctx)), 12.0);
}

#[test]
fn auto_formula_with_lookup_functions() {
    let mut col = auto_column("bonus", "f1(x1)+f2(x1)", &[("x1", "vp", VariableMode::Value)]);
    col.functions.insert(
        "f1".to_string(),
        vec![MappingRule {
            min: Some(0.0),
            score: 5.0,
            ..MappingRule::default()
        }],
    );
    col.functions.insert(
        "f2".to_string(),
        vec![MappingRule {
            min: Some(10.0),
            score: 100.0,
            ..MappingRule::default()
        }],
    );
    let columns = vec![column("vp", "a1"), col.clone()];
    let scores = sheet(&[("vp", &[4.0])]);
    let ctx = ScoringContext::new(&columns, &scores);
    // f1 matches (5), f2 does not (0)
    assert_eq!(calculate_column_score(&col, &[], Some(&ctx)), 5.0);
}

#[test]
fn legacy_f1_alias_feeds_auto_formulas() {
    let mut col = auto_column("bonus", "f1(x1)", &[("x1", "vp", VariableMode::Value)]);
    col.f1 = Some(vec![MappingRule {
        min: Some(0.0),
        score: 7.0,
        ..MappingRule::default()
    }]);
    let columns = vec![column("vp", "a1"), col.clone()];
    let scores = sheet(&[("vp", &[1.0])]);
    let ctx = ScoringContext::new(&columns, &scores);
    assert_eq!(calculate_column_score(&col, &[], Some(&ctx)), 7.0);
}

#[test]
fn auto_rounding_applies_to_formula_result() {
    let mut col = auto_column("half", "x1/2", &[("x1", "vp", VariableMode::Value)]);
    col.rounding = Rounding::Floor;
    let columns = vec![column("vp", "a1"), col.clone()];
    let scores = sheet(&[("vp", &[7.0])]);
    let ctx = ScoringContext::new(&columns, &scores);
    assert_eq!(calculate_column_score(&col, &[], Some(&ctx)), 3.0);
}

#[test]
fn dangling_reference_scores_zero_and_reports() {
    let col = auto_column("a", "x1+5", &[("x1", "missing_col", VariableMode::Value)]);
    let columns = vec![col.clone()];
    let scores = BTreeMap::new();
    let ctx = ScoringContext::new(&columns, &scores);
    assert_eq!(calculate_column_score(&col, &[], Some(&ctx)), 5.0);
    assert_eq!(
        get_auto_column_error(&col, Some(&ctx)),
        Some(AutoColumnError::MissingDependency)
    );
}

#[test]
fn player_count_sentinel() {
    let col = auto_column("pc", "x1*10", &[("x1", PLAYER_COUNT_ID, VariableMode::Value)]);
    let columns = vec![col.clone()];
    let scores = BTreeMap::new();
    let players = vec![player("p1", &[]), player("p2", &[]), player("p3", &[])];

    let ctx = ScoringContext::new(&columns, &scores).with_players(&players);
    assert_eq!(calculate_column_score(&col, &[], Some(&ctx)), 30.0);

    let no_roster = ScoringContext::new(&columns, &scores);
    assert_eq!(calculate_column_score(&col, &[], Some(&no_roster)), 0.0);

    // The sentinel is not a dangling reference.
    assert_eq!(get_auto_column_error(&col, Some(&ctx)), None);
}

#[test]
fn rank_modes_follow_competition_ranking() {
    for mode in [VariableMode::RankScore, VariableMode::RankPlayer] {
        let rank = auto_column("rank", "x1", &[("x1", "vp", mode)]);
        let columns = vec![column("vp", "a1"), rank.clone()];
        let players = vec![
            player("p1", &[("vp", &[10.0])]),
            player("p2", &[("vp", &[10.0])]),
            player("p3", &[("vp", &[8.0])]),
        ];
        let expected = [1.0, 1.0, 3.0];
        for (p, want) in players.iter().zip(expected) {
            let ctx = ScoringContext::new(&columns, &p.scores).with_players(&players);
            assert_eq!(calculate_column_score(&rank, &[], Some(&ctx)), want);
        }
    }
}

#[test]
fn tie_count_includes_self() {
    let ties = auto_column("ties", "x1", &[("x1", "vp", VariableMode::TieCount)]);
    let columns = vec![column("vp", "a1"), ties.clone()];
    let players = vec![
        player("p1", &[("vp", &[10.0])]),
        player("p2", &[("vp", &[10.0])]),
        player("p3", &[("vp", &[8.0])]),
    ];
    let expected = [2.0, 2.0, 1.0];
    for (p, want) in players.iter().zip(expected) {
        let ctx = ScoringContext::new(&columns, &p.scores).with_players(&players);
        assert_eq!(calculate_column_score(&ties, &[], Some(&ctx)), want);
    }
}

#[test]
fn rank_without_roster_defaults_to_one() {
    let rank = auto_column("rank", "x1", &[("x1", "vp", VariableMode::RankScore)]);
    let columns = vec![column("vp", "a1"), rank.clone()];
    let scores = sheet(&[("vp", &[10.0])]);
    let ctx = ScoringContext::new(&columns, &scores);
    assert_eq!(calculate_column_score(&rank, &[], Some(&ctx)), 1.0);
}

#[test]
fn mutual_recursion_is_cut_off() {
    let a = auto_column("a", "x1+1", &[("x1", "b", VariableMode::Value)]);
    let b = auto_column("b", "x1+1", &[("x1", "a", VariableMode::Value)]);
    let columns = vec![a.clone(), b.clone()];
    let scores = BTreeMap::new();
    let ctx = ScoringContext::new(&columns, &scores);

    // Each level adds 1 until the depth guard zeroes the chain.
    let score = calculate_column_score(&a, &[], Some(&ctx));
    assert_eq!(score, f64::from(MAX_AUTO_DEPTH) + 1.0);
}

#[test]
fn self_reference_is_cut_off() {
    let col = auto_column("narcissus", "x1*2", &[("x1", "narcissus", VariableMode::Value)]);
    let columns = vec![col.clone()];
    let scores = BTreeMap::new();
    let ctx = ScoringContext::new(&columns, &scores);
    assert_eq!(calculate_column_score(&col, &[], Some(&ctx)), 0.0);
}

// --- diagnostics ---

#[test]
fn diagnostic_ignores_non_auto_and_missing_context() {
    let plain = column("vp", "a1");
    let columns = vec![plain.clone()];
    let scores = BTreeMap::new();
    let ctx = ScoringContext::new(&columns, &scores);
    assert_eq!(get_auto_column_error(&plain, Some(&ctx)), None);

    let auto = auto_column("a", "x1", &[("x1", "vp", VariableMode::Value)]);
    assert_eq!(get_auto_column_error(&auto, None), None);
}

#[test]
fn division_by_zero_reports_math_error() {
    let col = auto_column("bad", "x1/0", &[("x1", "vp", VariableMode::Value)]);
    let columns = vec![column("vp", "a1"), col.clone()];
    let scores = BTreeMap::new();
    let ctx = ScoringContext::new(&columns, &scores);
    assert_eq!(
        get_auto_column_error(&col, Some(&ctx)),
        Some(AutoColumnError::MathError)
    );
}

#[test]
fn malformed_formula_reports_math_error() {
    let col = auto_column("bad", "x1++", &[("x1", "vp", VariableMode::Value)]);
    let columns = vec![column("vp", "a1"), col.clone()];
    let scores = BTreeMap::new();
    let ctx = ScoringContext::new(&columns, &scores);
    assert_eq!(
        get_auto_column_error(&col, Some(&ctx)),
        Some(AutoColumnError::MathError)
    );
}

#[test]
fn healthy_auto_column_reports_nothing() {
    let mut col = auto_column("ok", "f1(x1)*2", &[("x1", "vp", VariableMode::Value)]);
    col.functions.insert(
        "f1".to_string(),
        vec![MappingRule {
            min: Some(0.0),
            score: 1.0,
            ..MappingRule::default()
        }],
    );
    let columns = vec![column("vp", "a1"), col.clone()];
    let scores = BTreeMap::new();
    let ctx = ScoringContext::new(&columns, &scores);
    assert_eq!(get_auto_column_error(&col, Some(&ctx)), None);
}

// --- totals ---

#[test]
fn total_sums_scoring_columns_only() {
    let mut bank = column("bank", "a1");
    bank.is_scoring = false;
    let template = GameTemplate {
        id: "t".to_string(),
        name: "T".to_string(),
        columns: vec![column("vp", "a1"), column("penalty", "a1"), bank],
        ..GameTemplate::default()
    };
    let p = player(
        "p1",
        &[("vp", &[10.0]), ("penalty", &[-3.0]), ("bank", &[100.0])],
    );
    assert_eq!(calculate_player_total(&p, &template, None), 7.0);
}

#[test]
fn total_includes_auto_columns_with_roster_context() {
    let majority = auto_column(
        "majority",
        "max(0, 3-x1)*5",
        &[("x1", "vp", VariableMode::RankScore)],
    );
    let template = GameTemplate {
        id: "t".to_string(),
        name: "T".to_string(),
        columns: vec![column("vp", "a1"), majority],
        ..GameTemplate::default()
    };
    let players = vec![
        player("p1", &[("vp", &[10.0])]),
        player("p2", &[("vp", &[4.0])]),
    ];
    // p1: vp 10, rank 1 -> bonus 10; p2: vp 4, rank 2 -> bonus 5
    assert_eq!(
        calculate_player_total(&players[0], &template, Some(&players)),
        20.0
    );
    assert_eq!(
        calculate_player_total(&players[1], &template, Some(&players)),
        9.0
    );
}
