use clap::Args;
use tracing::info;

use tallyforge::error::TfResult;
use tallyforge::model::{GameTemplate, Player, ScoreColumn, ScoreValue};
use tallyforge::session::GameSession;

use crate::reports;

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Template file
    pub template: String,

    #[arg(long, default_value_t = 4)]
    pub players: usize,

    /// RNG seed for reproducible sessions
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: SimulateArgs) -> TfResult<()> {
    let template = GameTemplate::load_from_file(&args.template)?;
    info!(
        "🎲 Simulating {} players on '{}'",
        args.players, template.name
    );

    let mut rng = match args.seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };

    let mut session = GameSession {
        template,
        players: Vec::new(),
    };
    for i in 0..args.players {
        let mut player = Player {
            id: format!("p{}", i + 1),
            name: format!("Player {}", i + 1),
            ..Player::default()
        };
        for column in &session.template.columns {
            if column.is_auto {
                continue;
            }
            player
                .scores
                .insert(column.id.clone(), random_value(column, &mut rng));
        }
        session.players.push(player);
    }

    session.recompute_totals();
    reports::print_scoreboard(&session);
    Ok(())
}

/// Plausible raw inputs per input family, so a dry run exercises the whole
/// pipeline the way a real session would.
fn random_value(column: &ScoreColumn, rng: &mut fastrand::Rng) -> ScoreValue {
    if column.formula.contains("+next") {
        let parts = (0..rng.usize(1..=5))
            .map(|_| f64::from(rng.i32(-2..10)))
            .collect();
        return ScoreValue { parts };
    }
    if column.formula == "a1×a2" {
        return ScoreValue {
            parts: vec![f64::from(rng.i32(0..10)), f64::from(rng.i32(1..5))],
        };
    }
    if !column.quick_actions.is_empty() {
        let action = &column.quick_actions[rng.usize(0..column.quick_actions.len())];
        return ScoreValue::scalar(action.value);
    }
    ScoreValue::scalar(f64::from(rng.i32(0..30)))
}
