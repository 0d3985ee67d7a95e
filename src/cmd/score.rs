use clap::Args;
use std::collections::BTreeMap;
use tracing::{info, warn};

use tallyforge::error::TfResult;
use tallyforge::model::ScoringContext;
use tallyforge::scoring;
use tallyforge::session::GameSession;

use crate::reports;

#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    /// Session file (template + players)
    pub session: String,

    /// Also write the scoreboard as CSV
    #[arg(long)]
    pub export: Option<String>,
}

pub fn run(args: ScoreArgs) -> TfResult<()> {
    info!("📂 Loading session: {}", args.session);
    let session = GameSession::load_from_file(&args.session)?;
    info!(
        "    Template '{}', {} columns, {} players",
        session.template.name,
        session.template.columns.len(),
        session.players.len()
    );

    // Surface broken auto columns before printing; the board still renders
    // with their degraded scores.
    let empty = BTreeMap::new();
    let sheet = session
        .players
        .first()
        .map(|p| &p.scores)
        .unwrap_or(&empty);
    let ctx = ScoringContext::new(&session.template.columns, sheet)
        .with_players(&session.players);
    for column in &session.template.columns {
        if let Some(err) = scoring::get_auto_column_error(column, Some(&ctx)) {
            warn!("column '{}' ({}): {}", column.name, column.id, err);
        }
    }

    reports::print_scoreboard(&session);

    if let Some(path) = &args.export {
        reports::export_csv(&session, path)?;
        info!("💾 Scoreboard exported to {}", path);
    }
    Ok(())
}
