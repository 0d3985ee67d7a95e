use crate::reports;
use clap::Args;
use std::collections::BTreeMap;
use tracing::info;

use tallyforge::error::{TallyForgeError, TfResult};
use tallyforge::model::{GameTemplate, Player, ScoringContext};
use tallyforge::scoring;

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Template file to audit
    pub template: String,

    /// Roster size used for rank and player-count dry runs
    #[arg(long, default_value_t = 4)]
    pub players: usize,
}

pub fn run(args: ValidateArgs) -> TfResult<()> {
    let template = GameTemplate::load_from_file(&args.template)?;
    info!(
        "🔎 Auditing template '{}' ({} columns)",
        template.name,
        template.columns.len()
    );

    let roster: Vec<Player> = (0..args.players)
        .map(|i| Player {
            id: format!("p{}", i + 1),
            name: format!("Player {}", i + 1),
            ..Player::default()
        })
        .collect();
    let empty = BTreeMap::new();

    let mut failures = 0;
    let mut rows = Vec::new();
    for column in &template.columns {
        let ctx = ScoringContext::new(&template.columns, &empty).with_players(&roster);
        let diagnostic = scoring::get_auto_column_error(column, Some(&ctx));
        if diagnostic.is_some() {
            failures += 1;
        }
        rows.push((column, diagnostic));
    }

    reports::print_audit(&rows);

    if failures > 0 {
        return Err(TallyForgeError::Validation(format!(
            "{failures} column(s) failed the audit"
        )));
    }
    info!("✅ All columns OK");
    Ok(())
}
