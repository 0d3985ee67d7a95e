//! Session and template files: JSON on disk, migrated on load so any
//! historical shape scores with the current engine.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TfResult;
use crate::migration;
use crate::model::{GameTemplate, Player};
use crate::scoring;

/// One live game: a template plus the roster entering scores against it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameSession {
    pub template: GameTemplate,
    pub players: Vec<Player>,
}

impl GameTemplate {
    /// Load a template file, migrating legacy shapes on the way in.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> TfResult<Self> {
        let text = fs::read_to_string(path)?;
        let raw: Value = serde_json::from_str(&text)?;
        Ok(migration::migrate_template(&raw))
    }
}

impl GameSession {
    /// Load a session file. The template and every player's score map pass
    /// through migration, then all totals are recomputed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> TfResult<Self> {
        let text = fs::read_to_string(path)?;
        let raw: Value = serde_json::from_str(&text)?;
        let template = migration::migrate_template(raw.get("template").unwrap_or(&Value::Null));
        let players = parse_players(raw.get("players"), &template);
        let mut session = Self { template, players };
        session.recompute_totals();
        Ok(session)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> TfResult<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Recompute every player's `totalScore` from the template and the full
    /// roster. Stored totals are never trusted.
    pub fn recompute_totals(&mut self) {
        let roster = self.players.clone();
        for player in &mut self.players {
            player.total_score =
                scoring::calculate_player_total(player, &self.template, Some(&roster));
        }
    }
}

fn parse_players(raw: Option<&Value>, template: &GameTemplate) -> Vec<Player> {
    let Some(list) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };
    list.iter()
        .enumerate()
        .map(|(idx, player)| Player {
            id: player
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("p{}", idx + 1)),
            name: player
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Player {}", idx + 1)),
            color: player.get("color").and_then(Value::as_str).map(str::to_string),
            scores: migration::migrate_scores(
                player.get("scores").unwrap_or(&Value::Null),
                template,
            ),
            total_score: 0.0,
        })
        .collect()
}
