use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use tallyforge::error::TfResult;
use tallyforge::model::{Player, ScoreColumn, ScoringContext};
use tallyforge::scoring::{self, AutoColumnError};
use tallyforge::session::GameSession;

/// Score sheet: one row per column, one column per player, totals last.
pub fn print_scoreboard(session: &GameSession) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![Cell::new(&session.template.name).add_attribute(Attribute::Bold)];
    for player in &session.players {
        header.push(Cell::new(&player.name).add_attribute(Attribute::Bold));
    }
    table.add_row(header);

    for column in &session.template.columns {
        let mut row = vec![Cell::new(&column.name)];
        for player in &session.players {
            let cell = Cell::new(format_score(cell_score(column, player, session)));
            row.push(if column.is_scoring {
                cell
            } else {
                cell.fg(Color::DarkGrey)
            });
        }
        table.add_row(row);
    }

    let mut totals = vec![Cell::new("TOTAL").add_attribute(Attribute::Bold)];
    for player in &session.players {
        totals.push(
            Cell::new(format_score(player.total_score))
                .fg(Color::Cyan)
                .add_attribute(Attribute::Bold),
        );
    }
    table.add_row(totals);

    for i in 1..=session.players.len() {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    println!("\n{table}");
}

/// Template audit: one row per column with its diagnostic.
pub fn print_audit(rows: &[(&ScoreColumn, Option<AutoColumnError>)]) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Column").add_attribute(Attribute::Bold),
        Cell::new("Formula"),
        Cell::new("Input"),
        Cell::new("Auto"),
        Cell::new("Scoring"),
        Cell::new("Status"),
    ]);

    for (column, diagnostic) in rows {
        let status = match diagnostic {
            None => Cell::new("OK").fg(Color::Green),
            Some(err) => Cell::new(err.to_string()).fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(format!("{} ({})", column.name, column.id)),
            Cell::new(&column.formula),
            Cell::new(column.input_type.to_string()),
            Cell::new(if column.is_auto { "yes" } else { "" }),
            Cell::new(if column.is_scoring { "yes" } else { "" }),
            status,
        ]);
    }

    println!("\n{table}");
}

/// Write the same grid as [`print_scoreboard`] as CSV.
pub fn export_csv(session: &GameSession, path: &str) -> TfResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["Column".to_string()];
    header.extend(session.players.iter().map(|p| p.name.clone()));
    writer.write_record(&header)?;

    for column in &session.template.columns {
        let mut record = vec![column.name.clone()];
        for player in &session.players {
            record.push(format_score(cell_score(column, player, session)));
        }
        writer.write_record(&record)?;
    }

    let mut totals = vec!["TOTAL".to_string()];
    totals.extend(session.players.iter().map(|p| format_score(p.total_score)));
    writer.write_record(&totals)?;

    writer.flush()?;
    Ok(())
}

fn cell_score(column: &ScoreColumn, player: &Player, session: &GameSession) -> f64 {
    let parts = player
        .scores
        .get(&column.id)
        .map(|v| v.parts.as_slice())
        .unwrap_or(&[]);
    let ctx = ScoringContext::new(&session.template.columns, &player.scores)
        .with_players(&session.players);
    scoring::calculate_column_score(column, parts, Some(&ctx))
}

/// Non-finite scores render as ERR; `-0` stays visible because it means
/// "entered as negative" on a score sheet.
fn format_score(score: f64) -> String {
    if !score.is_finite() {
        return "ERR".to_string();
    }
    if score.fract() == 0.0 {
        format!("{score:.0}")
    } else {
        format!("{score:.2}")
    }
}
