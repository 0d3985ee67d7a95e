use clap::Args;
use rayon::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{error, info};

use tallyforge::error::{TallyForgeError, TfResult};
use tallyforge::migration;

#[derive(Args, Debug, Clone)]
pub struct MigrateArgs {
    /// Legacy template files
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Output directory (defaults to `<stem>.migrated.json` next to each input)
    #[arg(long)]
    pub out_dir: Option<String>,
}

pub fn run(args: MigrateArgs) -> TfResult<()> {
    info!("🔁 Migrating {} template file(s)", args.inputs.len());

    let results: Vec<TfResult<String>> = args
        .inputs
        .par_iter()
        .map(|input| migrate_one(input, args.out_dir.as_deref()))
        .collect();

    let mut failures = 0;
    for result in results {
        match result {
            Ok(path) => info!("    wrote {}", path),
            Err(e) => {
                failures += 1;
                error!("    {}", e);
            }
        }
    }

    if failures > 0 {
        return Err(TallyForgeError::Validation(format!(
            "{failures} file(s) failed to migrate"
        )));
    }
    Ok(())
}

fn migrate_one(input: &str, out_dir: Option<&str>) -> TfResult<String> {
    let text = fs::read_to_string(input)?;
    let raw: Value = serde_json::from_str(&text)?;
    let template = migration::migrate_template(&raw);

    let input_path = Path::new(input);
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("template");
    let out_path = match out_dir {
        Some(dir) => Path::new(dir).join(format!("{stem}.migrated.json")),
        None => input_path.with_file_name(format!("{stem}.migrated.json")),
    };
    fs::write(&out_path, serde_json::to_string_pretty(&template)?)?;
    Ok(out_path.display().to_string())
}
