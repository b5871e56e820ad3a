//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use configparser::ini::Ini;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::delimited_adapter::DelimitedAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::spreadsheet_adapter::SpreadsheetAdapter;
use crate::domain::error::TradeportError;
use crate::domain::matcher::MATCH_THRESHOLD;
use crate::domain::parser::ParseStrategy;
use crate::domain::table::UploadedFile;
use crate::domain::trade::{FieldMapping, TradeField};
use crate::domain::workflow::WorkflowState;
use crate::ports::config_port::ConfigPort;

/// Database used when no config names one.
pub const DEFAULT_DB_PATH: &str = "tradeport.db";

#[derive(Parser, Debug)]
#[command(name = "tradeport", about = "Broker export import pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a broker export file
    Import {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Broker to stamp on committed trades (and to learn a template under)
        #[arg(short, long)]
        broker: Option<String>,
        /// INI file with a [mapping] section: trade_field = Source Column
        #[arg(short, long)]
        mapping: Option<PathBuf>,
    },
    /// Detect the format and show headers plus sample rows
    Preview {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long, default_value_t = 5)]
        rows: usize,
    },
    /// List learned broker templates
    Templates {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Import {
            file,
            config,
            broker,
            mapping,
        } => run_import(&file, config.as_ref(), broker.as_deref(), mapping.as_ref()),
        Command::Preview { file, rows } => run_preview(&file, rows),
        Command::Templates { config } => run_templates(config.as_ref()),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TradeportError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Parse a `[mapping]` section into a field mapping. Keys are normalized
/// trade field names, values are source column names.
pub fn mapping_from_ini(ini: &Ini, file: &str) -> Result<FieldMapping, TradeportError> {
    let map = ini.get_map().unwrap_or_default();
    let section = map
        .get("mapping")
        .ok_or_else(|| TradeportError::ConfigParse {
            file: file.to_string(),
            reason: "missing [mapping] section".into(),
        })?;

    let mut mapping = FieldMapping::new();
    for (key, value) in section {
        let field = key
            .parse::<TradeField>()
            .map_err(|_| TradeportError::ConfigInvalid {
                section: "mapping".into(),
                key: key.clone(),
                reason: "unknown trade field".into(),
            })?;
        let column = value
            .clone()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| TradeportError::ConfigInvalid {
                section: "mapping".into(),
                key: key.clone(),
                reason: "missing source column".into(),
            })?;
        mapping.insert(field, column.trim().to_string());
    }

    if mapping.is_empty() {
        return Err(TradeportError::ConfigParse {
            file: file.to_string(),
            reason: "[mapping] section is empty".into(),
        });
    }
    Ok(mapping)
}

pub fn load_mapping_file(path: &PathBuf) -> Result<FieldMapping, TradeportError> {
    let mut ini = Ini::new();
    ini.load(path).map_err(|e| TradeportError::ConfigParse {
        file: path.display().to_string(),
        reason: e,
    })?;
    mapping_from_ini(&ini, &path.display().to_string())
}

fn run_preview(file_path: &PathBuf, rows: usize) -> ExitCode {
    let file = match UploadedFile::from_path(file_path) {
        Ok(f) => f,
        Err(e) => {
            let err = TradeportError::Io(e);
            eprintln!("error: {err}");
            return ExitCode::from(&err);
        }
    };

    let delimited = DelimitedAdapter::new();
    let spreadsheet = SpreadsheetAdapter::new();
    let strategy = ParseStrategy::new(&delimited, &spreadsheet);

    let table = match strategy.parse(&file) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error ({} stage): {e}", e.stage());
            return ExitCode::from(&e);
        }
    };

    println!("{}", table.headers.join(", "));
    for row in table.rows.iter().take(rows) {
        let values: Vec<&str> = table
            .headers
            .iter()
            .map(|h| row.get(h).map(String::as_str).unwrap_or(""))
            .collect();
        println!("{}", values.join(" | "));
    }
    println!("{} rows", table.rows.len());

    ExitCode::SUCCESS
}

fn run_import(
    file_path: &PathBuf,
    config_path: Option<&PathBuf>,
    broker: Option<&str>,
    mapping_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: load config, if any
    let config = match config_path {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            match load_config(path) {
                Ok(adapter) => Some(adapter),
                Err(code) => return code,
            }
        }
        None => None,
    };

    let threshold = config
        .as_ref()
        .map(|c| c.get_double("import", "match_threshold", MATCH_THRESHOLD))
        .unwrap_or(MATCH_THRESHOLD);
    let default_broker = config
        .as_ref()
        .and_then(|c| c.get_string("import", "default_broker"));
    let broker = broker.map(str::to_string).or(default_broker);

    // Stage 2: read the upload
    let file = match UploadedFile::from_path(file_path) {
        Ok(f) => f,
        Err(e) => {
            let err = TradeportError::Io(e);
            eprintln!("error: {err}");
            return ExitCode::from(&err);
        }
    };
    eprintln!("Importing {} ({} bytes)", file.name, file.bytes.len());

    // Stages 3-6: store-dependent pipeline
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_store_adapter::SqliteStoreAdapter;
        use crate::domain::workflow::ImportWorkflow;

        let store = match open_store(config.as_ref()) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(&e);
            }
        };

        let delimited = DelimitedAdapter::new();
        let spreadsheet = SpreadsheetAdapter::new();
        let strategy = ParseStrategy::new(&delimited, &spreadsheet);
        let mut workflow =
            ImportWorkflow::new(strategy, &store, &store).with_threshold(threshold);

        // Stage 3: parse and route
        if let Err(e) = workflow.upload(&file) {
            eprintln!("error ({} stage): {e}", e.stage());
            return ExitCode::from(&e);
        }

        // Stage 4: resolve the mapping
        if let WorkflowState::Mapping { table } = workflow.state() {
            let Some(mapping_path) = mapping_path else {
                eprintln!("No template matched. Columns found:");
                eprintln!("  {}", table.headers.join(", "));
                eprintln!("Provide --mapping <file> with a [mapping] section to continue.");
                return ExitCode::from(5);
            };

            let mapping = match load_mapping_file(mapping_path) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("error: {e}");
                    return ExitCode::from(&e);
                }
            };

            if let Err(e) = workflow.submit_mapping(mapping, broker.as_deref()) {
                eprintln!("error ({} stage): {e}", e.stage());
                return ExitCode::from(&e);
            }
        } else {
            eprintln!("Matched a learned template");
        }

        eprintln!("Transformed {} trades", workflow.trades().len());

        // Stage 5: commit everything (selection trimming is interactive-only)
        match workflow.commit(broker.as_deref()) {
            Ok(count) => {
                println!("Committed {count} trades");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error ({} stage): {e}", e.stage());
                ExitCode::from(&e)
            }
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (threshold, broker, mapping_path, file);
        eprintln!("error: sqlite feature is required for import");
        ExitCode::from(1)
    }
}

fn run_templates(config_path: Option<&PathBuf>) -> ExitCode {
    #[cfg(feature = "sqlite")]
    {
        use crate::ports::template_store::TemplateStore;

        let config = match config_path {
            Some(path) => match load_config(path) {
                Ok(adapter) => Some(adapter),
                Err(code) => return code,
            },
            None => None,
        };

        let store = match open_store(config.as_ref()) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(&e);
            }
        };

        let templates = match store.list_templates() {
            Ok(t) => t,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(&e);
            }
        };

        if templates.is_empty() {
            println!("No templates learned yet");
            return ExitCode::SUCCESS;
        }

        for template in templates {
            let last_used = template
                .last_used_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "{} — {} fields, used {} times, last used {}",
                template.broker_name,
                template.column_mappings.len(),
                template.usage_count,
                last_used,
            );
        }
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config_path;
        eprintln!("error: sqlite feature is required for templates");
        ExitCode::from(1)
    }
}

#[cfg(feature = "sqlite")]
fn open_store(
    config: Option<&FileConfigAdapter>,
) -> Result<crate::adapters::sqlite_store_adapter::SqliteStoreAdapter, TradeportError> {
    use crate::adapters::sqlite_store_adapter::SqliteStoreAdapter;

    let store = match config {
        Some(adapter) if adapter.get_string("sqlite", "path").is_some() => {
            SqliteStoreAdapter::from_config(adapter)?
        }
        _ => SqliteStoreAdapter::from_path(DEFAULT_DB_PATH)?,
    };
    store.initialize_schema()?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ini_from(content: &str) -> Ini {
        let mut ini = Ini::new();
        ini.read(content.to_string()).unwrap();
        ini
    }

    #[test]
    fn mapping_from_ini_parses_fields() {
        let ini = ini_from(
            "[mapping]\n\
             symbol = Symbol\n\
             entry_price = Entry Price\n\
             opened_at = Open Time\n",
        );
        let mapping = mapping_from_ini(&ini, "test.ini").unwrap();

        assert_eq!(mapping[&TradeField::Symbol], "Symbol");
        assert_eq!(mapping[&TradeField::EntryPrice], "Entry Price");
        assert_eq!(mapping[&TradeField::OpenedAt], "Open Time");
    }

    #[test]
    fn mapping_from_ini_rejects_unknown_fields() {
        let ini = ini_from("[mapping]\nsymbol = Symbol\nprix = Prix\n");
        let err = mapping_from_ini(&ini, "test.ini").unwrap_err();
        assert!(
            matches!(err, TradeportError::ConfigInvalid { key, .. } if key == "prix")
        );
    }

    #[test]
    fn mapping_from_ini_requires_the_section() {
        let ini = ini_from("[import]\nmatch_threshold = 80\n");
        let err = mapping_from_ini(&ini, "test.ini").unwrap_err();
        assert!(matches!(err, TradeportError::ConfigParse { .. }));
    }

    #[test]
    fn mapping_from_ini_rejects_empty_columns() {
        let ini = ini_from("[mapping]\nsymbol =\n");
        let err = mapping_from_ini(&ini, "test.ini").unwrap_err();
        assert!(matches!(err, TradeportError::ConfigInvalid { .. }));
    }
}
