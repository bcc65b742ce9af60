use crate::{
    app::App,
    config,
    view::{SortKey, ViewQuery},
};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

pub enum CliAction {
    Ui,
    Command(CliCommand),
}

pub enum CliCommand {
    GamesList {
        format: OutputFormat,
        sort: SortKey,
        tags: Vec<String>,
        search: Option<String>,
    },
    Export {
        path: PathBuf,
    },
    Import {
        path: PathBuf,
        assume_yes: bool,
    },
    Version,
    Help,
}

pub fn parse(args: &[String]) -> Result<CliAction> {
    let mut iter = args.iter().peekable();
    let Some(first) = iter.next() else {
        return Ok(CliAction::Ui);
    };

    match first.as_str() {
        "games" => {
            match iter.next().map(String::as_str) {
                Some("list") => {}
                other => bail!("unknown games subcommand {:?}", other.unwrap_or("")),
            }
            let mut sort = SortKey::Name;
            let mut tags = Vec::new();
            let mut search = None;
            let mut format = OutputFormat::Text;
            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--sort" => {
                        let value = iter.next().context("--sort requires a value")?;
                        sort = SortKey::parse(value)
                            .with_context(|| format!("unknown sort key {value}"))?;
                    }
                    "--tag" => {
                        let value = iter.next().context("--tag requires a value")?;
                        tags.push(value.trim().to_lowercase());
                    }
                    "--search" => {
                        let value = iter.next().context("--search requires a value")?;
                        search = Some(value.clone());
                    }
                    "--format" => {
                        let value = iter.next().context("--format requires a value")?;
                        format = OutputFormat::parse(value)
                            .with_context(|| format!("unknown format {value}"))?;
                    }
                    other => bail!("unknown option {other}"),
                }
            }
            Ok(CliAction::Command(CliCommand::GamesList {
                format,
                sort,
                tags,
                search,
            }))
        }
        "export" => {
            let path = iter.next().context("export requires a path")?;
            Ok(CliAction::Command(CliCommand::Export {
                path: PathBuf::from(path),
            }))
        }
        "import" => {
            let mut path = None;
            let mut assume_yes = false;
            for arg in iter {
                match arg.as_str() {
                    "--yes" | "-y" => assume_yes = true,
                    other => path = Some(PathBuf::from(other)),
                }
            }
            let path = path.context("import requires a path")?;
            Ok(CliAction::Command(CliCommand::Import { path, assume_yes }))
        }
        "version" | "--version" | "-V" => Ok(CliAction::Command(CliCommand::Version)),
        "help" | "--help" | "-h" => Ok(CliAction::Command(CliCommand::Help)),
        other => bail!("unknown command {other} (try help)"),
    }
}

#[derive(Serialize)]
struct GameRow<'a> {
    id: &'a str,
    title: &'a str,
    section: &'a str,
    tags: &'a [String],
    plays: u64,
    favorite: bool,
}

pub fn run(command: CliCommand) -> Result<()> {
    match command {
        CliCommand::GamesList {
            format,
            sort,
            tags,
            search,
        } => {
            let mut app = App::open(&config::base_data_dir()?)?;
            app.query = ViewQuery {
                tags: tags.into_iter().collect(),
                search: search.unwrap_or_default(),
                sort,
            };
            app.rederive();
            print_games(&app, format)
        }
        CliCommand::Export { path } => {
            let app = App::open(&config::base_data_dir()?)?;
            app.export_to(&path)?;
            println!("Exported to {}", path.display());
            Ok(())
        }
        CliCommand::Import { path, assume_yes } => {
            if !assume_yes {
                bail!(
                    "import replaces all local state; re-run with --yes to confirm"
                );
            }
            let mut app = App::open(&config::base_data_dir()?)?;
            app.import_from(&path)?;
            println!("Imported from {}", path.display());
            Ok(())
        }
        CliCommand::Version => {
            println!("arcadesmith {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Help => {
            print_help();
            Ok(())
        }
    }
}

fn print_games(app: &App, format: OutputFormat) -> Result<()> {
    let view = app.view();
    let mut rows = Vec::new();
    for (section, games) in &view.sections {
        for game in games {
            let display = view.display_for(&game.id);
            rows.push(GameRow {
                id: &game.id,
                title: &game.title,
                section: section.label(),
                tags: &game.tags,
                plays: display.play_count,
                favorite: display.favorited,
            });
        }
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                if view.no_results {
                    println!("No games match the current search.");
                } else {
                    println!("Catalog is empty.");
                }
                return Ok(());
            }
            let mut current = "";
            for row in &rows {
                if row.section != current {
                    current = row.section;
                    println!("[{current}]");
                }
                let marker = if row.favorite { "*" } else { " " };
                println!(
                    "{marker} {:<28} plays {:<5} tags {}",
                    row.title,
                    row.plays,
                    row.tags.join(",")
                );
            }
        }
    }
    Ok(())
}

pub fn print_help() {
    println!("arcadesmith");
    println!("  (no args)                 Launch the TUI");
    println!("  games list [options]      Print the derived game grid");
    println!("    --sort name|newest|most-played");
    println!("    --tag <tag>             Repeatable, AND semantics");
    println!("    --search <query>");
    println!("    --format text|json");
    println!("  export <path>             Write a full state backup");
    println!("  import <path> --yes       Replace all state from a backup");
    println!("  version");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parse_games_list_options() {
        let action = parse(&strings(&[
            "games", "list", "--sort", "most-played", "--tag", "Puzzle", "--search", "moto",
            "--format", "json",
        ]))
        .unwrap();
        let CliAction::Command(CliCommand::GamesList {
            format,
            sort,
            tags,
            search,
        }) = action
        else {
            panic!("expected games list");
        };
        assert!(matches!(format, OutputFormat::Json));
        assert_eq!(sort, SortKey::MostPlayed);
        assert_eq!(tags, vec!["puzzle"]);
        assert_eq!(search.as_deref(), Some("moto"));
    }

    #[test]
    fn import_without_yes_is_refused() {
        let action = parse(&strings(&["import", "backup.json"])).unwrap();
        let CliAction::Command(command) = action else {
            panic!("expected command");
        };
        assert!(run(command).is_err());
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(parse(&strings(&["frobnicate"])).is_err());
    }

    #[test]
    fn no_args_launches_the_ui() {
        assert!(matches!(parse(&[]).unwrap(), CliAction::Ui));
    }
}
