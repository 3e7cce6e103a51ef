use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use list_core::{load_settings, HttpStateGateway, ListController, Outcome, RenderModel};
use shared::domain::ItemId;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides `server_url` from the settings file and environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prints the list as the service currently holds it.
    Show {
        #[arg(long, default_value_t = 1)]
        pages: u32,
        #[arg(long)]
        search: Option<String>,
    },
    Toggle {
        id: i64,
    },
    SelectAll,
    Clear,
    /// Moves the row at index `from` to index `to` and saves the new order.
    Move {
        from: usize,
        to: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
        settings.validate()?;
    }

    let gateway = HttpStateGateway::new(
        &settings.server_url,
        settings.controller.request_timeout(),
    )?;
    let controller = ListController::new(Arc::new(gateway), settings.controller.clone());
    check("mount", controller.mount().await)?;

    match cli.command {
        Command::Show { pages, search } => {
            if let Some(term) = search {
                check("search", controller.on_search_term_change(&term).await)?;
            }
            for _ in 1..pages {
                if check("load more", controller.on_scroll_near_bottom().await)?
                    == Outcome::Ignored
                {
                    break;
                }
            }
        }
        Command::Toggle { id } => {
            check("toggle", controller.on_toggle(ItemId(id)).await)?;
        }
        Command::SelectAll => {
            check("select all", controller.on_select_all().await)?;
        }
        Command::Clear => {
            check("clear selection", controller.on_clear_selection().await)?;
        }
        Command::Move { from, to } => {
            if check("move", controller.on_drag_end(from, Some(to)).await)? == Outcome::Ignored {
                bail!("no row at index {from}");
            }
        }
    }

    print!("{}", RenderModel::from_snapshot(&controller.snapshot()).to_text());
    Ok(())
}

fn check(action: &str, outcome: Outcome) -> Result<Outcome> {
    match outcome {
        Outcome::Failed(err) => bail!("{action} failed: {err}"),
        other => Ok(other),
    }
}
