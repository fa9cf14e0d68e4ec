//! CLI for managing kernel environments.
//!
//! Wires the production store and collaborators into the environment
//! manager and exposes its operations as subcommands. Ctrl-C cancels the
//! in-flight operation through the same cancellation token the editor
//! would use.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};
use tokio_util::sync::CancellationToken;

use environments::{
    CreateEnvironmentOptions, Environment, EnvironmentManager, EnvironmentTreeProvider,
    EnvironmentUpdate, EnvironmentWithStatus, JsonFileStore, LocalServerClient,
    PythonInterpreter, UvToolkitInstaller,
};

#[derive(Parser)]
#[command(author, version, about = "Manage kernel environments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all environments
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Create a new environment
    Create {
        /// Display name
        #[arg(long)]
        name: String,
        /// Python interpreter to seed the venv from
        #[arg(long, default_value = "python3")]
        python: PathBuf,
        /// Extra package specifier (repeatable)
        #[arg(long = "package")]
        packages: Vec<String>,
        /// Free-text note
        #[arg(long)]
        description: Option<String>,
    },
    /// Show one environment in detail
    Show {
        /// Environment id (or unique prefix, or name)
        id: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Start the environment's kernel server
    Start { id: String },
    /// Stop the environment's kernel server
    Stop { id: String },
    /// Restart the environment's kernel server
    Restart { id: String },
    /// Update name, packages, or description
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// Replace the package list (repeatable)
        #[arg(long = "package")]
        packages: Option<Vec<String>>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete an environment (stops its server first)
    Delete {
        id: String,
        /// Also remove the venv directory from disk
        #[arg(long)]
        purge_venv: bool,
    },
    /// Render the environment tree as the editor's view would
    Tree,
}

#[derive(Tabled)]
struct EnvironmentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "INTERPRETER")]
    interpreter: String,
    #[tabled(rename = "TOOLKIT")]
    toolkit: String,
    #[tabled(rename = "LAST USED")]
    last_used: String,
}

impl From<&EnvironmentWithStatus> for EnvironmentRow {
    fn from(with_status: &EnvironmentWithStatus) -> Self {
        let env = &with_status.environment;
        EnvironmentRow {
            id: short_id(&env.id),
            name: env.name.clone(),
            status: with_status.status.to_string(),
            interpreter: shorten_path(&env.python_interpreter.path),
            toolkit: env.toolkit_version.clone().unwrap_or_else(|| "-".to_string()),
            last_used: env.last_used_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// First uuid segment, enough to address an environment interactively.
fn short_id(id: &str) -> String {
    id.split('-').next().unwrap_or(id).to_string()
}

/// Shorten a path for display by replacing home directory with ~
fn shorten_path(path: &std::path::Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(relative) = path.strip_prefix(&home) {
            return format!("~/{}", relative.display());
        }
    }
    path.display().to_string()
}

fn env_to_json(with_status: &EnvironmentWithStatus) -> serde_json::Value {
    let env = &with_status.environment;
    let mut value = serde_json::json!({
        "id": env.id,
        "name": env.name,
        "status": with_status.status,
        "pythonInterpreterPath": env.python_interpreter.path,
        "venvPath": env.venv_path,
        "createdAt": env.created_at.to_rfc3339(),
        "lastUsedAt": env.last_used_at.to_rfc3339(),
        "packages": env.packages,
        "toolkitVersion": env.toolkit_version,
        "description": env.description,
    });
    if let Some(server) = &env.server_info {
        value["server"] = serde_json::json!({
            "url": server.url,
            "jupyterPort": server.jupyter_port,
            "lspPort": server.lsp_port,
        });
    }
    value
}

/// Resolve an id argument: exact id, unique id prefix, or unique name.
fn resolve_id(manager: &EnvironmentManager, needle: &str) -> Result<String> {
    let environments = manager.list_environments();

    if environments.iter().any(|env| env.id == needle) {
        return Ok(needle.to_string());
    }

    let matches: Vec<&Environment> = environments
        .iter()
        .filter(|env| env.id.starts_with(needle) || env.name == needle)
        .collect();

    match matches.as_slice() {
        [single] => Ok(single.id.clone()),
        [] => anyhow::bail!("No environment matches '{}'", needle),
        _ => anyhow::bail!("'{}' is ambiguous; use a longer id prefix", needle),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let manager = Arc::new(EnvironmentManager::new(
        Arc::new(JsonFileStore::default()),
        Arc::new(UvToolkitInstaller::new()),
        Arc::new(LocalServerClient::new()),
    ));
    manager.initialize().await;

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        });
    }

    if let Err(e) = run(cli.command, &manager, &token).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(
    command: Commands,
    manager: &Arc<EnvironmentManager>,
    token: &CancellationToken,
) -> Result<()> {
    match command {
        Commands::List { json } => {
            let environments: Vec<EnvironmentWithStatus> = manager
                .list_environments()
                .iter()
                .filter_map(|env| manager.get_environment_with_status(&env.id))
                .collect();

            if json {
                let values: Vec<_> = environments.iter().map(env_to_json).collect();
                println!("{}", serde_json::to_string_pretty(&values)?);
            } else if environments.is_empty() {
                println!("No environments. Create one with `envctl create --name ...`");
            } else {
                let rows: Vec<EnvironmentRow> =
                    environments.iter().map(EnvironmentRow::from).collect();
                let table = Table::new(rows).with(Style::rounded()).to_string();
                println!("{}", table);
            }
        }

        Commands::Create {
            name,
            python,
            packages,
            description,
        } => {
            let env = manager
                .create_environment(
                    CreateEnvironmentOptions {
                        name,
                        python_interpreter: PythonInterpreter::from_path(python),
                        packages: (!packages.is_empty()).then_some(packages),
                        description,
                    },
                    token,
                )
                .await?;
            println!("Created environment {} ({})", env.name, env.id);
        }

        Commands::Show { id, json } => {
            let id = resolve_id(manager, &id)?;
            let with_status = manager
                .get_environment_with_status(&id)
                .ok_or_else(|| anyhow::anyhow!("No environment matches '{}'", id))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&env_to_json(&with_status))?);
            } else {
                let provider = EnvironmentTreeProvider::new(manager.clone());
                println!("{}", with_status.environment.name);
                for row in provider.info_rows(&id) {
                    println!("  {:<12} {}", row.label, row.value);
                }
            }
        }

        Commands::Start { id } => {
            let id = resolve_id(manager, &id)?;
            manager.start_server(&id, token).await?;
            let with_status = manager
                .get_environment_with_status(&id)
                .ok_or_else(|| anyhow::anyhow!("No environment matches '{}'", id))?;
            if let Some(server) = &with_status.environment.server_info {
                println!("Server running at {}", server.url);
            }
        }

        Commands::Stop { id } => {
            let id = resolve_id(manager, &id)?;
            manager.stop_server(&id, token).await?;
            println!("Server stopped");
        }

        Commands::Restart { id } => {
            let id = resolve_id(manager, &id)?;
            manager.restart_server(&id, token).await?;
            println!("Server restarted");
        }

        Commands::Update {
            id,
            name,
            packages,
            description,
        } => {
            let id = resolve_id(manager, &id)?;
            manager
                .update_environment(
                    &id,
                    EnvironmentUpdate {
                        name,
                        packages,
                        description,
                    },
                )
                .await?;
            println!("Updated environment {}", short_id(&id));
        }

        Commands::Delete { id, purge_venv } => {
            let id = resolve_id(manager, &id)?;
            let env = manager
                .get_environment(&id)
                .ok_or_else(|| anyhow::anyhow!("No environment matches '{}'", id))?;

            manager.delete_environment(&id, token).await?;
            println!("Deleted environment {}", env.name);

            if purge_venv {
                toolkit_env::uv::remove_venv(&env.venv_path).await?;
                println!("Removed venv {}", shorten_path(&env.venv_path));
            }
        }

        Commands::Tree => {
            let provider = EnvironmentTreeProvider::new(manager.clone());
            let nodes = provider.environments();
            if nodes.is_empty() {
                println!("(no environments)");
            }
            for node in nodes {
                println!("{} [{}]", node.label, node.status);
                for row in provider.info_rows(&node.id) {
                    println!("  {:<12} {}", row.label, row.value);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_takes_first_segment() {
        assert_eq!(short_id("4f9d2a31-aaaa-bbbb"), "4f9d2a31");
        assert_eq!(short_id("plain"), "plain");
    }
}
