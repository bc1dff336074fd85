//! projdef cli interface

use clap::{Parser, Subcommand, ValueEnum};
use projdef::workspace::actions::EntityAction;
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; projdef ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[clap(flatten)]
    pub project: ProjectArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved project definition context
    Render(RenderCommand),

    /// Load and validate the project definition
    Validate,

    /// Perform an action on an entity (definition version 2)
    Entity(EntityCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct ProjectArgs {
    /// Project directory
    ///
    /// Defaults to the first directory containing snowflake.yml,
    /// searching upwards from the work directory.
    #[clap(short = 'p', long = "project", global(true))]
    pub project: Option<PathBuf>,

    /// Override a project environment variable (KEY=VALUE)
    ///
    /// Available to templates as ctx.env.KEY, wins over the
    /// process environment and the env section.
    #[clap(long = "env", value_parser = parse_key_value, global(true))]
    pub env: Vec<(String, String)>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[derive(Parser, Debug)]
pub struct RenderCommand {
    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct EntityCommand {
    /// Entity id as used under `entities`
    pub entity_id: String,

    /// One of bundle, deploy, drop, events, validate
    pub action: EntityAction,

    /// Role to use when the entity doesn't configure one
    #[clap(long = "role", default_value = "dry_run_role")]
    pub role: String,

    /// Warehouse to use when the entity doesn't configure one
    #[clap(long = "warehouse")]
    pub warehouse: Option<String>,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Loaded definition files
    Files,
    /// Resolved context including the effective environment
    Context,
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn key_value_pairs() {
        assert_eq!(
            parse_key_value("A=b=c"),
            Ok(("A".to_string(), "b=c".to_string()))
        );
        assert_eq!(parse_key_value("A="), Ok(("A".to_string(), String::new())));
        assert!(parse_key_value("=b").is_err());
        assert!(parse_key_value("A").is_err());
    }

    #[test]
    fn entity_command() {
        let cli = Cli::parse_from(["projdef", "--env", "A=1", "entity", "app", "deploy"]);

        assert_eq!(cli.project.env, vec![("A".to_string(), "1".to_string())]);
        let Command::Entity(entity) = cli.command else {
            panic!("expected entity command");
        };
        assert_eq!(entity.entity_id, "app");
        assert_eq!(entity.action, EntityAction::Deploy);
    }
}
