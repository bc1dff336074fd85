mod cli;

use projdef::environment::Ambient;
use projdef::project::{discover, DefinitionManager};
use projdef::workspace::actions::StdConsole;
use projdef::workspace::sql::DryRunExecutor;
use projdef::workspace::WorkspaceManager;
use projdef::{OverrideContext, RenderedDefinition};

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("PROJDEF_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Render(render_cli) => render(&cli.project, render_cli),
        cli::Command::Validate => validate(&cli.project),
        cli::Command::Entity(entity_cli) => entity(&cli.project, entity_cli),
        cli::Command::Dev(dev_cli) => dev(&cli.project, dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

fn project(args: &cli::ProjectArgs) -> anyhow::Result<DefinitionManager> {
    let cwd = std::env::current_dir()?;
    Ok(discover(args.project.as_deref(), &cwd)?)
}

fn load(manager: &DefinitionManager, args: &cli::ProjectArgs) -> anyhow::Result<RenderedDefinition> {
    let overrides = OverrideContext::from_pairs(args.env.iter().cloned());
    let rendered = manager.load(&overrides, &Ambient::Process)?;

    for warning in &rendered.warnings {
        eprintln!("{warning}");
    }

    Ok(rendered)
}

pub fn render(args: &cli::ProjectArgs, cli: cli::RenderCommand) -> anyhow::Result<()> {
    let manager = project(args)?;
    let rendered = load(&manager, args)?;

    output(&cli.output, &rendered.project_context)
}

pub fn validate(args: &cli::ProjectArgs) -> anyhow::Result<()> {
    let manager = project(args)?;
    let rendered = load(&manager, args)?;

    println!(
        "Project definition is valid (definition_version {})",
        rendered.definition_version()
    );
    Ok(())
}

pub fn entity(args: &cli::ProjectArgs, cli: cli::EntityCommand) -> anyhow::Result<()> {
    let manager = project(args)?;
    let rendered = load(&manager, args)?;

    let executor = DryRunExecutor::new(cli.role);
    let console = StdConsole;
    let mut workspace = WorkspaceManager::new(
        &rendered.project_definition,
        manager.project_root(),
        None,
        cli.warehouse.as_deref(),
        &console,
        &executor,
    )?;

    let outcome = workspace.perform_action(&cli.entity_id, cli.action)?;
    output(&cli.output, &outcome)
}

fn output<T: serde::Serialize>(output: &cli::OutputArgs, value: &T) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}

/// (projdef-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(args: &cli::ProjectArgs, cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    let manager = project(args)?;

    match cli.command {
        Files => println!("{:#?}", manager.definition_files()),
        Context => {
            let rendered = load(&manager, args)?;
            println!("{:#?}", rendered.project_context)
        }
    }

    Ok(())
}
