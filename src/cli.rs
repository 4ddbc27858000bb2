use crate::command;
use crate::toolcheck;
use crate::config::Config;
use crate::container::Container;
use crate::pipeline::{self, Step};
use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "labdev")]
#[command(
    about = "Bootstrap a plugin development environment against a containerlab network OS lab"
)]
#[command(after_help = "Settings are read from the nearest .labdev.yaml.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every bootstrap step in order, stopping at the first failure
    Setup,

    /// Warn if the Python package installer is not on PATH
    CheckTools,

    /// Deploy the lab topology with containerlab
    Deploy,

    /// Destroy the lab topology with containerlab
    Destroy,

    /// Write the container's installed Python packages to the manifest
    FetchDeps,

    /// Comment out manifest entries that are not on the allow-list
    FilterDeps,

    /// Install the filtered manifest into the local environment
    InstallDeps,

    /// Copy the vendor CLI package out of the container
    FetchCli,

    /// Run the given steps in order, stopping at the first failure
    Run {
        /// Steps to run
        #[arg(value_enum, required = true)]
        steps: Vec<Step>,
    },

    /// Enable remote debugging of the vendor CLI inside the container
    EnableDebug {
        /// Make the CLI wait for a debugger before starting
        /// (also enabled by WAIT_FOR_DEBUG_CONN=true)
        #[arg(long)]
        wait: bool,
    },

    /// Show resolved settings and the state of the lab and local artifacts
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        generate_completions(shell);
        return Ok(());
    }

    let (config, location) = Config::load()?;
    let container = Container::from_config(&config);
    let exec = |step: Step| pipeline::execute(step, &config, &container);

    match cli.command {
        Commands::Setup => pipeline::run_setup(&config, &container),
        Commands::CheckTools => {
            toolcheck::check_available(config.installer());
            Ok(())
        }
        Commands::Deploy => exec(Step::Deploy),
        Commands::Destroy => exec(Step::Destroy),
        Commands::FetchDeps => exec(Step::FetchDeps),
        Commands::FilterDeps => exec(Step::FilterDeps),
        Commands::InstallDeps => exec(Step::InstallDeps),
        Commands::FetchCli => exec(Step::FetchCli),
        Commands::Run { steps } => pipeline::run_steps(&steps, &config, &container),
        Commands::EnableDebug { wait } => command::enable_debug::run(&config, &container, wait),
        Commands::Status { json } => {
            command::status::run(&config, location.as_ref(), &container, json)
        }
        Commands::Completions { .. } => Ok(()),
    }
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
