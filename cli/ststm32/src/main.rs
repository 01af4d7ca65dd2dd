//! ststm32 CLI: resolve, inspect and flash STM32 builds.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use ststm32_board::Framework;

use commands::Project;
use manifest::ProjectManifest;

#[derive(Parser)]
#[command(name = "ststm32", version, about = "STM32 build configuration resolver")]
struct Cli {
    /// Log resolved facts (MCU family, linker script, uploader)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project
    Init {
        /// Project directory
        path: PathBuf,
        /// Board id
        #[arg(long, default_value = "bluepill_f103c8")]
        board: String,
        /// Framework (arduino, mbed, cmsis, spl, stm32cube, chibios, zephyr, bare)
        #[arg(long, default_value = "bare")]
        framework: Framework,
    },
    /// Inspect and manage board definitions
    Boards {
        #[command(subcommand)]
        action: BoardsAction,
    },
    /// Resolve the build configuration of the project
    Resolve {
        /// Board id, replacing the project's
        #[arg(long)]
        board: Option<String>,
        /// Framework, replacing the project's
        #[arg(long)]
        framework: Option<Framework>,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Find or generate the linker script of a board
    Ldscript {
        /// Board id (default: the project's board)
        #[arg(long)]
        board: Option<String>,
        /// Write the built-in linker template to this path and exit
        #[arg(long)]
        write_template: Option<PathBuf>,
    },
    /// Extract source or include lists from a ChibiOS makefile
    Scrape {
        /// Makefile to read
        makefile: PathBuf,
        /// Variable prefix (e.g., PORT, KERN, PLATFORM)
        #[arg(long)]
        prefix: String,
        /// Variable kind
        #[arg(long, value_enum, default_value = "src")]
        kind: commands::scrape::KindArg,
        /// Framework checkout the paths are mapped onto
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// List the makefiles this one includes instead
        #[arg(long)]
        includes: bool,
    },
    /// Upload the built firmware to the board
    Upload {
        /// Upload port, replacing the project's
        #[arg(long)]
        port: Option<String>,
        /// Upload protocol, replacing the project's
        #[arg(long)]
        protocol: Option<String>,
        /// Print the upload command without running it
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum BoardsAction {
    /// List known boards
    List,
    /// Show a board definition
    Describe {
        /// Board id
        id: String,
        /// Output format (text, toml, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Validate a board definition
    Validate {
        /// Board id
        id: String,
    },
    /// Write a new board manifest to the boards directory
    New {
        /// Board id
        id: String,
    },
    /// Show the debug probes of a board
    Debug {
        /// Board id
        id: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init {
            path,
            board,
            framework,
        } => commands::init::run(&path, &board, framework),

        Commands::Boards { action } => {
            let project = load_project_optional(&cwd)?;
            let catalog = commands::catalog(project.as_ref())?;
            match action {
                BoardsAction::List => commands::boards::list(&catalog),
                BoardsAction::Describe { id, format } => {
                    commands::boards::describe(&catalog, &id, &format)
                }
                BoardsAction::Validate { id } => commands::boards::validate(&catalog, &id),
                BoardsAction::New { id } => {
                    let dir = match &project {
                        Some(p) => p.boards_dir(),
                        None => cwd.join("boards"),
                    };
                    commands::boards::new(&dir, &id)
                }
                BoardsAction::Debug { id } => commands::boards::debug(&catalog, &id),
            }
        }

        Commands::Resolve {
            board,
            framework,
            format,
        } => {
            let project = load_project_required(&cwd)?;
            commands::resolve::run(&project, board.as_deref(), framework, &format)
        }

        Commands::Ldscript {
            board,
            write_template,
        } => {
            if let Some(path) = write_template {
                return commands::ldscript::write_template(&path);
            }
            let project = load_project_optional(&cwd)?;
            commands::ldscript::run(project.as_ref(), &cwd, board.as_deref())
        }

        Commands::Scrape {
            makefile,
            prefix,
            kind,
            root,
            includes,
        } => {
            if includes {
                commands::scrape::includes(&makefile, &root)
            } else {
                commands::scrape::run(&makefile, &prefix, kind, &root)
            }
        }

        Commands::Upload {
            port,
            protocol,
            dry_run,
        } => {
            let project = load_project_required(&cwd)?;
            commands::upload::run(&project, port.as_deref(), protocol.as_deref(), dry_run)
        }
    }
}

/// Load the project, returning an error if there is none.
fn load_project_required(cwd: &Path) -> anyhow::Result<Project> {
    match load_project_optional(cwd)? {
        Some(project) => Ok(project),
        None => anyhow::bail!("no {} found (run `ststm32 init` first)", manifest::MANIFEST_FILE),
    }
}

/// Try to load the project from the current directory upward.
fn load_project_optional(cwd: &Path) -> anyhow::Result<Option<Project>> {
    Ok(ProjectManifest::find_and_load(cwd)?.map(|(manifest, dir)| Project { manifest, dir }))
}
