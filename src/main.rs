use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use sorrel::{Site, Synchronizer, logging};

#[derive(Parser)]
#[command(name = "sorrel")]
#[command(about = "Site content index and incremental build engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new site skeleton
    Init {
        /// Directory to create the site in
        path: PathBuf,
    },

    /// Regenerate all derived files
    Build {
        /// Site root directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print collected errors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build, then keep the index in sync with filesystem changes
    Watch {
        /// Site root directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { path } => init(path),
        Commands::Build { path, json } => build(path, json),
        Commands::Watch { path } => watch(path),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init(path: PathBuf) -> sorrel::Result<ExitCode> {
    logging::init();
    Site::create(&path)?;
    println!("Created site in {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn build(path: PathBuf, json: bool) -> sorrel::Result<ExitCode> {
    let site = open(&path)?;
    let errors = site.generate();

    if json {
        println!("{}", serde_json::to_string_pretty(&errors).expect("errors serialize"));
    } else {
        for error in &errors {
            eprintln!("{}: {}", error.file, error.message);
        }
    }

    if errors.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn watch(path: PathBuf) -> sorrel::Result<ExitCode> {
    let site = Arc::new(open(&path)?);
    let errors = site.generate();
    for error in &errors {
        eprintln!("{}: {}", error.file, error.message);
    }

    let synchronizer = Synchronizer::new(site)?;
    synchronizer.run();
    Ok(ExitCode::SUCCESS)
}

fn open(path: &std::path::Path) -> sorrel::Result<Site> {
    // Logging levels come from the site configuration, so peek at it before
    // the site itself loads.
    let config = sorrel::SiteConfig::load(path)?;
    logging::init_with_config(&config.logging);
    Site::open(path)
}
