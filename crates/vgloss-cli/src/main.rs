mod commands;
mod logging;
mod progress;

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info};
use vgloss_core::config::load_configuration;
use vgloss_core::engine::{ensure_initialized, init_gallery};
use vgloss_core::{AppConfig, Database, ReconcileEngine};

fn main() {
    dotenv().ok();

    let args = Cli::parse();

    let root = match args.root.clone().map(Ok).unwrap_or_else(env::current_dir) {
        Ok(root) => root,
        Err(err) => {
            eprintln!("{} cannot determine gallery root: {}", "error:".red(), err);
            process::exit(1);
        }
    };

    let config = match load_configuration(Some(&root)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} loading configuration: {}", "error:".red(), err);
            process::exit(1);
        }
    };

    let guard = logging::init_logger(&config.data_path());

    let result = match args.command {
        Some(Commands::Init { noinput }) => run_init(&config, noinput),
        Some(Commands::Scan) => run_scan(&config),
        Some(Commands::Show { path }) => run_show(&config, &path),
        Some(Commands::Folders) => run_folders(&config),
        Some(Commands::PrintConfig) => run_print_config(&config),
        None => Cli::command().print_long_help().context("printing help"),
    };

    let code = match result {
        Ok(()) => 0,
        Err(err) => {
            error!("Error: {:#}", err);
            1
        }
    };
    // Flush the file log before exiting.
    drop(guard);
    process::exit(code);
}

fn run_init(config: &AppConfig, noinput: bool) -> Result<()> {
    println!(
        "Initializing vgloss gallery in: {}",
        config.root.display().to_string().cyan()
    );
    if !noinput && !prompt_confirm("Are you sure?", Some(true))? {
        bail!("initialization cancelled");
    }

    init_gallery(config)?;
    run_scan(config)
}

fn run_scan(config: &AppConfig) -> Result<()> {
    require_gallery(config)?;

    let engine = ReconcileEngine::new(config.clone());
    let reporter = CliReporter::new();
    let report = engine.reconcile(&reporter)?;

    println!();
    info!(
        "Walk: {}, Apply: {}, Metadata: {}",
        format!("{:.2}s", report.walk_duration.as_secs_f64()).green(),
        format!("{:.2}s", report.apply_duration.as_secs_f64()).green(),
        format!("{:.2}s", report.metadata_duration.as_secs_f64()).green(),
    );
    info!(
        "{} paths created, {} updated, {} deleted, {} unchanged",
        format!("{}", report.paths_created).cyan(),
        format!("{}", report.paths_updated).cyan(),
        format!("{}", report.paths_deleted).cyan(),
        format!("{}", report.paths_unchanged).cyan(),
    );
    info!(
        "{} contents created, {} purged, {} scanned",
        format!("{}", report.contents_created).cyan(),
        format!("{}", report.contents_purged).cyan(),
        format!("{}", report.contents_scanned).cyan(),
    );
    if report.scan_failures > 0 {
        info!(
            "{} contents could not be scanned and will be retried next time",
            format!("{}", report.scan_failures).red(),
        );
    }

    Ok(())
}

fn run_show(config: &AppConfig, path: &str) -> Result<()> {
    require_gallery(config)?;
    let db = open_index(config)?;

    let relative = gallery_relative(&config.root, path);
    let Some(record) = db.get_path(&relative)? else {
        bail!("{} is not in the index", relative);
    };
    let content = db
        .get_content(&record.content_ref)?
        .with_context(|| format!("content {} is missing", record.content_ref))?;

    println!("{:<14}{}", "path:".bold(), record.path);
    println!("{:<14}{}", "folder:".bold(), record.folder);
    println!("{:<14}{}", "modified:".bold(), record.mod_time_ns);
    println!("{:<14}{}", "fingerprint:".bold(), content.fingerprint);
    println!(
        "{:<14}{}",
        "mime type:".bold(),
        content.mime_type.as_deref().unwrap_or("-")
    );
    println!(
        "{:<14}{}",
        "taken:".bold(),
        content
            .timestamp
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "{:<14}{}",
        "scanned at:".bold(),
        content
            .scan_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "never".yellow().to_string())
    );

    let copies: Vec<String> = db
        .paths_for_content(&content.fingerprint)?
        .into_iter()
        .map(|p| p.path)
        .filter(|p| *p != record.path)
        .collect();
    if !copies.is_empty() {
        println!("{}", "also at:".bold());
        for copy in copies {
            println!("  {}", copy);
        }
    }

    if !content.metadata.is_empty() {
        println!("{}", "metadata:".bold());
        for (key, value) in &content.metadata {
            println!("  {}: {}", key.dimmed(), value);
        }
    }
    Ok(())
}

fn run_folders(config: &AppConfig) -> Result<()> {
    require_gallery(config)?;
    let db = open_index(config)?;

    let folders = db.list_folders()?;
    if folders.is_empty() {
        println!("{}", "(no folders)".dimmed());
    }
    for folder in folders {
        let count = db.paths_in_folder(&folder)?.len();
        println!("{} {}", folder, format!("({})", count).dimmed());
    }
    Ok(())
}

fn run_print_config(config: &AppConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("rendering configuration")?;
    print!("{}", rendered);
    Ok(())
}

fn require_gallery(config: &AppConfig) -> Result<()> {
    ensure_initialized(config).context("Run \"vgloss init\" to initialize it")?;
    Ok(())
}

fn open_index(config: &AppConfig) -> Result<Database> {
    let db_path = config.database_path();
    Database::open(&db_path).with_context(|| format!("opening index {}", db_path.display()))
}

/// Accepts paths relative to the gallery root, with or without a leading
/// `./`, or absolute paths inside it.
fn gallery_relative(root: &Path, path: &str) -> String {
    let candidate = PathBuf::from(path);
    let relative = match candidate.strip_prefix(root) {
        Ok(stripped) => stripped.to_string_lossy().into_owned(),
        Err(_) => path.to_string(),
    };
    relative
        .trim_start_matches("./")
        .trim_matches('/')
        .to_string()
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => println!("Please respond with 'yes' or 'no' (or 'y' or 'n')."),
        }
    }
}
