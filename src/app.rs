// Declare modules
pub mod build;
pub mod cli;
pub mod concat;
pub mod config;
pub mod error;
pub mod handlers;
pub mod markup;
pub mod minifier;
pub mod models;
pub mod scanner;
pub mod template;
pub mod upload;
pub mod versioning;

#[cfg(test)]
pub mod testutil;

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::fs;
use std::io;

use self::cli::{BuildArgs, Cli, Command, RenderArgs, UploadArgs};
use self::config::{load_settings, resolve_build_config, resolve_template_settings, resolve_upload_config, Settings};
use self::upload::{HttpStore, UploadJob, UploadOptions};

/// Parses args, sets up logging and runs the requested command.
pub fn run() -> Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    // The project root is the folder we are invoked from.
    let current_dir = env::current_dir().context("Failed to get current directory")?;
    let settings = load_settings(args.settings.as_deref(), &current_dir)?;

    match &args.command {
        Command::Build(build_args) => run_build(build_args, args.verbose, &settings, &current_dir),
        Command::Upload(upload_args) => run_upload(upload_args, &settings),
        Command::Render(render_args) => run_render(render_args, &settings),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn run_build(args: &BuildArgs, verbose: bool, settings: &Settings, current_dir: &std::path::Path) -> Result<()> {
    let config = resolve_build_config(args, verbose, settings, current_dir)?;
    let report = build::run(&config)?;

    if report.tool_failures > 0 {
        log::warn!("⚠️ {} file(s) could not be minified", report.tool_failures);
    }
    println!("Built {} into {}: {}", config.source_root.display(), config.build_root.display(), report);
    Ok(())
}

fn run_upload(args: &UploadArgs, settings: &Settings) -> Result<()> {
    let upload_config = resolve_upload_config(settings)?;

    let jobs = if let Some(dir) = &args.dir {
        upload::jobs_from_dir(dir)?
    } else if let [src, dest] = args.paths.as_slice() {
        vec![UploadJob {
            src: src.into(),
            key: dest.trim_start_matches('/').to_string(),
        }]
    } else {
        upload::jobs_from_lines(io::stdin().lock())?
    };

    if jobs.is_empty() {
        log::warn!("⚠️ Nothing to upload.");
        return Ok(());
    }

    let options = UploadOptions {
        gzip: !args.no_gzip,
        expires: !args.no_expires,
    };
    let bucket = upload_config.bucket.clone();
    let store = HttpStore::new(upload_config)?;
    let count = upload::upload_all(&store, &bucket, &jobs, options)?;
    println!("Uploaded {} file(s) to {}", count, bucket);
    Ok(())
}

fn run_render(args: &RenderArgs, settings: &Settings) -> Result<()> {
    let template_settings = resolve_template_settings(settings, args.optimize_override());
    let source = fs::read_to_string(&args.template)
        .context(format!("Failed to read template {:?}", args.template))?;
    let rendered = template::render(&source, &template_settings)
        .context(format!("Failed to render {:?}", args.template))?;

    match &args.output {
        Some(path) => fs::write(path, rendered).context(format!("Failed to write {:?}", path))?,
        None => print!("{}", rendered),
    }
    Ok(())
}
