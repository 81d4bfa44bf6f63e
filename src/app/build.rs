//! One build run: preflight checks, fresh build directory, tree walk, then
//! the concatenation pass.

use crate::app::concat::ConcatPlan;
use crate::app::error::{BuildError, ToolError};
use crate::app::markup;
use crate::app::minifier::Minifier;
use crate::app::models::{BuildConfig, BuildReport, ToolFailurePolicy};
use crate::app::scanner::Scanner;
use anyhow::{Context, Result};
use std::fs;

/// State shared by the walker, the handlers and the concat pass.
pub struct BuildContext<'a> {
    pub config: &'a BuildConfig,
    pub minifier: &'a Minifier,
    pub concat: &'a ConcatPlan,
    pub report: BuildReport,
}

impl<'a> BuildContext<'a> {
    pub fn new(config: &'a BuildConfig, minifier: &'a Minifier, concat: &'a ConcatPlan) -> Self {
        Self {
            config,
            minifier,
            concat,
            report: BuildReport::default(),
        }
    }

    /// Record a failed minifier run. Errors out only under the abort policy.
    pub fn tool_failed(&mut self, err: ToolError) -> Result<()> {
        self.report.tool_failures += 1;
        match self.config.tool_failure {
            ToolFailurePolicy::Continue => {
                log::error!("{:#}", anyhow::Error::new(err));
                Ok(())
            }
            ToolFailurePolicy::Abort => Err(BuildError::ToolFailure(err).into()),
        }
    }
}

/// Fatal configuration checks. Runs before any file is touched.
pub fn preflight(config: &BuildConfig, markup_available: bool) -> Result<Minifier, BuildError> {
    if config.inline_target().is_some() && !markup_available {
        return Err(BuildError::MarkupUnavailable);
    }

    let minifier = Minifier::from_command(&config.minifier)?;
    minifier.ensure_available()?;

    let overlaps = config.build_root.starts_with(&config.source_root)
        || config.source_root.starts_with(&config.build_root);
    if overlaps {
        return Err(BuildError::BuildInsideSource {
            build: config.build_root.clone(),
            source_root: config.source_root.clone(),
        });
    }

    Ok(minifier)
}

pub fn run(config: &BuildConfig) -> Result<BuildReport> {
    run_with(config, markup::AVAILABLE)
}

fn run_with(config: &BuildConfig, markup_available: bool) -> Result<BuildReport> {
    let minifier = preflight(config, markup_available)?;
    let plan = ConcatPlan::resolve(config)?;
    if config.verbose {
        for bundle in plan.bundles() {
            log::info!("Bundle {} <- {} file(s)", bundle.dest.display(), bundle.sources.len());
        }
    }

    if config.build_root.exists() {
        fs::remove_dir_all(&config.build_root)
            .with_context(|| format!("Failed to remove {}", config.build_root.display()))?;
    }
    fs::create_dir_all(&config.build_root)
        .with_context(|| format!("Failed to create {}", config.build_root.display()))?;
    log::info!(
        "Building {} into {}",
        config.source_root.display(),
        config.build_root.display()
    );

    let mut ctx = BuildContext::new(config, &minifier, &plan);
    Scanner::new(config.source_root.clone(), config.site_root(), config.keep_hidden).mirror(&mut ctx)?;
    plan.apply(&mut ctx)?;

    Ok(ctx.report)
}
