//! Concatenation of designated source files into bundles.
//!
//! Rules are expanded against the source tree before the walk so the
//! per-type handlers can tell which files belong to a bundle. After the walk,
//! every bundle is appended into the build directory and minified once.

use crate::app::build::BuildContext;
use crate::app::error::BuildError;
use crate::app::handlers::rewrite_css_file;
use crate::app::models::{BuildConfig, FileClass};
use anyhow::{Context, Result};
use globset::GlobBuilder;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// One rule with its sources resolved to paths relative to the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub dest: PathBuf,
    pub sources: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConcatPlan {
    bundles: Vec<Bundle>,
    members: HashSet<PathBuf>,
}

impl ConcatPlan {
    pub fn resolve(config: &BuildConfig) -> Result<Self> {
        let mut plan = Self::default();
        let tree = if config.concat_rules.iter().any(|rule| is_glob(&rule.source)) {
            list_source_files(config)?
        } else {
            Vec::new()
        };

        for rule in &config.concat_rules {
            let source = relative_spelling(&rule.source);
            let sources = if is_glob(&source) {
                let matcher = GlobBuilder::new(&source)
                    .literal_separator(true)
                    .build()
                    .with_context(|| format!("Invalid concat pattern: {}", rule.source))?
                    .compile_matcher();
                tree.iter().filter(|f| matcher.is_match(f)).cloned().collect()
            } else {
                let relative = PathBuf::from(&source);
                let absolute = config.source_root.join(&relative);
                if !absolute.is_file() {
                    anyhow::bail!("Concat source {} does not exist", absolute.display());
                }
                vec![relative]
            };

            if sources.is_empty() {
                return Err(BuildError::EmptyConcatRule(rule.source.clone()).into());
            }
            plan.members.extend(sources.iter().cloned());
            plan.bundles.push(Bundle {
                dest: PathBuf::from(relative_spelling(&rule.dest)),
                sources,
            });
        }

        Ok(plan)
    }

    /// Whether `relative` is emitted by a bundle instead of on its own.
    pub fn contains(&self, relative: &Path) -> bool {
        self.members.contains(relative)
    }

    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    /// Append every bundle into the build directory, then minify each
    /// distinct destination in place.
    pub fn apply(&self, ctx: &mut BuildContext<'_>) -> Result<()> {
        let site_root = ctx.config.site_root();
        let mut outputs: Vec<PathBuf> = Vec::new();

        for bundle in &self.bundles {
            let dest = ctx.config.versioned(&site_root.join(&bundle.dest));
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            for source in &bundle.sources {
                append_file(&ctx.config.source_root.join(source), &dest)?;
            }
            if !outputs.contains(&dest) {
                outputs.push(dest);
            }
        }

        for dest in &outputs {
            ctx.report.bundles += 1;
            if let Err(err) = ctx.minifier.minify_file(dest, dest) {
                ctx.tool_failed(err)?;
                continue;
            }
            if FileClass::from_path(dest) == FileClass::Stylesheet {
                rewrite_css_file(ctx.config, dest)?;
            }
        }
        Ok(())
    }
}

/// `./js//a.js` and `js/a.js` name the same file; the walker only produces
/// the second form.
fn relative_spelling(raw: &str) -> String {
    raw.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Every file under the source root, relative and sorted, honouring the
/// hidden-entry setting.
fn list_source_files(config: &BuildConfig) -> Result<Vec<PathBuf>> {
    let walker = WalkBuilder::new(&config.source_root)
        .standard_filters(false)
        .hidden(!config.keep_hidden)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.context("Failed to list source files")?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(&config.source_root) {
            files.push(relative.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn append_file(src: &Path, dst: &Path) -> Result<()> {
    log::info!("Appending {} to {}", src.display(), dst.display());
    let mut input = File::open(src).with_context(|| format!("Failed to open {}", src.display()))?;
    let mut output = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dst)
        .with_context(|| format!("Failed to open {}", dst.display()))?;
    io::copy(&mut input, &mut output)
        .with_context(|| format!("Failed to append {} to {}", src.display(), dst.display()))?;
    Ok(())
}
