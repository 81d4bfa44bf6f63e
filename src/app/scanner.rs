use crate::app::build::BuildContext;
use crate::app::handlers::SourceFile;
use crate::app::models::FileClass;
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use pathdiff::diff_paths;
use std::fs;
use std::path::{Path, PathBuf};

/// Mirrors the source tree into the build directory, dispatching every
/// regular file to the handler for its class.
pub struct Scanner {
    root: PathBuf,
    target_root: PathBuf,
    keep_hidden: bool,
}

impl Scanner {
    /// `target_root` is the directory that stands in for `root` in the build.
    pub fn new(root: PathBuf, target_root: PathBuf, keep_hidden: bool) -> Self {
        Self {
            root,
            target_root,
            keep_hidden,
        }
    }

    /// Walk depth-first in file name order. A directory is created before
    /// anything inside it is written. Symlinks are never followed.
    pub fn mirror(&self, ctx: &mut BuildContext<'_>) -> Result<()> {
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .hidden(!self.keep_hidden)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for result in walker {
            let entry = result.context("Failed to walk source tree")?;
            self.process_entry(ctx, entry.path(), entry.file_type())?;
        }
        Ok(())
    }

    fn process_entry(&self, ctx: &mut BuildContext<'_>, path: &Path, file_type: Option<fs::FileType>) -> Result<()> {
        let relative = diff_paths(path, &self.root).unwrap_or_default();
        let target = self.target_root.join(&relative);

        let Some(file_type) = file_type else {
            log::warn!("Skipping {}: unknown file type", path.display());
            return Ok(());
        };

        if file_type.is_symlink() {
            log::warn!("Skipping symbolic link {}", path.display());
            ctx.report.symlinks_skipped += 1;
        } else if file_type.is_dir() {
            fs::create_dir(&target).with_context(|| format!("Failed to create {}", target.display()))?;
            ctx.report.directories += 1;
        } else if file_type.is_file() {
            let Some(target_dir) = target.parent() else {
                return Ok(());
            };
            let file = SourceFile {
                path,
                relative: &relative,
                target_dir,
            };
            FileClass::from_path(path).handler().handle(ctx, &file)?;
        }
        Ok(())
    }
}
