use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Represents the final configuration of one build run, after merging
/// settings files and CLI args. Read-only once constructed.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub source_root: PathBuf,
    pub build_root: PathBuf,
    pub version: String,
    pub concat_rules: Vec<ConcatRule>,
    pub minifier: Vec<String>,
    pub keep_hidden: bool,
    pub versioning_disabled: bool,
    pub compress_inline_script: bool,
    pub compress_inline_style: bool,
    pub verbose: bool,
    pub tool_failure: ToolFailurePolicy,
}

impl BuildConfig {
    /// Directory mirroring the source root inside the build root.
    pub fn site_root(&self) -> PathBuf {
        match self.source_root.file_name() {
            Some(name) => self.build_root.join(name),
            None => self.build_root.clone(),
        }
    }

    /// Which inline elements get minified, if any. Script wins over style.
    pub fn inline_target(&self) -> Option<InlineTarget> {
        if self.compress_inline_script {
            Some(InlineTarget::Script)
        } else if self.compress_inline_style {
            Some(InlineTarget::Style)
        } else {
            None
        }
    }

    pub fn versioned(&self, path: &Path) -> PathBuf {
        crate::app::versioning::versioned_name(path, &self.version, self.versioning_disabled)
    }
}

/// One concatenation rule: every file matched by `source` is appended to `dest`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConcatRule {
    pub source: String,
    pub dest: String,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolFailurePolicy {
    #[default]
    Continue,
    Abort,
}

/// File category derived from the extension. Drives handler dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Bytecode,
    Script,
    Stylesheet,
    Markup,
    Image,
    Other,
}

impl FileClass {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "pyc" | "pyo" => Self::Bytecode,
            "js" => Self::Script,
            "css" => Self::Stylesheet,
            "html" | "htm" => Self::Markup,
            "gif" | "jpg" | "png" => Self::Image,
            _ => Self::Other,
        }
    }
}

/// Kind of content handed to the minifier, mapped to its `--type` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Script,
    Style,
}

impl AssetKind {
    pub fn type_flag(self) -> &'static str {
        match self {
            Self::Script => "js",
            Self::Style => "css",
        }
    }
}

/// Inline element type rewritten inside markup files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineTarget {
    Script,
    Style,
}

impl InlineTarget {
    pub fn tag_name(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Style => "style",
        }
    }

    pub fn kind(self) -> AssetKind {
        match self {
            Self::Script => AssetKind::Script,
            Self::Style => AssetKind::Style,
        }
    }
}

/// Counters collected over one build run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub directories: usize,
    pub copied: usize,
    pub minified: usize,
    pub images: usize,
    pub markup_rewritten: usize,
    pub discarded: usize,
    pub deferred_to_concat: usize,
    pub bundles: usize,
    pub symlinks_skipped: usize,
    pub tool_failures: usize,
    pub inline_failures: usize,
}

impl std::fmt::Display for BuildReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} dirs, {} copied, {} minified, {} images, {} bundles, {} discarded",
            self.directories, self.copied, self.minified, self.images, self.bundles, self.discarded
        )?;
        if self.tool_failures > 0 || self.inline_failures > 0 {
            write!(
                f,
                " ({} minifier failures, {} inline failures)",
                self.tool_failures, self.inline_failures
            )?;
        }
        Ok(())
    }
}
