use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Build, version and upload optimized static media for a web project"
)]
pub struct Cli {
    /// Settings file to use instead of ./yslow.toml
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Verbose mode for you control freaks
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a production-ready compressed copy of the project
    Build(BuildArgs),
    /// Upload static media files to an object store bucket
    ///
    /// Requests are sent unsigned, with an `x-amz-acl` header. The bucket
    /// must accept anonymous PUTs, or `upload.endpoint` must point at a proxy
    /// that signs them.
    Upload(UploadArgs),
    /// Render `ifprod` blocks of a template for the current optimize setting
    Render(RenderArgs),
}

#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Keep hidden files and folders (.git, .svn, ...) in the build
    #[arg(long)]
    pub keep_hidden: bool,

    /// Compress inline <script> tags
    #[arg(long)]
    pub compress_inline_script: bool,

    /// Compress inline <style> tags
    #[arg(long)]
    pub compress_inline_style: bool,

    /// Disable versioning of static media file names
    #[arg(long)]
    pub disable_versioning: bool,

    /// Output folder (overrides `build_folder` from settings)
    #[arg(long)]
    pub build_folder: Option<PathBuf>,

    /// Stop the build at the first minifier failure
    #[arg(long)]
    pub abort_on_tool_failure: bool,
}

#[derive(Args, Debug, Default)]
pub struct UploadArgs {
    /// Switch off gzip compression
    #[arg(long)]
    pub no_gzip: bool,

    /// No far future Expires header
    #[arg(long)]
    pub no_expires: bool,

    /// Upload every file below this folder, keyed by relative path
    #[arg(long, conflicts_with = "paths")]
    pub dir: Option<PathBuf>,

    /// SRC DEST pair; without it, file paths are read from stdin
    #[arg(num_args = 2, value_names = ["SRC", "DEST"])]
    pub paths: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct RenderArgs {
    /// Template file to render
    pub template: PathBuf,

    /// Force optimization on
    #[arg(long, conflicts_with = "no_optimize")]
    pub optimize: bool,

    /// Force optimization off
    #[arg(long)]
    pub no_optimize: bool,

    /// Write the result here instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

impl RenderArgs {
    pub fn optimize_override(&self) -> Option<bool> {
        match (self.optimize, self.no_optimize) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}
