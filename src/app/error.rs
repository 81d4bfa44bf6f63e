use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Fatal problems detected before or during a build run.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("No minifier configured: set `minifier` or `yuicompressor_jar` in settings, or the YUICOMPRESSOR_JAR environment variable")]
    MissingMinifier,

    #[error("Minifier program `{0}` was not found on PATH")]
    MinifierNotFound(String),

    #[error("Inline compression needs the markup parser; rebuild with the `inline` feature")]
    MarkupUnavailable,

    #[error("Build folder {build} overlaps the source folder {source_root}")]
    BuildInsideSource { build: PathBuf, source_root: PathBuf },

    #[error("Concat rule `{0}` did not match any source file")]
    EmptyConcatRule(String),

    #[error("Aborting build after minifier failure")]
    ToolFailure(#[source] ToolError),
}

/// A single failed invocation of the external minifier.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to run `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to pipe input to `{program}`")]
    Pipe {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Minifying {input} failed ({status}): {stderr}")]
    Exit {
        input: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Minifier produced non UTF-8 output")]
    InvalidUtf8,
}
