use crate::app::cli::BuildArgs;
use crate::app::error::BuildError;
use crate::app::models::{BuildConfig, ConcatRule, ToolFailurePolicy};
use crate::app::template::TemplateSettings;
use crate::app::upload::UploadConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const SETTINGS_FILE: &str = "yslow.toml";
pub const JAR_ENV: &str = "YUICOMPRESSOR_JAR";
const DEFAULT_VERSION: &str = "v1";

/// Contents of a settings file. Every field is optional so user defaults and
/// the project file can be layered.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Settings {
    pub version: Option<String>,
    pub build_folder: Option<PathBuf>,
    pub minifier: Option<Vec<String>>,
    pub yuicompressor_jar: Option<String>,
    pub tool_failure: Option<ToolFailurePolicy>,
    pub optimize: Option<bool>,
    pub debug: Option<bool>,
    pub media_url: Option<String>,
    #[serde(default)]
    pub concat: Vec<ConcatRule>,
    #[serde(default)]
    pub upload: UploadSettings,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct UploadSettings {
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub acl: Option<String>,
}

impl Settings {
    /// Fill unset values from `fallback`. Concat rules are project-only.
    pub fn or(self, fallback: Settings) -> Settings {
        Settings {
            version: self.version.or(fallback.version),
            build_folder: self.build_folder.or(fallback.build_folder),
            minifier: self.minifier.or(fallback.minifier),
            yuicompressor_jar: self.yuicompressor_jar.or(fallback.yuicompressor_jar),
            tool_failure: self.tool_failure.or(fallback.tool_failure),
            optimize: self.optimize.or(fallback.optimize),
            debug: self.debug.or(fallback.debug),
            media_url: self.media_url.or(fallback.media_url),
            concat: self.concat,
            upload: UploadSettings {
                bucket: self.upload.bucket.or(fallback.upload.bucket),
                endpoint: self.upload.endpoint.or(fallback.upload.endpoint),
                acl: self.upload.acl.or(fallback.upload.acl),
            },
        }
    }
}

fn read_settings(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path).context(format!("Failed to read settings at {:?}", path))?;
    toml::from_str(&content).context(format!("Failed to parse {:?}", path))
}

/// User-wide defaults from ~/.config/yslow/config.toml, if present.
fn load_user_defaults() -> Result<Settings> {
    let Some(home) = dirs::home_dir() else {
        return Ok(Settings::default());
    };
    let config_path = home.join(".config").join("yslow").join("config.toml");

    if !config_path.exists() {
        return Ok(Settings::default());
    }
    read_settings(&config_path)
}

/// Project settings layered over user defaults. An explicit `--settings`
/// path must exist; the default project file is optional.
pub fn load_settings(explicit: Option<&Path>, source_root: &Path) -> Result<Settings> {
    let project = match explicit {
        Some(path) => read_settings(path)?,
        None => {
            let default_path = source_root.join(SETTINGS_FILE);
            if default_path.exists() {
                read_settings(&default_path)?
            } else {
                log::debug!("No {} found in {}", SETTINGS_FILE, source_root.display());
                Settings::default()
            }
        }
    };
    Ok(project.or(load_user_defaults()?))
}

/// Minifier command: explicit command, then jar setting, then the
/// YUICOMPRESSOR_JAR environment variable.
fn resolve_minifier(settings: &Settings, env_jar: Option<String>) -> Result<Vec<String>, BuildError> {
    if let Some(command) = settings.minifier.as_ref().filter(|c| !c.is_empty()) {
        return Ok(command.clone());
    }
    settings
        .yuicompressor_jar
        .clone()
        .or(env_jar)
        .filter(|jar| !jar.trim().is_empty())
        .map(|jar| vec!["java".to_string(), "-jar".to_string(), jar])
        .ok_or(BuildError::MissingMinifier)
}

pub fn resolve_build_config(
    args: &BuildArgs,
    verbose: bool,
    settings: &Settings,
    source_root: &Path,
) -> Result<BuildConfig> {
    resolve_build_config_with_env(args, verbose, settings, source_root, std::env::var(JAR_ENV).ok())
}

fn resolve_build_config_with_env(
    args: &BuildArgs,
    verbose: bool,
    settings: &Settings,
    source_root: &Path,
    env_jar: Option<String>,
) -> Result<BuildConfig> {
    let source_root = normalize(source_root);
    let minifier = resolve_minifier(settings, env_jar)?;

    let version = match &settings.version {
        Some(version) => version.clone(),
        None => {
            if !args.disable_versioning {
                log::warn!(
                    "Versioning requested but no `version` set in settings, using the default \"{}\"",
                    DEFAULT_VERSION
                );
            }
            DEFAULT_VERSION.to_string()
        }
    };

    let build_root = match args.build_folder.as_ref().or(settings.build_folder.as_ref()) {
        Some(folder) => normalize(&source_root.join(folder)),
        None => {
            let name = source_root
                .file_name()
                .context("Cannot derive a build folder name from the filesystem root")?;
            let parent = source_root.parent().unwrap_or(&source_root);
            let folder = parent.join(format!("{}-build", name.to_string_lossy()));
            log::warn!("No `build_folder` in settings, using {}", folder.display());
            folder
        }
    };

    let tool_failure = if args.abort_on_tool_failure {
        ToolFailurePolicy::Abort
    } else {
        settings.tool_failure.unwrap_or_default()
    };

    Ok(BuildConfig {
        source_root,
        build_root,
        version,
        concat_rules: settings.concat.clone(),
        minifier,
        keep_hidden: args.keep_hidden,
        versioning_disabled: args.disable_versioning,
        compress_inline_script: args.compress_inline_script,
        compress_inline_style: args.compress_inline_style,
        verbose,
        tool_failure,
    })
}

pub fn resolve_upload_config(settings: &Settings) -> Result<UploadConfig> {
    let bucket = settings
        .upload
        .bucket
        .clone()
        .context("Add `bucket` under [upload] in your settings file")?;
    Ok(UploadConfig {
        bucket,
        endpoint: settings
            .upload
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://s3.amazonaws.com".to_string()),
        acl: settings.upload.acl.clone().unwrap_or_else(|| "public-read".to_string()),
    })
}

pub fn resolve_template_settings(settings: &Settings, optimize_override: Option<bool>) -> TemplateSettings {
    TemplateSettings {
        optimize: optimize_override.or(settings.optimize),
        debug: settings.debug.unwrap_or(false),
        version: settings.version.clone().unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        media_url: settings.media_url.clone().unwrap_or_default(),
    }
}

/// Lexically resolve `.` and `..` so overlap checks compare like with like.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
