//! Upload of built media to an object store bucket.
//!
//! Each file is sent with a content type guessed from its extension,
//! optionally gzipped and optionally with a far-future `Expires` header.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use ignore::WalkBuilder;
use pathdiff::diff_paths;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Component, Path, PathBuf};

/// Expires header is set this many days from now.
pub const FAR_FUTURE_EXPIRY_DAYS: i64 = 365 * 2;
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub bucket: String,
    pub endpoint: String,
    pub acl: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadOptions {
    pub gzip: bool,
    pub expires: bool,
}

/// A source file and the key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub src: PathBuf,
    pub key: String,
}

/// Body and headers of one PUT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadObject {
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub content_encoding: Option<&'static str>,
    pub expires: Option<String>,
}

pub trait ObjectStore {
    /// Store `object` under `key`, returning a short status for the log.
    fn put(&self, key: &str, object: &UploadObject) -> Result<String>;
}

/// Plain HTTP PUT to `{endpoint}/{bucket}/{key}`. Requests are unsigned.
pub struct HttpStore {
    client: reqwest::blocking::Client,
    config: UploadConfig,
}

impl HttpStore {
    pub fn new(config: UploadConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bucket,
            key.trim_start_matches('/')
        )
    }
}

impl ObjectStore for HttpStore {
    fn put(&self, key: &str, object: &UploadObject) -> Result<String> {
        let url = self.url(key);
        let mut request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, object.content_type)
            .header("x-amz-acl", &self.config.acl)
            .body(object.body.clone());
        if let Some(encoding) = object.content_encoding {
            request = request.header(reqwest::header::CONTENT_ENCODING, encoding);
        }
        if let Some(expires) = &object.expires {
            request = request.header(reqwest::header::EXPIRES, expires);
        }

        let response = request.send().with_context(|| format!("PUT {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("PUT {url} returned {status}");
        }
        Ok(status.to_string())
    }
}

/// Content type for the upload, `text/plain` when unknown.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "swf" => "application/x-shockwave-flash",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "text/plain",
    }
}

pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(6));
    encoder.write_all(data).context("Failed to gzip payload")?;
    encoder.finish().context("Failed to gzip payload")
}

pub fn expires_header(now: DateTime<Utc>) -> String {
    (now + Duration::days(FAR_FUTURE_EXPIRY_DAYS)).format(HTTP_DATE).to_string()
}

pub fn prepare(src: &Path, options: UploadOptions, now: DateTime<Utc>) -> Result<UploadObject> {
    let data = fs::read(src).with_context(|| format!("Failed to read {}", src.display()))?;
    let (body, content_encoding) = if options.gzip {
        (gzip(&data)?, Some("gzip"))
    } else {
        (data, None)
    };
    Ok(UploadObject {
        body,
        content_type: content_type(src),
        content_encoding,
        expires: options.expires.then(|| expires_header(now)),
    })
}

/// Turn a path into a bucket key: normalised, forward slashes, no `./`.
/// `None` when `..` climbs above the first component.
fn key_for(path: &Path) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Some(parts.join("/"))
}

/// Jobs from newline separated paths; `.` and non-files are skipped.
pub fn jobs_from_lines(reader: impl BufRead) -> Result<Vec<UploadJob>> {
    let mut jobs = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read file list from stdin")?;
        let path = PathBuf::from(line.trim_end_matches('\r'));
        let Some(key) = key_for(&path) else {
            log::warn!("Skipping {}: no bucket key above the current folder", path.display());
            continue;
        };
        if key.is_empty() || !path.is_file() {
            continue;
        }
        jobs.push(UploadJob { src: path, key });
    }
    Ok(jobs)
}

/// Jobs for every regular file below `root`, keyed relative to it.
pub fn jobs_from_dir(root: &Path) -> Result<Vec<UploadJob>> {
    let walker = WalkBuilder::new(root).standard_filters(false).hidden(true).build();

    let mut jobs = Vec::new();
    for entry in walker {
        let entry = entry.context("Failed to walk upload folder")?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Some(key) = diff_paths(entry.path(), root).and_then(|relative| key_for(&relative)) else {
            continue;
        };
        jobs.push(UploadJob {
            src: entry.path().to_path_buf(),
            key,
        });
    }
    jobs.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(jobs)
}

/// Upload every job in order. The first failure stops the run.
pub fn upload_all(store: &dyn ObjectStore, bucket: &str, jobs: &[UploadJob], options: UploadOptions) -> Result<usize> {
    for job in jobs {
        log::info!("Uploading {} to {}/{}", job.src.display(), bucket, job.key);
        let object = prepare(&job.src, options, Utc::now())?;
        let status = store.put(&job.key, &object)?;
        log::info!("{status}");
    }
    Ok(jobs.len())
}
