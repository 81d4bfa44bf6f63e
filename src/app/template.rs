//! Development/production switch for asset references in templates.
//!
//! `{% ifprod "js/all.js" %} ... {% endifprod %}` keeps the enclosed tags
//! while optimization is off, and collapses to a single tag pointing at the
//! concatenated bundle when it is on.

use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use thiserror::Error;

static BLOCK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%\s*(ifprod|endifprod)\b([^%]*)%\}").expect("valid block tag regex"));
static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("valid variable regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("'ifprod' requires exactly 1 argument, got `{0}`")]
    Arguments(String),
    #[error("'ifprod' at byte {0} is missing its 'endifprod'")]
    Unclosed(usize),
    #[error("'ifprod' blocks cannot be nested (byte {0})")]
    Nested(usize),
    #[error("'endifprod' at byte {0} has no matching 'ifprod'")]
    Stray(usize),
}

#[derive(Debug, Clone, Default)]
pub struct TemplateSettings {
    pub optimize: Option<bool>,
    pub debug: bool,
    pub version: String,
    pub media_url: String,
}

impl TemplateSettings {
    /// Explicit `optimize` setting, otherwise on whenever debug is off.
    pub fn should_optimize(&self) -> bool {
        self.optimize.unwrap_or(!self.debug)
    }

    /// Suffix spliced into asset names by templates: empty in debug mode.
    pub fn version_string(&self) -> String {
        if self.debug {
            String::new()
        } else {
            format!(".{}", self.version)
        }
    }

    pub fn context(&self) -> HashMap<&'static str, String> {
        HashMap::from([
            ("VERSION_STRING", self.version_string()),
            ("MEDIA_URL", self.media_url.clone()),
        ])
    }
}

struct Block<'t> {
    dest: String,
    body: &'t str,
    start: usize,
    end: usize,
}

pub fn render(template: &str, settings: &TemplateSettings) -> Result<String, TemplateError> {
    let context = settings.context();
    let optimize = settings.should_optimize();
    let mut emitted: HashSet<String> = HashSet::new();
    let mut out = String::with_capacity(template.len());
    let mut pos = 0;

    for block in parse_blocks(template)? {
        out.push_str(&substitute(&template[pos..block.start], &context));
        pos = block.end;

        if !optimize {
            out.push_str(&substitute(block.body, &context));
            continue;
        }
        let resolved = substitute(&block.dest, &context);
        let tag = if block.dest.ends_with(".js") {
            format!("<script src=\"{resolved}\" type=\"text/javascript\"></script>")
        } else if block.dest.ends_with(".css") {
            format!("<link href=\"{resolved}\" rel=\"stylesheet\" type=\"text/css\"/>")
        } else {
            continue;
        };
        // At most once per template for a given destination.
        if emitted.insert(block.dest) {
            out.push_str(&tag);
        }
    }

    out.push_str(&substitute(&template[pos..], &context));
    Ok(out)
}

fn parse_blocks(template: &str) -> Result<Vec<Block<'_>>, TemplateError> {
    let mut blocks = Vec::new();
    let mut open: Option<(String, usize, usize)> = None;

    for caps in BLOCK_TAG.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        match (&caps[1], open.take()) {
            ("ifprod", None) => {
                let dest = parse_argument(&caps[2])?;
                open = Some((dest, whole.start(), whole.end()));
            }
            ("ifprod", Some(_)) => return Err(TemplateError::Nested(whole.start())),
            (_, Some((dest, start, body_start))) => blocks.push(Block {
                dest,
                body: &template[body_start..whole.start()],
                start,
                end: whole.end(),
            }),
            (_, None) => return Err(TemplateError::Stray(whole.start())),
        }
    }

    match open {
        Some((_, start, _)) => Err(TemplateError::Unclosed(start)),
        None => Ok(blocks),
    }
}

fn parse_argument(raw: &str) -> Result<String, TemplateError> {
    let raw = raw.trim();
    let single = if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        !inner.contains('"')
    } else {
        raw.split_whitespace().count() == 1
    };
    if !single {
        return Err(TemplateError::Arguments(raw.to_string()));
    }
    Ok(raw.replace('"', ""))
}

/// Replace known `{{ NAME }}` variables; unknown ones are left for the
/// downstream template engine.
fn substitute(text: &str, context: &HashMap<&'static str, String>) -> String {
    VARIABLE
        .replace_all(text, |caps: &Captures| match context.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
