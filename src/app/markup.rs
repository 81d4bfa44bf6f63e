//! Inline `<script>` / `<style>` compression inside markup files.
//!
//! Script and style bodies are raw text in HTML: a `<` inside them never
//! opens a tag, and only the matching close tag ends them. Elements are
//! located with that rule and only their bodies are replaced. Every other
//! byte of the document is written back unchanged.
//!
//! Support is compiled in with the `inline` feature. Builds that ask for
//! inline compression without it are rejected up front, see
//! [`crate::app::build::preflight`].

use crate::app::minifier::Minifier;
use crate::app::models::InlineTarget;
use anyhow::Result;

/// Whether this binary was compiled with inline markup support.
pub const AVAILABLE: bool = cfg!(feature = "inline");

/// Result of rewriting one document.
#[derive(Debug, Default)]
pub struct InlineOutcome {
    pub html: String,
    pub rewritten: usize,
    pub failures: usize,
}

#[cfg(feature = "inline")]
mod scan {
    use crate::app::models::InlineTarget;
    use regex::Regex;
    use std::ops::Range;
    use std::sync::LazyLock;

    /// A comment, or the opening tag of a raw-text element. Quoted attribute
    /// values may contain `>`.
    static OPENING: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?is)<!--.*?-->|<(script|style)(?:\s(?:[^>"']|"[^"]*"|'[^']*')*)?>"#)
            .expect("valid opening tag regex")
    });
    static SCRIPT_END: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)</script[\s/>]").expect("valid script end regex"));
    static STYLE_END: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)</style[\s/>]").expect("valid style end regex"));

    /// Body ranges of every script and style element, in document order.
    /// Comments are skipped. An element without a close tag ends the scan
    /// and is not reported.
    pub fn raw_text_elements(html: &str) -> Vec<(InlineTarget, Range<usize>)> {
        let mut found = Vec::new();
        let mut pos = 0;

        while let Some(caps) = OPENING.captures_at(html, pos) {
            let Some(open) = caps.get(0) else {
                break;
            };
            let Some(name) = caps.get(1) else {
                pos = open.end();
                continue;
            };
            let (element, end) = if name.as_str().eq_ignore_ascii_case("script") {
                (InlineTarget::Script, &*SCRIPT_END)
            } else {
                (InlineTarget::Style, &*STYLE_END)
            };
            let Some(close) = end.find_at(html, open.end()) else {
                break;
            };
            found.push((element, open.end()..close.start()));
            pos = close.end();
        }
        found
    }
}

/// Minify the body of every `target` element in place.
///
/// An element whose minification fails keeps its text.
#[cfg(feature = "inline")]
pub fn compress_inline(html: &str, target: InlineTarget, minifier: &Minifier) -> Result<InlineOutcome> {
    let mut outcome = InlineOutcome {
        html: String::with_capacity(html.len()),
        ..InlineOutcome::default()
    };
    let mut copied = 0;

    for (element, body) in scan::raw_text_elements(html) {
        let text = &html[body.clone()];
        if element != target || text.trim().is_empty() {
            continue;
        }
        match minifier.minify_inline(text, target.kind()) {
            Ok(minified) => {
                outcome.html.push_str(&html[copied..body.start]);
                outcome.html.push_str(&minified);
                copied = body.end;
                outcome.rewritten += 1;
            }
            Err(err) => {
                log::error!("Inline <{}> left untouched: {:#}", target.tag_name(), anyhow::Error::new(err));
                outcome.failures += 1;
            }
        }
    }

    outcome.html.push_str(&html[copied..]);
    Ok(outcome)
}

#[cfg(not(feature = "inline"))]
pub fn compress_inline(_html: &str, _target: InlineTarget, _minifier: &Minifier) -> Result<InlineOutcome> {
    Err(crate::app::error::BuildError::MarkupUnavailable.into())
}
