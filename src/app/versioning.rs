//! Cache-busting file names.
//!
//! A version tag is spliced in front of the final extension (`app.js` →
//! `app.v3.js`), and image references inside stylesheets get the same
//! treatment so they keep pointing at the versioned copies.

use regex::Regex;
use std::borrow::Cow;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// `url(...)` with a png/gif/jpg target, optionally quoted. The path part may
/// not contain `)` or quotes, so one match never spans two `url()` calls.
static CSS_IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\((["']?)([^)"']+)\.(png|gif|jpg)["']?\)"#).expect("valid css url regex")
});

/// Insert `tag` before the extension of the last path component.
///
/// Returns the path unchanged when versioning is disabled or the file name
/// has no extension.
pub fn versioned_name(path: &Path, tag: &str, disabled: bool) -> PathBuf {
    if disabled {
        return path.to_path_buf();
    }
    let (Some(stem), Some(ext)) = (path.file_stem(), path.extension()) else {
        return path.to_path_buf();
    };

    let mut name = OsString::from(stem);
    name.push(".");
    name.push(tag);
    name.push(".");
    name.push(ext);
    path.with_file_name(name)
}

/// Rewrite `url(<path>.<png|gif|jpg>)` references to their versioned names.
pub fn rewrite_css_asset_urls<'a>(css: &'a str, tag: &str) -> Cow<'a, str> {
    CSS_IMAGE_URL.replace_all(css, |caps: &regex::Captures| {
        format!("url({q}{}.{tag}.{}{q})", &caps[2], &caps[3], q = &caps[1])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_tag_before_extension() {
        assert_eq!(
            versioned_name(Path::new("app.js"), "v3", false),
            PathBuf::from("app.v3.js")
        );
        assert_eq!(
            versioned_name(Path::new("/out/site/js/all.min.js"), "v2", false),
            PathBuf::from("/out/site/js/all.min.v2.js")
        );
    }

    #[test]
    fn leaves_names_without_extension() {
        assert_eq!(versioned_name(Path::new("LICENSE"), "v3", false), PathBuf::from("LICENSE"));
        assert_eq!(versioned_name(Path::new(".htaccess"), "v3", false), PathBuf::from(".htaccess"));
        // Dots in directory names do not count.
        assert_eq!(
            versioned_name(Path::new("lib.d/README"), "v3", false),
            PathBuf::from("lib.d/README")
        );
    }

    #[test]
    fn disabled_is_identity() {
        assert_eq!(versioned_name(Path::new("app.js"), "v3", true), PathBuf::from("app.js"));
    }

    #[test]
    fn rewrites_image_urls() {
        assert_eq!(
            rewrite_css_asset_urls("background: url(a/b.png)", "v3"),
            "background: url(a/b.v3.png)"
        );
        assert_eq!(
            rewrite_css_asset_urls("a{background:url('x.gif')}b{background:url(\"y.jpg\")}", "v1"),
            "a{background:url('x.v1.gif')}b{background:url(\"y.v1.jpg\")}"
        );
    }

    #[test]
    fn ignores_other_urls() {
        let css = "a{background:url(icon.svg)} b{src:url(http://cdn.example.com/font.woff)} c{x:url()}";
        assert!(matches!(rewrite_css_asset_urls(css, "v3"), Cow::Borrowed(_)));
    }

    #[test]
    fn svg_before_png_is_not_swallowed() {
        assert_eq!(
            rewrite_css_asset_urls("url(icon.svg) url(b.png)", "v2"),
            "url(icon.svg) url(b.v2.png)"
        );
    }

    #[test]
    fn single_pass_does_not_double_tag() {
        let once = rewrite_css_asset_urls("url(a.png) url(a.png)", "v2").into_owned();
        assert_eq!(once, "url(a.v2.png) url(a.v2.png)");
    }
}
