use crate::app::build::BuildContext;
use crate::app::markup;
use crate::app::models::{BuildConfig, FileClass};
use crate::app::versioning::rewrite_css_asset_urls;
use anyhow::{Context, Result};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

/// A regular file found by the walker, with its mirrored target directory.
#[derive(Debug)]
pub struct SourceFile<'p> {
    pub path: &'p Path,
    /// Relative to the source root.
    pub relative: &'p Path,
    pub target_dir: &'p Path,
}

impl SourceFile<'_> {
    /// Output path under the unversioned name.
    pub fn target(&self) -> PathBuf {
        match self.path.file_name() {
            Some(name) => self.target_dir.join(name),
            None => self.target_dir.to_path_buf(),
        }
    }
}

/// Decides what a file category turns into inside the build directory.
pub trait AssetHandler {
    fn handle(&self, ctx: &mut BuildContext<'_>, file: &SourceFile<'_>) -> Result<()>;
}

impl FileClass {
    pub fn handler(self) -> &'static dyn AssetHandler {
        match self {
            Self::Bytecode => &Discard,
            Self::Script => &ScriptHandler,
            Self::Stylesheet => &StylesheetHandler,
            Self::Markup => &MarkupHandler,
            Self::Image => &ImageHandler,
            Self::Other => &Passthrough,
        }
    }
}

/// Compiled artifacts never reach the build.
pub struct Discard;

impl AssetHandler for Discard {
    fn handle(&self, ctx: &mut BuildContext<'_>, file: &SourceFile<'_>) -> Result<()> {
        log::debug!("Skipping {}", file.path.display());
        ctx.report.discarded += 1;
        Ok(())
    }
}

pub struct Passthrough;

impl AssetHandler for Passthrough {
    fn handle(&self, ctx: &mut BuildContext<'_>, file: &SourceFile<'_>) -> Result<()> {
        copy_file(file.path, &file.target())?;
        ctx.report.copied += 1;
        Ok(())
    }
}

pub struct ScriptHandler;

impl AssetHandler for ScriptHandler {
    fn handle(&self, ctx: &mut BuildContext<'_>, file: &SourceFile<'_>) -> Result<()> {
        minify_unless_concatenated(ctx, file).map(|_| ())
    }
}

pub struct StylesheetHandler;

impl AssetHandler for StylesheetHandler {
    fn handle(&self, ctx: &mut BuildContext<'_>, file: &SourceFile<'_>) -> Result<()> {
        if let Some(output) = minify_unless_concatenated(ctx, file)? {
            rewrite_css_file(ctx.config, &output)?;
        }
        Ok(())
    }
}

/// Shared by scripts and stylesheets. Returns the output path when the
/// minifier succeeded.
fn minify_unless_concatenated(ctx: &mut BuildContext<'_>, file: &SourceFile<'_>) -> Result<Option<PathBuf>> {
    if ctx.concat.contains(file.relative) {
        log::debug!("Deferring {} to concatenation", file.relative.display());
        ctx.report.deferred_to_concat += 1;
        return Ok(None);
    }

    let output = ctx.config.versioned(&file.target());
    match ctx.minifier.minify_file(file.path, &output) {
        Ok(()) => {
            ctx.report.minified += 1;
            Ok(Some(output))
        }
        Err(err) => {
            ctx.tool_failed(err)?;
            Ok(None)
        }
    }
}

pub struct ImageHandler;

impl AssetHandler for ImageHandler {
    fn handle(&self, ctx: &mut BuildContext<'_>, file: &SourceFile<'_>) -> Result<()> {
        copy_file(file.path, &ctx.config.versioned(&file.target()))?;
        ctx.report.images += 1;
        Ok(())
    }
}

/// Copies markup as-is, or minifies its inline script/style elements when
/// requested. Markup keeps its unversioned name either way.
pub struct MarkupHandler;

impl AssetHandler for MarkupHandler {
    fn handle(&self, ctx: &mut BuildContext<'_>, file: &SourceFile<'_>) -> Result<()> {
        let Some(target) = ctx.config.inline_target() else {
            return Passthrough.handle(ctx, file);
        };

        let bytes = fs::read(file.path).with_context(|| format!("Failed to read {}", file.path.display()))?;
        let Ok(html) = String::from_utf8(bytes) else {
            log::warn!("{} is not UTF-8, copying without inline compression", file.path.display());
            return Passthrough.handle(ctx, file);
        };

        let outcome = markup::compress_inline(&html, target, ctx.minifier)
            .with_context(|| format!("Failed to process {}", file.path.display()))?;
        log::info!(
            "Minified {} inline <{}> element(s) in {}",
            outcome.rewritten,
            target.tag_name(),
            file.path.display()
        );
        let output = file.target();
        fs::write(&output, outcome.html).with_context(|| format!("Failed to write {}", output.display()))?;

        ctx.report.markup_rewritten += 1;
        ctx.report.inline_failures += outcome.failures;
        Ok(())
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    log::info!("Copying {} to {}", from.display(), to.display());
    fs::copy(from, to).with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}

/// Point image references of a written stylesheet at their versioned names.
pub fn rewrite_css_file(config: &BuildConfig, path: &Path) -> Result<()> {
    if config.versioning_disabled {
        return Ok(());
    }
    let css = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if let Cow::Owned(rewritten) = rewrite_css_asset_urls(&css, &config.version) {
        fs::write(path, rewritten).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::app::concat::ConcatPlan;
    use crate::app::minifier::Minifier;
    use crate::app::models::{BuildReport, ConcatRule, ToolFailurePolicy};
    use crate::app::testutil::{failing_minifier, fake_minifier, write_file};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        source: PathBuf,
        target: PathBuf,
        config: BuildConfig,
        minifier: Minifier,
    }

    fn fixture(minifier: fn(&Path) -> Minifier) -> Fixture {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("site");
        let target = dir.path().join("out");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&target).unwrap();
        let config = BuildConfig {
            source_root: source.clone(),
            build_root: dir.path().join("site-build"),
            version: "v3".into(),
            concat_rules: Vec::new(),
            minifier: Vec::new(),
            keep_hidden: false,
            versioning_disabled: false,
            compress_inline_script: false,
            compress_inline_style: false,
            verbose: false,
            tool_failure: ToolFailurePolicy::Continue,
        };
        let minifier = minifier(dir.path());
        Fixture { _dir: dir, source, target, config, minifier }
    }

    fn dispatch(fx: &Fixture, concat: &ConcatPlan, relative: &str) -> Result<BuildReport> {
        let path = fx.source.join(relative);
        let mut ctx = BuildContext::new(&fx.config, &fx.minifier, concat);
        let file = SourceFile {
            path: &path,
            relative: Path::new(relative),
            target_dir: &fx.target,
        };
        FileClass::from_path(&path).handler().handle(&mut ctx, &file)?;
        Ok(ctx.report)
    }

    #[test]
    fn image_is_copied_under_versioned_name() {
        let fx = fixture(fake_minifier);
        let png = [0x89, b'P', b'N', b'G', 0, 1, 2, 3];
        fs::write(fx.source.join("logo.png"), png).unwrap();

        let report = dispatch(&fx, &ConcatPlan::default(), "logo.png").unwrap();
        assert_eq!(report.images, 1);
        assert_eq!(fs::read(fx.target.join("logo.v3.png")).unwrap(), png);
        assert!(!fx.target.join("logo.png").exists());
    }

    #[test]
    fn script_is_minified_to_versioned_name() {
        let fx = fixture(fake_minifier);
        write_file(&fx.source, "app.js", "var a = 1;\n");

        let report = dispatch(&fx, &ConcatPlan::default(), "app.js").unwrap();
        assert_eq!(report.minified, 1);
        assert_eq!(fs::read_to_string(fx.target.join("app.v3.js")).unwrap(), "vara=1;");
    }

    #[test]
    fn stylesheet_gets_image_urls_versioned() {
        let fx = fixture(fake_minifier);
        write_file(&fx.source, "site.css", "body { background: url(img/bg.png) }\n");

        dispatch(&fx, &ConcatPlan::default(), "site.css").unwrap();
        assert_eq!(
            fs::read_to_string(fx.target.join("site.v3.css")).unwrap(),
            "body{background:url(img/bg.v3.png)}"
        );
    }

    #[test]
    fn concat_members_are_left_for_the_concat_pass() {
        let mut fx = fixture(fake_minifier);
        write_file(&fx.source, "js/a.js", "var a;");
        fx.config.concat_rules = vec![ConcatRule {
            source: "js/a.js".into(),
            dest: "js/all.js".into(),
        }];
        let plan = ConcatPlan::resolve(&fx.config).unwrap();

        let report = dispatch(&fx, &plan, "js/a.js").unwrap();
        assert_eq!(report.deferred_to_concat, 1);
        assert_eq!(report.minified, 0);
        assert_eq!(fs::read_dir(&fx.target).unwrap().count(), 0);
    }

    #[test]
    fn bytecode_is_discarded_and_unknown_copied() {
        let fx = fixture(fake_minifier);
        write_file(&fx.source, "views.pyc", "\0\0");
        write_file(&fx.source, "robots.txt", "User-agent: *\n");

        let report = dispatch(&fx, &ConcatPlan::default(), "views.pyc").unwrap();
        assert_eq!(report.discarded, 1);
        assert!(!fx.target.join("views.pyc").exists());

        dispatch(&fx, &ConcatPlan::default(), "robots.txt").unwrap();
        assert_eq!(
            fs::read_to_string(fx.target.join("robots.txt")).unwrap(),
            "User-agent: *\n"
        );
    }

    #[test]
    fn markup_without_inline_flags_is_copied() {
        let fx = fixture(fake_minifier);
        write_file(&fx.source, "index.html", "<script>var a = 1;</script>");

        let report = dispatch(&fx, &ConcatPlan::default(), "index.html").unwrap();
        assert_eq!(report.copied, 1);
        assert_eq!(
            fs::read_to_string(fx.target.join("index.html")).unwrap(),
            "<script>var a = 1;</script>"
        );
    }

    #[cfg(feature = "inline")]
    #[test]
    fn markup_inline_scripts_are_minified_in_place() {
        let mut fx = fixture(fake_minifier);
        fx.config.compress_inline_script = true;
        let page = "<!DOCTYPE html>\n<html lang=\"en\">\n<body data-x='1 > 0'>\n\
                    <script>for (i = 0; i<n; i++) { out += \"</p>\"; }</script>\n\
                    <p>after</p>\n</body>\n</html>\n";
        write_file(&fx.source, "index.html", page);

        let report = dispatch(&fx, &ConcatPlan::default(), "index.html").unwrap();
        assert_eq!(report.markup_rewritten, 1);
        assert_eq!(
            fs::read_to_string(fx.target.join("index.html")).unwrap(),
            "<!DOCTYPE html>\n<html lang=\"en\">\n<body data-x='1 > 0'>\n\
             <script>/*js*/for(i=0;i<n;i++){out+=\"</p>\";}</script>\n\
             <p>after</p>\n</body>\n</html>\n"
        );
        assert!(!fx.target.join("index.v3.html").exists());
    }

    #[test]
    fn minifier_failure_is_tolerated_by_default() {
        let fx = fixture(failing_minifier);
        write_file(&fx.source, "app.js", "var a;");

        let report = dispatch(&fx, &ConcatPlan::default(), "app.js").unwrap();
        assert_eq!(report.tool_failures, 1);
        assert!(!fx.target.join("app.v3.js").exists());
    }

    #[test]
    fn minifier_failure_aborts_when_configured() {
        let mut fx = fixture(failing_minifier);
        fx.config.tool_failure = ToolFailurePolicy::Abort;
        write_file(&fx.source, "app.js", "var a;");

        assert!(dispatch(&fx, &ConcatPlan::default(), "app.js").is_err());
    }
}
