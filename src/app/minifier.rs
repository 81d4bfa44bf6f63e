//! Adapter for the external compressor (YUI Compressor style CLI).
//!
//! Two calling conventions:
//! - file to file: `<cmd> <input> -o <output>`, type inferred from extension
//! - pipe: `<cmd> --type <js|css>`, source on stdin, result on stdout

use crate::app::error::{BuildError, ToolError};
use crate::app::models::AssetKind;
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

#[derive(Debug, Clone)]
pub struct Minifier {
    program: OsString,
    args: Vec<OsString>,
}

impl Minifier {
    /// Create from a command array (e.g. `["java", "-jar", "yuicompressor.jar"]`).
    pub fn from_command(command: &[String]) -> Result<Self, BuildError> {
        let (program, args) = command.split_first().ok_or(BuildError::MissingMinifier)?;
        if program.trim().is_empty() {
            return Err(BuildError::MissingMinifier);
        }
        Ok(Self {
            program: program.into(),
            args: args.iter().map(OsString::from).collect(),
        })
    }

    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Fails when the program cannot be located on PATH.
    pub fn ensure_available(&self) -> Result<(), BuildError> {
        which::which(&self.program)
            .map(|_| ())
            .map_err(|_| BuildError::MinifierNotFound(self.program_name()))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Compress `input` into `output`. Both may be the same path.
    pub fn minify_file(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        log::info!("Compressing {}...", input.display());

        let result = self
            .command()
            .arg(input)
            .arg("-o")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ToolError::Spawn {
                program: self.program_name(),
                source,
            })?;

        check_status(&input.display().to_string(), &result)
    }

    /// Compress a script/style fragment through stdin/stdout.
    pub fn minify_inline(&self, text: &str, kind: AssetKind) -> Result<String, ToolError> {
        let mut child = self
            .command()
            .args(["--type", kind.type_flag()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: self.program_name(),
                source,
            })?;

        // Feed stdin from a second thread so a chatty tool can't fill the
        // stdout pipe while we are still writing.
        let stdin = child.stdin.take();
        let result = std::thread::scope(|scope| {
            let writer = scope.spawn(move || -> std::io::Result<()> {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(text.as_bytes())?;
                }
                Ok(())
            });
            let output = child.wait_with_output();
            let written = writer.join().unwrap_or(Ok(()));
            (output, written)
        });

        let pipe_err = |source| ToolError::Pipe {
            program: self.program_name(),
            source,
        };
        let output = result.0.map_err(pipe_err)?;
        check_status(&format!("inline {}", kind.type_flag()), &output)?;
        // A tool that exits early without reading stdin still produced a result.
        if let Err(err) = result.1 {
            log::debug!("stdin of `{}` closed early: {}", self.program_name(), err);
        }

        String::from_utf8(output.stdout).map_err(|_| ToolError::InvalidUtf8)
    }
}

fn check_status(input: &str, output: &Output) -> Result<(), ToolError> {
    if output.status.success() {
        return Ok(());
    }
    Err(ToolError::Exit {
        input: input.to_string(),
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::app::testutil::{failing_minifier, fake_minifier};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn empty_command_is_missing() {
        assert!(matches!(
            Minifier::from_command(&[]),
            Err(BuildError::MissingMinifier)
        ));
        assert!(matches!(
            Minifier::from_command(&[" ".to_string()]),
            Err(BuildError::MissingMinifier)
        ));
    }

    #[test]
    fn unknown_program_is_reported() {
        let minifier = Minifier::from_command(&["yslow-no-such-tool-7f3a".to_string()]).unwrap();
        assert!(matches!(
            minifier.ensure_available(),
            Err(BuildError::MinifierNotFound(name)) if name == "yslow-no-such-tool-7f3a"
        ));
    }

    #[test]
    fn minifies_file_to_file() {
        let dir = TempDir::new().unwrap();
        let minifier = fake_minifier(dir.path());
        let input = dir.path().join("app.js");
        let output = dir.path().join("app.v1.js");
        fs::write(&input, "var a = 1;\nvar b = 2;\n").unwrap();

        minifier.minify_file(&input, &output).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "vara=1;varb=2;");
    }

    #[test]
    fn minifies_in_place() {
        let dir = TempDir::new().unwrap();
        let minifier = fake_minifier(dir.path());
        let file = dir.path().join("all.css");
        fs::write(&file, "a { color: red; }\n").unwrap();

        minifier.minify_file(&file, &file).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "a{color:red;}");
    }

    #[test]
    fn non_zero_exit_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let minifier = failing_minifier(dir.path());
        let input = dir.path().join("app.js");
        fs::write(&input, "x").unwrap();

        let err = minifier
            .minify_file(&input, &dir.path().join("out.js"))
            .unwrap_err();
        match err {
            ToolError::Exit { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn pipes_inline_fragments() {
        let dir = TempDir::new().unwrap();
        let minifier = fake_minifier(dir.path());

        let out = minifier
            .minify_inline("function f() {\n  return 1;\n}\n", AssetKind::Script)
            .unwrap();
        assert_eq!(out, "/*js*/functionf(){return1;}");

        let out = minifier.minify_inline("p { margin: 0 }", AssetKind::Style).unwrap();
        assert_eq!(out, "/*css*/p{margin:0}");
    }

    #[test]
    fn inline_failure_is_an_error() {
        let dir = TempDir::new().unwrap();
        let minifier = failing_minifier(dir.path());
        assert!(minifier.minify_inline("var a;", AssetKind::Script).is_err());
    }
}
