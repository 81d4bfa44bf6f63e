//! Stand-in minifiers for tests. Each one is a tiny `sh` script written to a
//! scratch directory.

use crate::app::minifier::Minifier;
use std::fs;
use std::path::Path;

/// Strips spaces and newlines. Pipe mode prefixes the output with `/*<type>*/`.
const FAKE_MINIFIER: &str = r#"if [ "$1" = "--type" ]; then
  printf '/*%s*/' "$2"
  tr -d ' \n'
  exit 0
fi
tr -d ' \n' < "$1" > "$3.tmp" && mv "$3.tmp" "$3"
"#;

const FAILING_MINIFIER: &str = "echo boom >&2\nexit 3\n";

fn script_command(dir: &Path, name: &str, body: &str) -> Vec<String> {
    let script = dir.join(name);
    fs::write(&script, body).unwrap();
    vec!["sh".to_string(), script.display().to_string()]
}

pub fn fake_minifier_command(dir: &Path) -> Vec<String> {
    script_command(dir, "fake-minifier.sh", FAKE_MINIFIER)
}

pub fn failing_minifier_command(dir: &Path) -> Vec<String> {
    script_command(dir, "failing-minifier.sh", FAILING_MINIFIER)
}

pub fn fake_minifier(dir: &Path) -> Minifier {
    Minifier::from_command(&fake_minifier_command(dir)).unwrap()
}

pub fn failing_minifier(dir: &Path) -> Minifier {
    Minifier::from_command(&failing_minifier_command(dir)).unwrap()
}

/// Write `contents` at `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}
