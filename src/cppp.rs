//! Built-in header transformer ("pre-pre-processor").
//!
//! Produces a self-contained public header for an embedded library:
//!
//! - every configured symbol is `#define`d at the top and `#undef`d at the
//!   bottom of the generated file
//! - every `#include` that resolves inside the include search path is
//!   expanded in place; the directory of the file being expanded is always
//!   searched after the configured paths
//! - an include that resolves to a file already on the current expansion
//!   chain is dropped. Include guards are not tracked.
//! - includes that cannot be resolved (system headers) are copied verbatim
//!
//! The same behaviour is available as `kiln cppp` so it can be configured
//! as an external transformer.

use crate::error::{BuildError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn include_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*#\s*include\s*(?:<([^>]+)>|"([^"]+)")"#).expect("valid include pattern")
    })
}

/// Name inside an `#include` line, if the line is one.
pub fn match_include(line: &str) -> Option<&str> {
    let caps = include_re().captures(line)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

fn find_path(name: &str, includes: &[PathBuf], current_dir: Option<&Path>) -> Option<PathBuf> {
    includes
        .iter()
        .map(PathBuf::as_path)
        .chain(current_dir)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn expand(
    path: &Path,
    content: &str,
    out: &mut String,
    includes: &[PathBuf],
    chain: &mut Vec<PathBuf>,
) -> Result<()> {
    let current_dir = path.parent();

    for line in content.split_inclusive('\n') {
        if let Some(name) = match_include(line)
            && let Some(found) = find_path(name, includes, current_dir)
        {
            if !chain.contains(&found) {
                let nested = fs::read_to_string(&found).map_err(|e| BuildError::io(&found, e))?;
                chain.push(found.clone());
                expand(&found, &nested, out, includes, chain)?;
                chain.pop();
            }
            continue;
        }
        out.push_str(line);
    }
    Ok(())
}

/// Transform header text. `path` locates the header for relative includes.
pub fn transform(
    path: &Path,
    content: &str,
    includes: &[PathBuf],
    symbols: &BTreeMap<String, String>,
) -> Result<String> {
    let mut out = String::new();

    for (name, value) in symbols {
        if value.is_empty() {
            out.push_str(&format!("#define {}\n", name));
        } else {
            out.push_str(&format!("#define {} {}\n", name, value));
        }
    }

    let mut chain = Vec::new();
    expand(path, content, &mut out, includes, &mut chain)?;

    for name in symbols.keys() {
        out.push_str(&format!("#undef {}\n", name));
    }

    Ok(out)
}

/// Transform `header` and atomically write the result to `output`.
pub fn transform_file(
    header: &Path,
    output: &Path,
    includes: &[PathBuf],
    symbols: &BTreeMap<String, String>,
) -> Result<()> {
    let content = fs::read_to_string(header).map_err(|e| BuildError::io(header, e))?;
    let text = transform(header, &content, includes, symbols)?;

    let dir = output.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| BuildError::io(dir, e))?;
    tmp.write_all(text.as_bytes())
        .map_err(|e| BuildError::io(tmp.path(), e))?;
    tmp.persist(output)
        .map_err(|e| BuildError::io(output, e.error))?;
    Ok(())
}

/// Parse a `sym[=val]` command-line define.
pub fn parse_define(raw: &str) -> (String, String) {
    match raw.split_once('=') {
        Some((name, value)) => (name.to_string(), value.to_string()),
        None => (raw.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_include_forms() {
        assert_eq!(match_include("#include <avr/io.h>\n"), Some("avr/io.h"));
        assert_eq!(match_include("  #  include \"gpio.h\""), Some("gpio.h"));
        assert_eq!(match_include("int x; // #include <nope.h>"), None);
        assert_eq!(match_include("#define X 1"), None);
    }

    #[test]
    fn test_symbols_wrap_output() {
        let symbols = BTreeMap::from([
            ("HAL_UART".to_string(), "1".to_string()),
            ("HAL_DEBUG".to_string(), String::new()),
        ]);
        let out = transform(Path::new("hal.h"), "void hal_init(void);\n", &[], &symbols).unwrap();
        assert_eq!(
            out,
            "#define HAL_DEBUG\n#define HAL_UART 1\nvoid hal_init(void);\n#undef HAL_DEBUG\n#undef HAL_UART\n"
        );
    }

    #[test]
    fn test_expands_found_includes_and_keeps_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let inc = dir.path().join("include");
        fs::create_dir_all(&inc).unwrap();
        fs::write(inc.join("regs.h"), "#define REG 0x20\n").unwrap();

        let header = inc.join("hal.h");
        let content = "#include <stdint.h>\n#include \"regs.h\"\nvoid f(void);\n";
        fs::write(&header, content).unwrap();

        let out = transform(&header, content, &[], &BTreeMap::new()).unwrap();
        assert_eq!(out, "#include <stdint.h>\n#define REG 0x20\nvoid f(void);\n");
    }

    #[test]
    fn test_include_loop_is_cut() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.h");
        let b = dir.path().join("b.h");
        fs::write(&a, "A\n#include \"b.h\"\n").unwrap();
        fs::write(&b, "B\n#include \"a.h\"\n").unwrap();

        let root = dir.path().join("root.h");
        let content = "#include \"a.h\"\n";
        let out = transform(&root, content, &[dir.path().to_path_buf()], &BTreeMap::new()).unwrap();
        assert_eq!(out, "A\nB\n");
    }

    #[test]
    fn test_transform_file_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("hal.h");
        fs::write(&header, "void hal(void);\n").unwrap();
        let output = dir.path().join("out").join("hal").join("hal.h");

        let symbols = BTreeMap::from([("X".to_string(), "2".to_string())]);
        transform_file(&header, &output, &[], &symbols).unwrap();
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "#define X 2\nvoid hal(void);\n#undef X\n"
        );
    }

    #[test]
    fn test_parse_define() {
        assert_eq!(parse_define("F_CPU=8000000"), ("F_CPU".into(), "8000000".into()));
        assert_eq!(parse_define("NDEBUG"), ("NDEBUG".into(), String::new()));
    }
}
