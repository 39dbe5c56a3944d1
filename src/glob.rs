use globset::{GlobBuilder, GlobSetBuilder};
use itertools::Itertools;

use crate::Result;

/// Match staged files against a config pattern. Separators are not literal,
/// so `*.rs` matches at any depth, the way task patterns are written.
pub fn get_matches<S: AsRef<str>>(glob: &str, files: &[S]) -> Result<Vec<String>> {
    let mut gb = GlobSetBuilder::new();
    let mut builder = GlobBuilder::new(glob);
    builder.empty_alternates(true);
    gb.add(builder.build()?);
    let gs = gb.build()?;
    let matches = files
        .iter()
        .map(AsRef::as_ref)
        .filter(|file| gs.is_match(file))
        .map(str::to_string)
        .collect_vec();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_pattern_matches_at_any_depth() {
        let files = ["main.rs", "src/lib.rs", "docs/readme.md"];
        assert_eq!(get_matches("*.rs", &files).unwrap(), ["main.rs", "src/lib.rs"]);
    }

    #[test]
    fn brace_alternates() {
        let files = ["a.js", "b.ts", "c.rs"];
        assert_eq!(get_matches("*.{js,ts}", &files).unwrap(), ["a.js", "b.ts"]);
    }

    #[test]
    fn directory_scoped_pattern() {
        let files = ["src/a.rs", "tests/b.rs"];
        assert_eq!(get_matches("src/*.rs", &files).unwrap(), ["src/a.rs"]);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(get_matches("a{", &["a"]).is_err());
    }
}
