//! Path guard and include/exclude matcher (spec §4.9).

use std::path::{Path, PathBuf};

use glob::Pattern as GlobPattern;
use regex::Regex;

/// Caches normalized absolute roots; `contains` resolves symlinks before
/// the containment check so a symlinked escape can't slip through
/// (spec §9, "Symbolic links").
#[derive(Debug, Clone)]
pub struct PathGuard {
    roots: Vec<PathBuf>,
}

impl PathGuard {
    pub fn new<I, P>(roots: I) -> std::io::Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut canon = Vec::new();
        for root in roots {
            let abs = dunce_canonicalize(root.as_ref())?;
            canon.push(abs);
        }
        Ok(Self { roots: canon })
    }

    /// True iff `p` equals some root or has a root as a proper ancestor,
    /// after resolving symlinks on both sides.
    pub fn contains(&self, p: impl AsRef<Path>) -> bool {
        let abs = match dunce_canonicalize(p.as_ref()) {
            Ok(a) => a,
            Err(_) => return false,
        };
        self.roots.iter().any(|root| {
            if &abs == root {
                return true;
            }
            match abs.strip_prefix(root) {
                Ok(rel) => rel != Path::new(""),
                Err(_) => false,
            }
        })
    }
}

/// Best-effort canonicalization: falls back to the absolute, non-resolved
/// path when the entry doesn't exist yet (e.g. a root being validated
/// before the walk starts).
fn dunce_canonicalize(p: &Path) -> std::io::Result<PathBuf> {
    match std::fs::canonicalize(p) {
        Ok(c) => Ok(c),
        Err(_) => {
            if p.is_absolute() {
                Ok(p.to_path_buf())
            } else {
                Ok(std::env::current_dir()?.join(p))
            }
        }
    }
}

/// Include/exclude lists, each compiled into a glob list and a regex
/// list. Include restricts (if non-empty, one must match); exclude vetoes.
pub struct PathMatcher {
    include_globs: Vec<GlobPattern>,
    include_regexes: Vec<Regex>,
    exclude_globs: Vec<GlobPattern>,
    exclude_regexes: Vec<Regex>,
}

impl PathMatcher {
    pub fn new(
        include_globs: &[String],
        include_regexes: &[String],
        exclude_globs: &[String],
        exclude_regexes: &[String],
    ) -> Self {
        Self {
            include_globs: compile_globs(include_globs),
            include_regexes: compile_regexes(include_regexes),
            exclude_globs: compile_globs(exclude_globs),
            exclude_regexes: compile_regexes(exclude_regexes),
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let full = path.to_string_lossy();

        let has_include = !self.include_globs.is_empty() || !self.include_regexes.is_empty();
        if has_include {
            let included = self.include_globs.iter().any(|g| g.matches(&basename))
                || self.include_regexes.iter().any(|r| r.is_match(&full));
            if !included {
                return false;
            }
        }

        let excluded = self.exclude_globs.iter().any(|g| g.matches(&basename))
            || self.exclude_regexes.iter().any(|r| r.is_match(&full));
        !excluded
    }
}

fn compile_globs(patterns: &[String]) -> Vec<GlobPattern> {
    patterns
        .iter()
        .filter_map(|p| match GlobPattern::new(p) {
            Ok(g) => Some(g),
            Err(e) => {
                tracing::warn!(pattern = %p, error = %e, "invalid glob pattern, skipping");
                None
            }
        })
        .collect()
}

fn compile_regexes(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::warn!(pattern = %p, error = %e, "invalid regex pattern, skipping");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn contains_root_and_descendants_only() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("a").join("b");
        std::fs::create_dir_all(&sub).unwrap();
        let guard = PathGuard::new([dir.path()]).unwrap();
        assert!(guard.contains(dir.path()));
        assert!(guard.contains(&sub));

        let sibling = tempdir().unwrap();
        assert!(!guard.contains(sibling.path()));
    }

    #[test]
    fn include_restricts_exclude_vetoes() {
        let matcher = PathMatcher::new(
            &["*.rs".to_string()],
            &[],
            &["*_test.rs".to_string()],
            &[],
        );
        assert!(matcher.matches(Path::new("/src/main.rs")));
        assert!(!matcher.matches(Path::new("/src/lib_test.rs")));
        assert!(!matcher.matches(Path::new("/src/main.toml")));
    }

    #[test]
    fn empty_include_allows_everything_unless_excluded() {
        let matcher = PathMatcher::new(&[], &[], &["secret*".to_string()], &[]);
        assert!(matcher.matches(Path::new("/a/normal.txt")));
        assert!(!matcher.matches(Path::new("/a/secret.txt")));
    }
}
