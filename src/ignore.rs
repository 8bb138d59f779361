//! gitignore-style path filtering.
//!
//! a [`Filter`] is one `.gitignore` file's worth of patterns, later lines
//! overriding earlier ones exactly as git's own layering works. a
//! [`FilterStack`] composes several filters (e.g. a repository-wide
//! `.gitignore`, a per-directory override, `.git/info/exclude`) in the
//! order they should be consulted, the last definite decision winning.
//! grounded in the teacher's `iter.rs`, which filtered worktree entries
//! through a hardcoded `.bit`/`.git` name check only - this crate instead
//! implements the pattern language itself, since the teacher never had a
//! `.gitignore` reader at all.

use lazy_static::lazy_static;
use regex::Regex;

/// one parsed line of a `.gitignore` file.
#[derive(Debug, Clone)]
struct Pattern {
    regex: Regex,
    negated: bool,
    dir_only: bool,
    source: String,
}

impl Pattern {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let mut rest = line;
        let negated = if let Some(stripped) = rest.strip_prefix('!') {
            rest = stripped;
            true
        } else {
            false
        };

        if rest.is_empty() {
            return None;
        }

        let dir_only = rest.ends_with('/') && !rest.ends_with("\\/");
        if dir_only {
            rest = &rest[..rest.len() - 1];
        }

        let anchored = rest.starts_with('/') || rest[..rest.len().saturating_sub(1)].contains('/');
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        if rest.is_empty() {
            return None;
        }

        let translated = translate_glob(rest);
        let full = if anchored { format!("^{translated}$") } else { format!("^(?:.*/)?{translated}$") };
        let regex = Regex::new(&full).ok()?;

        Some(Self { regex, negated, dir_only, source: line.to_owned() })
    }

    fn matches(&self, path: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        self.regex.is_match(path)
    }
}

/// translates a single gitignore glob (no leading `!`, no leading/trailing
/// `/`) into the body of an anchored regex. `*` does not cross `/`, `**`
/// does, `?` matches one non-separator byte.
fn translate_glob(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }
    out
}

/// one `.gitignore` file's patterns, later lines overriding earlier ones.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    patterns: Vec<Pattern>,
}

impl Filter {
    pub fn parse(content: &str) -> Self {
        Self { patterns: content.lines().filter_map(Pattern::parse).collect() }
    }

    /// `Some(true)` = excluded, `Some(false)` = explicitly not-excluded
    /// (a `!pattern` override matched), `None` = no pattern in this filter
    /// said anything about `path`.
    fn decide(&self, path: &str, is_dir: bool) -> Option<bool> {
        let mut decision = None;
        for pattern in &self.patterns {
            if pattern.matches(path, is_dir) {
                decision = Some(!pattern.negated);
            }
        }
        decision
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

lazy_static! {
    /// build/vendor directories and common transient files, consulted
    /// before any repository-specific `.gitignore` so a repository can
    /// still override it with an explicit `!pattern`.
    static ref COMMON_IGNORE: Filter = Filter::parse(
        "bin/\nobj/\nnode_modules/\ntarget/\n.vs/\n*.log\n*.tmp\n"
    );
}

/// an ordered composition of [`Filter`]s: the later filter's decision wins
/// whenever it has one, otherwise the earlier decision (or "not excluded")
/// carries through.
#[derive(Debug, Clone, Default)]
pub struct FilterStack {
    filters: Vec<Filter>,
}

impl FilterStack {
    /// an empty stack with no precompiled defaults.
    pub fn new() -> Self {
        Self { filters: vec![] }
    }

    /// a stack seeded with the precompiled common-ignore set, the starting
    /// point for a real worktree scan.
    pub fn with_common_ignores() -> Self {
        Self { filters: vec![COMMON_IGNORE.clone()] }
    }

    pub fn push(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// evaluates every filter in order; `path` is repository-relative and
    /// forward-slash separated.
    pub fn is_excluded(&self, path: &str, is_dir: bool) -> bool {
        let mut decision = false;
        for filter in &self.filters {
            if let Some(d) = filter.decide(path, is_dir) {
                decision = d;
            }
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_glob_matches_any_directory_depth() {
        let filter = Filter::parse("*.log\n");
        assert_eq!(filter.decide("a.log", false), Some(true));
        assert_eq!(filter.decide("nested/a.log", false), Some(true));
        assert_eq!(filter.decide("a.log.txt", false), None);
    }

    #[test]
    fn leading_slash_anchors_to_root() {
        let filter = Filter::parse("/build\n");
        assert_eq!(filter.decide("build", true), Some(true));
        assert_eq!(filter.decide("nested/build", true), None);
    }

    #[test]
    fn trailing_slash_matches_directories_only() {
        let filter = Filter::parse("target/\n");
        assert_eq!(filter.decide("target", true), Some(true));
        assert_eq!(filter.decide("target", false), None);
    }

    #[test]
    fn double_star_crosses_separators() {
        let filter = Filter::parse("**/generated/**\n");
        assert_eq!(filter.decide("a/b/generated/c/d.rs", false), Some(true));
    }

    #[test]
    fn later_negation_overrides_earlier_exclusion() {
        let filter = Filter::parse("*.log\n!important.log\n");
        assert_eq!(filter.decide("debug.log", false), Some(true));
        assert_eq!(filter.decide("important.log", false), Some(false));
    }

    #[test]
    fn blank_lines_and_comments_are_skipped() {
        let filter = Filter::parse("\n# comment\n*.tmp\n");
        assert_eq!(filter.patterns.len(), 1);
    }

    #[test]
    fn stack_lets_later_filter_override_earlier() {
        let mut stack = FilterStack::new();
        stack.push(Filter::parse("*.log\n"));
        stack.push(Filter::parse("!keep.log\n"));
        assert!(stack.is_excluded("debug.log", false));
        assert!(!stack.is_excluded("keep.log", false));
    }

    #[test]
    fn common_ignores_cover_typical_build_dirs() {
        let stack = FilterStack::with_common_ignores();
        assert!(stack.is_excluded("target", true));
        assert!(stack.is_excluded("node_modules", true));
        assert!(stack.is_excluded("debug.log", false));
        assert!(!stack.is_excluded("src/main.rs", false));
    }
}
