use crate::error::Result;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// a hand-rolled reader for the small slice of git-config grammar this
/// crate actually needs: `[section]` / `[section "subsection"]` headers,
/// `key = value` lines, `;`/`#` comments. replaces the teacher's
/// dependency on a forked, non-fetchable `git-config` crate (see
/// DESIGN.md) - not a general git-config parser, just enough to read
/// `core.bare` and `remote.<name>.url`.
#[derive(Debug, Default, Clone)]
pub struct Config {
    sections: HashMap<(String, Option<String>), HashMap<String, String>>,
}

impl Config {
    pub fn parse(reader: impl BufRead) -> Result<Self> {
        let mut sections = HashMap::new();
        let mut current: (String, Option<String>) = (String::new(), None);

        for line in reader.lines() {
            let line = line.map_err(|e| crate::error::Error::io("<config>", e))?;
            let line = strip_comment(&line).trim();
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                current = parse_header(header);
                sections.entry(current.clone()).or_insert_with(HashMap::new);
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim().to_ascii_lowercase();
                let value = value.trim().trim_matches('"').to_owned();
                sections.entry(current.clone()).or_insert_with(HashMap::new).insert(key, value);
            }
        }

        Ok(Self { sections })
    }

    pub fn parse_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| crate::error::Error::io(path, e))?;
        Self::parse(std::io::BufReader::new(file))
    }

    pub fn get(&self, section: &str, subsection: Option<&str>, key: &str) -> Option<&str> {
        self.sections
            .get(&(section.to_owned(), subsection.map(str::to_owned)))
            .and_then(|kv| kv.get(key))
            .map(String::as_str)
    }

    pub fn bare(&self) -> bool {
        self.get("core", None, "bare").map(|v| v == "true").unwrap_or(false)
    }

    pub fn remote_url(&self, name: &str) -> Option<&str> {
        self.get("remote", Some(name), "url")
    }
}

fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' | '#' if !in_quotes => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_header(header: &str) -> (String, Option<String>) {
    match header.split_once(' ') {
        Some((section, rest)) => {
            let sub = rest.trim().trim_matches('"').to_owned();
            (section.trim().to_ascii_lowercase(), Some(sub))
        }
        None => (header.trim().to_ascii_lowercase(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_remote_url() {
        let text = r#"
[core]
    repositoryformatversion = 0
    filemode = true
    bare = true
[remote "origin"]
    url = https://example.com/repo.git
    fetch = +refs/heads/*:refs/remotes/origin/*
"#;
        let config = Config::parse(text.as_bytes()).unwrap();
        assert!(config.bare());
        assert_eq!(config.remote_url("origin"), Some("https://example.com/repo.git"));
        assert_eq!(config.remote_url("upstream"), None);
    }

    #[test]
    fn strips_comments() {
        let text = "[core]\n  bare = true ; a comment\n";
        let config = Config::parse(text.as_bytes()).unwrap();
        assert!(config.bare());
    }
}
