use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use rootseek_config::RetrievalConfig;
use rootseek_core::{normalize_node_id, LexicalBackend, LexicalMatch};

/// Literal search over a source tree on disk.
///
/// Honours `.gitignore` plus the include/exclude globs of the retrieval
/// config. Returned paths are relative to the root.
#[derive(Clone)]
pub struct FsLiteralBackend {
    root: PathBuf,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    case_insensitive: bool,
}

impl FsLiteralBackend {
    pub fn new(root: impl Into<PathBuf>, config: &RetrievalConfig) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            include: build_globset(&config.include_paths).context("invalid include_paths")?,
            exclude: build_globset(&config.exclude_paths).context("invalid exclude_paths")?,
            case_insensitive: false,
        })
    }

    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    fn walk(&self, re: &Regex, scope: Option<&str>) -> Vec<LexicalMatch> {
        let scope = scope.map(normalize_node_id).filter(|s| !s.is_empty());
        let mut builder = WalkBuilder::new(&self.root);
        builder.git_ignore(true).git_exclude(true).ignore(true);

        let mut matches = Vec::new();
        for entry in builder.build().flatten() {
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            let rel = normalize_node_id(&path.strip_prefix(&self.root).unwrap_or(path).to_string_lossy());
            if let Some(set) = &self.include {
                if !set.is_match(&rel) {
                    continue;
                }
            }
            if let Some(set) = &self.exclude {
                if set.is_match(&rel) {
                    continue;
                }
            }
            if let Some(prefix) = &scope {
                if !is_under(&rel, prefix) {
                    continue;
                }
            }
            scan_file(path, &rel, re, &mut matches);
        }
        matches
    }
}

fn scan_file(path: &Path, rel: &str, re: &Regex, out: &mut Vec<LexicalMatch>) {
    let Ok(file) = File::open(path) else {
        return;
    };
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut line_no = 0;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(path = rel, error = %e, "stopped reading file");
                break;
            }
        }
        line_no += 1;
        // Invalid UTF-8 is replaced, the rest of the line still matches.
        let text = String::from_utf8_lossy(&buf);
        let text = text.trim_end_matches(['\n', '\r']);
        if re.is_match(text) {
            out.push(LexicalMatch {
                path: rel.to_string(),
                line: line_no,
                text: text.to_string(),
            });
        }
    }
}

fn is_under(id: &str, prefix: &str) -> bool {
    id.starts_with(prefix) || id.split('/').any(|seg| seg.starts_with(prefix))
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("bad glob {pattern:?}"))?);
    }
    Ok(Some(builder.build()?))
}

#[async_trait]
impl LexicalBackend for FsLiteralBackend {
    async fn find(&self, pattern: &str, scope: Option<&str>) -> Result<Vec<LexicalMatch>> {
        let re = RegexBuilder::new(&regex::escape(pattern))
            .case_insensitive(self.case_insensitive)
            .build()
            .context("failed to compile literal pattern")?;
        let backend = self.clone();
        let scope = scope.map(str::to_string);
        let matches = tokio::task::spawn_blocking(move || backend.walk(&re, scope.as_deref()))
            .await
            .context("literal search task failed")?;
        debug!(pattern, matches = matches.len(), root = %self.root.display(), "literal search");
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Repo")).unwrap();
        fs::create_dir_all(root.join("API")).unwrap();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(
            root.join("Repo/CommentRepository.kt"),
            "class CommentRepository {\n  val author_name = row[\"author_name\"]\n}\n",
        )
        .unwrap();
        fs::write(root.join("API/CommentAPI.kt"), "fun author(c: Comment) = c.author_name\n").unwrap();
        fs::write(root.join("build/generated.kt"), "author_name\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn finds_literal_matches_and_skips_excluded() {
        let dir = tree();
        let backend = FsLiteralBackend::new(dir.path(), &RetrievalConfig::default()).unwrap();
        let mut found = backend.find("author_name", None).await.unwrap();
        found.sort_by(|a, b| a.path.cmp(&b.path).then(a.line.cmp(&b.line)));
        let located: Vec<_> = found.iter().map(|m| (m.path.as_str(), m.line)).collect();
        assert_eq!(located, vec![("API/CommentAPI.kt", 1), ("Repo/CommentRepository.kt", 2)]);
    }

    #[tokio::test]
    async fn pattern_is_literal_not_regex() {
        let dir = tree();
        let backend = FsLiteralBackend::new(dir.path(), &RetrievalConfig::default()).unwrap();
        assert!(backend.find("row[", None).await.unwrap().len() == 1);
        assert!(backend.find("author.name", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scope_and_case_options() {
        let dir = tree();
        let backend = FsLiteralBackend::new(dir.path(), &RetrievalConfig::default())
            .unwrap()
            .case_insensitive(true);
        let scoped = backend.find("AUTHOR_NAME", Some("Repo")).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].path, "Repo/CommentRepository.kt");
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_hide_later_matches() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = b"val header = 1\r\n".to_vec();
        body.extend_from_slice(b"// caf\xe9 author_name\n");
        body.extend_from_slice(b"val author_name = row.get(0)\n");
        fs::write(dir.path().join("Legacy.kt"), body).unwrap();

        let backend = FsLiteralBackend::new(dir.path(), &RetrievalConfig::default()).unwrap();
        let found = backend.find("author_name", None).await.unwrap();
        let lines: Vec<_> = found.iter().map(|m| m.line).collect();
        assert_eq!(lines, vec![2, 3]);
        assert_eq!(found[1].text, "val author_name = row.get(0)");
    }
}
