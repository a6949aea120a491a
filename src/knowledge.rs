//! File-backed knowledge base for retrieval.
//!
//! A directory of `.md` / `.txt` files is read once at startup and split
//! into paragraph passages. Search is a case-insensitive keyword match.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::KnowledgeError;

/// Query terms shorter than this (in chars) are ignored.
const MIN_TERM_CHARS: usize = 3;

/// Longest passage kept, in chars.
const MAX_PASSAGE_CHARS: usize = 1500;

/// A paragraph of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    /// Path relative to the knowledge directory.
    pub source: String,
    pub text: String,
}

/// A search hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub source: String,
    pub snippet: String,
    pub score: f32,
}

/// In-memory passage index.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    passages: Vec<Passage>,
}

impl KnowledgeBase {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_passages(passages: Vec<Passage>) -> Self {
        Self { passages }
    }

    /// Read every `.md` / `.txt` file under `dir`.
    pub async fn load(dir: &Path) -> Result<Self, KnowledgeError> {
        if !dir.is_dir() {
            return Err(KnowledgeError::NotFound(dir.display().to_string()));
        }
        let mut passages = Vec::new();
        load_dir(dir, dir, &mut passages).await?;
        tracing::info!(
            dir = %dir.display(),
            passages = passages.len(),
            "Knowledge base loaded"
        );
        Ok(Self { passages })
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Top `limit` passages by the fraction of query terms they contain.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<SearchResult> = self
            .passages
            .iter()
            .filter_map(|passage| {
                let text_lower = passage.text.to_lowercase();
                let matched = terms.iter().filter(|t| text_lower.contains(t.as_str())).count();
                (matched > 0).then(|| SearchResult {
                    source: passage.source.clone(),
                    snippet: passage.text.clone(),
                    score: matched as f32 / terms.len() as f32,
                })
            })
            .collect();

        // Stable sort keeps file order among equal scores.
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        results
    }
}

fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_CHARS)
        .map(String::from)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

/// Split file content on blank lines.
fn split_passages(source: &str, content: &str) -> Vec<Passage> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| Passage {
            source: source.to_string(),
            text: p.chars().take(MAX_PASSAGE_CHARS).collect(),
        })
        .collect()
}

/// Recursively read files in a directory.
fn load_dir<'a>(
    root: &'a Path,
    dir: &'a Path,
    passages: &'a mut Vec<Passage>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), KnowledgeError>> + Send + 'a>> {
    Box::pin(async move {
        let mut read_dir = fs::read_dir(dir).await?;
        let mut entries: Vec<PathBuf> = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            entries.push(entry.path());
        }
        // Directory order is platform-defined; keep loading deterministic.
        entries.sort();

        for path in entries {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if name.starts_with('.') {
                continue;
            }

            let metadata = fs::metadata(&path).await?;
            if metadata.is_dir() {
                load_dir(root, &path, passages).await?;
            } else if metadata.is_file()
                && matches!(path.extension().and_then(|e| e.to_str()), Some("md" | "txt"))
            {
                match fs::read_to_string(&path).await {
                    Ok(content) => {
                        let rel_path = path
                            .strip_prefix(root)
                            .unwrap_or(&path)
                            .to_string_lossy()
                            .to_string();
                        passages.extend(split_passages(&rel_path, &content));
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable knowledge file");
                    }
                }
            }
        }
        Ok(())
    })
}
