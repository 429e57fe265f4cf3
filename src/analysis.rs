//! File outlines: a syntect-backed analyzer and the per-path result cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use syntect::parsing::{ParseState, ScopeStack, SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::backend::Backend;
use crate::error::{AppError, Result};
use crate::event::{Event, EventSender};

/// Scope kinds under `entity.name.` that count as outline symbols.
const SYMBOL_KINDS: &[&str] = &[
    "function",
    "class",
    "struct",
    "enum",
    "trait",
    "type",
    "interface",
    "impl",
    "union",
    "module",
    "namespace",
    "macro",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub kind: String,
    pub name: String,
    /// 1-based line number.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub language: String,
    pub lines: usize,
    pub symbols: Vec<Symbol>,
}

/// Turns file content into an [`AnalysisReport`].
pub trait Analyzer: Send + Sync {
    fn analyze(&self, path: &Path, text: &str) -> Result<AnalysisReport>;
}

/// Outline extraction from syntect scope parsing.
pub struct SyntaxOutlineAnalyzer {
    syntaxes: SyntaxSet,
}

impl SyntaxOutlineAnalyzer {
    pub fn new() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
        }
    }

    fn syntax_for(&self, path: &Path, text: &str) -> Option<&SyntaxReference> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.syntaxes.find_syntax_by_extension(ext))
            .or_else(|| {
                let first = text.lines().next()?;
                self.syntaxes.find_syntax_by_first_line(first)
            })
    }
}

impl Default for SyntaxOutlineAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for SyntaxOutlineAnalyzer {
    fn analyze(&self, path: &Path, text: &str) -> Result<AnalysisReport> {
        let lines = text.lines().count();
        let Some(syntax) = self.syntax_for(path, text) else {
            return Ok(AnalysisReport {
                language: "Plain Text".to_string(),
                lines,
                symbols: Vec::new(),
            });
        };

        let mut state = ParseState::new(syntax);
        let mut stack = ScopeStack::new();
        let mut symbols: Vec<Symbol> = Vec::new();

        for (idx, line) in LinesWithEndings::from(text).enumerate() {
            let ops = state
                .parse_line(line, &self.syntaxes)
                .map_err(|e| AppError::Analysis(e.to_string()))?;
            let mut cursor = 0;
            let mut previous_kind: Option<String> = None;
            for (pos, op) in ops {
                if pos > cursor {
                    previous_kind =
                        collect_token(&stack, &line[cursor..pos], idx + 1, previous_kind, &mut symbols);
                }
                stack
                    .apply(&op)
                    .map_err(|e| AppError::Analysis(format!("{:?}", e)))?;
                cursor = pos;
            }
            if cursor < line.len() {
                collect_token(&stack, &line[cursor..], idx + 1, previous_kind, &mut symbols);
            }
        }

        Ok(AnalysisReport {
            language: syntax.name.clone(),
            lines,
            symbols,
        })
    }
}

/// Symbol kind of the innermost `entity.name.*` scope on the stack.
fn symbol_kind(stack: &ScopeStack) -> Option<String> {
    stack.as_slice().iter().rev().find_map(|scope| {
        let name = scope.build_string();
        let kind = name.strip_prefix("entity.name.")?.split('.').next()?;
        SYMBOL_KINDS.contains(&kind).then(|| kind.to_string())
    })
}

/// Record `token` if it sits in a symbol scope, gluing it onto the previous
/// token of the same kind when the name was split across parse ops.
fn collect_token(
    stack: &ScopeStack,
    token: &str,
    line: usize,
    previous_kind: Option<String>,
    symbols: &mut Vec<Symbol>,
) -> Option<String> {
    let kind = symbol_kind(stack)?;
    let text = token.trim();
    if text.is_empty() {
        return previous_kind;
    }
    match symbols.last_mut() {
        Some(last) if previous_kind.as_deref() == Some(kind.as_str()) && last.line == line => {
            last.name.push_str(text);
        }
        _ => symbols.push(Symbol {
            kind: kind.clone(),
            name: text.to_string(),
            line,
        }),
    }
    Some(kind)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisState {
    Pending,
    Ready(AnalysisReport),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisEntry {
    pub state: AnalysisState,
    pub expanded: bool,
}

/// Result of [`AnalysisCache::analyze`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeAction {
    /// An entry existed; its expanded flag is now the contained value.
    Toggled(bool),
    /// A pending entry was created; the caller must fetch and analyze.
    Fetch,
}

/// Per-path analysis results. Entries are never invalidated.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: HashMap<PathBuf, AnalysisEntry>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(&mut self, path: &Path) -> AnalyzeAction {
        if let Some(entry) = self.entries.get_mut(path) {
            entry.expanded = !entry.expanded;
            return AnalyzeAction::Toggled(entry.expanded);
        }
        self.entries.insert(
            path.to_path_buf(),
            AnalysisEntry {
                state: AnalysisState::Pending,
                expanded: true,
            },
        );
        AnalyzeAction::Fetch
    }

    /// Store a finished analysis. Ignored unless the entry is pending.
    pub fn complete(&mut self, path: &Path, result: Result<AnalysisReport>) -> bool {
        match self.entries.get_mut(path) {
            Some(entry) if entry.state == AnalysisState::Pending => {
                entry.state = match result {
                    Ok(report) => AnalysisState::Ready(report),
                    Err(e) => AnalysisState::Failed(e.to_string()),
                };
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, path: &Path) -> Option<&AnalysisEntry> {
        self.entries.get(path)
    }
}

/// Fetch `path` through the backend and analyze it off the event loop.
pub fn spawn_analysis(
    backend: Arc<dyn Backend>,
    analyzer: Arc<dyn Analyzer>,
    path: PathBuf,
    tx: EventSender,
) {
    tokio::spawn(async move {
        let result = match backend.read_file_content(&path).await {
            Ok(text) => {
                let target = path.clone();
                tokio::task::spawn_blocking(move || analyzer.analyze(&target, &text))
                    .await
                    .unwrap_or_else(|e| Err(AppError::Analysis(e.to_string())))
            }
            Err(e) => Err(e),
        };
        if let Err(ref e) = result {
            tracing::warn!(path = %path.display(), error = %e, "analysis failed");
        }
        let _ = tx.send(Event::AnalysisDone { path, result });
    });
}
