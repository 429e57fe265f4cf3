use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use crate::analysis::{AnalysisCache, AnalysisState};
use crate::fs::tree::FlatItem;
use crate::selection::{FileTag, SelectionStore};
use crate::theme::ThemeColors;
use crate::view::{ViewCoordinator, ViewMode, ViewStatus};

/// Most outline lines shown under the listing.
const MAX_OUTLINE_LINES: usize = 12;

/// The file sidebar: header, optional search line, rows and file outline.
pub struct SidebarWidget<'a> {
    view: &'a ViewCoordinator,
    selection: &'a SelectionStore,
    analysis: &'a AnalysisCache,
    theme: &'a ThemeColors,
    searching: bool,
    block: Option<Block<'a>>,
}

impl<'a> SidebarWidget<'a> {
    pub fn new(
        view: &'a ViewCoordinator,
        selection: &'a SelectionStore,
        analysis: &'a AnalysisCache,
        theme: &'a ThemeColors,
    ) -> Self {
        Self {
            view,
            selection,
            analysis,
            theme,
            searching: false,
            block: None,
        }
    }

    pub fn searching(mut self, searching: bool) -> Self {
        self.searching = searching;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    /// Box-drawing prefix for a tree row, derived from the rows above it.
    fn build_prefix(item: &FlatItem, items: &[FlatItem], index: usize) -> String {
        if item.depth == 0 {
            return String::new();
        }
        let mut prefix = String::new();
        for level in 1..item.depth {
            // The nearest row above at this depth or shallower is the ancestor.
            let ancestor_is_last = items[..index]
                .iter()
                .rev()
                .find(|i| i.depth <= level)
                .is_some_and(|i| i.depth == level && i.is_last_sibling);
            prefix.push_str(if ancestor_is_last { "   " } else { "│  " });
        }
        prefix.push_str(if item.is_last_sibling { "└─ " } else { "├─ " });
        prefix
    }

    fn tag_style(&self, tag: FileTag) -> Style {
        let fg = match tag {
            FileTag::Modify => self.theme.tag_modify_fg,
            FileTag::DoNotModify => self.theme.tag_keep_fg,
            FileTag::UseAsExample => self.theme.tag_example_fg,
        };
        Style::default().fg(fg).add_modifier(Modifier::BOLD)
    }

    fn row_line(&self, item: &FlatItem, prefix: String, selected: bool) -> Line<'a> {
        let mut spans = vec![Span::styled(prefix, Style::default().fg(self.theme.dim_fg))];
        match self.selection.tag(&item.path) {
            Some(tag) => spans.push(Span::styled(format!("[{}] ", tag.marker()), self.tag_style(tag))),
            None => spans.push(Span::raw("    ")),
        }
        let (name, style) = if item.is_dir {
            let arrow = match (self.view.mode(), item.is_expanded) {
                (ViewMode::Tree, true) => "▾ ",
                (ViewMode::Tree, false) => "▸ ",
                (ViewMode::Flat, _) => "",
            };
            (
                format!("{}{}/", arrow, item.name),
                Style::default().fg(self.theme.dir_fg).add_modifier(Modifier::BOLD),
            )
        } else {
            (item.name.clone(), Style::default().fg(self.theme.file_fg))
        };
        let style = if selected {
            style.bg(self.theme.selected_bg).fg(self.theme.selected_fg)
        } else {
            style
        };
        spans.push(Span::styled(name, style));
        if let Some(kind) = self.view.change_of(&item.path) {
            spans.push(Span::styled(
                format!(" {}", kind.marker()),
                Style::default().fg(self.theme.warning_fg),
            ));
        }
        Line::from(spans)
    }

    /// Outline lines for the highlighted file, when expanded.
    fn outline_lines(&self) -> Vec<Line<'a>> {
        let Some(row) = self.view.selected_row().filter(|r| !r.is_dir) else {
            return Vec::new();
        };
        let Some(entry) = self.analysis.get(&row.path).filter(|e| e.expanded) else {
            return Vec::new();
        };
        let dim = Style::default().fg(self.theme.dim_fg);
        let mut lines = vec![Line::from(Span::styled(
            format!("─ {} ", row.name),
            Style::default().fg(self.theme.accent_fg),
        ))];
        match &entry.state {
            AnalysisState::Pending => lines.push(Line::from(Span::styled("analyzing…", dim))),
            AnalysisState::Failed(message) => lines.push(Line::from(Span::styled(
                format!("error: {}", message),
                Style::default().fg(self.theme.error_fg),
            ))),
            AnalysisState::Ready(report) => {
                lines.push(Line::from(Span::styled(
                    format!("{} · {} lines", report.language, report.lines),
                    dim,
                )));
                if report.symbols.is_empty() {
                    lines.push(Line::from(Span::styled("no symbols", dim)));
                }
                for symbol in report.symbols.iter().take(MAX_OUTLINE_LINES) {
                    lines.push(Line::from(vec![
                        Span::styled(format!("{:>5} ", symbol.line), dim),
                        Span::styled(format!("{} ", symbol.kind), Style::default().fg(self.theme.info_fg)),
                        Span::raw(symbol.name.clone()),
                    ]));
                }
                if report.symbols.len() > MAX_OUTLINE_LINES {
                    lines.push(Line::from(Span::styled(
                        format!("… {} more", report.symbols.len() - MAX_OUTLINE_LINES),
                        dim,
                    )));
                }
            }
        }
        lines
    }
}

impl<'a> Widget for SidebarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };
        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let mut y = inner.y;
        let bottom = inner.y + inner.height;

        // Header: current directory, entry count and truncation marker.
        let path = self
            .view
            .current_path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let mut header = vec![Span::styled(path, Style::default().fg(self.theme.info_fg))];
        if self.view.status() == &ViewStatus::Ready {
            header.push(Span::styled(
                format!(" · {} entries", self.view.entry_count()),
                Style::default().fg(self.theme.dim_fg),
            ));
        }
        if self.view.is_truncated() {
            header.push(Span::styled(
                " (truncated)",
                Style::default().fg(self.theme.warning_fg),
            ));
        }
        buf.set_line(inner.x, y, &Line::from(header), inner.width);
        y += 1;

        if self.view.mode() == ViewMode::Tree && y < bottom {
            let style = if self.searching {
                Style::default().fg(self.theme.accent_fg).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.theme.dim_fg)
            };
            let search = format!("/{}{}", self.view.query(), if self.searching { "▏" } else { "" });
            let mut line = vec![Span::styled(search, style)];
            if let Some(results) = self.view.results() {
                line.push(Span::styled(
                    format!("  {} found", results.len()),
                    Style::default().fg(self.theme.dim_fg),
                ));
            }
            if self.view.changed_only() {
                line.push(Span::styled(
                    "  [changed]",
                    Style::default().fg(self.theme.warning_fg),
                ));
            }
            buf.set_line(inner.x, y, &Line::from(line), inner.width);
            y += 1;
        }

        if y >= bottom {
            return;
        }

        let outline = self.outline_lines();
        let remaining = bottom - y;
        let outline_height = (outline.len() as u16).min(remaining / 2);
        let list_height = remaining - outline_height;

        let placeholder = match self.view.status() {
            ViewStatus::Ready if self.view.no_matches() => Some("no matches"),
            ViewStatus::Ready if self.view.rows().is_empty() => Some("(empty)"),
            status => status.label(),
        };

        if let Some(text) = placeholder {
            let style = match self.view.status() {
                ViewStatus::Error(_) => Style::default().fg(self.theme.error_fg),
                _ => Style::default().fg(self.theme.dim_fg).add_modifier(Modifier::ITALIC),
            };
            buf.set_line(inner.x, y, &Line::from(Span::styled(text, style)), inner.width);
        } else {
            let rows = self.view.rows();
            let cursor = self.view.cursor();
            let height = list_height as usize;
            let offset = cursor.saturating_sub(height.saturating_sub(1));
            for (i, (index, item)) in rows.iter().enumerate().skip(offset).take(height).enumerate() {
                let prefix = Self::build_prefix(item, rows, index);
                let line = self.row_line(item, prefix, index == cursor);
                buf.set_line(inner.x, y + i as u16, &line, inner.width);
            }
        }

        let outline_top = y + list_height;
        for (i, line) in outline.iter().take(outline_height as usize).enumerate() {
            buf.set_line(inner.x, outline_top + i as u16, line, inner.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::SessionId;
    use crate::event::Event;
    use crate::git::{ChangeKind, GitChanges};
    use crate::theme;
    use crate::view::ViewOptions;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn buffer_lines(buf: &Buffer) -> Vec<String> {
        let area = buf.area;
        (area.y..area.y + area.height)
            .map(|y| {
                (area.x..area.x + area.width)
                    .map(|x| buf.cell((x, y)).map(|c| c.symbol()).unwrap_or(" "))
                    .collect::<String>()
            })
            .collect()
    }

    #[tokio::test]
    async fn changed_only_view_shows_markers_and_indicator() {
        let mock = Arc::new(MockBackend::new());
        mock.add_file("/r/a/x.rs", "");
        mock.add_file("/r/b.rs", "");
        mock.set_cwd(&SessionId::from("s1"), "/r");
        mock.set_git_changes(GitChanges::from([(PathBuf::from("/r/a/x.rs"), ChangeKind::Modified)]));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut view = ViewCoordinator::new(mock, ViewMode::Tree, ViewOptions::default(), tx);
        view.set_session(Some(SessionId::from("s1")));
        view.open_sidebar();
        match rx.recv().await {
            Some(Event::SnapshotLoaded { token, result }) => assert!(view.on_snapshot_loaded(token, result)),
            other => panic!("unexpected event: {:?}", other),
        }
        view.toggle_changed_only();
        match rx.recv().await {
            Some(Event::GitStatusLoaded { generation, result }) => {
                assert!(view.on_git_status_loaded(generation, result))
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let selection = SelectionStore::new();
        let analysis = AnalysisCache::new();
        let colors = theme::dark_theme();
        let area = Rect::new(0, 0, 40, 6);
        let mut buf = Buffer::empty(area);
        SidebarWidget::new(&view, &selection, &analysis, &colors).render(area, &mut buf);

        let lines = buffer_lines(&buf);
        assert!(lines[0].starts_with("/r · 3 entries"));
        assert!(lines[1].contains("[changed]"));
        assert!(lines[2].contains("▾ a/"));
        assert!(lines[3].contains("x.rs M"));
        assert!(lines[4].trim().is_empty());
    }

    fn item(name: &str, depth: usize, last: bool) -> FlatItem {
        FlatItem {
            name: name.to_string(),
            path: PathBuf::from(format!("/r/{}", name)),
            is_dir: false,
            depth,
            is_expanded: false,
            is_last_sibling: last,
        }
    }

    #[test]
    fn prefixes_follow_tree_shape() {
        let items = vec![
            item("a", 0, false),
            item("x", 1, false),
            item("deep", 2, true),
            item("y", 1, true),
            item("z", 2, true),
            item("b", 0, true),
        ];
        let prefixes: Vec<String> = items
            .iter()
            .enumerate()
            .map(|(i, it)| SidebarWidget::build_prefix(it, &items, i))
            .collect();
        assert_eq!(prefixes[0], "");
        assert_eq!(prefixes[1], "├─ ");
        assert_eq!(prefixes[2], "│  └─ ");
        assert_eq!(prefixes[3], "└─ ");
        assert_eq!(prefixes[4], "   └─ ");
        assert_eq!(prefixes[5], "");
    }
}
