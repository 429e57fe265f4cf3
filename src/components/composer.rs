use std::path::Path;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Paragraph, Widget, Wrap},
};

use crate::app::Composer;
use crate::fs::path::relative_path;
use crate::selection::{FileTag, SelectionStore};
use crate::theme::ThemeColors;

/// Most selection rows shown at once; the list scrolls past this.
const MAX_LIST_ROWS: usize = 6;

/// Centered popup for writing a message that is sent with the selection.
pub struct ComposerWidget<'a> {
    composer: &'a Composer,
    selection: &'a SelectionStore,
    theme: &'a ThemeColors,
    cwd: Option<&'a Path>,
}

impl<'a> ComposerWidget<'a> {
    pub fn new(composer: &'a Composer, selection: &'a SelectionStore, theme: &'a ThemeColors) -> Self {
        Self {
            composer,
            selection,
            theme,
            cwd: None,
        }
    }

    /// Show selected paths relative to `cwd`.
    pub fn cwd(mut self, cwd: Option<&'a Path>) -> Self {
        self.cwd = cwd;
        self
    }

    fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
        let x = area.x + area.width.saturating_sub(width) / 2;
        let y = area.y + area.height.saturating_sub(height) / 2;
        Rect::new(x, y, width.min(area.width), height.min(area.height))
    }

    /// Selected-file count per tag.
    fn selection_summary(&self) -> Line<'a> {
        let mut spans = Vec::new();
        for tag in FileTag::ALL {
            let count = self.selection.paths_with(tag).len();
            spans.push(Span::styled(
                format!("{} {}  ", tag.label(), count),
                Style::default().fg(if count > 0 { self.theme.accent_fg } else { self.theme.dim_fg }),
            ));
        }
        Line::from(spans)
    }

    fn tag_color(&self, tag: FileTag) -> ratatui::style::Color {
        match tag {
            FileTag::Modify => self.theme.tag_modify_fg,
            FileTag::DoNotModify => self.theme.tag_keep_fg,
            FileTag::UseAsExample => self.theme.tag_example_fg,
        }
    }

    /// One selection row: the three tag markers, active one lit, then the path.
    fn entry_line(&self, path: &Path, tag: FileTag, highlighted: bool) -> Line<'a> {
        let mut spans = Vec::new();
        for marker in FileTag::ALL {
            let style = if marker == tag {
                Style::default().fg(self.tag_color(marker)).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.theme.dim_fg)
            };
            spans.push(Span::styled(format!("{} ", marker.marker()), style));
        }
        let shown = match self.cwd {
            Some(cwd) => relative_path(path, cwd),
            None => path.display().to_string(),
        };
        let style = if highlighted {
            Style::default().bg(self.theme.selected_bg).fg(self.theme.selected_fg)
        } else {
            Style::default().fg(self.theme.sidebar_fg)
        };
        spans.push(Span::styled(format!(" {}", shown), style));
        Line::from(spans)
    }

    /// Selection list rows, scrolled so the highlighted entry stays visible.
    fn list_lines(&self) -> Vec<Line<'a>> {
        if self.selection.is_empty() {
            return vec![Line::from(Span::styled(
                "(no files selected)",
                Style::default().fg(self.theme.dim_fg).add_modifier(Modifier::ITALIC),
            ))];
        }
        let offset = self.composer.selected.saturating_sub(MAX_LIST_ROWS - 1);
        self.selection
            .iter()
            .enumerate()
            .skip(offset)
            .take(MAX_LIST_ROWS)
            .map(|(i, (path, tag))| self.entry_line(path, tag, i == self.composer.selected))
            .collect()
    }
}

impl<'a> Widget for ComposerWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = 76.min(area.width.saturating_sub(4));
        let height = 18.min(area.height.saturating_sub(2));
        let rect = Self::centered_rect(width, height, area);

        Clear.render(rect, buf);

        let block = Block::default()
            .title(" Compose ")
            .title_bottom(" Ctrl+S send · ↑↓ pick · Alt+1/2/3 tag · Alt+x drop · Alt+X clear · Esc ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border_focused_fg))
            .padding(Padding::horizontal(1));
        let inner = block.inner(rect);
        block.render(rect, buf);
        if inner.height == 0 {
            return;
        }

        let bottom = inner.y + inner.height;
        let mut y = inner.y;
        buf.set_line(inner.x, y, &self.selection_summary(), inner.width);
        y += 1;

        for line in self.list_lines() {
            if y >= bottom {
                return;
            }
            buf.set_line(inner.x, y, &line, inner.width);
            y += 1;
        }
        if y < bottom {
            let rule = "─".repeat(inner.width as usize);
            buf.set_string(inner.x, y, rule, Style::default().fg(self.theme.border_fg));
            y += 1;
        }

        let mut text = self.composer.input.clone();
        text.insert(self.composer.cursor_position, '▏');
        let body = Rect::new(inner.x, y, inner.width, bottom.saturating_sub(y));
        Paragraph::new(text)
            .style(Style::default().fg(self.theme.sidebar_fg))
            .wrap(Wrap { trim: false })
            .render(body, buf);
    }
}
