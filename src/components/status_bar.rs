use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::app::Focus;
use crate::theme::ThemeColors;

/// Bottom line: directory, session and key hints, or a transient message.
pub struct StatusBarWidget<'a> {
    path_str: &'a str,
    session: Option<&'a str>,
    focus: Focus,
    selected: usize,
    theme: &'a ThemeColors,
    status_message: Option<&'a str>,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(path_str: &'a str, focus: Focus, theme: &'a ThemeColors) -> Self {
        Self {
            path_str,
            session: None,
            focus,
            selected: 0,
            theme,
            status_message: None,
        }
    }

    pub fn session(mut self, session: Option<&'a str>) -> Self {
        self.session = session;
        self
    }

    pub fn selected(mut self, count: usize) -> Self {
        self.selected = count;
        self
    }

    pub fn status_message(mut self, msg: &'a str) -> Self {
        self.status_message = Some(msg);
        self
    }

    fn key_hints(&self) -> &'static str {
        match self.focus {
            Focus::Terminal => " ^B sidebar  ^O focus  ^T compose  ^Q quit ",
            Focus::Sidebar => " ⏎ open  ␣ select  1/2/3 tag  i insert  a outline  / search ",
            Focus::Search => " type to filter  ⏎ keep  Esc clear ",
            Focus::Composer => " ^S send  Esc close ",
        }
    }
}

impl<'a> Widget for StatusBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let width = area.width as usize;
        let base = Style::default().bg(self.theme.status_bg).fg(self.theme.status_fg);

        if let Some(msg) = self.status_message {
            let display: String = format!("{:<width$}", msg, width = width)
                .chars()
                .take(width)
                .collect();
            let line = Line::from(Span::styled(display, base.fg(self.theme.success_fg)));
            buf.set_line(area.x, area.y, &line, area.width);
            return;
        }

        let session = match self.session {
            Some(id) => format!(" [{}]", id),
            None => " [no session]".to_string(),
        };
        let selected = if self.selected > 0 {
            format!("  {} selected", self.selected)
        } else {
            String::new()
        };
        let hints = self.key_hints();

        let used = session.chars().count() + selected.chars().count() + hints.chars().count() + 1;
        let path_budget = width.saturating_sub(used);
        let path_len = self.path_str.chars().count();
        let path_display = if path_len > path_budget && path_budget > 1 {
            let tail: String = self.path_str.chars().skip(path_len - (path_budget - 1)).collect();
            format!("…{}", tail)
        } else {
            self.path_str.chars().take(path_budget).collect()
        };
        let pad = width.saturating_sub(used - 1 + path_display.chars().count());

        let spans = vec![
            Span::styled(format!(" {}", path_display), base),
            Span::styled(session, base.fg(self.theme.info_fg)),
            Span::styled(selected, base.fg(self.theme.accent_fg).add_modifier(Modifier::BOLD)),
            Span::styled(" ".repeat(pad.saturating_sub(1)), base),
            Span::styled(hints, base.fg(self.theme.dim_fg)),
        ];
        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme;
    use ratatui::style::Color;

    fn content(buf: &Buffer, width: u16) -> String {
        (0..width)
            .map(|x| buf.cell((x, 0)).unwrap().symbol().to_string())
            .collect()
    }

    #[test]
    fn test_status_message_replaces_bar() {
        let tc = theme::dark_theme();
        let widget = StatusBarWidget::new("/path", Focus::Terminal, &tc).status_message("Shell exited");
        let area = Rect::new(0, 0, 60, 1);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        let text = content(&buf, 60);
        assert!(text.contains("Shell exited"));
        assert!(!text.contains("/path"));
        assert_eq!(buf.cell((0, 0)).unwrap().fg, Color::Rgb(166, 227, 161));
    }

    #[test]
    fn test_normal_bar_rendering() {
        let tc = theme::dark_theme();
        let widget = StatusBarWidget::new("/home/user/project", Focus::Terminal, &tc)
            .session(Some("0a1b2c3d"))
            .selected(2);
        let area = Rect::new(0, 0, 120, 1);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        let text = content(&buf, 120);
        assert!(text.contains("/home/user/project"));
        assert!(text.contains("[0a1b2c3d]"));
        assert!(text.contains("2 selected"));
        assert!(text.contains("^T compose"));
    }

    #[test]
    fn test_long_path_is_elided() {
        let tc = theme::dark_theme();
        let long = format!("/{}", "x".repeat(200));
        let widget = StatusBarWidget::new(&long, Focus::Composer, &tc);
        let area = Rect::new(0, 0, 60, 1);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        let text = content(&buf, 60);
        assert!(text.contains('…'));
        assert!(text.contains("[no session]"));
    }

    #[test]
    fn test_zero_area_does_not_panic() {
        let tc = theme::dark_theme();
        let widget = StatusBarWidget::new("/path", Focus::Sidebar, &tc);
        let area = Rect::new(0, 0, 0, 0);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
    }
}
