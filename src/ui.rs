use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::{Block, Borders},
    Frame,
};

use crate::app::{App, Focus};
use crate::components::composer::ComposerWidget;
use crate::components::sidebar::SidebarWidget;
use crate::components::status_bar::StatusBarWidget;
use crate::components::terminal::TerminalWidget;
use crate::theme;

/// Screen areas: optional sidebar, shell panel, status line.
struct Areas {
    sidebar: Option<Rect>,
    terminal: Rect,
    status: Rect,
}

fn split(area: Rect, sidebar_open: bool, width_percent: u16) -> Areas {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    let (sidebar, terminal) = if sidebar_open {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(width_percent),
                Constraint::Percentage(100 - width_percent.min(100)),
            ])
            .split(rows[0]);
        (Some(cols[0]), cols[1])
    } else {
        (None, rows[0])
    };
    Areas {
        sidebar,
        terminal,
        status: rows[1],
    }
}

/// Rows and columns the shell gets inside its bordered panel.
pub fn terminal_size(width: u16, height: u16, sidebar_open: bool, width_percent: u16) -> (u16, u16) {
    let areas = split(Rect::new(0, 0, width, height), sidebar_open, width_percent);
    let rows = areas.terminal.height.saturating_sub(2).max(1);
    let cols = areas.terminal.width.saturating_sub(2).max(1);
    (rows, cols)
}

fn border_style(focused: bool, colors: &theme::ThemeColors) -> Style {
    if focused {
        Style::default().fg(colors.border_focused_fg)
    } else {
        Style::default().fg(colors.border_fg)
    }
}

/// Render the application UI.
pub fn render(app: &mut App, frame: &mut Frame) {
    let colors = theme::dark_theme();
    let areas = split(frame.area(), app.view.is_sidebar_open(), app.sidebar_width);

    if let Some(area) = areas.sidebar {
        let focused = matches!(app.focus, Focus::Sidebar | Focus::Search);
        let block = Block::default()
            .title(format!(" [{}] ", app.view.mode().to_string().to_uppercase()))
            .borders(Borders::ALL)
            .border_style(border_style(focused, &colors));
        let sidebar = SidebarWidget::new(&app.view, &app.selection, &app.analysis, &colors)
            .searching(app.focus == Focus::Search)
            .block(block);
        frame.render_widget(sidebar, area);
    }

    let shell_title = match app.terminal.session() {
        Some(session) => format!(" shell {} ", session.short()),
        None => " shell ".to_string(),
    };
    let block = Block::default()
        .title(shell_title)
        .borders(Borders::ALL)
        .border_style(border_style(app.focus == Focus::Terminal, &colors));
    let terminal = TerminalWidget::new(&app.terminal, &colors, app.focus == Focus::Terminal).block(block);
    frame.render_widget(terminal, areas.terminal);

    let path_str = app
        .handoff_cwd()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let session = app.terminal.session().map(|s| s.short());
    let mut status = StatusBarWidget::new(&path_str, app.focus, &colors)
        .session(session)
        .selected(app.selection.len());
    if let Some((msg, _)) = &app.status_message {
        status = status.status_message(msg);
    }
    frame.render_widget(status, areas.status);

    if app.focus == Focus::Composer {
        let composer = ComposerWidget::new(&app.composer, &app.selection, &colors).cwd(app.handoff_cwd());
        frame.render_widget(composer, frame.area());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_size_without_sidebar() {
        assert_eq!(terminal_size(100, 30, false, 30), (27, 98));
    }

    #[test]
    fn test_terminal_size_with_sidebar() {
        let (rows, cols) = terminal_size(100, 30, true, 30);
        assert_eq!(rows, 27);
        assert_eq!(cols, 68);
    }

    #[test]
    fn test_terminal_size_never_zero() {
        assert_eq!(terminal_size(0, 0, true, 50), (1, 1));
    }

    #[test]
    fn test_split_places_status_on_last_row() {
        let areas = split(Rect::new(0, 0, 80, 24), true, 25);
        assert_eq!(areas.status, Rect::new(0, 23, 80, 1));
        assert_eq!(areas.sidebar.map(|r| r.width), Some(20));
        assert_eq!(areas.terminal.x, 20);
    }
}
