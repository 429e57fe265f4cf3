//! Shell panel widget: draws the emulator screen and the cursor.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Widget};

use crate::terminal::TerminalPanel;
use crate::theme::ThemeColors;

const DETACHED_MESSAGE: &str = "[No shell session]";

pub struct TerminalWidget<'a> {
    panel: &'a TerminalPanel,
    theme: &'a ThemeColors,
    block: Option<Block<'a>>,
    show_cursor: bool,
}

impl<'a> TerminalWidget<'a> {
    pub fn new(panel: &'a TerminalPanel, theme: &'a ThemeColors, show_cursor: bool) -> Self {
        Self {
            panel,
            theme,
            block: None,
            show_cursor,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl<'a> Widget for TerminalWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = match self.block {
            Some(block) => {
                let inner = block.inner(area);
                block.render(area, buf);
                inner
            }
            None => area,
        };

        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let screen = self.panel.emulator.screen();
        for (row, line) in screen.lines().iter().enumerate().take(inner.height as usize) {
            buf.set_line(inner.x, inner.y + row as u16, line, inner.width);
        }

        if !self.panel.is_attached() {
            let y = inner.y + inner.height / 2;
            let x = inner.x + inner.width.saturating_sub(DETACHED_MESSAGE.len() as u16) / 2;
            let style = Style::default()
                .fg(self.theme.dim_fg)
                .add_modifier(Modifier::DIM);
            buf.set_stringn(x, y, DETACHED_MESSAGE, inner.width as usize, style);
            return;
        }

        if self.show_cursor {
            let (row, col) = screen.cursor();
            let x = inner.x + col as u16;
            let y = inner.y + row as u16;
            if x < inner.x + inner.width && y < inner.y + inner.height {
                if let Some(cell) = buf.cell_mut((x, y)) {
                    cell.set_style(
                        Style::default()
                            .fg(Color::Black)
                            .bg(self.theme.border_focused_fg),
                    );
                }
            }
        }
    }
}
