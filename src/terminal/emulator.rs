//! A small screen model fed by the `vte` parser: enough of VT100 for an
//! interactive shell prompt, without scrollback or alternate screens.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: Style::default(),
        }
    }
}

/// Grid, cursor and pen state. Implements [`vte::Perform`].
#[derive(Debug)]
pub struct Screen {
    grid: Vec<Vec<Cell>>,
    rows: usize,
    cols: usize,
    row: usize,
    col: usize,
    pen: Style,
    saved: Option<(usize, usize)>,
}

impl Screen {
    pub fn new(rows: usize, cols: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            grid: vec![vec![Cell::default(); cols]; rows],
            rows,
            cols,
            row: 0,
            col: 0,
            pen: Style::default(),
            saved: None,
        }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col.min(self.cols - 1))
    }

    pub fn resize(&mut self, rows: usize, cols: usize) {
        let rows = rows.max(1);
        let cols = cols.max(1);
        // Keep the bottom of the screen, where the prompt usually is.
        while self.grid.len() > rows {
            self.grid.remove(0);
            self.row = self.row.saturating_sub(1);
        }
        while self.grid.len() < rows {
            self.grid.push(vec![Cell::default(); cols]);
        }
        for line in &mut self.grid {
            line.resize(cols, Cell::default());
        }
        self.rows = rows;
        self.cols = cols;
        self.row = self.row.min(rows - 1);
        self.col = self.col.min(cols - 1);
    }

    pub fn lines(&self) -> Vec<Line<'static>> {
        self.grid
            .iter()
            .map(|row| {
                let mut spans: Vec<Span<'static>> = Vec::new();
                let mut run = String::new();
                let mut style = row.first().map(|c| c.style).unwrap_or_default();
                for cell in row {
                    if cell.style != style {
                        spans.push(Span::styled(std::mem::take(&mut run), style));
                        style = cell.style;
                    }
                    run.push(cell.ch);
                }
                spans.push(Span::styled(run, style));
                Line::from(spans)
            })
            .collect()
    }

    fn blank(&self) -> Cell {
        Cell {
            ch: ' ',
            style: Style::default().bg(self.pen.bg.unwrap_or(Color::Reset)),
        }
    }

    fn line_feed(&mut self) {
        if self.row + 1 < self.rows {
            self.row += 1;
        } else {
            self.grid.remove(0);
            self.grid.push(vec![Cell::default(); self.cols]);
        }
    }

    fn clear_range(&mut self, row: usize, from: usize, to: usize) {
        let blank = self.blank();
        if let Some(line) = self.grid.get_mut(row) {
            for cell in line.iter_mut().take(to).skip(from) {
                *cell = blank;
            }
        }
    }

    fn sgr(&mut self, params: &[u16]) {
        if params.is_empty() {
            self.pen = Style::default();
            return;
        }
        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => self.pen = Style::default(),
                1 => self.pen = self.pen.add_modifier(Modifier::BOLD),
                2 => self.pen = self.pen.add_modifier(Modifier::DIM),
                3 => self.pen = self.pen.add_modifier(Modifier::ITALIC),
                4 => self.pen = self.pen.add_modifier(Modifier::UNDERLINED),
                7 => self.pen = self.pen.add_modifier(Modifier::REVERSED),
                22 => self.pen = self.pen.remove_modifier(Modifier::BOLD | Modifier::DIM),
                23 => self.pen = self.pen.remove_modifier(Modifier::ITALIC),
                24 => self.pen = self.pen.remove_modifier(Modifier::UNDERLINED),
                27 => self.pen = self.pen.remove_modifier(Modifier::REVERSED),
                n @ 30..=37 => self.pen = self.pen.fg(Color::Indexed((n - 30) as u8)),
                n @ 90..=97 => self.pen = self.pen.fg(Color::Indexed((n - 90 + 8) as u8)),
                n @ 40..=47 => self.pen = self.pen.bg(Color::Indexed((n - 40) as u8)),
                n @ 100..=107 => self.pen = self.pen.bg(Color::Indexed((n - 100 + 8) as u8)),
                39 => self.pen.fg = None,
                49 => self.pen.bg = None,
                n @ (38 | 48) => {
                    let color = match params.get(i + 1).copied() {
                        Some(5) => params.get(i + 2).map(|&c| {
                            i += 2;
                            Color::Indexed(c as u8)
                        }),
                        Some(2) if i + 4 < params.len() => {
                            let rgb = Color::Rgb(
                                params[i + 2] as u8,
                                params[i + 3] as u8,
                                params[i + 4] as u8,
                            );
                            i += 4;
                            Some(rgb)
                        }
                        _ => None,
                    };
                    if let Some(color) = color {
                        self.pen = if n == 38 { self.pen.fg(color) } else { self.pen.bg(color) };
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }
}

impl vte::Perform for Screen {
    fn print(&mut self, c: char) {
        if self.col >= self.cols {
            self.col = 0;
            self.line_feed();
        }
        self.grid[self.row][self.col] = Cell { ch: c, style: self.pen };
        self.col += 1;
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\r' => self.col = 0,
            b'\n' | 0x0b | 0x0c => self.line_feed(),
            0x08 => self.col = self.col.saturating_sub(1),
            b'\t' => self.col = ((self.col / 8 + 1) * 8).min(self.cols - 1),
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &vte::Params, intermediates: &[u8], _ignore: bool, action: char) {
        // Private modes (`CSI ? ...`) toggle features this screen lacks.
        if intermediates.first() == Some(&b'?') {
            return;
        }
        let args: Vec<u16> = params.iter().map(|p| p.first().copied().unwrap_or(0)).collect();
        let arg = |i: usize| args.get(i).copied().filter(|&n| n > 0).unwrap_or(1) as usize;

        match action {
            'A' => self.row = self.row.saturating_sub(arg(0)),
            'B' => self.row = (self.row + arg(0)).min(self.rows - 1),
            'C' => self.col = (self.col + arg(0)).min(self.cols - 1),
            'D' => self.col = self.col.saturating_sub(arg(0)),
            'G' => self.col = (arg(0) - 1).min(self.cols - 1),
            'd' => self.row = (arg(0) - 1).min(self.rows - 1),
            'H' | 'f' => {
                self.row = (arg(0) - 1).min(self.rows - 1);
                self.col = (arg(1) - 1).min(self.cols - 1);
            }
            'J' => match args.first().copied().unwrap_or(0) {
                0 => {
                    self.clear_range(self.row, self.col, self.cols);
                    for row in self.row + 1..self.rows {
                        self.clear_range(row, 0, self.cols);
                    }
                }
                1 => {
                    for row in 0..self.row {
                        self.clear_range(row, 0, self.cols);
                    }
                    self.clear_range(self.row, 0, self.col + 1);
                }
                _ => {
                    for row in 0..self.rows {
                        self.clear_range(row, 0, self.cols);
                    }
                }
            },
            'K' => match args.first().copied().unwrap_or(0) {
                0 => self.clear_range(self.row, self.col, self.cols),
                1 => self.clear_range(self.row, 0, self.col + 1),
                _ => self.clear_range(self.row, 0, self.cols),
            },
            'P' => {
                let n = arg(0).min(self.cols - self.col.min(self.cols));
                let blank = self.blank();
                let line = &mut self.grid[self.row];
                if self.col < self.cols {
                    line.drain(self.col..self.col + n);
                    line.resize(self.cols, blank);
                }
            }
            'X' => {
                let end = (self.col + arg(0)).min(self.cols);
                self.clear_range(self.row, self.col, end);
            }
            'm' => self.sgr(&args),
            's' => self.saved = Some((self.row, self.col)),
            'u' => {
                if let Some((row, col)) = self.saved {
                    self.row = row.min(self.rows - 1);
                    self.col = col.min(self.cols - 1);
                }
            }
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, byte: u8) {
        match byte {
            b'7' => self.saved = Some((self.row, self.col)),
            b'8' => {
                if let Some((row, col)) = self.saved {
                    self.row = row.min(self.rows - 1);
                    self.col = col.min(self.cols - 1);
                }
            }
            b'c' => *self = Screen::new(self.rows, self.cols),
            _ => {}
        }
    }
}

/// Parser plus screen.
pub struct TerminalEmulator {
    parser: vte::Parser,
    screen: Screen,
}

impl TerminalEmulator {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            parser: vte::Parser::new(),
            screen: Screen::new(rows, cols),
        }
    }

    pub fn process(&mut self, data: &[u8]) {
        for &byte in data {
            self.parser.advance(&mut self.screen, byte);
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.screen.resize(rows, cols);
    }
}

impl std::fmt::Debug for TerminalEmulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalEmulator")
            .field("size", &self.screen.size())
            .field("cursor", &self.screen.cursor())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Screen {
        fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
            self.grid.get(row).and_then(|r| r.get(col))
        }

        /// Text of `row` with trailing blanks removed.
        fn row_text(&self, row: usize) -> String {
            self.grid
                .get(row)
                .map(|r| r.iter().map(|c| c.ch).collect::<String>())
                .unwrap_or_default()
                .trim_end()
                .to_string()
        }
    }

    fn emu(rows: usize, cols: usize, input: &[u8]) -> TerminalEmulator {
        let mut emu = TerminalEmulator::new(rows, cols);
        emu.process(input);
        emu
    }

    #[test]
    fn prints_and_moves_cursor() {
        let e = emu(24, 80, b"Hello");
        assert_eq!(e.screen().row_text(0), "Hello");
        assert_eq!(e.screen().cursor(), (0, 5));
    }

    #[test]
    fn crlf_starts_new_line() {
        let e = emu(24, 80, b"one\r\ntwo");
        assert_eq!(e.screen().row_text(0), "one");
        assert_eq!(e.screen().row_text(1), "two");
    }

    #[test]
    fn long_lines_wrap() {
        let e = emu(3, 4, b"abcdef");
        assert_eq!(e.screen().row_text(0), "abcd");
        assert_eq!(e.screen().row_text(1), "ef");
    }

    #[test]
    fn bottom_line_feed_scrolls() {
        let e = emu(2, 10, b"a\r\nb\r\nc");
        assert_eq!(e.screen().row_text(0), "b");
        assert_eq!(e.screen().row_text(1), "c");
    }

    #[test]
    fn cursor_position_and_erase() {
        let e = emu(3, 10, b"AAAAAAAAAA\r\nBBBBBBBBBB\x1b[2;6H\x1b[0J");
        assert_eq!(e.screen().row_text(0), "AAAAAAAAAA");
        assert_eq!(e.screen().row_text(1), "BBBBB");
        assert_eq!(e.screen().cursor(), (1, 5));
    }

    #[test]
    fn erase_line_and_backspace() {
        let e = emu(2, 20, b"prompt$ ls\x08\x08\x1b[K");
        assert_eq!(e.screen().row_text(0), "prompt$");
    }

    #[test]
    fn delete_characters_shifts_left() {
        let e = emu(1, 10, b"abcdef\x1b[1G\x1b[2P");
        assert_eq!(e.screen().row_text(0), "cdef");
    }

    #[test]
    fn sgr_sets_colors() {
        let e = emu(1, 10, b"\x1b[1;31mR\x1b[0mn\x1b[38;2;1;2;3mt");
        let screen = e.screen();
        assert_eq!(screen.cell(0, 0).unwrap().style.fg, Some(Color::Indexed(1)));
        assert!(screen.cell(0, 0).unwrap().style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(screen.cell(0, 1).unwrap().style, Style::default());
        assert_eq!(screen.cell(0, 2).unwrap().style.fg, Some(Color::Rgb(1, 2, 3)));
    }

    #[test]
    fn private_modes_are_ignored() {
        let e = emu(1, 10, b"\x1b[?25lok\x1b[?25h");
        assert_eq!(e.screen().row_text(0), "ok");
    }

    #[test]
    fn resize_keeps_bottom_rows() {
        let mut e = emu(3, 10, b"1\r\n2\r\n3");
        e.resize(2, 5);
        assert_eq!(e.screen().size(), (2, 5));
        assert_eq!(e.screen().row_text(0), "2");
        assert_eq!(e.screen().row_text(1), "3");
        assert_eq!(e.screen().cursor(), (1, 1));
    }

    #[test]
    fn lines_group_styled_runs() {
        let e = emu(1, 4, b"\x1b[31mab\x1b[0mcd");
        let lines = e.screen().lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(lines[0].spans[0].content, "ab");
        assert_eq!(lines[0].spans[1].content, "cd");
    }
}
