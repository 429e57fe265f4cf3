//! UI palette (Catppuccin Mocha).

use ratatui::style::Color;

#[derive(Debug, Clone)]
pub struct ThemeColors {
    pub sidebar_fg: Color,
    pub selected_bg: Color,
    pub selected_fg: Color,
    pub dir_fg: Color,
    pub file_fg: Color,

    pub tag_modify_fg: Color,
    pub tag_keep_fg: Color,
    pub tag_example_fg: Color,

    pub status_bg: Color,
    pub status_fg: Color,

    pub border_fg: Color,
    pub border_focused_fg: Color,

    pub error_fg: Color,
    pub warning_fg: Color,
    pub success_fg: Color,
    pub info_fg: Color,
    pub accent_fg: Color,
    pub dim_fg: Color,
}

pub fn dark_theme() -> ThemeColors {
    ThemeColors {
        sidebar_fg: Color::Rgb(205, 214, 244),  // #cdd6f4 (text)
        selected_bg: Color::Rgb(69, 71, 90),    // #45475a (surface1)
        selected_fg: Color::Rgb(205, 214, 244), // #cdd6f4
        dir_fg: Color::Rgb(137, 180, 250),      // #89b4fa (blue)
        file_fg: Color::Rgb(205, 214, 244),

        tag_modify_fg: Color::Rgb(250, 179, 135),  // #fab387 (peach)
        tag_keep_fg: Color::Rgb(243, 139, 168),    // #f38ba8 (red)
        tag_example_fg: Color::Rgb(166, 227, 161), // #a6e3a1 (green)

        status_bg: Color::Rgb(49, 50, 68), // #313244 (surface0)
        status_fg: Color::Rgb(205, 214, 244),

        border_fg: Color::Rgb(88, 91, 112),            // #585b70 (surface2)
        border_focused_fg: Color::Rgb(137, 180, 250),  // #89b4fa

        error_fg: Color::Rgb(243, 139, 168),   // #f38ba8
        warning_fg: Color::Rgb(249, 226, 175), // #f9e2af (yellow)
        success_fg: Color::Rgb(166, 227, 161), // #a6e3a1
        info_fg: Color::Rgb(137, 220, 235),    // #89dceb (sky)
        accent_fg: Color::Rgb(203, 166, 247),  // #cba6f7 (mauve)
        dim_fg: Color::Rgb(108, 112, 134),     // #6c7086 (overlay0)
    }
}
