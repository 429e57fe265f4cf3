use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Focus};
use crate::selection::FileTag;

/// Handle a key event.
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        let handled = match key.code {
            KeyCode::Char('q') => {
                app.quit();
                true
            }
            KeyCode::Char('b') => {
                app.toggle_sidebar();
                true
            }
            KeyCode::Char('o') => {
                app.swap_focus();
                true
            }
            KeyCode::Char('t') => {
                app.toggle_composer();
                true
            }
            KeyCode::Char('g') if matches!(app.focus, Focus::Sidebar | Focus::Search) => {
                app.toggle_changed_only();
                true
            }
            _ => false,
        };
        if handled {
            return;
        }
    }

    match app.focus {
        Focus::Terminal => {
            if let Some(bytes) = key_to_bytes(key) {
                app.write_to_terminal(&bytes);
            }
        }
        Focus::Sidebar => handle_sidebar_key(app, key),
        Focus::Search => handle_search_key(app, key),
        Focus::Composer => handle_composer_key(app, key),
    }
}

fn handle_sidebar_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.view.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.view.select_previous(),
        KeyCode::Char('g') | KeyCode::Home => app.view.select_first(),
        KeyCode::Char('G') | KeyCode::End => app.view.select_last(),
        KeyCode::Enter => app.activate_selected(),
        KeyCode::Char(' ') => app.toggle_select(),
        KeyCode::Char('1') => app.tag_selected(FileTag::Modify),
        KeyCode::Char('2') => app.tag_selected(FileTag::DoNotModify),
        KeyCode::Char('3') => app.tag_selected(FileTag::UseAsExample),
        KeyCode::Char('x') => app.remove_selected(),
        KeyCode::Char('X') => app.selection.clear_all(),
        KeyCode::Backspace | KeyCode::Char('h') => app.view.navigate_to_parent(),
        KeyCode::Tab => app.view.toggle_mode(),
        KeyCode::Char('/') => app.start_search(),
        KeyCode::Char('a') => app.analyze_selected(),
        KeyCode::Char('i') => app.insert_reference(),
        KeyCode::Char('r') => app.view.refresh(),
        KeyCode::Esc => app.focus = Focus::Terminal,
        _ => {}
    }
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.end_search(true),
        KeyCode::Enter | KeyCode::Down => app.end_search(false),
        KeyCode::Backspace => app.search_backspace(),
        KeyCode::Char(c) => app.search_input(c),
        _ => {}
    }
}

fn handle_composer_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if key.code == KeyCode::Char('s') {
            app.send_composed();
        }
        return;
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        match key.code {
            KeyCode::Char('1') => app.composer_tag(FileTag::Modify),
            KeyCode::Char('2') => app.composer_tag(FileTag::DoNotModify),
            KeyCode::Char('3') => app.composer_tag(FileTag::UseAsExample),
            KeyCode::Char('x') => app.composer_remove(),
            KeyCode::Char('X') => app.composer_clear_selection(),
            _ => {}
        }
        return;
    }
    match key.code {
        KeyCode::Esc => app.close_composer(),
        KeyCode::Up => app.composer_select_previous(),
        KeyCode::Down => app.composer_select_next(),
        KeyCode::Enter => app.composer.insert_char('\n'),
        KeyCode::Backspace => app.composer.delete_char(),
        KeyCode::Left => app.composer.move_left(),
        KeyCode::Right => app.composer.move_right(),
        KeyCode::Home => app.composer.home(),
        KeyCode::End => app.composer.end(),
        KeyCode::Char(c) => app.composer.insert_char(c),
        _ => {}
    }
}

/// Encode a key press as the bytes a terminal would send.
pub fn key_to_bytes(key: KeyEvent) -> Option<Vec<u8>> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let mut bytes = match key.code {
        KeyCode::Char(c) if ctrl => match c.to_ascii_lowercase() {
            c @ 'a'..='z' => vec![c as u8 - b'a' + 1],
            '@' | ' ' => vec![0],
            '[' => vec![0x1b],
            '\\' => vec![0x1c],
            ']' => vec![0x1d],
            _ => return None,
        },
        KeyCode::Char(c) => c.to_string().into_bytes(),
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::Insert => b"\x1b[2~".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        _ => return None,
    };
    if alt {
        bytes.insert(0, 0x1b);
    }
    Some(bytes)
}
