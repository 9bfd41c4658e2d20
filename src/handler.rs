use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, FocusPane, InputMode, Screen};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => app.scroll_chat_to_bottom(),
        AppEvent::Tick => app.tick(),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    if app.show_provider_picker {
        match key.code {
            KeyCode::Esc => app.show_provider_picker = false,
            KeyCode::Char('j') | KeyCode::Down => app.provider_picker_nav_down(),
            KeyCode::Char('k') | KeyCode::Up => app.provider_picker_nav_up(),
            KeyCode::Enter => app.select_provider().await,
            _ => {}
        }
        return Ok(());
    }

    if app.show_model_picker {
        match key.code {
            KeyCode::Esc => app.show_model_picker = false,
            KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
            KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
            KeyCode::Enter => app.select_model(),
            _ => {}
        }
        return Ok(());
    }

    match (app.screen, app.input_mode) {
        (Screen::Info, _) => handle_info(app, key),
        (Screen::Dashboard, InputMode::Normal) => handle_dashboard_normal(app, key).await,
        (Screen::Dashboard, InputMode::Editing) => handle_chat_editing(app, key),
    }

    Ok(())
}

fn handle_info(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => app.screen = Screen::Dashboard,
        KeyCode::Char('j') | KeyCode::Down => app.info_scroll = app.info_scroll.saturating_add(1),
        KeyCode::Char('k') | KeyCode::Up => app.info_scroll = app.info_scroll.saturating_sub(1),
        KeyCode::Char('g') => app.info_scroll = 0,
        _ => {}
    }
}

fn focus_input(app: &mut App) {
    app.focus = FocusPane::Input;
    app.input_mode = InputMode::Editing;
    // Cursor at end of existing text
    app.chat_cursor = app.chat_input.chars().count();
}

async fn handle_dashboard_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('?') => {
            app.screen = Screen::Info;
            app.info_scroll = 0;
        }

        // Tab cycles: Sensors -> Chat -> Input -> Sensors
        KeyCode::Tab => match app.focus {
            FocusPane::Sensors => app.focus = FocusPane::Chat,
            FocusPane::Chat => focus_input(app),
            FocusPane::Input => app.focus = FocusPane::Sensors,
        },
        KeyCode::Char('i') => focus_input(app),

        KeyCode::Char('a') => app.start_analyze(),
        KeyCode::Enter => match app.focus {
            FocusPane::Sensors => app.start_analyze(),
            FocusPane::Chat | FocusPane::Input => focus_input(app),
        },

        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Sensors => app.field_down(),
            _ => app.scroll_chat_down(1),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Sensors => app.field_up(),
            _ => app.scroll_chat_up(1),
        },
        KeyCode::Char('l') | KeyCode::Right if app.focus == FocusPane::Sensors => app.adjust_selected(1),
        KeyCode::Char('h') | KeyCode::Left if app.focus == FocusPane::Sensors => app.adjust_selected(-1),
        KeyCode::Char('L') if app.focus == FocusPane::Sensors => app.adjust_selected(10),
        KeyCode::Char('H') if app.focus == FocusPane::Sensors => app.adjust_selected(-10),

        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_chat_down(app.chat_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_chat_up(app.chat_height / 2);
        }
        KeyCode::Char('g') if app.focus == FocusPane::Chat => app.chat_scroll = 0,
        KeyCode::Char('G') if app.focus == FocusPane::Chat => app.scroll_chat_to_bottom(),

        KeyCode::Char('P') => app.open_provider_picker(),
        KeyCode::Char('M') => app.open_model_picker().await,

        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Chat;
        }
        KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Sensors;
        }
        KeyCode::Enter => app.send_question(),
        // Typing is disabled while an answer is pending
        _ if app.is_answering() => {}
        KeyCode::Backspace => {
            if app.chat_cursor > 0 {
                app.chat_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.chat_input.chars().count();
            if app.chat_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.chat_cursor = app.chat_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.chat_input.chars().count();
            app.chat_cursor = (app.chat_cursor + 1).min(char_count);
        }
        KeyCode::Home => app.chat_cursor = 0,
        KeyCode::End => app.chat_cursor = app.chat_input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
            app.chat_input.insert(byte_pos, c);
            app.chat_cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let (x, y) = (mouse.column, mouse.row);
    let in_sensors = app.sensor_area.is_some_and(|r| point_in_rect(x, y, r));
    let in_chat = app.chat_area.is_some_and(|r| point_in_rect(x, y, r));

    match (mouse.kind, app.screen) {
        (MouseEventKind::ScrollDown, Screen::Info) => app.info_scroll = app.info_scroll.saturating_add(3),
        (MouseEventKind::ScrollUp, Screen::Info) => app.info_scroll = app.info_scroll.saturating_sub(3),
        (MouseEventKind::ScrollDown, Screen::Dashboard) => {
            if in_chat {
                app.scroll_chat_down(3);
            } else if in_sensors {
                app.field_down();
            }
        }
        (MouseEventKind::ScrollUp, Screen::Dashboard) => {
            if in_chat {
                app.scroll_chat_up(3);
            } else if in_sensors {
                app.field_up();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use busguardian::{Config, Provider, SensorField};

    fn press(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn app() -> App {
        App::new(Config::new(), Provider::Ollama, "llama3.2:latest".to_string())
    }

    #[test]
    fn byte_index_handles_multibyte_chars() {
        assert_eq!(char_to_byte_index("°C", 1), 2);
        assert_eq!(char_to_byte_index("ab", 5), 2);
    }

    #[tokio::test]
    async fn typing_edits_at_cursor() {
        let mut app = app();
        handle_event(&mut app, press(KeyCode::Char('i'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Editing);

        for c in "90°".chars() {
            handle_event(&mut app, press(KeyCode::Char(c))).await.unwrap();
        }
        handle_event(&mut app, press(KeyCode::Left)).await.unwrap();
        handle_event(&mut app, press(KeyCode::Backspace)).await.unwrap();
        assert_eq!(app.chat_input, "9°");
        assert_eq!(app.chat_cursor, 1);

        handle_event(&mut app, press(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.focus, FocusPane::Chat);
    }

    #[tokio::test]
    async fn sensor_keys_adjust_selected_row() {
        let mut app = app();
        handle_event(&mut app, press(KeyCode::Char('j'))).await.unwrap();
        assert_eq!(app.selected_field, SensorField::CabinTemperature);

        handle_event(&mut app, press(KeyCode::Char('L'))).await.unwrap();
        assert_eq!(app.session.sensors().cabin_temperature, 32.0);
        handle_event(&mut app, press(KeyCode::Char('h'))).await.unwrap();
        assert_eq!(app.session.sensors().cabin_temperature, 31.0);
    }

    #[tokio::test]
    async fn info_screen_toggles() {
        let mut app = app();
        handle_event(&mut app, press(KeyCode::Char('?'))).await.unwrap();
        assert_eq!(app.screen, Screen::Info);
        handle_event(&mut app, press(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.screen, Screen::Dashboard);
        assert!(!app.should_quit);
    }
}
