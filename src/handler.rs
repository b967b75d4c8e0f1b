use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::App;
use crate::selection::Pane;

/// Handles the key events and updates the state of [`App`].
///
/// Errors from confirm and submit are shown in the command bar.
pub fn handle_key_events(key_event: KeyEvent, app: &mut App) {
    if key_event.modifiers.contains(KeyModifiers::CONTROL) && key_event.code == KeyCode::Char('c')
    {
        app.quit();
        return;
    }
    if key_event.code == KeyCode::Tab {
        app.advance_pane();
        return;
    }

    let result = match app.focus {
        Pane::Input => match key_event.code {
            KeyCode::Enter if key_event.modifiers.contains(KeyModifiers::ALT) => {
                app.enter_char('\n');
                Ok(())
            }
            KeyCode::Enter => app.submit_input().map(|_| ()),
            code => {
                match code {
                    KeyCode::Char(c) => app.enter_char(c),
                    KeyCode::Backspace => app.delete_char(),
                    KeyCode::Left => app.move_cursor_left(),
                    KeyCode::Right => app.move_cursor_right(),
                    KeyCode::Esc => app.focus_pane(Pane::Log),
                    _ => {}
                }
                Ok(())
            }
        },
        pane => match key_event.code {
            KeyCode::Char(c) if c.is_ascii_digit() => {
                if let Some(target) = Pane::from_digit(c) {
                    app.focus_pane(target);
                }
                Ok(())
            }
            KeyCode::Char('q') => {
                app.quit();
                Ok(())
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if pane == Pane::Log {
                    app.scroll_log_up();
                } else {
                    app.move_selection_up(pane);
                }
                Ok(())
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if pane == Pane::Log {
                    app.scroll_log_down();
                } else {
                    app.move_selection_down(pane);
                }
                Ok(())
            }
            KeyCode::Enter => match pane {
                Pane::Providers => app.confirm_provider(),
                Pane::Models => app.confirm_model(),
                Pane::Conversations => app.confirm_conversation(),
                Pane::Log | Pane::Input => Ok(()),
            },
            _ => Ok(()),
        },
    };
    report(app, result);
}

fn report(app: &mut App, result: crate::error::AppResult<()>) {
    if let Err(e) = result {
        app.report_error(&e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;

    fn press(app: &mut App, code: KeyCode) {
        handle_key_events(KeyEvent::new(code, KeyModifiers::NONE), app);
    }

    #[test]
    fn digits_type_into_input_but_jump_elsewhere() {
        let (_dir, mut app) = test_app();
        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.input, "2");
        assert_eq!(app.focus, Pane::Input);

        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.focus, Pane::Models);
        assert!(!app.cursor_visible);
    }

    #[test]
    fn enter_in_models_pane_confirms() {
        let (_dir, mut app) = test_app();
        app.focus_pane(Pane::Models);
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.active_model().unwrap().name, "gpt-4o");
        assert_eq!(app.conversation.model, "gpt-4o");
    }

    #[test]
    fn alt_enter_inserts_newline_and_enter_submits() {
        let (_dir, mut app) = test_app();
        press(&mut app, KeyCode::Char('a'));
        handle_key_events(KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT), &mut app);
        press(&mut app, KeyCode::Char('b'));
        assert_eq!(app.input, "a\nb");

        press(&mut app, KeyCode::Enter);
        assert!(app.input.is_empty());
        assert!(app.is_waiting());
        assert_eq!(app.conversation.history()[1].content, "a\nb");
    }

    #[test]
    fn ctrl_c_quits_from_any_pane() {
        let (_dir, mut app) = test_app();
        handle_key_events(
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            &mut app,
        );
        assert!(!app.running);
    }
}
