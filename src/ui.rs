use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::selection::{Pane, Selection};

const INPUT_HEIGHT: u16 = 6;
const LIST_HEIGHT: u16 = 11;

fn pane_block(pane: Pane, app: &App) -> Block<'static> {
    let block = Block::bordered()
        .title(pane.title())
        .border_type(BorderType::Rounded);
    if app.focus == pane {
        block.border_style(Style::default().fg(Color::Green))
    } else {
        block
    }
}

/// Renders the widgets. Also records the chat log width used for wrapping.
pub fn render(frame: &mut Frame, app: &mut App) {
    let [main_area, command_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(3)]).areas(frame.area());
    let [left, right] =
        Layout::horizontal([Constraint::Ratio(1, 4), Constraint::Ratio(3, 4)]).areas(main_area);
    let [top_left, conversations_area] =
        Layout::vertical([Constraint::Length(LIST_HEIGHT), Constraint::Min(1)]).areas(left);
    let [providers_area, models_area] =
        Layout::horizontal([Constraint::Ratio(1, 2); 2]).areas(top_left);
    let [log_area, input_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(INPUT_HEIGHT)]).areas(right);

    app.set_log_width(log_area.width.saturating_sub(2));

    let footer = active_footer(app);
    let providers: Vec<String> = app.providers.clone();
    render_list(
        frame,
        providers_area,
        pane_block(Pane::Providers, app),
        &providers,
        app.provider_selection,
        Some(footer.clone()),
    );
    let models: Vec<String> = app.models.iter().map(|m| m.name.clone()).collect();
    render_list(
        frame,
        models_area,
        pane_block(Pane::Models, app),
        &models,
        app.model_selection,
        Some(footer),
    );
    let titles: Vec<String> = app
        .conversations
        .iter()
        .map(|c| {
            if c.title.is_empty() {
                "Untitled".to_string()
            } else {
                c.title.clone()
            }
        })
        .collect();
    render_list(
        frame,
        conversations_area,
        pane_block(Pane::Conversations, app),
        &titles,
        app.conversation_selection,
        None,
    );

    render_log(frame, log_area, app);
    render_input(frame, input_area, app);
    render_command_bar(frame, command_area, app);
}

fn active_footer(app: &App) -> Text<'static> {
    let style = Style::default().fg(Color::Green);
    Text::from(vec![
        Line::styled("ACTIVE:", style),
        Line::styled(
            format!(
                "{} -> {}",
                app.active_provider_name().unwrap_or("-"),
                app.active_model().map(|m| m.name.as_str()).unwrap_or("-")
            ),
            style,
        ),
    ])
}

fn render_list(
    frame: &mut Frame,
    area: Rect,
    block: Block<'static>,
    names: &[String],
    selection: Selection,
    footer: Option<Text<'static>>,
) {
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let (list_area, footer_area) = match footer {
        Some(_) => {
            let [list_area, footer_area] =
                Layout::vertical([Constraint::Min(1), Constraint::Length(3)]).areas(inner);
            (list_area, Some(footer_area))
        }
        None => (inner, None),
    };

    let items: Vec<ListItem> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let marker = if selection.active == Some(i) { "* " } else { "  " };
            ListItem::new(Line::from(format!("{marker}{name}")))
        })
        .collect();
    let mut state = ListState::default();
    if !items.is_empty() {
        state.select(Some(selection.selected));
    }
    let list = List::new(items).highlight_style(
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    );
    frame.render_stateful_widget(list, list_area, &mut state);

    if let (Some(text), Some(footer_area)) = (footer, footer_area) {
        frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), footer_area);
    }
}

fn render_log(frame: &mut Frame, area: Rect, app: &App) {
    let mut block = pane_block(Pane::Log, app);
    if app.is_waiting() {
        block = block.title_bottom(Line::from(" waiting for reply... ").italic());
    }
    let height = usize::from(area.height.saturating_sub(2));
    let total = app.log.len();
    let top = total.saturating_sub(height + app.log_scroll);
    let scroll = u16::try_from(top).unwrap_or(u16::MAX);

    let log = Paragraph::new(Text::from(app.log.clone()))
        .block(block)
        .scroll((scroll, 0));
    frame.render_widget(log, area);
}

fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(Color::Yellow))
        .block(pane_block(Pane::Input, app));
    frame.render_widget(input, area);

    if app.cursor_visible && app.focus == Pane::Input {
        let before: String = app.input.chars().take(app.character_index).collect();
        let row = before.matches('\n').count();
        let col = before.rsplit('\n').next().map_or(0, |l| l.chars().count());
        #[allow(clippy::cast_possible_truncation)]
        frame.set_cursor_position((area.x + 1 + col as u16, area.y + 1 + row as u16));
    }
}

fn render_command_bar(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        "Tab".bold(),
        " next pane  ".into(),
        "1-5".bold(),
        " jump  ".into(),
        "Enter".bold(),
        " select/send  ".into(),
        "Alt+Enter".bold(),
        " newline  ".into(),
        "Ctrl+C".bold(),
        " quit".into(),
    ];
    if let Some(status) = &app.status {
        let style = if status.is_error {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Yellow)
        };
        spans.push("  |  ".into());
        spans.push(Span::styled(status.text.clone(), style));
    }
    let bar = Paragraph::new(Line::from(spans)).block(
        Block::bordered()
            .title("Command")
            .border_type(BorderType::Rounded),
    );
    frame.render_widget(bar, area);
}
