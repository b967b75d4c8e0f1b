use ratatui::text::Line;

use crate::ai::CompletionJob;
use crate::chats::Conversation;
use crate::config::{Config, ModelConfig};
use crate::error::{AppError, AppResult};
use crate::selection::{Pane, Selection};
use crate::snippets::Highlighter;
use crate::storage::ConversationStore;

/// Text shown in the command bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub is_error: bool,
}

/// App holds the whole session state: selections, the live conversation and
/// the rendered log. Every mutation happens on the UI task.
pub struct App {
    /// Is the application running?
    pub running: bool,
    pub config: Config,
    pub store: ConversationStore,
    pub highlighter: Highlighter,
    /// Provider names, in config order.
    pub providers: Vec<String>,
    /// Models of the active provider.
    pub models: Vec<ModelConfig>,
    /// Saved conversations of the active provider/model pair.
    pub conversations: Vec<Conversation>,
    pub provider_selection: Selection,
    pub model_selection: Selection,
    pub conversation_selection: Selection,
    /// Focused pane.
    pub focus: Pane,
    pub cursor_visible: bool,
    /// The conversation new messages go to.
    pub conversation: Conversation,
    /// Rendered chat log.
    pub log: Vec<Line<'static>>,
    /// Lines scrolled up from the bottom of the log.
    pub log_scroll: usize,
    /// Inner width of the chat log pane.
    pub log_width: u16,
    pub input: String,
    /// Position of cursor in the input, in characters.
    pub character_index: usize,
    pub status: Option<Status>,
    pub(crate) in_flight: Option<u64>,
    pub(crate) next_request_id: u64,
    pub(crate) queued: Option<CompletionJob>,
}

impl App {
    pub fn new(config: Config, store: ConversationStore) -> AppResult<Self> {
        let providers = config.get_all_providers();
        let provider_index = config.initial_provider_index();
        let provider = providers
            .get(provider_index)
            .cloned()
            .ok_or_else(|| AppError::ConfigInvalid("no providers configured".into()))?;
        let models = config.get_models_for_provider(&provider)?.to_vec();
        let model = models
            .first()
            .ok_or_else(|| AppError::ConfigInvalid(format!("provider '{provider}' has no models")))?;
        let conversation =
            Conversation::with_system_prompt(&provider, &model.name, &model.system_prompt);

        let mut app = Self {
            running: true,
            config,
            store,
            highlighter: Highlighter::new(),
            providers,
            models,
            conversations: Vec::new(),
            provider_selection: Selection::confirmed(provider_index),
            model_selection: Selection::confirmed(0),
            conversation_selection: Selection::default(),
            focus: Pane::Input,
            cursor_visible: true,
            conversation,
            log: Vec::new(),
            log_scroll: 0,
            log_width: 80,
            input: String::new(),
            character_index: 0,
            status: None,
            in_flight: None,
            next_request_id: 0,
            queued: None,
        };
        app.refresh_conversations();
        Ok(app)
    }

    /// Handles the tick event of the terminal.
    pub fn tick(&self) {}

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn active_provider_name(&self) -> Option<&str> {
        self.provider_selection
            .active
            .and_then(|i| self.providers.get(i))
            .map(String::as_str)
    }

    pub fn active_model(&self) -> Option<&ModelConfig> {
        self.model_selection.active.and_then(|i| self.models.get(i))
    }

    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            is_error: false,
        });
    }

    /// Logs `error` and shows it in the command bar; the session carries on.
    pub fn report_error(&mut self, error: &AppError) {
        tracing::error!(error = %error, "recoverable error");
        self.status = Some(Status {
            text: error.to_string(),
            is_error: true,
        });
    }

    pub fn set_log_width(&mut self, width: u16) {
        self.log_width = width;
    }

    pub fn scroll_log_up(&mut self) {
        if self.log_scroll < self.log.len() {
            self.log_scroll += 1;
        }
    }

    pub fn scroll_log_down(&mut self) {
        self.log_scroll = self.log_scroll.saturating_sub(1);
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.character_index = 0;
    }

    pub fn enter_char(&mut self, new_char: char) {
        let index = self.byte_index();
        self.input.insert(index, new_char);
        self.move_cursor_right();
    }

    pub fn delete_char(&mut self) {
        if self.character_index == 0 {
            return;
        }
        let current = self.character_index;
        let before = self.input.chars().take(current - 1);
        let after = self.input.chars().skip(current);
        self.input = before.chain(after).collect();
        self.move_cursor_left();
    }

    pub fn move_cursor_left(&mut self) {
        self.character_index = self.character_index.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        let len = self.input.chars().count();
        if self.character_index < len {
            self.character_index += 1;
        }
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .map(|(i, _)| i)
            .nth(self.character_index)
            .unwrap_or(self.input.len())
    }
}
