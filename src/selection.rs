use crate::app::App;
use crate::chats::Conversation;
use crate::error::{AppError, AppResult};

/// Focusable regions, in Tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Providers,
    Models,
    Conversations,
    Log,
    Input,
}

impl Pane {
    pub const ALL: [Pane; 5] = [
        Pane::Providers,
        Pane::Models,
        Pane::Conversations,
        Pane::Log,
        Pane::Input,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// Pane bound to the digit keys `1`..`5`.
    pub fn from_digit(c: char) -> Option<Self> {
        let n = c.to_digit(10)? as usize;
        n.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn accepts_text(self) -> bool {
        self == Pane::Input
    }

    pub fn title(self) -> &'static str {
        match self {
            Pane::Providers => "[1]-Providers",
            Pane::Models => "[2]-Models",
            Pane::Conversations => "[3]-Conversations",
            Pane::Log => "[4]-Chat Log",
            Pane::Input => "[5]-Input",
        }
    }
}

/// Browsing cursor plus the confirmed choice in one list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub selected: usize,
    pub active: Option<usize>,
}

impl Selection {
    pub fn confirmed(index: usize) -> Self {
        Self {
            selected: index,
            active: Some(index),
        }
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self, len: usize) {
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    /// Keeps both indices inside a list of `len` items.
    pub fn clamp(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
        self.active = self.active.filter(|&i| i < len);
    }
}

impl App {
    pub fn move_selection_up(&mut self, list: Pane) {
        match list {
            Pane::Providers => self.provider_selection.move_up(),
            Pane::Models => self.model_selection.move_up(),
            Pane::Conversations => self.conversation_selection.move_up(),
            Pane::Log | Pane::Input => {}
        }
    }

    pub fn move_selection_down(&mut self, list: Pane) {
        match list {
            Pane::Providers => self.provider_selection.move_down(self.providers.len()),
            Pane::Models => self.model_selection.move_down(self.models.len()),
            Pane::Conversations => self
                .conversation_selection
                .move_down(self.conversations.len()),
            Pane::Log | Pane::Input => {}
        }
    }

    /// Makes the highlighted provider active and starts over on its first model.
    ///
    /// Nothing changes when the provider cannot be resolved.
    pub fn confirm_provider(&mut self) -> AppResult<()> {
        let index = self.provider_selection.selected;
        let name = self
            .providers
            .get(index)
            .cloned()
            .ok_or_else(|| AppError::ProviderNotFound(format!("#{index}")))?;
        let models = self.config.get_models_for_provider(&name)?.to_vec();
        if models.is_empty() {
            return Err(AppError::ModelNotFound {
                provider: name,
                model: "#0".into(),
            });
        }

        tracing::info!(provider = %name, "switching provider");
        self.provider_selection.active = Some(index);
        self.models = models;
        self.model_selection = Selection::confirmed(0);
        self.start_new_conversation();
        Ok(())
    }

    /// Makes the highlighted model active within the current provider.
    pub fn confirm_model(&mut self) -> AppResult<()> {
        let index = self.model_selection.selected;
        if index >= self.models.len() {
            return Err(AppError::ModelNotFound {
                provider: self.active_provider_name().unwrap_or_default().to_string(),
                model: format!("#{index}"),
            });
        }

        tracing::info!(model = %self.models[index].name, "switching model");
        self.model_selection.active = Some(index);
        self.start_new_conversation();
        Ok(())
    }

    /// Replaces the live conversation with the highlighted saved one.
    pub fn confirm_conversation(&mut self) -> AppResult<()> {
        let Some(target) = self
            .conversations
            .get(self.conversation_selection.selected)
            .and_then(|c| c.path().cloned())
        else {
            return Ok(());
        };

        self.save_current();
        let conversation = self.store.load(&target)?;
        tracing::info!(path = %target.display(), "opening conversation");
        self.install_conversation(conversation);
        self.refresh_conversations();
        if let Some(active) = self.conversation_selection.active {
            self.conversation_selection.selected = active;
        }
        self.render_history();
        Ok(())
    }

    pub fn advance_pane(&mut self) {
        self.focus_pane(self.focus.next());
    }

    pub fn focus_pane(&mut self, pane: Pane) {
        self.focus = pane;
        self.cursor_visible = pane.accepts_text();
    }

    /// Reloads the saved conversations of the live pair and marks the live one.
    pub fn refresh_conversations(&mut self) {
        let listed = self
            .store
            .list(&self.conversation.provider, &self.conversation.model);
        self.conversations = match listed {
            Ok(conversations) => conversations,
            Err(e) => {
                self.report_error(&e);
                Vec::new()
            }
        };
        self.conversation_selection.clamp(self.conversations.len());
        self.conversation_selection.active = self.conversation.path().and_then(|path| {
            self.conversations
                .iter()
                .position(|c| c.path() == Some(path))
        });
    }

    /// Saves the live conversation if it holds more than its system prompt.
    pub fn save_current(&mut self) {
        if !self.conversation.has_exchange() {
            return;
        }
        if let Err(e) = self.store.save(&mut self.conversation) {
            self.report_error(&e);
        }
    }

    fn start_new_conversation(&mut self) {
        self.save_current();

        let provider = self.active_provider_name().unwrap_or_default().to_string();
        let (model, system_prompt) = self
            .active_model()
            .map(|m| (m.name.clone(), m.system_prompt.clone()))
            .unwrap_or_default();
        self.install_conversation(Conversation::with_system_prompt(
            provider,
            model,
            &system_prompt,
        ));
        self.conversation_selection = Selection::default();
        self.refresh_conversations();
        self.clear_input();
    }

    fn install_conversation(&mut self, conversation: Conversation) {
        if let Some(request_id) = self.in_flight.take() {
            tracing::warn!(request_id, "abandoning pending reply");
        }
        self.queued = None;
        self.conversation = conversation;
        self.log.clear();
        self.log_scroll = 0;
    }
}
