use std::borrow::Cow;

use ratatui::{
    layout::Alignment,
    style::{Color, Style},
    text::{Line, Span},
};

use crate::ai::{CompletionJob, CompletionOutcome, CompletionRequest};
use crate::app::App;
use crate::chats::Role;
use crate::error::{AppError, AppResult};
use crate::snippets::{split_fenced, Segment};

/// Columns kept free on the right of wrapped messages.
pub const WRAP_MARGIN: usize = 10;
const MIN_WRAP_WIDTH: usize = 20;
const USER_PREFIX: &str = "You: ";
const CONTINUATION_INDENT: &str = "    ";
const REPLY_PADDING: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Nothing but whitespace.
    Ignored,
    /// A reply is still pending.
    Busy,
    Dispatched(u64),
}

/// Greedy word wrap with a role prefix on the first line.
pub fn wrap_message(text: &str, width: usize, prefix: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut first = true;
    for paragraph in text.lines() {
        let paragraph = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
        if paragraph.is_empty() {
            if !first {
                lines.push(String::new());
            }
            continue;
        }
        let initial = if first { prefix } else { CONTINUATION_INDENT };
        let options = textwrap::Options::new(width)
            .wrap_algorithm(textwrap::WrapAlgorithm::FirstFit)
            .word_separator(textwrap::WordSeparator::AsciiSpace)
            .initial_indent(initial)
            .subsequent_indent(CONTINUATION_INDENT);
        lines.extend(textwrap::wrap(&paragraph, options).into_iter().map(Cow::into_owned));
        first = false;
    }
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    if lines.is_empty() && !prefix.is_empty() {
        lines.push(prefix.trim_end().to_string());
    }
    lines
}

/// Cuts a styled line into rows of at most `width` columns, keeping each span's style.
fn split_styled(line: Line<'static>, width: usize) -> Vec<Vec<Span<'static>>> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut row: Vec<Span<'static>> = Vec::new();
    let mut used = 0;
    for span in line.spans {
        let mut chunk = String::new();
        for ch in span.content.chars() {
            let w = textwrap::core::display_width(ch.encode_utf8(&mut [0; 4]));
            if used > 0 && used + w > width {
                if !chunk.is_empty() {
                    row.push(Span::styled(std::mem::take(&mut chunk), span.style));
                }
                rows.push(std::mem::take(&mut row));
                used = 0;
            }
            chunk.push(ch);
            used += w;
        }
        if !chunk.is_empty() {
            row.push(Span::styled(chunk, span.style));
        }
    }
    rows.push(row);
    rows
}

impl App {
    /// Sends the input pane's text; the input is kept when the send is refused.
    pub fn submit_input(&mut self) -> AppResult<Submission> {
        let text = self.input.clone();
        let submission = self.submit(&text)?;
        if submission != Submission::Busy {
            self.clear_input();
        }
        Ok(submission)
    }

    /// Appends `text` as a user message and queues the remote call for it.
    pub fn submit(&mut self, text: &str) -> AppResult<Submission> {
        let text = text.trim_end();
        if text.trim().is_empty() {
            return Ok(Submission::Ignored);
        }
        if let Some(request_id) = self.in_flight {
            tracing::debug!(request_id, "submission refused while waiting");
            self.set_status("Still waiting for the previous reply");
            return Ok(Submission::Busy);
        }

        let provider_name = self
            .active_provider_name()
            .ok_or_else(|| AppError::ProviderNotFound(self.conversation.provider.clone()))?;
        let provider = self.config.get_provider_config(provider_name)?.clone();
        let model = self
            .active_model()
            .cloned()
            .ok_or_else(|| AppError::ModelNotFound {
                provider: self.conversation.provider.clone(),
                model: self.conversation.model.clone(),
            })?;

        self.render_user_message(text);
        self.conversation.push(Role::User, text);

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.in_flight = Some(request_id);
        self.queued = Some(CompletionJob {
            request_id,
            request: CompletionRequest {
                endpoint: provider.endpoint,
                api_key: provider.api_key,
                model: model.name,
                temperature: model.temperature,
                history: self.conversation.history().to_vec(),
            },
        });
        self.set_status(format!("Waiting for {}...", self.conversation.model));
        tracing::info!(request_id, model = %self.conversation.model, "dispatching request");
        Ok(Submission::Dispatched(request_id))
    }

    /// The request queued by the last successful [`App::submit`], if not yet spawned.
    pub fn take_queued_job(&mut self) -> Option<CompletionJob> {
        self.queued.take()
    }

    pub fn is_waiting(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Applies a finished request. Replies for an abandoned conversation are dropped.
    pub fn apply_completion(&mut self, outcome: CompletionOutcome) {
        if self.in_flight != Some(outcome.request_id) {
            tracing::warn!(
                request_id = outcome.request_id,
                "discarding reply for a conversation that is no longer live"
            );
            return;
        }
        self.in_flight = None;

        match outcome.result {
            Ok(reply) => {
                self.render_assistant_message(&reply);
                self.conversation.push(Role::Assistant, reply);
                self.status = None;
                match self.store.save(&mut self.conversation) {
                    Ok(_) => self.refresh_conversations(),
                    Err(e) => self.report_error(&e),
                }
            }
            Err(e) => {
                self.render_error(&e);
                self.report_error(&e);
            }
        }
    }

    /// Never wider than the log pane, even when the pane is narrower than the minimum.
    fn wrap_width(&self) -> usize {
        let pane = usize::from(self.log_width).max(1);
        pane.saturating_sub(WRAP_MARGIN).max(MIN_WRAP_WIDTH).min(pane)
    }

    pub(crate) fn render_user_message(&mut self, text: &str) {
        let style = Style::default().fg(Color::Green);
        self.log.push(Line::default());
        for line in wrap_message(text, self.wrap_width(), USER_PREFIX) {
            self.log
                .push(Line::styled(line, style).alignment(Alignment::Right));
        }
        self.log_scroll = 0;
    }

    pub(crate) fn render_assistant_message(&mut self, text: &str) {
        let style = Style::default().fg(Color::Cyan);
        let width = self.wrap_width();
        let mut prefix = format!("{}: ", self.conversation.model);

        self.log.push(Line::default());
        for segment in split_fenced(text) {
            match segment {
                Segment::Text(prose) => {
                    let prose = prose.trim_matches('\n');
                    if prose.trim().is_empty() {
                        continue;
                    }
                    for line in wrap_message(prose, width, &prefix) {
                        self.log
                            .push(Line::styled(format!("{REPLY_PADDING}{line}"), style));
                    }
                }
                Segment::Code(block) => {
                    if !prefix.is_empty() {
                        self.log.push(Line::styled(
                            format!("{REPLY_PADDING}{}", prefix.trim_end()),
                            style,
                        ));
                    }
                    let code_width = width.saturating_sub(CONTINUATION_INDENT.len());
                    let highlighted = self.highlighter.highlight(&block.code, &block.language);
                    for row in highlighted
                        .into_iter()
                        .flat_map(|line| split_styled(line, code_width))
                    {
                        let mut spans = vec![Span::raw(CONTINUATION_INDENT)];
                        spans.extend(row);
                        self.log.push(Line::from(spans));
                    }
                }
            }
            prefix.clear();
        }
        if !prefix.is_empty() {
            self.log
                .push(Line::styled(format!("{REPLY_PADDING}{}", prefix.trim_end()), style));
        }
        self.log_scroll = 0;
    }

    fn render_error(&mut self, error: &AppError) {
        self.log.push(Line::default());
        self.log.push(Line::styled(
            format!("{REPLY_PADDING}Error: {error}"),
            Style::default().fg(Color::Red),
        ));
        self.log_scroll = 0;
    }

    /// Rebuilds the log from the live conversation.
    pub(crate) fn render_history(&mut self) {
        self.log.clear();
        let messages = self.conversation.visible_messages().to_vec();
        for message in messages {
            match message.role {
                Role::User => self.render_user_message(&message.content),
                Role::Assistant => self.render_assistant_message(&message.content),
                Role::System => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;

    fn log_text(app: &App) -> Vec<String> {
        app.log.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn wraps_greedily_with_prefix_and_indent() {
        assert_eq!(
            wrap_message("hello world again", 12, "You: "),
            vec!["You: hello", "    world", "    again"]
        );
        assert_eq!(wrap_message("short", 40, "You: "), vec!["You: short"]);
    }

    #[test]
    fn later_paragraphs_are_indented() {
        assert_eq!(
            wrap_message("one\n\ntwo", 40, "gpt: "),
            vec!["gpt: one", "", "    two"]
        );
    }

    #[test]
    fn tabs_and_runs_of_spaces_separate_words() {
        assert_eq!(
            wrap_message("alpha\tbeta   gamma\u{a0}delta", 12, "You: "),
            vec!["You: alpha", "    beta", "    gamma", "    delta"]
        );
    }

    #[test]
    fn wrap_width_never_exceeds_narrow_pane() {
        let (_dir, mut app) = test_app();
        app.set_log_width(12);
        assert_eq!(app.wrap_width(), 12);
        app.set_log_width(0);
        assert_eq!(app.wrap_width(), 1);
        app.set_log_width(88);
        assert_eq!(app.wrap_width(), 78);
    }

    #[test]
    fn long_code_lines_are_split_under_indent() {
        let (_dir, mut app) = test_app();
        app.set_log_width(30);
        let code = "x".repeat(40);
        app.render_assistant_message(&format!("```\n{code}\n```"));
        let text = log_text(&app);
        assert_eq!(
            text,
            vec![
                "".to_string(),
                "  gpt-4o-mini:".to_string(),
                format!("    {}", "x".repeat(16)),
                format!("    {}", "x".repeat(16)),
                format!("    {}", "x".repeat(8)),
            ]
        );
        assert!(text.iter().all(|l| l.chars().count() <= 30));
    }

    #[test]
    fn failed_save_keeps_reply_and_session_usable() {
        let (dir, mut app) = test_app();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        app.store = crate::storage::ConversationStore::new(blocker);

        let Submission::Dispatched(request_id) = app.submit("hello").unwrap() else {
            panic!("expected dispatch");
        };
        app.apply_completion(CompletionOutcome {
            request_id,
            result: Ok("hi there".into()),
        });

        assert_eq!(app.conversation.history().len(), 3);
        assert_eq!(app.conversation.history()[2].content, "hi there");
        assert!(app.conversation.path().is_none());
        assert!(app.status.as_ref().unwrap().is_error);
        assert!(log_text(&app).iter().any(|l| l == "  gpt-4o-mini: hi there"));
        assert_eq!(app.submit("again").unwrap(), Submission::Dispatched(2));
    }

    #[test]
    fn blank_submission_is_ignored() {
        let (_dir, mut app) = test_app();
        assert_eq!(app.submit("  \n\t").unwrap(), Submission::Ignored);
        assert_eq!(app.conversation.history().len(), 1);
        assert!(app.take_queued_job().is_none());
        assert!(app.log.is_empty());
    }

    #[test]
    fn submit_queues_full_history() {
        let (_dir, mut app) = test_app();
        let submission = app.submit("What is Rust?\n").unwrap();
        assert_eq!(submission, Submission::Dispatched(1));

        let job = app.take_queued_job().unwrap();
        assert_eq!(job.request_id, 1);
        assert_eq!(job.request.model, "gpt-4o-mini");
        assert_eq!(job.request.temperature, 0.2);
        assert_eq!(job.request.api_key, "sk-test");
        assert_eq!(job.request.history.len(), 2);
        assert_eq!(job.request.history[1].content, "What is Rust?");
        assert!(log_text(&app).iter().any(|l| l == "You: What is Rust?"));
        assert_eq!(app.log.last().unwrap().alignment, Some(Alignment::Right));
    }

    #[test]
    fn second_submit_waits_for_reply() {
        let (_dir, mut app) = test_app();
        app.submit("one").unwrap();
        for c in "two".chars() {
            app.enter_char(c);
        }
        assert_eq!(app.submit_input().unwrap(), Submission::Busy);
        assert_eq!(app.input, "two");
        assert_eq!(app.conversation.history().len(), 2);
    }

    #[test]
    fn reply_is_rendered_appended_and_saved() {
        let (_dir, mut app) = test_app();
        let Submission::Dispatched(request_id) = app.submit("show me go").unwrap() else {
            panic!("expected dispatch");
        };
        app.apply_completion(CompletionOutcome {
            request_id,
            result: Ok("before ```go\nfmt.Println(1)\n``` after".into()),
        });

        assert!(!app.is_waiting());
        assert_eq!(app.conversation.history().len(), 3);
        assert_eq!(app.conversation.history()[2].role, Role::Assistant);

        let text = log_text(&app);
        assert!(text.iter().any(|l| l == "  gpt-4o-mini: before"));
        assert!(text.iter().any(|l| l == "    fmt.Println(1)"));
        assert!(text.iter().any(|l| l == "  after"));
        assert!(!text.iter().any(|l| l.contains("```")));

        assert_eq!(app.conversations.len(), 1);
        assert_eq!(app.conversation_selection.active, Some(0));
        assert!(app.conversation.path().is_some());
    }

    #[test]
    fn failed_call_keeps_session_usable() {
        let (_dir, mut app) = test_app();
        app.submit("hello").unwrap();
        let job = app.take_queued_job().unwrap();
        app.apply_completion(CompletionOutcome {
            request_id: job.request_id,
            result: Err(AppError::RemoteCall("connection refused".into())),
        });

        assert_eq!(app.conversation.history().len(), 2);
        assert!(app.status.as_ref().unwrap().is_error);
        assert!(log_text(&app).iter().any(|l| l.contains("connection refused")));
        assert_eq!(app.submit("again").unwrap(), Submission::Dispatched(2));
    }

    #[test]
    fn stale_reply_after_switch_is_dropped() {
        let (_dir, mut app) = test_app();
        app.submit("hello").unwrap();
        let job = app.take_queued_job().unwrap();
        app.confirm_model().unwrap();

        app.apply_completion(CompletionOutcome {
            request_id: job.request_id,
            result: Ok("late".into()),
        });
        assert_eq!(app.conversation.history().len(), 1);
        assert!(app.log.is_empty());
    }

    #[test]
    fn reply_starting_with_code_gets_own_prefix_line() {
        let (_dir, mut app) = test_app();
        app.render_assistant_message("```\nls\n```");
        let text = log_text(&app);
        assert_eq!(text, vec!["", "  gpt-4o-mini:", "    ls"]);
    }
}
