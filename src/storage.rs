use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::chats::Conversation;
use crate::error::{AppError, AppResult};

const MAX_NAME_CHARS: usize = 50;
const UNTITLED: &str = "untitled";
const EXTENSION: &str = "json";

/// Saved conversations, one directory per `provider-model` pair.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    root: PathBuf,
}

impl ConversationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn pair_dir(&self, provider: &str, model: &str) -> PathBuf {
        self.root.join(format!(
            "{}-{}",
            sanitize_component(provider),
            sanitize_component(model)
        ))
    }

    /// Writes `conversation` and returns the file it lives in.
    ///
    /// The file name is fixed on the first save and reused afterwards.
    pub fn save(&self, conversation: &mut Conversation) -> AppResult<PathBuf> {
        conversation.updated_at = Utc::now();

        let path = match conversation.path.clone() {
            Some(path) => path,
            None => {
                let dir = self.pair_dir(&conversation.provider, &conversation.model);
                fs::create_dir_all(&dir)
                    .map_err(|source| AppError::persistence("creating directory", &dir, source))?;
                dir.join(file_name(&conversation.created_at, &conversation.title))
            }
        };

        let data = serde_json::to_string_pretty(conversation).map_err(|e| {
            AppError::persistence("encoding conversation", &path, std::io::Error::other(e))
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)
            .map_err(|source| AppError::persistence("writing conversation", &tmp, source))?;
        fs::rename(&tmp, &path)
            .map_err(|source| AppError::persistence("replacing conversation", &path, source))?;

        tracing::debug!(path = %path.display(), messages = conversation.history().len(), "saved conversation");
        conversation.path = Some(path.clone());
        Ok(path)
    }

    pub fn load(&self, path: &Path) -> AppResult<Conversation> {
        let data = fs::read_to_string(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => AppError::NotFound {
                path: path.to_path_buf(),
            },
            _ => AppError::persistence("reading conversation", path, source),
        })?;
        let mut conversation: Conversation =
            serde_json::from_str(&data).map_err(|source| AppError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        conversation.path = Some(path.to_path_buf());
        Ok(conversation)
    }

    /// Every readable conversation for the pair, newest first.
    ///
    /// A missing directory is an empty list; unreadable files are skipped.
    pub fn list(&self, provider: &str, model: &str) -> AppResult<Vec<Conversation>> {
        let dir = self.pair_dir(provider, model);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(AppError::persistence("listing conversations", &dir, source)),
        };

        let mut conversations = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match self.load(&path) {
                Ok(conversation) => conversations.push(conversation),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping conversation"),
            }
        }
        conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(conversations)
    }
}

/// Strips characters that could escape the storage directory and clamps the length.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').trim_matches('-');
    let clamped: String = cleaned.chars().take(MAX_NAME_CHARS).collect();
    if clamped.is_empty() {
        UNTITLED.to_string()
    } else {
        clamped
    }
}

fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

pub fn file_name(created_at: &DateTime<Utc>, title: &str) -> String {
    format!(
        "{}-{}.{EXTENSION}",
        created_at.format("%Y-%m-%d-%H%M%S"),
        sanitize_title(title)
    )
}
