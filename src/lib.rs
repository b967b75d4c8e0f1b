/// Application state.
pub mod app;

/// Command line arguments.
pub mod cli;

/// Terminal events handler.
pub mod event;

/// Widget renderer.
pub mod ui;

/// Terminal user interface.
pub mod tui;

/// Key event handler.
pub mod handler;

/// Remote chat completion.
pub mod ai;

/// Provider and model configuration.
pub mod config;

/// Messages and conversations.
pub mod chats;

/// Error types.
pub mod error;

/// Log file setup.
pub mod logging;

/// Provider, model, conversation and pane selection.
pub mod selection;

/// Sending messages and applying replies.
pub mod session;

/// Code fence decoding and syntax highlighting.
pub mod snippets;

/// Conversation files.
pub mod storage;
