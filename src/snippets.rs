use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub code: String,
    pub language: String,
}

/// Result of feeding one character to a [`FenceDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    /// Literal text to print as is.
    Text(String),
    /// The character was buffered.
    Pending,
    /// A fenced block just closed.
    Block(CodeBlock),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Text,
    OneTick,
    TwoTicks,
    Language,
    Code,
    CloseOne,
    CloseTwo,
}

/// Incremental recognizer for triple-backtick code fences.
///
/// The decoder sees the reply one character at a time, so chunk
/// boundaries (even ones splitting a fence marker) never change its output.
#[derive(Debug, Default)]
pub struct FenceDecoder {
    phase: Phase,
    language: String,
    code: String,
}

impl FenceDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, ch: char) -> Emission {
        match self.phase {
            Phase::Text => {
                if ch == '`' {
                    self.phase = Phase::OneTick;
                    Emission::Pending
                } else {
                    Emission::Text(ch.to_string())
                }
            }
            Phase::OneTick => {
                if ch == '`' {
                    self.phase = Phase::TwoTicks;
                    Emission::Pending
                } else {
                    self.phase = Phase::Text;
                    Emission::Text(format!("`{ch}"))
                }
            }
            Phase::TwoTicks => {
                if ch == '`' {
                    self.phase = Phase::Language;
                    self.language.clear();
                    Emission::Pending
                } else {
                    self.phase = Phase::Text;
                    Emission::Text(format!("``{ch}"))
                }
            }
            Phase::Language => {
                if ch == '\n' {
                    self.phase = Phase::Code;
                } else {
                    self.language.push(ch);
                }
                Emission::Pending
            }
            Phase::Code => {
                if ch == '`' {
                    self.phase = Phase::CloseOne;
                } else {
                    self.code.push(ch);
                }
                Emission::Pending
            }
            Phase::CloseOne => {
                if ch == '`' {
                    self.phase = Phase::CloseTwo;
                } else {
                    self.phase = Phase::Code;
                    self.code.push('`');
                    self.code.push(ch);
                }
                Emission::Pending
            }
            Phase::CloseTwo => {
                if ch == '`' {
                    self.phase = Phase::Text;
                    Emission::Block(CodeBlock {
                        code: std::mem::take(&mut self.code),
                        language: std::mem::take(&mut self.language),
                    })
                } else {
                    self.phase = Phase::Code;
                    self.code.push_str("``");
                    self.code.push(ch);
                    Emission::Pending
                }
            }
        }
    }

    /// Feeds a chunk, dropping the `Pending` emissions.
    pub fn feed_str(&mut self, chunk: &str) -> Vec<Emission> {
        chunk
            .chars()
            .map(|ch| self.feed(ch))
            .filter(|emission| *emission != Emission::Pending)
            .collect()
    }

    /// Ends the stream and returns whatever was still buffered, as literal text.
    ///
    /// An unterminated fence is given back verbatim rather than dropped.
    pub fn finish(&mut self) -> String {
        let mut rest = String::new();
        match self.phase {
            Phase::Text => {}
            Phase::OneTick => rest.push('`'),
            Phase::TwoTicks => rest.push_str("``"),
            Phase::Language => {
                rest.push_str(FENCE);
                rest.push_str(&self.language);
            }
            Phase::Code | Phase::CloseOne | Phase::CloseTwo => {
                rest.push_str(FENCE);
                rest.push_str(&self.language);
                rest.push('\n');
                rest.push_str(&self.code);
                match self.phase {
                    Phase::CloseOne => rest.push('`'),
                    Phase::CloseTwo => rest.push_str("``"),
                    _ => {}
                }
            }
        }
        self.reset();
        rest
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Text;
        self.language.clear();
        self.code.clear();
    }
}

/// A run of prose or a closed code block, in reply order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Code(CodeBlock),
}

/// Splits a complete reply into prose and code segments.
pub fn split_fenced(text: &str) -> Vec<Segment> {
    let mut decoder = FenceDecoder::new();
    let mut segments = Vec::new();
    let mut prose = String::new();
    for emission in decoder.feed_str(text) {
        match emission {
            Emission::Text(s) => prose.push_str(&s),
            Emission::Block(block) => {
                if !prose.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut prose)));
                }
                segments.push(Segment::Code(block));
            }
            Emission::Pending => {}
        }
    }
    prose.push_str(&decoder.finish());
    if !prose.is_empty() {
        segments.push(Segment::Text(prose));
    }
    segments
}

pub fn load_theme() -> Theme {
    let mut ts = ThemeSet::load_defaults();
    ts.themes
        .remove("Solarized (dark)")
        .or_else(|| ts.themes.remove("base16-mocha.dark"))
        .unwrap_or_default()
}

/// Syntax highlighting for code blocks in the chat log.
pub struct Highlighter {
    syntaxes: SyntaxSet,
    theme: Theme,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_nonewlines(),
            theme: load_theme(),
        }
    }
}

impl Highlighter {
    pub fn new() -> Self {
        Self::default()
    }

    fn syntax_for(&self, language: &str) -> &SyntaxReference {
        // Fence info strings look like "rust", "rust,ignore" or "python title=x".
        let token = language
            .split(|c: char| c.is_whitespace() || c == ',' || c == '{')
            .next()
            .unwrap_or_default();
        if token.is_empty() {
            return self.syntaxes.find_syntax_plain_text();
        }
        self.syntaxes
            .find_syntax_by_token(token)
            .or_else(|| {
                self.syntaxes
                    .find_syntax_by_name(&translate_language_name_to_syntect_name(token))
            })
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text())
    }

    /// Renders `code` as styled lines; unknown languages fall back to plain text.
    pub fn highlight(&self, code: &str, language: &str) -> Vec<Line<'static>> {
        let syntax = self.syntax_for(language.trim());
        let mut h = HighlightLines::new(syntax, &self.theme);

        code.lines()
            .map(|line| match h.highlight_line(line, &self.syntaxes) {
                Ok(highlights) => Line::from(
                    highlights
                        .into_iter()
                        .map(|(style, content)| {
                            Span::styled(
                                content.to_string(),
                                Style::default().fg(convert_syntect_color(style.foreground)),
                            )
                        })
                        .collect::<Vec<_>>(),
                ),
                Err(e) => {
                    tracing::debug!(language, error = %e, "highlighting failed for line");
                    Line::raw(line.to_string())
                }
            })
            .collect()
    }
}

fn convert_syntect_color(color: syntect::highlighting::Color) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

pub fn translate_language_name_to_syntect_name(s: &str) -> String {
    match s {
        // Special cases
        "tex" | "latex" => "LaTeX".to_string(),
        "ocaml" => "OCaml".to_string(),
        "bash" | "sh" | "shell" | "zsh" => "Bourne Again Shell (bash)".to_string(),
        "js" | "javascript" => "JavaScript".to_string(),
        _ => {
            let mut c = s.chars();
            match c.next() {
                None => String::new(),
                Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(code: &str, language: &str) -> Segment {
        Segment::Code(CodeBlock {
            code: code.to_string(),
            language: language.to_string(),
        })
    }

    fn text(s: &str) -> Segment {
        Segment::Text(s.to_string())
    }

    /// Feeds `input` split at `at`, coalescing literal text between blocks.
    fn decode_in_two_chunks(input: &str, at: usize) -> Vec<Segment> {
        let (head, tail) = input.split_at(at);
        let mut decoder = FenceDecoder::new();
        let mut emissions = decoder.feed_str(head);
        emissions.extend(decoder.feed_str(tail));

        let mut segments = Vec::new();
        let mut prose = String::new();
        for emission in emissions {
            match emission {
                Emission::Text(s) => prose.push_str(&s),
                Emission::Block(b) => {
                    if !prose.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut prose)));
                    }
                    segments.push(Segment::Code(b));
                }
                Emission::Pending => unreachable!("feed_str drops pending"),
            }
        }
        prose.push_str(&decoder.finish());
        if !prose.is_empty() {
            segments.push(Segment::Text(prose));
        }
        segments
    }

    #[test]
    fn extracts_block_between_prose() {
        assert_eq!(
            split_fenced("before ```go\nfmt.Println(1)\n``` after"),
            vec![text("before "), block("fmt.Println(1)\n", "go"), text(" after")]
        );
    }

    #[test]
    fn two_backticks_stay_literal() {
        assert_eq!(split_fenced("``x"), vec![text("``x")]);
        assert_eq!(split_fenced("a `b` c"), vec![text("a `b` c")]);
        assert_eq!(split_fenced("ends with `"), vec![text("ends with `")]);
        assert_eq!(split_fenced("ends with ``"), vec![text("ends with ``")]);
    }

    #[test]
    fn empty_language_tag() {
        assert_eq!(split_fenced("```\nls -la\n```"), vec![block("ls -la\n", "")]);
    }

    #[test]
    fn backticks_inside_code_are_kept() {
        assert_eq!(
            split_fenced("```md\nuse `x` or ``y``\n```"),
            vec![block("use `x` or ``y``\n", "md")]
        );
    }

    #[test]
    fn fourth_backtick_after_close_is_literal() {
        let mut decoder = FenceDecoder::new();
        let emissions = decoder.feed_str("```\na\n````");
        assert_eq!(
            emissions,
            vec![Emission::Block(CodeBlock {
                code: "a\n".into(),
                language: String::new()
            })]
        );
        assert_eq!(decoder.finish(), "`");
    }

    #[test]
    fn unterminated_fence_is_flushed_verbatim() {
        assert_eq!(
            split_fenced("look:\n```rust\nfn main() {}\n`"),
            vec![text("look:\n```rust\nfn main() {}\n`")]
        );
        assert_eq!(split_fenced("```py"), vec![text("```py")]);
    }

    #[test]
    fn decoder_resets_between_blocks() {
        assert_eq!(
            split_fenced("```a\n1\n```mid```b\n2\n```"),
            vec![block("1\n", "a"), text("mid"), block("2\n", "b")]
        );
    }

    #[test]
    fn chunking_never_changes_output() {
        let input = "Try this:\n```rust\nlet s = `x`;\n```\nthen ``y`` and\n```\nz\n``` done`";
        let whole = split_fenced(input);
        for at in 0..=input.len() {
            if input.is_char_boundary(at) {
                assert_eq!(decode_in_two_chunks(input, at), whole, "split at {at}");
            }
        }
    }

    #[test]
    fn unknown_language_falls_back_to_plain_text() {
        let highlighter = Highlighter::new();
        let lines = highlighter.highlight("a = 1\nb = 2\n", "no-such-language");
        let rendered: Vec<String> = lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert_eq!(rendered, vec!["a = 1", "b = 2"]);
    }

    #[test]
    fn known_language_gets_colors() {
        let highlighter = Highlighter::new();
        let lines = highlighter.highlight("fn main() {}", "rust");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].spans.iter().any(|s| s.style.fg.is_some()));
    }

    #[test]
    fn translates_language_names() {
        assert_eq!(translate_language_name_to_syntect_name("latex"), "LaTeX");
        assert_eq!(
            translate_language_name_to_syntect_name("bash"),
            "Bourne Again Shell (bash)"
        );
        assert_eq!(translate_language_name_to_syntect_name("python"), "Python");
        assert_eq!(translate_language_name_to_syntect_name(""), "");
    }
}
