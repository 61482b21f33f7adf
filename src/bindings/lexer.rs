//! Line-level comment handling shared by the preprocessor filter and the
//! declaration scanner.

/// A source line with comments separated from code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrippedLine {
    /// Code with block comments replaced by a space (or kept, for annotations)
    pub code: String,

    /// Text of a trailing `//` comment, without the slashes
    pub comment: Option<String>,
}

impl StrippedLine {
    pub fn is_blank(&self) -> bool {
        self.code.trim().is_empty()
    }
}

/// Removes C and C++ comments line by line, carrying block-comment state
/// across lines.
///
/// Block comments whose whole content is one of the configured annotation
/// tokens (`/*ARRAY*/`) are kept in the code as `/*TOKEN*/`.
#[derive(Debug, Clone, Default)]
pub struct CommentStripper {
    in_block: bool,
    block: String,
    annotations: Vec<String>,
}

impl CommentStripper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep block comments that consist of exactly one of `tokens`.
    pub fn with_annotations(mut self, tokens: impl IntoIterator<Item = String>) -> Self {
        self.annotations = tokens.into_iter().collect();
        self
    }

    /// True while inside an unterminated `/* ... */`.
    pub fn in_block(&self) -> bool {
        self.in_block
    }

    pub fn strip(&mut self, line: &str) -> StrippedLine {
        let mut out = StrippedLine::default();
        let chars: Vec<char> = line.chars().collect();
        let mut quote: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            if self.in_block {
                if c == '*' && next == Some('/') {
                    self.in_block = false;
                    let content = std::mem::take(&mut self.block);
                    let content = content.trim();
                    if self.annotations.iter().any(|a| a == content) {
                        out.code.push_str(&format!(" /*{}*/ ", content));
                    } else {
                        out.code.push(' ');
                    }
                    i += 2;
                } else {
                    self.block.push(c);
                    i += 1;
                }
                continue;
            }

            if let Some(q) = quote {
                out.code.push(c);
                if c == '\\' {
                    if let Some(n) = next {
                        out.code.push(n);
                        i += 1;
                    }
                } else if c == q {
                    quote = None;
                }
                i += 1;
                continue;
            }

            match (c, next) {
                ('/', Some('*')) => {
                    self.in_block = true;
                    i += 2;
                }
                ('/', Some('/')) => {
                    let rest: String = chars[i..].iter().collect();
                    let text = rest.trim_start_matches('/').trim();
                    if !text.is_empty() {
                        out.comment = Some(text.to_string());
                    }
                    break;
                }
                ('"', _) | ('\'', _) => {
                    quote = Some(c);
                    out.code.push(c);
                    i += 1;
                }
                _ => {
                    out.code.push(c);
                    i += 1;
                }
            }
        }

        if self.in_block {
            self.block.push('\n');
        }

        out
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(is_ident_char)
}

/// Find `word` in `text` as a whole identifier; returns the byte offset.
pub fn find_word(text: &str, word: &str) -> Option<usize> {
    let mut start = 0;
    while let Some(pos) = text[start..].find(word) {
        let at = start + pos;
        let before = text[..at].chars().next_back();
        let after = text[at + word.len()..].chars().next();
        if !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char) {
            return Some(at);
        }
        start = at + word.len();
    }
    None
}
