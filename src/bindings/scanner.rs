//! Export declaration scanner.
//!
//! Walks the live lines of one file and extracts every function declaration
//! introduced by an export marker. Declarations may span several lines; the
//! scanner joins them with a small state machine:
//!
//! ```text
//! Outside --marker--> Accumulating --'('--> InParams --')'--> AfterParams
//!    ^                     |                                    |
//!    +------ ';' / '{' ----+---------- ';' / '{' ---------------+
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::lexer::{find_word, is_ident_char, is_identifier, normalize_ws, CommentStripper};
use super::preprocess::LiveLine;
use crate::core::{CallingConvention, Location, RawDeclaration, RawParam};
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Macros that take a parenthesized argument list and decorate a declaration.
const ATTRIBUTE_MACROS: &[&str] = &["__declspec", "__attribute__", "alignas", "_Pragma"];

/// Storage and linkage words dropped from the return type.
const LINKAGE_WORDS: &[&str] = &[
    "extern",
    "\"C\"",
    "\"C++\"",
    "static",
    "inline",
    "__inline",
    "__forceinline",
];

/// Words that cannot be a parameter name.
const TYPE_KEYWORDS: &[&str] = &[
    "void", "bool", "char", "wchar_t", "short", "int", "long", "float", "double", "signed",
    "unsigned", "const", "volatile", "struct", "class", "enum", "union",
];

/// Scanner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanPolicy {
    /// Tokens that mark a function as exported
    pub markers: Vec<String>,

    /// Maximum number of lines joined into one declaration
    pub lookahead: usize,

    /// Block-comment annotations kept in parameter type text
    pub annotations: Vec<String>,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        ScanPolicy {
            markers: vec!["RH_C_FUNCTION".to_string()],
            lookahead: 32,
            annotations: vec!["ARRAY".to_string()],
        }
    }
}

/// Where the scanner is inside a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Looking for an export marker
    Outside,
    /// After a marker, collecting return type and name
    Accumulating,
    /// Inside the parameter list; `depth` counts open parentheses
    InParams { depth: usize },
    /// Inside an attribute macro's arguments in the declaration head
    InAttribute { depth: usize },
    /// Parameter list closed; expecting `;` or `{`
    AfterParams,
}

/// Declarations and warnings found in one file.
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    pub declarations: Vec<RawDeclaration>,
    pub warnings: Vec<Diagnostic>,
}

#[derive(Debug, Default)]
struct Pending {
    start_line: usize,
    last_line: usize,
    head: String,
    params: String,
}

/// Line-oriented scanner for one file.
pub struct Scanner<'p> {
    policy: &'p ScanPolicy,
    file: &'p Path,
    state: ScanState,
    pending: Pending,
    out: ScanOutput,
}

impl<'p> Scanner<'p> {
    pub fn new(policy: &'p ScanPolicy, file: &'p Path) -> Self {
        Scanner {
            policy,
            file,
            state: ScanState::Outside,
            pending: Pending::default(),
            out: ScanOutput::default(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Scan all live lines of a file.
    pub fn scan<'a>(mut self, lines: impl IntoIterator<Item = &'a LiveLine<'a>>) -> ScanOutput {
        let mut stripper =
            CommentStripper::new().with_annotations(self.policy.annotations.iter().cloned());
        for line in lines.into_iter().filter(|l| l.live) {
            let stripped = stripper.strip(line.text);
            self.feed(line.number, &stripped.code, stripped.comment.as_deref());
        }
        if self.state != ScanState::Outside {
            self.abandon("declaration is not terminated before end of file");
        }
        self.out
    }

    /// Feed one comment-free line of code.
    pub fn feed(&mut self, number: usize, code: &str, comment: Option<&str>) {
        if self.state != ScanState::Outside {
            if number.saturating_sub(self.pending.start_line) >= self.policy.lookahead {
                self.abandon(&format!(
                    "declaration is not terminated within {} lines",
                    self.policy.lookahead
                ));
            } else {
                self.pending.last_line = number;
            }
        }

        let mut rest = code;
        while !rest.is_empty() {
            rest = match self.state {
                ScanState::Outside => match self.find_marker(rest) {
                    Some(end) => {
                        self.pending = Pending {
                            start_line: number,
                            last_line: number,
                            ..Pending::default()
                        };
                        self.state = ScanState::Accumulating;
                        &rest[end..]
                    }
                    None => "",
                },
                _ => self.step(rest, comment),
            };
        }

        // Line breaks separate tokens
        match self.state {
            ScanState::Accumulating | ScanState::InAttribute { .. } => self.pending.head.push(' '),
            ScanState::InParams { .. } => self.pending.params.push(' '),
            _ => {}
        }
    }

    /// Byte offset just past the earliest marker in `text`.
    fn find_marker(&self, text: &str) -> Option<usize> {
        self.policy
            .markers
            .iter()
            .filter_map(|m| find_word(text, m).map(|at| (at, at + m.len())))
            .min()
            .map(|(_, end)| end)
    }

    /// Consume characters of `text` inside a declaration; returns the unconsumed tail.
    fn step<'t>(&mut self, text: &'t str, comment: Option<&str>) -> &'t str {
        for (i, c) in text.char_indices() {
            let after = &text[i + c.len_utf8()..];
            match self.state {
                ScanState::Accumulating => match c {
                    '(' => {
                        if ATTRIBUTE_MACROS.contains(&trailing_identifier(&self.pending.head)) {
                            self.pending.head.push(c);
                            self.state = ScanState::InAttribute { depth: 1 };
                        } else {
                            self.state = ScanState::InParams { depth: 1 };
                        }
                    }
                    ';' | '{' | '}' | '=' => {
                        self.abandon("export marker is not followed by a function declaration");
                        return after;
                    }
                    _ => self.pending.head.push(c),
                },
                ScanState::InAttribute { depth } => {
                    self.pending.head.push(c);
                    match c {
                        '(' => self.state = ScanState::InAttribute { depth: depth + 1 },
                        ')' if depth == 1 => self.state = ScanState::Accumulating,
                        ')' => self.state = ScanState::InAttribute { depth: depth - 1 },
                        _ => {}
                    }
                }
                ScanState::InParams { depth } => match c {
                    '(' => {
                        self.pending.params.push(c);
                        self.state = ScanState::InParams { depth: depth + 1 };
                    }
                    ')' if depth == 1 => self.state = ScanState::AfterParams,
                    ')' => {
                        self.pending.params.push(c);
                        self.state = ScanState::InParams { depth: depth - 1 };
                    }
                    _ => self.pending.params.push(c),
                },
                ScanState::AfterParams => match c {
                    ';' | '{' => {
                        self.finish(comment);
                        return after;
                    }
                    c if c.is_whitespace() || is_ident_char(c) => {}
                    _ => {
                        self.abandon("expected `;` or `{` after parameter list");
                        return after;
                    }
                },
                ScanState::Outside => return &text[i..],
            }
        }
        ""
    }

    fn abandon(&mut self, reason: &str) {
        self.out
            .warnings
            .push(Diagnostic::warning(reason).at(self.file, self.pending.start_line));
        self.state = ScanState::Outside;
        self.pending = Pending::default();
    }

    fn finish(&mut self, comment: Option<&str>) {
        let pending = std::mem::take(&mut self.pending);
        let location = Location::new(self.file, pending.start_line);
        self.state = ScanState::Outside;

        match build_declaration(location, &pending.head, &pending.params, comment) {
            Ok(decl) => {
                tracing::trace!("found {} at {}", decl.name, decl.location);
                self.out.declarations.push(decl);
            }
            Err(reason) => {
                let diag = Diagnostic::warning(reason)
                    .at(self.file, pending.start_line)
                    .with_context("declaration skipped");
                let diag = if diag.message.contains("has no name") {
                    diag.with_suggestion(suggestions::MISSING_PARAM_NAME)
                } else {
                    diag
                };
                self.out.warnings.push(diag);
            }
        }
    }
}

/// Scan the live lines of one file with `policy`.
pub fn scan_lines<'a>(
    policy: &ScanPolicy,
    file: &Path,
    lines: impl IntoIterator<Item = &'a LiveLine<'a>>,
) -> ScanOutput {
    Scanner::new(policy, file).scan(lines)
}

/// The trailing word of `text`. Non-ASCII characters are part of the word,
/// so a name spelled with them fails `is_identifier` instead of being cut.
fn trailing_identifier(text: &str) -> &str {
    let text = text.trim_end();
    let start = text
        .char_indices()
        .rev()
        .find(|&(_, c)| c.is_ascii() && !is_ident_char(c))
        .map_or(0, |(i, c)| i + c.len_utf8());
    &text[start..]
}

/// Remove attribute macros and their argument lists.
fn strip_attributes(head: &str) -> String {
    let mut out = String::with_capacity(head.len());
    let mut rest = head;
    'outer: while !rest.is_empty() {
        for attr in ATTRIBUTE_MACROS {
            if let Some(at) = find_word(rest, attr) {
                let after = rest[at + attr.len()..].trim_start();
                if after.starts_with('(') {
                    let mut depth = 0usize;
                    for (i, c) in after.char_indices() {
                        match c {
                            '(' => depth += 1,
                            ')' => {
                                depth -= 1;
                                if depth == 0 {
                                    out.push_str(&rest[..at]);
                                    out.push(' ');
                                    rest = &after[i + 1..];
                                    continue 'outer;
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
        out.push_str(rest);
        break;
    }
    out
}

/// Normalize the spelling of type text. Whitespace collapses, `*` and `&`
/// attach to the type, and annotations move to the front.
pub fn tidy_type(text: &str) -> String {
    let text = text.trim();
    if let Some(start) = text.find("/*") {
        if let Some(len) = text[start + 2..].find("*/") {
            let end = start + 2 + len + 2;
            let annotation = &text[start..end];
            let rest = tidy_type(&format!("{} {}", &text[..start], &text[end..]));
            return if rest.is_empty() {
                annotation.to_string()
            } else {
                format!("{} {}", annotation, rest)
            };
        }
    }

    let mut s = normalize_ws(text);
    for (from, to) in [
        (" *", "*"),
        (" &", "&"),
        ("* ", "*"),
        ("& ", "&"),
        (" [", "["),
        ("[ ", "["),
        (" ]", "]"),
    ] {
        while s.contains(from) {
            s = s.replace(from, to);
        }
    }
    // Restore the space between a pointer and a following qualifier or name
    let mut out = String::with_capacity(s.len() + 4);
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if (c == '*' || c == '&') && chars.peek().is_some_and(|n| is_ident_char(*n)) {
            out.push(' ');
        }
    }
    out
}

/// Split on commas that are not nested in `()`, `<>` or `[]`.
pub fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '<' | '[' => depth += 1,
            ')' | '>' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Split one parameter into type text and name.
///
/// Returns `None` when no name can be identified.
pub fn split_param(param: &str) -> Option<RawParam> {
    let param = normalize_ws(param);

    // Default argument values are not part of the binding
    let param = match split_top_level_eq(&param) {
        Some(at) => param[..at].trim().to_string(),
        None => param,
    };

    let mut body = param.as_str();
    let mut suffix = String::new();
    while let Some(stripped) = body.trim_end().strip_suffix(']') {
        let open = stripped.rfind('[')?;
        suffix.insert_str(0, &format!("[{}]", stripped[open + 1..].trim()));
        body = &stripped[..open];
    }
    let body = body.trim_end();

    let name = trailing_identifier(body);
    if name.is_empty() || !is_identifier(name) || TYPE_KEYWORDS.contains(&name) {
        return None;
    }
    let type_part = body[..body.len() - name.len()].trim();
    let type_without_annotations = type_part
        .split("*/")
        .last()
        .unwrap_or(type_part)
        .trim();
    if type_without_annotations.is_empty() {
        return None;
    }

    Some(RawParam::new(tidy_type(&format!("{}{}", type_part, suffix)), name))
}

fn split_top_level_eq(text: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '<' | '[' => depth += 1,
            ')' | '>' | ']' => depth -= 1,
            '=' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn build_declaration(
    location: Location,
    head: &str,
    params: &str,
    doc: Option<&str>,
) -> Result<RawDeclaration, String> {
    let head = strip_attributes(head);
    let mut convention = None;
    let words: Vec<&str> = head
        .split_whitespace()
        .filter(|w| !LINKAGE_WORDS.contains(w))
        .filter(|w| {
            if CallingConvention::from_keyword(w).is_some() {
                convention = Some(w.to_string());
                false
            } else {
                true
            }
        })
        .collect();
    let head = words.join(" ");

    let name = trailing_identifier(&head);
    if name.is_empty() || !is_identifier(name) {
        return Err("cannot find the function name of an exported declaration".to_string());
    }
    let return_type = tidy_type(&head[..head.len() - name.len()]);
    if return_type.is_empty() {
        return Err(format!("exported function `{}` has no return type", name));
    }

    let params_text = normalize_ws(params);
    let mut raw_params = Vec::new();
    if !(params_text.is_empty() || params_text == "void") {
        for piece in split_top_level(&params_text) {
            let piece = piece.trim();
            if piece == "..." {
                return Err(format!(
                    "exported function `{}` is variadic and cannot be bound",
                    name
                ));
            }
            match split_param(piece) {
                Some(param) => raw_params.push(param),
                None => {
                    return Err(format!(
                        "parameter `{}` of `{}` has no name or cannot be split",
                        piece, name
                    ))
                }
            }
        }
    }

    Ok(RawDeclaration {
        location,
        return_type,
        name: name.to_string(),
        params: raw_params,
        convention,
        doc: doc.map(str::to_string),
    })
}
