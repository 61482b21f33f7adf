//! Conditional-compilation filter.
//!
//! Decides which lines of a source file are live for a given set of defined
//! symbols. Only the `defined(SYM)` family of conditions is evaluated; any
//! other condition is assumed live and reported as a warning.

use std::path::Path;

use thiserror::Error;

use super::lexer::{is_ident_char, CommentStripper};
use crate::core::SymbolSet;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// One physical line and whether the scanner should see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveLine<'a> {
    /// 1-based line number
    pub number: usize,
    pub text: &'a str,
    pub live: bool,
}

/// Malformed conditional structure. Fatal for the file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreprocessError {
    #[error("`#{directive}` at line {line} has no matching `#if`")]
    Unmatched { directive: String, line: usize },

    #[error("`#{directive}` at line {line} follows `#else`")]
    AfterElse { directive: String, line: usize },

    #[error("conditional opened at line {line} is never closed")]
    Unterminated { line: usize },
}

impl PreprocessError {
    pub fn line(&self) -> usize {
        match self {
            PreprocessError::Unmatched { line, .. }
            | PreprocessError::AfterElse { line, .. }
            | PreprocessError::Unterminated { line } => *line,
        }
    }
}

/// Result of filtering one file.
#[derive(Debug, Clone, Default)]
pub struct Filtered<'a> {
    pub lines: Vec<LiveLine<'a>>,
    pub warnings: Vec<Diagnostic>,
}

impl<'a> Filtered<'a> {
    pub fn live(&self) -> impl Iterator<Item = &LiveLine<'a>> {
        self.lines.iter().filter(|l| l.live)
    }
}

#[derive(Debug)]
struct Frame {
    opened_at: usize,
    parent_live: bool,
    /// Some branch condition was known to be true
    taken: bool,
    seen_else: bool,
    live: bool,
}

/// Evaluate conditional blocks in `text` against `symbols`.
pub fn filter<'a>(
    text: &'a str,
    symbols: &SymbolSet,
    file: &Path,
) -> Result<Filtered<'a>, PreprocessError> {
    let mut out = Filtered::default();
    let mut stack: Vec<Frame> = Vec::new();
    let mut stripper = CommentStripper::new();

    let physical: Vec<&str> = text.lines().collect();
    let mut idx = 0;

    while idx < physical.len() {
        let number = idx + 1;
        let raw = physical[idx];
        idx += 1;

        let live_here = stack.last().map_or(true, |f| f.live);

        let was_in_block = stripper.in_block();
        let stripped = stripper.strip(raw);
        let code = stripped.code.trim();

        if was_in_block || !code.starts_with('#') {
            out.lines.push(LiveLine { number, text: raw, live: live_here });
            continue;
        }

        // Directive lines are never scanned. Join `\` continuations.
        out.lines.push(LiveLine { number, text: raw, live: false });
        let mut directive = code.trim_start_matches('#').trim().to_string();
        while directive.ends_with('\\') && idx < physical.len() {
            directive.pop();
            let next = stripper.strip(physical[idx]);
            directive.push(' ');
            directive.push_str(next.code.trim());
            out.lines.push(LiveLine { number: idx + 1, text: physical[idx], live: false });
            idx += 1;
        }

        let (keyword, rest) = split_directive(&directive);
        match keyword {
            "if" | "ifdef" | "ifndef" => {
                let condition = match keyword {
                    "ifdef" => Some(symbols.is_defined(rest.trim())),
                    "ifndef" => Some(!symbols.is_defined(rest.trim())),
                    _ => evaluate(rest, symbols),
                };
                if condition.is_none() && live_here {
                    out.warnings.push(unsupported(file, number, &directive));
                }
                stack.push(Frame {
                    opened_at: number,
                    parent_live: live_here,
                    taken: condition == Some(true),
                    seen_else: false,
                    live: live_here && condition.unwrap_or(true),
                });
            }
            "elif" => {
                let Some(frame) = stack.last_mut() else {
                    return Err(PreprocessError::Unmatched {
                        directive: "elif".into(),
                        line: number,
                    });
                };
                if frame.seen_else {
                    return Err(PreprocessError::AfterElse {
                        directive: "elif".into(),
                        line: number,
                    });
                }
                let condition = evaluate(rest, symbols);
                if condition.is_none() && frame.parent_live && !frame.taken {
                    out.warnings.push(unsupported(file, number, &directive));
                }
                frame.live = frame.parent_live && !frame.taken && condition.unwrap_or(true);
                frame.taken |= condition == Some(true);
            }
            "else" => {
                let Some(frame) = stack.last_mut() else {
                    return Err(PreprocessError::Unmatched {
                        directive: "else".into(),
                        line: number,
                    });
                };
                if frame.seen_else {
                    return Err(PreprocessError::AfterElse {
                        directive: "else".into(),
                        line: number,
                    });
                }
                frame.seen_else = true;
                frame.live = frame.parent_live && !frame.taken;
            }
            "endif" => {
                if stack.pop().is_none() {
                    return Err(PreprocessError::Unmatched {
                        directive: "endif".into(),
                        line: number,
                    });
                }
            }
            _ => {}
        }
    }

    if let Some(frame) = stack.first() {
        return Err(PreprocessError::Unterminated { line: frame.opened_at });
    }

    Ok(out)
}

fn split_directive(directive: &str) -> (&str, &str) {
    let end = directive
        .find(|c: char| !is_ident_char(c))
        .unwrap_or(directive.len());
    (&directive[..end], &directive[end..])
}

fn unsupported(file: &Path, line: usize, directive: &str) -> Diagnostic {
    Diagnostic::warning(format!(
        "unsupported preprocessor condition `#{}`; treating block as live",
        directive
    ))
    .at(file, line)
    .with_suggestion(suggestions::UNSUPPORTED_CONDITION)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Number(String),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Option<Vec<Tok>> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                tokens.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Tok::RParen);
                i += 1;
            }
            '!' if chars.get(i + 1) != Some(&'=') => {
                tokens.push(Tok::Not);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Tok::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Tok::Or);
                i += 2;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Tok::Number(chars[start..i].iter().collect()));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Tok::Ident(chars[start..i].iter().collect()));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

/// Evaluate a `#if`/`#elif` condition.
///
/// Supported: `defined(SYM)`, `defined SYM`, `!`, `&&`, `||`, parentheses,
/// and the literals `0` and `1`. Anything else yields `None`.
pub fn evaluate(expr: &str, symbols: &SymbolSet) -> Option<bool> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return None;
    }
    let mut parser = CondParser { tokens: &tokens, pos: 0, symbols };
    let value = parser.or_expr()?;
    (parser.pos == tokens.len()).then_some(value)
}

struct CondParser<'t> {
    tokens: &'t [Tok],
    pos: usize,
    symbols: &'t SymbolSet,
}

impl CondParser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Tok> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn or_expr(&mut self) -> Option<bool> {
        let mut value = self.and_expr()?;
        while self.peek() == Some(&Tok::Or) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            value = value || rhs;
        }
        Some(value)
    }

    fn and_expr(&mut self) -> Option<bool> {
        let mut value = self.unary()?;
        while self.peek() == Some(&Tok::And) {
            self.pos += 1;
            let rhs = self.unary()?;
            value = value && rhs;
        }
        Some(value)
    }

    fn unary(&mut self) -> Option<bool> {
        match self.bump()?.clone() {
            Tok::Not => self.unary().map(|v| !v),
            Tok::LParen => {
                let value = self.or_expr()?;
                (self.bump()? == &Tok::RParen).then_some(value)
            }
            Tok::Number(n) => match n.as_str() {
                "0" => Some(false),
                "1" => Some(true),
                _ => None,
            },
            Tok::Ident(word) if word == "defined" => {
                let name = match self.bump()?.clone() {
                    Tok::Ident(name) => name,
                    Tok::LParen => {
                        let Tok::Ident(name) = self.bump()?.clone() else {
                            return None;
                        };
                        if self.bump()? != &Tok::RParen {
                            return None;
                        }
                        name
                    }
                    _ => return None,
                };
                Some(self.symbols.is_defined(&name))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(names: &[&str]) -> SymbolSet {
        names.iter().copied().collect()
    }

    fn live_text<'a>(filtered: &Filtered<'a>) -> Vec<&'a str> {
        filtered
            .live()
            .map(|l| l.text.trim())
            .filter(|t| !t.is_empty())
            .collect()
    }

    #[test]
    fn test_evaluate_supported_forms() {
        let defs = symbols(&["A", "B"]);
        assert_eq!(evaluate("defined(A)", &defs), Some(true));
        assert_eq!(evaluate("defined C", &defs), Some(false));
        assert_eq!(evaluate("!defined(C)", &defs), Some(true));
        assert_eq!(evaluate("defined(A) && defined(C)", &defs), Some(false));
        assert_eq!(evaluate("defined(C) || defined(B)", &defs), Some(true));
        assert_eq!(evaluate("(defined(C) || defined(A)) && !defined(B)", &defs), Some(false));
        assert_eq!(evaluate("0", &defs), Some(false));
        assert_eq!(evaluate("1", &defs), Some(true));
    }

    #[test]
    fn test_evaluate_unsupported_forms() {
        let defs = symbols(&["A"]);
        assert_eq!(evaluate("RHINO_VERSION >= 5", &defs), None);
        assert_eq!(evaluate("A", &defs), None);
        assert_eq!(evaluate("defined(A) &&", &defs), None);
        assert_eq!(evaluate("", &defs), None);
    }

    #[test]
    fn test_ifdef_else_selects_branch() {
        let src = "#ifdef WIN\nint win;\n#else\nint other;\n#endif\nint always;\n";
        let out = filter(src, &symbols(&["WIN"]), Path::new("a.h")).unwrap();
        assert_eq!(live_text(&out), vec!["int win;", "int always;"]);

        let out = filter(src, &symbols(&[]), Path::new("a.h")).unwrap();
        assert_eq!(live_text(&out), vec!["int other;", "int always;"]);
    }

    #[test]
    fn test_nested_blocks_inherit_dead_parent() {
        let src = "#if defined(A)\n#ifndef B\nint ab;\n#endif\n#endif\n";
        let out = filter(src, &symbols(&["B"]), Path::new("a.h")).unwrap();
        assert!(live_text(&out).is_empty());

        let out = filter(src, &symbols(&["A"]), Path::new("a.h")).unwrap();
        assert_eq!(live_text(&out), vec!["int ab;"]);
    }

    #[test]
    fn test_elif_chain_takes_first_true_branch() {
        let src = "#if defined(X)\nint x;\n#elif defined(Y)\nint y;\n#elif 1\nint z;\n#else\nint w;\n#endif\n";
        let out = filter(src, &symbols(&["Y"]), Path::new("a.h")).unwrap();
        assert_eq!(live_text(&out), vec!["int y;"]);
    }

    #[test]
    fn test_trailing_comment_on_condition_is_ignored() {
        let src = "#if defined(RHINO_V5SR) || defined(OPENNURBS_BUILD)// only in V5\nint v5;\n#endif\n";
        let out = filter(src, &symbols(&["OPENNURBS_BUILD"]), Path::new("a.cpp")).unwrap();
        assert_eq!(live_text(&out), vec!["int v5;"]);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_unsupported_condition_is_live_with_warning() {
        let src = "#if RHINO_VERSION > 5\nint a;\n#else\nint b;\n#endif\n";
        let out = filter(src, &symbols(&[]), Path::new("v.h")).unwrap();
        assert_eq!(live_text(&out), vec!["int a;", "int b;"]);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].line, Some(1));
        assert_eq!(out.warnings[0].file.as_deref(), Some(Path::new("v.h")));
    }

    #[test]
    fn test_unbalanced_endif_is_fatal() {
        let err = filter("int a;\n#endif\n", &symbols(&[]), Path::new("a.h")).unwrap_err();
        assert_eq!(
            err,
            PreprocessError::Unmatched { directive: "endif".into(), line: 2 }
        );
    }

    #[test]
    fn test_unterminated_if_is_fatal() {
        let err = filter("#ifdef A\nint a;\n", &symbols(&[]), Path::new("a.h")).unwrap_err();
        assert_eq!(err, PreprocessError::Unterminated { line: 1 });
    }

    #[test]
    fn test_directives_inside_block_comments_are_not_directives() {
        let src = "/*\n#endif\n*/\nint a;\n";
        let out = filter(src, &symbols(&[]), Path::new("a.h")).unwrap();
        assert_eq!(live_text(&out).last(), Some(&"int a;"));
    }

    #[test]
    fn test_define_continuations_are_not_live() {
        let src = "#define EXPORT_ALL \\\n  EXPORT void hidden(int a);\nint shown;\n";
        let out = filter(src, &symbols(&[]), Path::new("a.h")).unwrap();
        assert_eq!(live_text(&out), vec!["int shown;"]);
        assert_eq!(out.lines.len(), 3);
    }
}
