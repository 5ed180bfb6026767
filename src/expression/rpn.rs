//! Postfix reader: whitespace-separated words, `#` comments to end of line.

use crate::expression::builtins::{Builtin, sample_index};
use crate::expression::typecheck::{Word, WordKind};
use crate::expression::error::{CompileError, CompileErrorKind};
use crate::expression::lexer::is_identifier;

pub(crate) fn read_rpn(src: &str) -> Result<Vec<Word>, CompileError> {
    let mut out = Vec::new();
    let mut line_start = 0usize;
    for line in src.split_inclusive('\n') {
        let code = line.split('#').next().unwrap_or("");
        let mut rest = code;
        while let Some(start) = rest.find(|c: char| !c.is_whitespace()) {
            let tail = &rest[start..];
            let len = tail.find(char::is_whitespace).unwrap_or(tail.len());
            let offset = line_start + (code.len() - rest.len()) + start;
            out.push(classify(&tail[..len], offset)?);
            rest = &tail[len..];
        }
        line_start += line.len();
    }
    Ok(out)
}

fn classify(tok: &str, offset: usize) -> Result<Word, CompileError> {
    let word = |kind| Ok(Word { kind, offset });

    if looks_numeric(tok) {
        return match tok.parse::<f64>() {
            Ok(v) if v.is_finite() => word(WordKind::Number(v)),
            _ => Err(CompileError::lex(offset, format!("invalid number '{tok}'"))),
        };
    }
    if let Some(n) = sample_index(tok) {
        return word(WordKind::Sample(n));
    }
    if let Some(b) = Builtin::lookup(tok) {
        return word(WordKind::Op(b));
    }
    if let Some(name) = tok.strip_prefix('!') {
        return register_word(name, offset, WordKind::Store);
    }
    if let Some(name) = tok.strip_prefix('@') {
        return register_word(name, offset, WordKind::Load);
    }
    if is_identifier(tok) {
        return word(WordKind::Name(tok.to_owned()));
    }
    Err(CompileError::new(
        offset,
        CompileErrorKind::UnknownFunction,
        format!("unknown operator '{tok}'"),
    ))
}

fn register_word(
    name: &str,
    offset: usize,
    kind: fn(String) -> WordKind,
) -> Result<Word, CompileError> {
    if !is_identifier(name) {
        return Err(CompileError::lex(
            offset,
            format!("invalid register name '{name}'"),
        ));
    }
    Ok(Word {
        kind: kind(name.to_owned()),
        offset,
    })
}

// Signed literals (`-3`, `+.5`) are numbers; a bare `-` or `+` is an operator.
fn looks_numeric(tok: &str) -> bool {
    let unsigned = tok.strip_prefix(['-', '+']).unwrap_or(tok);
    let mut chars = unsigned.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}
