use crate::expression::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(f64),
    Return,

    LParen,
    RParen,
    Comma,
    Semi,
    Assign,

    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,

    Bang,

    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    AndAnd,
    OrOr,

    Eof,
}

pub(crate) fn lex(input: &str) -> Result<Vec<Token>, CompileError> {
    let mut out = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Line comment.
        if c == '#' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        let start = i;

        // Number: [0-9]+(.[0-9]+)?([eE][+-]?[0-9]+)? or .[0-9]+([eE][+-]?[0-9]+)?
        if c.is_ascii_digit()
            || (c == '.' && i + 1 < bytes.len() && (bytes[i + 1] as char).is_ascii_digit())
        {
            i = scan_number(bytes, i)?;
            let s = &input[start..i];
            let v: f64 = s
                .parse()
                .map_err(|_| CompileError::lex(start, format!("invalid number '{s}'")))?;
            out.push(Token {
                kind: TokenKind::Number(v),
                span: Span { start },
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            i += 1;
            while i < bytes.len() && is_ident_byte(bytes[i]) {
                i += 1;
            }
            let s = &input[start..i];
            let kind = match s {
                "return" => TokenKind::Return,
                _ => TokenKind::Ident(s.to_owned()),
            };
            out.push(Token {
                kind,
                span: Span { start },
            });
            continue;
        }

        // Two-char operators
        if i + 1 < bytes.len() {
            let kind = match &bytes[i..i + 2] {
                b"&&" => Some(TokenKind::AndAnd),
                b"||" => Some(TokenKind::OrOr),
                b"==" => Some(TokenKind::EqEq),
                b"!=" => Some(TokenKind::Ne),
                b"<=" => Some(TokenKind::Le),
                b">=" => Some(TokenKind::Ge),
                b"**" => Some(TokenKind::StarStar),
                _ => None,
            };
            if let Some(kind) = kind {
                i += 2;
                out.push(Token {
                    kind,
                    span: Span { start },
                });
                continue;
            }
        }

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semi,
            '=' => TokenKind::Assign,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '!' => TokenKind::Bang,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            _ => {
                let ch = input[start..].chars().next().unwrap_or(c);
                return Err(CompileError::lex(
                    start,
                    format!("unexpected character '{ch}'"),
                ));
            }
        };
        i += 1;
        out.push(Token {
            kind,
            span: Span { start },
        });
    }

    out.push(Token {
        kind: TokenKind::Eof,
        span: Span { start: input.len() },
    });

    Ok(out)
}

pub(crate) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// `true` for `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => bytes.all(is_ident_byte),
        _ => false,
    }
}

/// Scan an unsigned decimal literal starting at `i`; returns the end offset.
fn scan_number(bytes: &[u8], mut i: usize) -> Result<usize, CompileError> {
    if bytes[i] == b'.' {
        i += 1;
    } else {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
            i += 1;
        }
    }

    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let e_pos = i;
        i += 1;
        if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if exp_start == i {
            return Err(CompileError::lex(
                e_pos,
                "invalid number exponent (expected digits)",
            ));
        }
    }
    Ok(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_assignment_and_power() {
        assert_eq!(
            kinds("a = 2 ** x;"),
            vec![
                TokenKind::Ident("a".to_owned()),
                TokenKind::Assign,
                TokenKind::Number(2.0),
                TokenKind::StarStar,
                TokenKind::Ident("x".to_owned()),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            kinds("# header\nreturn 1.5e2; # tail"),
            vec![
                TokenKind::Return,
                TokenKind::Number(150.0),
                TokenKind::Semi,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn reports_offset_of_bad_character() {
        let err = lex("return $;").unwrap_err();
        assert_eq!(err.offset, 7);
        assert_eq!(err.kind, crate::expression::error::CompileErrorKind::Lex);
    }

    #[test]
    fn rejects_empty_exponent() {
        assert!(lex("1e+").is_err());
    }

    #[test]
    fn identifier_shape() {
        assert!(is_identifier("_pix2"));
        assert!(!is_identifier("2pix"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }
}
