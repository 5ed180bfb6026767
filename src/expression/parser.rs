use crate::expression::ast::{Assign, BinaryOp, Expr, ExprKind, Script, UnaryOp};
use crate::expression::error::CompileError;
use crate::expression::lexer::{Token, TokenKind, lex};

/// Bound on both parser recursion and AST height.
const MAX_NESTING: u32 = 256;

/// Parse `(ident '=' expr ';')* 'return' expr ';'?`.
pub(crate) fn parse_script(src: &str) -> Result<Script, CompileError> {
    let tokens = lex(src)?;
    let mut p = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };

    let mut assigns = Vec::new();
    loop {
        match p.peek().kind.clone() {
            TokenKind::Return => {
                p.bump();
                let ret = p.parse_or()?;
                p.consume(&TokenKind::Semi);
                if p.peek().kind != TokenKind::Eof {
                    return Err(CompileError::syntax(
                        p.offset(),
                        format!(
                            "'return' must be the final statement, found {:?}",
                            p.peek().kind
                        ),
                    ));
                }
                return Ok(Script { assigns, ret });
            }
            TokenKind::Ident(name) => {
                let offset = p.offset();
                p.bump();
                p.expect(TokenKind::Assign)?;
                let value = p.parse_or()?;
                p.expect(TokenKind::Semi)?;
                assigns.push(Assign {
                    name,
                    offset,
                    value,
                });
            }
            TokenKind::Eof => {
                return Err(CompileError::syntax(
                    p.offset(),
                    "missing final 'return' statement",
                ));
            }
            other => {
                return Err(CompileError::syntax(
                    p.offset(),
                    format!("expected assignment or 'return', found {other:?}"),
                ));
            }
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: u32,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> &Token {
        let t = &self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn offset(&self) -> usize {
        self.peek().span.start
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), CompileError> {
        if self.peek().kind == kind {
            self.bump();
            Ok(())
        } else {
            Err(CompileError::syntax(
                self.offset(),
                format!("expected {kind:?}, found {:?}", self.peek().kind),
            ))
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume the next token if it is one of `ops`, returning the mapped operator and its offset.
    fn consume_op(&mut self, ops: &[(TokenKind, BinaryOp)]) -> Option<(BinaryOp, usize)> {
        let offset = self.offset();
        let op = ops
            .iter()
            .find(|(k, _)| *k == self.peek().kind)
            .map(|&(_, op)| op)?;
        self.bump();
        Some((op, offset))
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut e = self.parse_and()?;
        while let Some((op, offset)) = self.consume_op(&[(TokenKind::OrOr, BinaryOp::Or)]) {
            let r = self.parse_and()?;
            e = binary(op, e, r, offset)?;
        }
        Ok(e)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut e = self.parse_relational()?;
        while let Some((op, offset)) = self.consume_op(&[(TokenKind::AndAnd, BinaryOp::And)]) {
            let r = self.parse_relational()?;
            e = binary(op, e, r, offset)?;
        }
        Ok(e)
    }

    fn parse_relational(&mut self) -> Result<Expr, CompileError> {
        const OPS: &[(TokenKind, BinaryOp)] = &[
            (TokenKind::EqEq, BinaryOp::Eq),
            (TokenKind::Ne, BinaryOp::Ne),
            (TokenKind::Lt, BinaryOp::Lt),
            (TokenKind::Le, BinaryOp::Le),
            (TokenKind::Gt, BinaryOp::Gt),
            (TokenKind::Ge, BinaryOp::Ge),
        ];
        let mut e = self.parse_term()?;
        while let Some((op, offset)) = self.consume_op(OPS) {
            let r = self.parse_term()?;
            e = binary(op, e, r, offset)?;
        }
        Ok(e)
    }

    fn parse_term(&mut self) -> Result<Expr, CompileError> {
        const OPS: &[(TokenKind, BinaryOp)] = &[
            (TokenKind::Plus, BinaryOp::Add),
            (TokenKind::Minus, BinaryOp::Sub),
        ];
        let mut e = self.parse_factor()?;
        while let Some((op, offset)) = self.consume_op(OPS) {
            let r = self.parse_factor()?;
            e = binary(op, e, r, offset)?;
        }
        Ok(e)
    }

    fn parse_factor(&mut self) -> Result<Expr, CompileError> {
        const OPS: &[(TokenKind, BinaryOp)] = &[
            (TokenKind::Star, BinaryOp::Mul),
            (TokenKind::Slash, BinaryOp::Div),
            (TokenKind::Percent, BinaryOp::Mod),
        ];
        let mut e = self.parse_unary()?;
        while let Some((op, offset)) = self.consume_op(OPS) {
            let r = self.parse_unary()?;
            e = binary(op, e, r, offset)?;
        }
        Ok(e)
    }

    // Every recursive path of the grammar passes through here.
    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        if self.depth >= MAX_NESTING {
            return Err(too_deep(self.offset()));
        }
        self.depth += 1;
        let e = self.parse_prefixed();
        self.depth -= 1;
        e
    }

    fn parse_prefixed(&mut self) -> Result<Expr, CompileError> {
        let offset = self.offset();
        let op = if self.consume(&TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.consume(&TokenKind::Bang) {
            UnaryOp::Not
        } else {
            return self.parse_power();
        };
        let e = self.parse_unary()?;
        let height = e.height + 1;
        node(
            ExprKind::Unary {
                op,
                expr: Box::new(e),
            },
            offset,
            height,
        )
    }

    // `**` binds tighter than unary minus and is right-associative: `-2 ** 2 ** 3` is
    // `-(2 ** (2 ** 3))`.
    fn parse_power(&mut self) -> Result<Expr, CompileError> {
        let base = self.parse_postfix()?;
        if let Some((op, offset)) = self.consume_op(&[(TokenKind::StarStar, BinaryOp::Pow)]) {
            let exp = self.parse_unary()?;
            return binary(op, base, exp, offset);
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let e = self.parse_primary()?;
        if self.peek().kind != TokenKind::LParen {
            return Ok(e);
        }
        let call_offset = self.offset();
        self.bump();
        let func = match e.kind {
            ExprKind::Ident(name) => name,
            _ => {
                return Err(CompileError::syntax(
                    call_offset,
                    "call target must be an identifier",
                ));
            }
        };
        let args = self.parse_args()?;
        let height = args.iter().map(|a| a.height).max().unwrap_or(0) + 1;
        node(ExprKind::Call { func, args }, e.offset, height)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut args = Vec::new();
        if self.consume(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            if self.consume(&TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let t = self.bump().clone();
        let offset = t.span.start;
        match t.kind {
            TokenKind::Number(v) => node(ExprKind::Num(v), offset, 1),
            TokenKind::Ident(s) => node(ExprKind::Ident(s), offset, 1),
            TokenKind::LParen => {
                let e = self.parse_or()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            other => Err(CompileError::syntax(
                offset,
                format!("unexpected token {other:?}"),
            )),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr, offset: usize) -> Result<Expr, CompileError> {
    let height = left.height.max(right.height) + 1;
    node(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        offset,
        height,
    )
}

fn node(kind: ExprKind, offset: usize, height: u32) -> Result<Expr, CompileError> {
    if height > MAX_NESTING {
        return Err(too_deep(offset));
    }
    Ok(Expr {
        kind,
        offset,
        height,
    })
}

fn too_deep(offset: usize) -> CompileError {
    CompileError::syntax(offset, "expression nested too deeply")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::error::CompileErrorKind;

    fn ret(src: &str) -> ExprKind {
        parse_script(src).unwrap().ret.kind
    }

    #[test]
    fn parses_arithmetic_precedence() {
        match ret("return 1 + 2 * 3;") {
            ExprKind::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            )),
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn power_is_right_associative_and_binds_tighter_than_negation() {
        match ret("return -2 ** 3 ** 2;") {
            ExprKind::Unary {
                op: UnaryOp::Neg,
                expr,
            } => match expr.kind {
                ExprKind::Binary {
                    op: BinaryOp::Pow,
                    right,
                    ..
                } => assert!(matches!(
                    right.kind,
                    ExprKind::Binary {
                        op: BinaryOp::Pow,
                        ..
                    }
                )),
                other => panic!("unexpected ast: {other:?}"),
            },
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn logical_operators_bind_loosest() {
        match ret("return x < 1 || y > 2 && x == y;") {
            ExprKind::Binary {
                op: BinaryOp::Or,
                right,
                ..
            } => assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOp::And,
                    ..
                }
            )),
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn parses_assignments_then_return() {
        let s = parse_script("a = x / w; b = a * 2;\nreturn rgb(a, b, 0);").unwrap();
        assert_eq!(s.assigns.len(), 2);
        assert_eq!(s.assigns[1].name, "b");
        assert_eq!(s.assigns[1].offset, 11);
        match s.ret.kind {
            ExprKind::Call { func, args } => {
                assert_eq!(func, "rgb");
                assert_eq!(args.len(), 3);
            }
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn final_semicolon_is_optional() {
        assert!(parse_script("return rgb(255,0,0)").is_ok());
    }

    #[test]
    fn missing_return_is_a_syntax_error() {
        let err = parse_script("a = 1;").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::Syntax);
        assert_eq!(err.offset, 6);
    }

    #[test]
    fn statements_after_return_are_rejected() {
        let err = parse_script("return 1; a = 2;").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::Syntax);
        assert_eq!(err.offset, 10);
    }

    #[test]
    fn assignment_requires_semicolon() {
        assert!(parse_script("a = 1 return a;").is_err());
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let deep_parens = format!("return {}1{};", "(".repeat(200_000), ")".repeat(200_000));
        let deep_negation = format!("return {}1;", "-".repeat(200_000));
        let long_chain = format!("return 1{};", " + 1".repeat(200_000));
        let deep_power = format!("return 2{};", " ** 2".repeat(200_000));
        for src in [deep_parens, deep_negation, long_chain, deep_power] {
            let err = parse_script(&src).unwrap_err();
            assert_eq!(err.kind, CompileErrorKind::Syntax);
            assert!(err.message.contains("nested too deeply"), "{}", err.message);
        }
    }

    #[test]
    fn moderate_nesting_still_parses() {
        let src = format!("return {}x{};", "(".repeat(100), ")".repeat(100));
        assert!(parse_script(&src).is_ok());
        let src = format!("return 1{};", " + 1".repeat(100));
        assert_eq!(parse_script(&src).unwrap().ret.height, 101);
    }
}
