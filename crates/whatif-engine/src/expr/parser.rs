//! Recursive-descent parser for the expression language.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    := "if" expr "then" expr "else" expr | or
//! or      := and ("or" and)*
//! and     := not ("and" not)*
//! not     := "not" not | compare
//! compare := sum (("==" | "!=" | "<" | "<=" | ">" | ">=") sum)?
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/" | "%") unary)*
//! unary   := "-" unary | primary
//! primary := literal | name | name "(" args ")" | "(" expr ")"
//! ```
//!
//! Nesting is bounded by a depth limit. Left-associative chains such as
//! `a + b + c` build one tree level per operator, so each chained operator
//! counts one level too. Every tree walk then stays within the limit.

use whatif_core::Value;

use super::ast::{BinaryOp, Expr, LogicOp, UnaryOp};
use super::error::ExprError;
use super::lexer::{lex, Spanned, Token};

const KEYWORDS: &[&str] = &[
    "if", "then", "else", "and", "or", "not", "true", "false", "null",
];

/// Parses `src` into an [`Expr`], rejecting nesting deeper than `max_depth`.
pub fn parse(src: &str, max_depth: usize) -> Result<Expr, ExprError> {
    let tokens = lex(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
    };
    let expr = parser.expr()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(ExprError::parse(
            parser.offset(),
            format!("unexpected {} after expression", describe(other)),
        )),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].offset
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Word(w) if w == kw)
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), ExprError> {
        if self.at_keyword(kw) {
            self.advance();
            Ok(())
        } else {
            Err(ExprError::parse(
                self.offset(),
                format!("expected '{kw}', found {}", describe(self.peek())),
            ))
        }
    }

    fn expect(&mut self, tok: Token, what: &str) -> Result<(), ExprError> {
        if *self.peek() == tok {
            self.advance();
            Ok(())
        } else {
            Err(ExprError::parse(
                self.offset(),
                format!("expected {what}, found {}", describe(self.peek())),
            ))
        }
    }

    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ExprError::TooDeep {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Productions
    // -----------------------------------------------------------------------

    fn expr(&mut self) -> Result<Expr, ExprError> {
        self.descend()?;
        let result = if self.at_keyword("if") {
            self.advance();
            let cond = self.expr()?;
            self.expect_keyword("then")?;
            let then = self.expr()?;
            self.expect_keyword("else")?;
            let otherwise = self.expr()?;
            Expr::If {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            }
        } else {
            self.or()?
        };
        self.depth -= 1;
        Ok(result)
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.and()?;
        let mut chained = 0;
        while self.at_keyword("or") {
            self.advance();
            self.descend()?;
            chained += 1;
            let rhs = self.and()?;
            lhs = Expr::Logic {
                op: LogicOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.not()?;
        let mut chained = 0;
        while self.at_keyword("and") {
            self.advance();
            self.descend()?;
            chained += 1;
            let rhs = self.not()?;
            lhs = Expr::Logic {
                op: LogicOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, ExprError> {
        if self.at_keyword("not") {
            self.advance();
            self.descend()?;
            let operand = self.not()?;
            self.depth -= 1;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.sum()?;
        let op = match self.peek() {
            Token::Eq => BinaryOp::Eq,
            Token::Neq => BinaryOp::Neq,
            Token::Lt => BinaryOp::Lt,
            Token::Lte => BinaryOp::Lte,
            Token::Gt => BinaryOp::Gt,
            Token::Gte => BinaryOp::Gte,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.sum()?;
        if matches!(
            self.peek(),
            Token::Eq | Token::Neq | Token::Lt | Token::Lte | Token::Gt | Token::Gte
        ) {
            return Err(ExprError::parse(
                self.offset(),
                "comparisons cannot be chained; combine them with 'and'",
            ));
        }
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn sum(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.product()?;
        let mut chained = 0;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => {
                    self.depth -= chained;
                    return Ok(lhs);
                }
            };
            self.advance();
            self.descend()?;
            chained += 1;
            let rhs = self.product()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn product(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        let mut chained = 0;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => {
                    self.depth -= chained;
                    return Ok(lhs);
                }
            };
            self.advance();
            self.descend()?;
            chained += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if *self.peek() == Token::Minus {
            self.advance();
            self.descend()?;
            let operand = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        match self.advance() {
            Token::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Token::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Word(w) => match w.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                kw if KEYWORDS.contains(&kw) => Err(ExprError::parse(
                    offset,
                    format!("unexpected keyword '{kw}'"),
                )),
                _ if *self.peek() == Token::LParen => {
                    self.advance();
                    let args = self.call_args()?;
                    Ok(Expr::Call { function: w, args })
                }
                _ => Ok(Expr::Var(w)),
            },
            other => Err(ExprError::parse(
                offset,
                format!("expected a value, found {}", describe(&other)),
            )),
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if *self.peek() == Token::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.advance() {
                Token::Comma => continue,
                Token::RParen => return Ok(args),
                other => {
                    return Err(ExprError::parse(
                        self.offset(),
                        format!("expected ',' or ')', found {}", describe(&other)),
                    ))
                }
            }
        }
    }
}

fn describe(tok: &Token) -> String {
    match tok {
        Token::Word(w) => format!("'{w}'"),
        Token::Str(_) => "string literal".to_string(),
        Token::Int(i) => format!("'{i}'"),
        Token::Float(f) => format!("'{f}'"),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::Percent => "'%'".to_string(),
        Token::Eq => "'=='".to_string(),
        Token::Neq => "'!='".to_string(),
        Token::Lt => "'<'".to_string(),
        Token::Lte => "'<='".to_string(),
        Token::Gt => "'>'".to_string(),
        Token::Gte => "'>='".to_string(),
        Token::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(src: &str) -> Expr {
        parse(src, 64).unwrap()
    }

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(name.into()))
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            p("a + b * c"),
            Expr::Binary {
                op: BinaryOp::Add,
                lhs: var("a"),
                rhs: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    lhs: var("b"),
                    rhs: var("c"),
                }),
            }
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(
            p("a - b - c"),
            Expr::Binary {
                op: BinaryOp::Sub,
                lhs: Box::new(Expr::Binary {
                    op: BinaryOp::Sub,
                    lhs: var("a"),
                    rhs: var("b"),
                }),
                rhs: var("c"),
            }
        );
    }

    #[test]
    fn not_binds_looser_than_comparison() {
        assert_eq!(
            p("not a == b"),
            Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(Expr::Binary {
                    op: BinaryOp::Eq,
                    lhs: var("a"),
                    rhs: var("b"),
                }),
            }
        );
    }

    #[test]
    fn conditional_and_calls() {
        let e = p("if qty > 10 then round(price * 0.9, 2) else price");
        assert!(matches!(e, Expr::If { .. }));
        assert_eq!(
            e.free_variables().into_iter().collect::<Vec<_>>(),
            vec!["price", "qty"]
        );
    }

    #[test]
    fn empty_call() {
        assert_eq!(
            p("f()"),
            Expr::Call {
                function: "f".into(),
                args: vec![]
            }
        );
    }

    #[test]
    fn trailing_tokens_rejected() {
        let err = parse("a b", 64).unwrap_err();
        assert!(matches!(err, ExprError::Parse { offset: 2, .. }));
    }

    #[test]
    fn chained_comparison_rejected() {
        assert!(parse("a < b < c", 64).is_err());
    }

    #[test]
    fn keyword_as_value_rejected() {
        assert!(parse("then + 1", 64).is_err());
    }

    #[test]
    fn missing_else_rejected() {
        let err = parse("if a then b", 64).unwrap_err();
        assert!(err.to_string().contains("expected 'else'"));
    }

    #[test]
    fn depth_limit_enforced() {
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(parse(&deep, 64).unwrap_err(), ExprError::TooDeep { limit: 64 });
        assert!(parse(&deep, 200).is_ok());
    }

    #[test]
    fn long_operator_chain_counts_toward_depth() {
        let long = vec!["x"; 100_000].join(" + ");
        assert_eq!(parse(&long, 64).unwrap_err(), ExprError::TooDeep { limit: 64 });

        let long = vec!["x"; 100_000].join(" and ");
        assert_eq!(parse(&long, 64).unwrap_err(), ExprError::TooDeep { limit: 64 });
    }

    #[test]
    fn chain_depth_is_released_after_each_argument() {
        let arg = vec!["x"; 40].join(" * ");
        let call = format!("max({})", vec![arg.as_str(); 10].join(", "));
        assert!(parse(&call, 64).is_ok());

        let nested = vec![format!("({arg})"); 40].join(" - ");
        assert_eq!(parse(&nested, 64).unwrap_err(), ExprError::TooDeep { limit: 64 });
    }

    #[test]
    fn unary_chain_counts_toward_depth() {
        let deep = format!("{}1", "-".repeat(80));
        assert!(matches!(
            parse(&deep, 64).unwrap_err(),
            ExprError::TooDeep { .. }
        ));
    }
}
