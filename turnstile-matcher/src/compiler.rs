//! Shunting-yard compilation of matcher source into a postfix program.

use serde::{Deserialize, Serialize};

use crate::lexer::{self, Op, Token, TokenKind};
use crate::{CompileError, CompileResult};

/// One postfix instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instr {
    /// Push a numeric literal.
    PushNum {
        /// Literal value.
        value: f64,
    },
    /// Push a string literal. Also produced for the right-hand side of `.`,
    /// whose identifier is an attribute *name*, not a variable reference.
    PushStr {
        /// Literal value.
        value: String,
    },
    /// Push the environment entry under `name`.
    PushVar {
        /// Variable name resolved at evaluation time.
        name: String,
    },
    /// Pop an attribute name and a record, push the record's attribute.
    FetchAttr,
    /// Pop `arity` arguments, invoke the environment function `name`, push
    /// its result.
    Call {
        /// Function name resolved at evaluation time.
        name: String,
        /// Number of arguments to pop.
        arity: usize,
    },
    /// Logical negation of the popped value's truthiness.
    Not,
    /// Unary plus; the operand must be a number.
    Pos,
    /// Unary minus; the operand must be a number.
    Neg,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// Logical and over truthiness; yields one of the operands.
    And,
    /// Logical or over truthiness; yields one of the operands.
    Or,
}

/// A compiled matcher: a non-empty postfix instruction sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    instrs: Vec<Instr>,
}

impl Program {
    /// Compiles matcher source into a postfix program.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] describing the first offending token, the
    /// position of an unbalanced parenthesis, or an unterminated string
    /// literal.
    pub fn compile(source: &str) -> CompileResult<Self> {
        let tokens = lexer::tokenize(source)?;
        Compiler::default().run(&tokens)
    }

    /// Returns the instruction sequence.
    #[must_use]
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub(crate) fn from_instrs(instrs: Vec<Instr>) -> Self {
        Self { instrs }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Not,
    Pos,
    Neg,
}

/// Operator stack entries. Parentheses record their source position so an
/// unmatched one can be reported; function-call parentheses additionally
/// track the callee and the commas seen at their level.
#[derive(Debug, Clone)]
enum StackEntry {
    Unary {
        op: UnaryOp,
    },
    Binary {
        op: Op,
    },
    Paren {
        line: usize,
        column: usize,
        call: Option<CallFrame>,
    },
}

#[derive(Debug, Clone)]
struct CallFrame {
    name: String,
    commas: usize,
}

const UNARY_PREC: u8 = 7;

fn binary_prec(op: Op) -> u8 {
    match op {
        Op::Or => 1,
        Op::And => 2,
        Op::Eq | Op::Ne => 3,
        Op::Lt | Op::Le | Op::Gt | Op::Ge => 4,
        Op::Add | Op::Sub => 5,
        Op::Mul | Op::Div => 6,
        // `Not` never reaches the binary path.
        Op::Not => UNARY_PREC,
        Op::Dot => 8,
    }
}

fn binary_instr(op: Op) -> Instr {
    match op {
        Op::Or => Instr::Or,
        Op::And => Instr::And,
        Op::Eq => Instr::Eq,
        Op::Ne => Instr::Ne,
        Op::Lt => Instr::Lt,
        Op::Le => Instr::Le,
        Op::Gt => Instr::Gt,
        Op::Ge => Instr::Ge,
        Op::Add => Instr::Add,
        Op::Sub => Instr::Sub,
        Op::Mul => Instr::Mul,
        Op::Div => Instr::Div,
        Op::Not => Instr::Not,
        Op::Dot => Instr::FetchAttr,
    }
}

fn unary_instr(op: UnaryOp) -> Instr {
    match op {
        UnaryOp::Not => Instr::Not,
        UnaryOp::Pos => Instr::Pos,
        UnaryOp::Neg => Instr::Neg,
    }
}

#[derive(Default)]
struct Compiler {
    output: Vec<Instr>,
    stack: Vec<StackEntry>,
    /// Whether the previous significant token can end an operand (a literal,
    /// an identifier, or `)`), which decides unary versus binary `+`/`-` and
    /// catches adjacent operands.
    prev_is_operand: bool,
}

impl Compiler {
    fn run(mut self, tokens: &[Token]) -> CompileResult<Program> {
        if tokens.is_empty() {
            return Err(CompileError::UnexpectedToken { line: 0, column: 0 });
        }

        let mut iter = tokens.iter().peekable();
        let mut prev_kind: Option<&TokenKind> = None;

        while let Some(token) = iter.next() {
            match &token.kind {
                TokenKind::Num(value) => {
                    self.expect_operand_position(token)?;
                    self.output.push(Instr::PushNum { value: *value });
                    self.prev_is_operand = true;
                }
                TokenKind::Str(value) => {
                    self.expect_operand_position(token)?;
                    self.output.push(Instr::PushStr {
                        value: value.clone(),
                    });
                    self.prev_is_operand = true;
                }
                TokenKind::Ident(name) => {
                    self.expect_operand_position(token)?;
                    if matches!(prev_kind, Some(TokenKind::Op(Op::Dot))) {
                        // Attribute position: push the identifier's name.
                        self.output.push(Instr::PushStr {
                            value: name.clone(),
                        });
                    } else if matches!(iter.peek().map(|t| &t.kind), Some(TokenKind::LParen)) {
                        // Function call; the paren handler picks the name up.
                        let paren = iter.next().ok_or(CompileError::UnexpectedToken {
                            line: token.line,
                            column: token.column,
                        })?;
                        self.stack.push(StackEntry::Paren {
                            line: paren.line,
                            column: paren.column,
                            call: Some(CallFrame {
                                name: name.clone(),
                                commas: 0,
                            }),
                        });
                        self.prev_is_operand = false;
                        prev_kind = Some(&paren.kind);
                        continue;
                    } else {
                        self.output.push(Instr::PushVar { name: name.clone() });
                    }
                    self.prev_is_operand = true;
                }
                TokenKind::Op(Op::Not) => {
                    if self.prev_is_operand {
                        return Err(CompileError::UnexpectedToken {
                            line: token.line,
                            column: token.column,
                        });
                    }
                    self.push_unary(UnaryOp::Not);
                }
                TokenKind::Op(op @ (Op::Add | Op::Sub)) if !self.prev_is_operand => {
                    let unary = if *op == Op::Add {
                        UnaryOp::Pos
                    } else {
                        UnaryOp::Neg
                    };
                    self.push_unary(unary);
                }
                TokenKind::Op(op) => {
                    if !self.prev_is_operand {
                        return Err(CompileError::UnexpectedToken {
                            line: token.line,
                            column: token.column,
                        });
                    }
                    self.push_binary(*op);
                    self.prev_is_operand = false;
                }
                TokenKind::LParen => {
                    self.expect_operand_position(token)?;
                    self.stack.push(StackEntry::Paren {
                        line: token.line,
                        column: token.column,
                        call: None,
                    });
                    self.prev_is_operand = false;
                }
                TokenKind::RParen => {
                    self.close_paren(token, matches!(prev_kind, Some(TokenKind::LParen)))?;
                    self.prev_is_operand = true;
                }
                TokenKind::Comma => {
                    self.handle_comma(token)?;
                    self.prev_is_operand = false;
                }
            }
            prev_kind = Some(&token.kind);
        }

        if !self.prev_is_operand {
            // Trailing operator, comma, or open paren.
            if let Some(last) = tokens.last() {
                return Err(CompileError::UnexpectedToken {
                    line: last.line,
                    column: last.column,
                });
            }
        }

        while let Some(entry) = self.stack.pop() {
            match entry {
                StackEntry::Unary { op } => self.output.push(unary_instr(op)),
                StackEntry::Binary { op } => self.output.push(binary_instr(op)),
                StackEntry::Paren { line, column, .. } => {
                    return Err(CompileError::MismatchedParenthesis { line, column });
                }
            }
        }

        Ok(Program {
            instrs: self.output,
        })
    }

    /// Rejects an operand token directly following another operand.
    fn expect_operand_position(&self, token: &Token) -> CompileResult<()> {
        if self.prev_is_operand {
            return Err(CompileError::UnexpectedToken {
                line: token.line,
                column: token.column,
            });
        }
        Ok(())
    }

    fn push_unary(&mut self, op: UnaryOp) {
        // Right-associative: only strictly higher precedence is popped, so
        // stacked unary operators stay stacked.
        while let Some(top) = self.stack.last() {
            let top_prec = match top {
                StackEntry::Binary { op } => binary_prec(*op),
                StackEntry::Unary { .. } | StackEntry::Paren { .. } => break,
            };
            if top_prec > UNARY_PREC {
                if let Some(StackEntry::Binary { op }) = self.stack.pop() {
                    self.output.push(binary_instr(op));
                }
            } else {
                break;
            }
        }
        self.stack.push(StackEntry::Unary { op });
    }

    fn push_binary(&mut self, op: Op) {
        let prec = binary_prec(op);
        loop {
            let pop = match self.stack.last() {
                Some(StackEntry::Binary { op: top }) => binary_prec(*top) >= prec,
                Some(StackEntry::Unary { .. }) => UNARY_PREC >= prec,
                _ => false,
            };
            if !pop {
                break;
            }
            match self.stack.pop() {
                Some(StackEntry::Binary { op }) => self.output.push(binary_instr(op)),
                Some(StackEntry::Unary { op }) => self.output.push(unary_instr(op)),
                _ => break,
            }
        }
        self.stack.push(StackEntry::Binary { op });
    }

    /// Pops operators down to the innermost paren without removing it.
    /// Returns `false` when no paren is open.
    fn pop_to_paren(&mut self) -> bool {
        loop {
            match self.stack.last() {
                Some(StackEntry::Paren { .. }) => return true,
                Some(_) => match self.stack.pop() {
                    Some(StackEntry::Unary { op }) => self.output.push(unary_instr(op)),
                    Some(StackEntry::Binary { op }) => self.output.push(binary_instr(op)),
                    _ => return false,
                },
                None => return false,
            }
        }
    }

    fn handle_comma(&mut self, token: &Token) -> CompileResult<()> {
        if !self.prev_is_operand || !self.pop_to_paren() {
            return Err(CompileError::UnexpectedToken {
                line: token.line,
                column: token.column,
            });
        }
        match self.stack.last_mut() {
            Some(StackEntry::Paren {
                call: Some(frame), ..
            }) => {
                frame.commas += 1;
                Ok(())
            }
            // A comma inside grouping parentheses.
            _ => Err(CompileError::UnexpectedToken {
                line: token.line,
                column: token.column,
            }),
        }
    }

    fn close_paren(&mut self, token: &Token, empty_parens: bool) -> CompileResult<()> {
        if !self.pop_to_paren() {
            return Err(CompileError::MismatchedParenthesis {
                line: token.line,
                column: token.column,
            });
        }
        match self.stack.pop() {
            Some(StackEntry::Paren {
                call: Some(frame), ..
            }) => {
                let arity = if empty_parens { 0 } else { frame.commas + 1 };
                if arity > 0 && !self.prev_is_operand {
                    // Trailing comma before the close.
                    return Err(CompileError::UnexpectedToken {
                        line: token.line,
                        column: token.column,
                    });
                }
                self.output.push(Instr::Call {
                    name: frame.name,
                    arity,
                });
                Ok(())
            }
            Some(StackEntry::Paren { .. }) => {
                if empty_parens || !self.prev_is_operand {
                    // `()` grouping nothing, or `(x,)`-style dangling state.
                    return Err(CompileError::UnexpectedToken {
                        line: token.line,
                        column: token.column,
                    });
                }
                Ok(())
            }
            _ => Err(CompileError::MismatchedParenthesis {
                line: token.line,
                column: token.column,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Vec<Instr> {
        Program::compile(source).unwrap().instrs().to_vec()
    }

    fn var(name: &str) -> Instr {
        Instr::PushVar { name: name.into() }
    }

    fn num(value: f64) -> Instr {
        Instr::PushNum { value }
    }

    fn attr(name: &str) -> Instr {
        Instr::PushStr { value: name.into() }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            compile("1 + 2 * 3"),
            vec![num(1.0), num(2.0), num(3.0), Instr::Mul, Instr::Add]
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(
            compile("(1 + 2) * 3"),
            vec![num(1.0), num(2.0), Instr::Add, num(3.0), Instr::Mul]
        );
    }

    #[test]
    fn leading_minus_is_unary() {
        assert_eq!(
            compile("-1 + 2"),
            vec![num(1.0), Instr::Neg, num(2.0), Instr::Add]
        );
    }

    #[test]
    fn minus_after_close_paren_is_binary() {
        assert_eq!(
            compile("(1) - 2"),
            vec![num(1.0), num(2.0), Instr::Sub]
        );
    }

    #[test]
    fn dotted_access_compiles_to_fetch_attr() {
        assert_eq!(
            compile("r.sub == p.sub"),
            vec![
                var("r"),
                attr("sub"),
                Instr::FetchAttr,
                var("p"),
                attr("sub"),
                Instr::FetchAttr,
                Instr::Eq,
            ]
        );
    }

    #[test]
    fn attribute_chains_fetch_left_to_right() {
        assert_eq!(
            compile("a.b.c"),
            vec![
                var("a"),
                attr("b"),
                Instr::FetchAttr,
                attr("c"),
                Instr::FetchAttr,
            ]
        );
    }

    #[test]
    fn nested_calls_record_their_arities() {
        assert_eq!(
            compile("f(g(x), y)"),
            vec![
                var("x"),
                Instr::Call {
                    name: "g".into(),
                    arity: 1,
                },
                var("y"),
                Instr::Call {
                    name: "f".into(),
                    arity: 2,
                },
            ]
        );
    }

    #[test]
    fn zero_argument_calls_are_detected() {
        assert_eq!(
            compile("now()"),
            vec![Instr::Call {
                name: "now".into(),
                arity: 0,
            }]
        );
    }

    #[test]
    fn logical_operators_have_lowest_precedence() {
        assert_eq!(
            compile("a || b && c"),
            vec![var("a"), var("b"), var("c"), Instr::And, Instr::Or]
        );
    }

    #[test]
    fn not_applies_before_and() {
        assert_eq!(
            compile("!a && b"),
            vec![var("a"), Instr::Not, var("b"), Instr::And]
        );
    }

    #[test]
    fn double_negation_stays_stacked() {
        assert_eq!(compile("!!a"), vec![var("a"), Instr::Not, Instr::Not]);
    }

    #[test]
    fn unary_minus_binds_looser_than_attribute_access() {
        assert_eq!(
            compile("-r.age"),
            vec![var("r"), attr("age"), Instr::FetchAttr, Instr::Neg]
        );
    }

    #[test]
    fn unclosed_paren_reports_its_own_position() {
        assert_eq!(
            Program::compile("f(a, b").unwrap_err(),
            CompileError::MismatchedParenthesis { line: 0, column: 1 }
        );
    }

    #[test]
    fn stray_close_paren_reports_its_position() {
        assert_eq!(
            Program::compile("a)").unwrap_err(),
            CompileError::MismatchedParenthesis { line: 0, column: 1 }
        );
    }

    #[test]
    fn adjacent_operands_are_rejected() {
        assert!(matches!(
            Program::compile("1 2").unwrap_err(),
            CompileError::UnexpectedToken { line: 0, column: 2 }
        ));
    }

    #[test]
    fn trailing_operator_is_rejected() {
        assert!(matches!(
            Program::compile("a &&").unwrap_err(),
            CompileError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn binary_operator_without_left_operand_is_rejected() {
        assert!(matches!(
            Program::compile("* 2").unwrap_err(),
            CompileError::UnexpectedToken { line: 0, column: 0 }
        ));
    }

    #[test]
    fn empty_source_is_rejected() {
        assert!(matches!(
            Program::compile("  ").unwrap_err(),
            CompileError::UnexpectedToken { line: 0, column: 0 }
        ));
    }

    #[test]
    fn comma_outside_a_call_is_rejected() {
        assert!(matches!(
            Program::compile("(a, b)").unwrap_err(),
            CompileError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn programs_serialize_for_inspection() {
        let program = Program::compile("r.sub == \"root\"").unwrap();
        let json = serde_json::to_string(&program).unwrap();
        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(program, back);
    }
}
