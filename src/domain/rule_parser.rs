//! Recursive descent parser for generated rule source.
//!
//! A program is a sequence of `name = RULE` lines plus `#` comments; exactly
//! `entry_condition` and `exit_condition` may be assigned, each at most once.
//! Errors carry the byte offset into the full source so they can be shown
//! with [`ParseError::display_with_context`].

use crate::domain::augment::Column;
use crate::domain::error::ParseError;
use crate::domain::rule::{Operand, Program, Rule};

/// Maximum nesting of rules and operands.
pub const MAX_DEPTH: usize = 32;

pub const ENTRY_NAME: &str = "entry_condition";
pub const EXIT_NAME: &str = "exit_condition";

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.pos,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn skip_inline_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c == ' ' || c == '\t') {
            self.advance();
        }
    }

    /// Whitespace, blank lines and `#` comments between statements.
    fn skip_trivia(&mut self) {
        loop {
            self.skip_whitespace();
            if self.peek() == Some('#') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn peek_word(&self) -> &'a str {
        let remaining = self.remaining();
        let end = remaining
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(remaining.len());
        &remaining[..end]
    }

    fn describe_next(&self) -> String {
        match (self.peek_word(), self.peek()) {
            ("", Some(ch)) => ch.to_string(),
            ("", None) => "end of input".to_string(),
            (word, _) => word.to_string(),
        }
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!("nesting deeper than {} levels", MAX_DEPTH)));
        }
        Ok(())
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_integer(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let digits = self.remaining().chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            return Err(self.error("expected integer"));
        }
        self.pos += digits;
        let num_str = &self.input[start..self.pos];
        num_str.parse::<usize>().map_err(|_| ParseError {
            message: format!("invalid integer: {}", num_str),
            position: start,
        })
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.descend()?;
        let mut operand = self.parse_primary()?;
        loop {
            self.skip_whitespace();
            if self.peek() != Some('*') {
                break;
            }
            self.advance();
            let factor = self.parse_number()?;
            operand = operand.scaled(factor);
        }
        self.depth -= 1;
        Ok(operand)
    }

    fn parse_primary(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return Ok(Operand::Constant(self.parse_number()?));
        }

        let word = self.peek_word();
        match word {
            "ABS" | "ROUND" => {
                self.pos += word.len();
                self.expect_char('(')?;
                let inner = Box::new(self.parse_operand()?);
                self.expect_char(')')?;
                Ok(if word == "ABS" {
                    Operand::Abs(inner)
                } else {
                    Operand::Round(inner)
                })
            }
            "MIN" | "MAX" => {
                self.pos += word.len();
                self.expect_char('(')?;
                let a = Box::new(self.parse_operand()?);
                self.expect_char(',')?;
                let b = Box::new(self.parse_operand()?);
                self.expect_char(')')?;
                Ok(if word == "MIN" {
                    Operand::Min(a, b)
                } else {
                    Operand::Max(a, b)
                })
            }
            _ => match Column::from_name(word) {
                Some(column) => {
                    self.pos += word.len();
                    Ok(Operand::Column(column))
                }
                None => Err(self.error(format!(
                    "expected column, number or builtin, found '{}'",
                    self.describe_next()
                ))),
            },
        }
    }

    fn parse_comparison(&mut self, keyword: &str) -> Result<Rule, ParseError> {
        self.pos += keyword.len();
        self.expect_char('(')?;
        let left = self.parse_operand()?;
        self.expect_char(',')?;
        let right = self.parse_operand()?;
        self.expect_char(')')?;

        Ok(match keyword {
            "CROSS_ABOVE" => Rule::CrossAbove { left, right },
            "CROSS_BELOW" => Rule::CrossBelow { left, right },
            "ABOVE" => Rule::Above { left, right },
            "BELOW" => Rule::Below { left, right },
            "AT_OR_ABOVE" => Rule::AtOrAbove { left, right },
            _ => Rule::AtOrBelow { left, right },
        })
    }

    fn parse_composite(&mut self, keyword: &str) -> Result<Rule, ParseError> {
        self.pos += keyword.len();
        self.expect_char('(')?;

        let mut rules = vec![self.parse_rule()?];
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            rules.push(self.parse_rule()?);
        }

        if rules.len() < 2 {
            return Err(self.error(format!("{} requires at least 2 rules", keyword)));
        }

        Ok(if keyword == "AND" {
            Rule::And(rules)
        } else {
            Rule::Or(rules)
        })
    }

    fn parse_percent_rule(&mut self, keyword: &str) -> Result<Rule, ParseError> {
        self.pos += keyword.len();
        self.expect_char('(')?;
        let start = self.pos;
        let pct = self.parse_number()?;
        if pct < 0.0 {
            return Err(ParseError {
                message: format!("{} percentage must not be negative", keyword),
                position: start,
            });
        }
        self.expect_char(')')?;
        Ok(if keyword == "STOP_LOSS" {
            Rule::StopLoss(pct)
        } else {
            Rule::TakeProfit(pct)
        })
    }

    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        self.descend()?;
        self.skip_whitespace();

        let word = self.peek_word();
        let rule = match word {
            "CROSS_ABOVE" | "CROSS_BELOW" | "ABOVE" | "BELOW" | "AT_OR_ABOVE" | "AT_OR_BELOW" => {
                self.parse_comparison(word)?
            }
            "AND" | "OR" => self.parse_composite(word)?,
            "STOP_LOSS" | "TAKE_PROFIT" => self.parse_percent_rule(word)?,
            "WARMUP" => {
                self.pos += word.len();
                self.expect_char('(')?;
                let n = self.parse_integer()?;
                self.expect_char(')')?;
                Rule::Warmup(n)
            }
            _ => {
                return Err(self.error(format!("expected rule, found '{}'", self.describe_next())));
            }
        };

        self.depth -= 1;
        Ok(rule)
    }

    #[cfg(test)]
    fn parse_single(&mut self) -> Result<Rule, ParseError> {
        let rule = self.parse_rule()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after rule: '{}'",
                self.remaining()
            )));
        }
        Ok(rule)
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program {
            entry: None,
            exit: None,
        };

        loop {
            self.skip_trivia();
            if self.peek().is_none() {
                break;
            }

            let name_pos = self.pos;
            let name = self.peek_word();
            let slot = match name {
                ENTRY_NAME => &mut program.entry,
                EXIT_NAME => &mut program.exit,
                _ => {
                    return Err(self.error(format!(
                        "expected '{}' or '{}', found '{}'",
                        ENTRY_NAME,
                        EXIT_NAME,
                        self.describe_next()
                    )));
                }
            };
            if slot.is_some() {
                return Err(ParseError {
                    message: format!("{} assigned more than once", name),
                    position: name_pos,
                });
            }
            self.pos += name.len();
            self.expect_char('=')?;
            let rule = self.parse_rule()?;

            self.skip_inline_whitespace();
            match self.peek() {
                None | Some('\n') | Some('\r') | Some('#') => {}
                Some(_) => {
                    return Err(self.error(format!(
                        "expected end of line, found '{}'",
                        self.describe_next()
                    )));
                }
            }
            *slot = Some(rule);
        }

        Ok(program)
    }
}

/// Parse a single rule expression.
#[cfg(test)]
pub(crate) fn parse(input: &str) -> Result<Rule, ParseError> {
    Parser::new(input).parse_single()
}

/// Parse a full source text of assignments and comments.
pub fn parse_program(input: &str) -> Result<Program, ParseError> {
    Parser::new(input).parse_program()
}
