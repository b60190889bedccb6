//! Rule AST for generated strategy source.
//!
//! - `Operand`: a panel column, a constant, or a safe builtin over operands
//! - `Rule`: comparisons, crossovers, composites, and position-aware exits
//! - `Program`: the two decision functions a source text defines
//!
//! `Display` renders the exact surface syntax accepted by
//! [`rule_parser`](crate::domain::rule_parser), so a rendered rule parses
//! back to an equal tree.

use std::fmt;

use crate::domain::augment::Column;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(Column),
    Constant(f64),
    Abs(Box<Operand>),
    Min(Box<Operand>, Box<Operand>),
    Max(Box<Operand>, Box<Operand>),
    Round(Box<Operand>),
    Scaled { operand: Box<Operand>, factor: f64 },
}

impl Operand {
    pub fn scaled(self, factor: f64) -> Operand {
        Operand::Scaled {
            operand: Box::new(self),
            factor,
        }
    }
}

impl From<Column> for Operand {
    fn from(column: Column) -> Self {
        Operand::Column(column)
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Constant(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    CrossAbove { left: Operand, right: Operand },
    CrossBelow { left: Operand, right: Operand },
    Above { left: Operand, right: Operand },
    Below { left: Operand, right: Operand },
    AtOrAbove { left: Operand, right: Operand },
    AtOrBelow { left: Operand, right: Operand },
    And(Vec<Rule>),
    Or(Vec<Rule>),
    /// True once the bar index reaches `n`.
    Warmup(usize),
    /// True when close has fallen `pct` percent below the entry price.
    StopLoss(f64),
    /// True when close has risen `pct` percent above the entry price.
    TakeProfit(f64),
}

impl Rule {
    pub fn keyword(&self) -> &'static str {
        match self {
            Rule::CrossAbove { .. } => "CROSS_ABOVE",
            Rule::CrossBelow { .. } => "CROSS_BELOW",
            Rule::Above { .. } => "ABOVE",
            Rule::Below { .. } => "BELOW",
            Rule::AtOrAbove { .. } => "AT_OR_ABOVE",
            Rule::AtOrBelow { .. } => "AT_OR_BELOW",
            Rule::And(_) => "AND",
            Rule::Or(_) => "OR",
            Rule::Warmup(_) => "WARMUP",
            Rule::StopLoss(_) => "STOP_LOSS",
            Rule::TakeProfit(_) => "TAKE_PROFIT",
        }
    }

    /// Largest `WARMUP(n)` reachable through `AND` nodes.
    pub fn warmup(&self) -> usize {
        match self {
            Rule::Warmup(n) => *n,
            Rule::And(rules) => rules.iter().map(Rule::warmup).max().unwrap_or(0),
            _ => 0,
        }
    }
}

/// The decision functions defined by one source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub entry: Option<Rule>,
    pub exit: Option<Rule>,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Column(c) => write!(f, "{}", c),
            Operand::Constant(v) => write!(f, "{}", v),
            Operand::Abs(x) => write!(f, "ABS({})", x),
            Operand::Min(a, b) => write!(f, "MIN({}, {})", a, b),
            Operand::Max(a, b) => write!(f, "MAX({}, {})", a, b),
            Operand::Round(x) => write!(f, "ROUND({})", x),
            Operand::Scaled { operand, factor } => write!(f, "{} * {}", operand, factor),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::CrossAbove { left, right }
            | Rule::CrossBelow { left, right }
            | Rule::Above { left, right }
            | Rule::Below { left, right }
            | Rule::AtOrAbove { left, right }
            | Rule::AtOrBelow { left, right } => {
                write!(f, "{}({}, {})", self.keyword(), left, right)
            }
            Rule::And(rules) | Rule::Or(rules) => {
                write!(f, "{}(", self.keyword())?;
                for (i, rule) in rules.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", rule)?;
                }
                f.write_str(")")
            }
            Rule::Warmup(n) => write!(f, "WARMUP({})", n),
            Rule::StopLoss(p) | Rule::TakeProfit(p) => write!(f, "{}({})", self.keyword(), p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_comparison() {
        let rule = Rule::Below {
            left: Column::Rsi14.into(),
            right: 30.0.into(),
        };
        assert_eq!(rule.to_string(), "BELOW(rsi_14, 30)");
    }

    #[test]
    fn display_scaled_operand() {
        let rule = Rule::Above {
            left: Column::Volume.into(),
            right: Operand::from(Column::VolumeSma20).scaled(1.5),
        };
        assert_eq!(rule.to_string(), "ABOVE(volume, volume_sma_20 * 1.5)");
    }

    #[test]
    fn display_builtins() {
        let operand = Operand::Max(
            Box::new(Operand::Abs(Box::new(Column::Macd.into()))),
            Box::new(Operand::Round(Box::new(Column::Close.into()))),
        );
        assert_eq!(operand.to_string(), "MAX(ABS(macd), ROUND(close))");
    }

    #[test]
    fn display_composites() {
        let rule = Rule::Or(vec![
            Rule::StopLoss(5.0),
            Rule::TakeProfit(12.5),
            Rule::CrossBelow {
                left: Column::Macd.into(),
                right: Column::MacdSignal.into(),
            },
        ]);
        assert_eq!(
            rule.to_string(),
            "OR(STOP_LOSS(5), TAKE_PROFIT(12.5), CROSS_BELOW(macd, macd_signal))"
        );
    }

    #[test]
    fn warmup_found_through_and() {
        let rule = Rule::And(vec![
            Rule::Warmup(200),
            Rule::And(vec![Rule::Warmup(50), Rule::Warmup(250)]),
        ]);
        assert_eq!(rule.warmup(), 250);
        assert_eq!(Rule::Or(vec![Rule::Warmup(10), Rule::StopLoss(1.0)]).warmup(), 0);
    }
}
