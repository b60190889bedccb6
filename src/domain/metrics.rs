//! Performance analytics over a finished simulation.
//!
//! Units: returns, drawdown, win rate, averages, expectancy, VaR/CVaR and
//! Kelly are in percent. Ratios are plain numbers. Per-bar returns come from
//! consecutive equity points.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::fmt;

use crate::domain::position::Trade;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const SIGNIFICANCE_LEVEL: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityGrade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl QualityGrade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => QualityGrade::APlus,
            s if s >= 80.0 => QualityGrade::A,
            s if s >= 70.0 => QualityGrade::B,
            s if s >= 60.0 => QualityGrade::C,
            s if s >= 50.0 => QualityGrade::D,
            _ => QualityGrade::F,
        }
    }
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityGrade::APlus => "A+",
            QualityGrade::A => "A",
            QualityGrade::B => "B",
            QualityGrade::C => "C",
            QualityGrade::D => "D",
            QualityGrade::F => "F",
        })
    }
}

/// The seven bounded sub-scores behind the composite.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub returns: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub win_rate: f64,
    pub drawdown: f64,
    pub consistency: f64,
    pub trade_count: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.returns
            + self.sharpe
            + self.sortino
            + self.win_rate
            + self.drawdown
            + self.consistency
            + self.trade_count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub calmar_ratio: f64,
    pub omega_ratio: f64,
    pub recovery_factor: f64,
    pub ulcer_index: f64,
    pub var_95: f64,
    pub cvar_95: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub net_profit: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub kelly_criterion: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub t_statistic: f64,
    pub p_value: f64,
    pub is_significant: bool,
    pub final_equity: f64,
    pub score_breakdown: ScoreBreakdown,
    pub composite_score: f64,
    pub quality_grade: QualityGrade,
}

impl Metrics {
    /// The defined result for a run without trades: zeros and grade F.
    pub fn degenerate(final_equity: f64) -> Self {
        Metrics {
            total_return: 0.0,
            annualized_return: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            max_drawdown: 0.0,
            calmar_ratio: 0.0,
            omega_ratio: 0.0,
            recovery_factor: 0.0,
            ulcer_index: 0.0,
            var_95: 0.0,
            cvar_95: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            gross_profit: 0.0,
            gross_loss: 0.0,
            net_profit: 0.0,
            profit_factor: 0.0,
            expectancy: 0.0,
            kelly_criterion: 0.0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
            t_statistic: 0.0,
            p_value: 1.0,
            is_significant: false,
            final_equity,
            score_breakdown: ScoreBreakdown::default(),
            composite_score: 0.0,
            quality_grade: QualityGrade::F,
        }
    }

    pub fn compute(trades: &[Trade], equity_curve: &[f64], initial_capital: f64) -> Self {
        let final_equity = equity_curve.last().copied().unwrap_or(initial_capital);
        if trades.is_empty() {
            return Metrics::degenerate(final_equity);
        }

        let returns = per_bar_returns(equity_curve);

        let total_return = if initial_capital > 0.0 {
            (final_equity / initial_capital - 1.0) * 100.0
        } else {
            0.0
        };
        let annualized_return = finite_or_zero(annualized(initial_capital, final_equity, returns.len()));

        let sharpe_ratio = scaled_ratio(mean(&returns), sample_std(&returns));
        let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        let sortino_ratio = scaled_ratio(mean(&returns), sample_std(&downside));

        let drawdowns = drawdown_series(equity_curve);
        let max_drawdown = drawdowns.iter().copied().fold(0.0_f64, f64::min) * 100.0;
        let ulcer_index = if drawdowns.is_empty() {
            0.0
        } else {
            (drawdowns.iter().map(|d| d * d).sum::<f64>() / drawdowns.len() as f64).sqrt() * 100.0
        };
        let calmar_ratio = if max_drawdown < 0.0 {
            finite_or_zero(annualized_return / max_drawdown.abs())
        } else {
            0.0
        };

        let upside: f64 = returns.iter().filter(|r| **r > 0.0).sum();
        let downside_sum: f64 = returns.iter().filter(|r| **r < 0.0).sum::<f64>().abs();
        let omega_ratio = if downside_sum > 0.0 { upside / downside_sum } else { 0.0 };

        let (var_95, cvar_95) = value_at_risk(&returns);

        let total_trades = trades.len();
        let (winners, losers): (Vec<&Trade>, Vec<&Trade>) = trades.iter().partition(|t| t.is_win());
        let winning_trades = winners.len();
        let losing_trades = losers.len();
        let gross_profit: f64 = winners.iter().map(|t| t.profit).sum();
        let gross_loss: f64 = losers.iter().map(|t| t.profit).sum::<f64>().abs();
        let net_profit: f64 = trades.iter().map(|t| t.profit).sum();
        let profit_factor = if gross_loss > 0.0 { gross_profit / gross_loss } else { 0.0 };

        let win_prob = winning_trades as f64 / total_trades as f64;
        let loss_prob = losing_trades as f64 / total_trades as f64;
        let win_rate = win_prob * 100.0;
        let avg_win = average(winners.iter().map(|t| t.return_pct));
        let avg_loss = average(losers.iter().map(|t| t.return_pct));
        let expectancy = win_prob * avg_win + loss_prob * avg_loss;
        let kelly_criterion = kelly(win_prob, loss_prob, avg_win, avg_loss);

        let recovery_factor = if max_drawdown < 0.0 && initial_capital > 0.0 {
            finite_or_zero(net_profit / (max_drawdown.abs() * initial_capital / 100.0))
        } else {
            0.0
        };

        let (max_consecutive_wins, max_consecutive_losses) = consecutive_runs(trades);
        let (t_statistic, p_value) = t_test(&returns);

        let score_breakdown = ScoreBreakdown {
            returns: bounded(annualized_return / 30.0 * 20.0, 20.0),
            sharpe: bounded(sharpe_ratio / 2.0 * 15.0, 15.0),
            sortino: bounded(sortino_ratio / 3.0 * 10.0, 10.0),
            win_rate: bounded(win_rate / 70.0 * 15.0, 15.0),
            drawdown: bounded(20.0 * (1.0 - max_drawdown.abs() / 50.0), 20.0),
            consistency: bounded(expectancy / 2.0 * 10.0, 10.0),
            trade_count: bounded(total_trades as f64 / 30.0 * 10.0, 10.0),
        };
        let composite_score = score_breakdown.total().clamp(0.0, 100.0);

        Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            calmar_ratio,
            omega_ratio,
            recovery_factor,
            ulcer_index,
            var_95,
            cvar_95,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            avg_win,
            avg_loss,
            gross_profit,
            gross_loss,
            net_profit,
            profit_factor,
            expectancy,
            kelly_criterion,
            max_consecutive_wins,
            max_consecutive_losses,
            t_statistic,
            p_value,
            is_significant: p_value < SIGNIFICANCE_LEVEL,
            final_equity,
            score_breakdown,
            composite_score,
            quality_grade: QualityGrade::from_score(composite_score),
        }
    }
}

pub fn per_bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn annualized(initial: f64, final_equity: f64, bars: usize) -> f64 {
    if bars == 0 || initial <= 0.0 {
        return 0.0;
    }
    if final_equity <= 0.0 {
        return -100.0;
    }
    ((final_equity / initial).powf(TRADING_DAYS_PER_YEAR / bars as f64) - 1.0) * 100.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.mean()
}

/// Sample standard deviation; NaN below two observations.
fn sample_std(values: &[f64]) -> f64 {
    values.std_dev()
}

/// Annualized mean/std ratio, 0 when the deviation is zero or undefined.
fn scaled_ratio(mean: f64, std: f64) -> f64 {
    if std.is_finite() && std > 0.0 {
        finite_or_zero(mean / std * TRADING_DAYS_PER_YEAR.sqrt())
    } else {
        0.0
    }
}

/// Fractional drawdown from the running peak at each point, all ≤ 0.
fn drawdown_series(equity_curve: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity_curve
        .iter()
        .map(|&e| {
            peak = peak.max(e);
            if peak > 0.0 { (e - peak) / peak } else { 0.0 }
        })
        .collect()
}

fn value_at_risk(returns: &[f64]) -> (f64, f64) {
    if returns.is_empty() {
        return (0.0, 0.0);
    }
    let var = Data::new(returns.to_vec()).percentile(5);
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
    let cvar = if tail.is_empty() { var } else { tail.mean() };
    (finite_or_zero(var * 100.0), finite_or_zero(cvar * 100.0))
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn kelly(win_prob: f64, loss_prob: f64, avg_win: f64, avg_loss: f64) -> f64 {
    if avg_win == 0.0 || avg_loss == 0.0 {
        return 0.0;
    }
    let ratio = (avg_win / avg_loss).abs();
    finite_or_zero((win_prob - loss_prob / ratio) * 100.0).clamp(0.0, 100.0)
}

fn consecutive_runs(trades: &[Trade]) -> (usize, usize) {
    let mut max_wins = 0;
    let mut max_losses = 0;
    let mut cur_wins = 0;
    let mut cur_losses = 0;

    for trade in trades {
        if trade.is_win() {
            cur_wins += 1;
            cur_losses = 0;
            max_wins = max_wins.max(cur_wins);
        } else {
            cur_losses += 1;
            cur_wins = 0;
            max_losses = max_losses.max(cur_losses);
        }
    }

    (max_wins, max_losses)
}

/// One-sample two-sided t-test of the returns against zero.
fn t_test(returns: &[f64]) -> (f64, f64) {
    let n = returns.len();
    if n < 2 {
        return (0.0, 1.0);
    }
    let std = sample_std(returns);
    if !(std.is_finite() && std > 0.0) {
        return (0.0, 1.0);
    }
    let t = mean(returns) / (std / (n as f64).sqrt());
    match StudentsT::new(0.0, 1.0, (n - 1) as f64) {
        Ok(dist) if t.is_finite() => (t, (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0)),
        _ => (0.0, 1.0),
    }
}

fn bounded(value: f64, max: f64) -> f64 {
    finite_or_zero(value).clamp(0.0, max)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
