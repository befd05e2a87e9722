//! Monthly income and expense forecasting.
//!
//! The monthly trend is turned into a regularly spaced series (months without rows are zero), and
//! a `Forecaster` projects income and expense independently. The built-in `SeasonalForecaster`
//! uses additive Holt-Winters when at least two full years of history exist and Holt's linear
//! trend otherwise. Smoothing parameters are picked by a coarse grid search on one-step-ahead
//! squared error.

use crate::error::{ErrorType, IntoResult, Res, Result};
use crate::model::MonthBucket;
use crate::report::MonthlyTrend;
use anyhow::{bail, ensure};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The largest horizon that may be requested, in months.
pub const MAX_HORIZON: usize = 48;

/// The horizon used when none is given.
pub const DEFAULT_HORIZON: usize = 12;

const SEASON: usize = 12;
const GRID: [f64; 5] = [0.1, 0.3, 0.5, 0.7, 0.9];

/// Projects a series forward.
pub trait Forecaster: Send + Sync {
    /// Returns exactly `horizon` predicted means following `history`.
    fn predict(&self, history: &[f64], horizon: usize) -> Res<Vec<f64>>;
}

/// A regularly spaced monthly series of income and expense totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySeries {
    pub months: Vec<MonthBucket>,
    pub income: Vec<Decimal>,
    pub expense: Vec<Decimal>,
}

impl MonthlySeries {
    /// Spans the first to the last month of `trend`, filling months without rows with zero.
    pub fn from_trend(trend: &[MonthlyTrend]) -> Self {
        let (Some(first), Some(last)) = (trend.first(), trend.last()) else {
            return Self {
                months: Vec::new(),
                income: Vec::new(),
                expense: Vec::new(),
            };
        };
        let months = first.month.range_inclusive(last.month);
        let mut income = Vec::with_capacity(months.len());
        let mut expense = Vec::with_capacity(months.len());
        for month in &months {
            match trend.iter().find(|row| row.month == *month) {
                Some(row) => {
                    income.push(row.income);
                    expense.push(row.expense);
                }
                None => {
                    income.push(Decimal::ZERO);
                    expense.push(Decimal::ZERO);
                }
            }
        }
        Self {
            months,
            income,
            expense,
        }
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Income minus expense for each month.
    pub fn balance(&self) -> Vec<Decimal> {
        self.income
            .iter()
            .zip(&self.expense)
            .map(|(i, e)| i - e)
            .collect()
    }
}

/// Which series the trends page draws.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastView {
    #[default]
    Overall,
    Income,
    Expense,
    Balance,
}

serde_plain::derive_display_from_serialize!(ForecastView);
serde_plain::derive_fromstr_from_deserialize!(ForecastView);

impl ForecastView {
    pub const ALL: [ForecastView; 4] = [
        ForecastView::Overall,
        ForecastView::Income,
        ForecastView::Expense,
        ForecastView::Balance,
    ];

    /// The label shown in the view selector.
    pub fn label(&self) -> &'static str {
        match self {
            ForecastView::Overall => "Comparativo Geral",
            ForecastView::Income => "Apenas Receitas",
            ForecastView::Expense => "Apenas Despesas",
            ForecastView::Balance => "Saldo Líquido",
        }
    }
}

/// The history and its projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub history: MonthlySeries,
    pub projection: MonthlySeries,
}

impl Forecast {
    pub fn projected_income(&self) -> Decimal {
        self.projection.income.iter().sum()
    }

    pub fn projected_expense(&self) -> Decimal {
        self.projection.expense.iter().sum()
    }

    pub fn projected_balance(&self) -> Decimal {
        self.projected_income() - self.projected_expense()
    }
}

/// Forecasts income and expense `horizon` months past the end of `trend`.
///
/// Fails with a `Validation` error when the horizon is outside `1..=48` or when the history has
/// fewer than two months.
pub fn forecast(
    trend: &[MonthlyTrend],
    horizon: usize,
    forecaster: &dyn Forecaster,
) -> Result<Forecast> {
    forecast_inner(trend, horizon, forecaster).pub_result(ErrorType::Validation)
}

fn forecast_inner(
    trend: &[MonthlyTrend],
    horizon: usize,
    forecaster: &dyn Forecaster,
) -> Res<Forecast> {
    ensure!(
        (1..=MAX_HORIZON).contains(&horizon),
        "The forecast horizon must be between 1 and {MAX_HORIZON} months, got {horizon}"
    );
    let history = MonthlySeries::from_trend(trend);
    ensure!(
        history.len() >= 2,
        "At least two months of history are needed to forecast, found {}",
        history.len()
    );

    let income = forecaster.predict(&to_f64(&history.income), horizon)?;
    let expense = forecaster.predict(&to_f64(&history.expense), horizon)?;
    ensure!(
        income.len() == horizon && expense.len() == horizon,
        "The forecaster returned the wrong number of points"
    );

    let mut months = Vec::with_capacity(horizon);
    // history is non-empty here
    let mut month = history.months[history.len() - 1];
    for _ in 0..horizon {
        month = month.next();
        months.push(month);
    }

    Ok(Forecast {
        projection: MonthlySeries {
            months,
            income: to_cents(&income)?,
            expense: to_cents(&expense)?,
        },
        history,
    })
}

fn to_f64(values: &[Decimal]) -> Vec<f64> {
    values.iter().map(|d| d.to_f64().unwrap_or_default()).collect()
}

fn to_cents(values: &[f64]) -> Res<Vec<Decimal>> {
    values
        .iter()
        .map(|v| match Decimal::from_f64(v.max(0.0)) {
            Some(d) => Ok(d.round_dp(2)),
            None => bail!("The forecaster produced a non-finite value: {v}"),
        })
        .collect()
}

/// Additive Holt-Winters with a 12-month season, falling back to Holt's linear trend when there
/// are fewer than two full seasons of history.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeasonalForecaster;

impl Forecaster for SeasonalForecaster {
    fn predict(&self, history: &[f64], horizon: usize) -> Res<Vec<f64>> {
        ensure!(
            history.len() >= 2,
            "At least two points are needed to forecast"
        );
        if history.len() >= 2 * SEASON {
            Ok(best_holt_winters(history).project(horizon))
        } else {
            Ok(best_holt(history).project(horizon))
        }
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    level: f64,
    trend: f64,
    /// One full season of seasonal terms, oldest first, or empty for Holt's linear trend.
    seasonal: Vec<f64>,
    sse: f64,
}

impl Fitted {
    fn project(&self, horizon: usize) -> Vec<f64> {
        (1..=horizon)
            .map(|h| {
                let seasonal = if self.seasonal.is_empty() {
                    0.0
                } else {
                    self.seasonal[(h - 1) % self.seasonal.len()]
                };
                self.level + h as f64 * self.trend + seasonal
            })
            .collect()
    }
}

fn best_holt(y: &[f64]) -> Fitted {
    let mut best: Option<Fitted> = None;
    for alpha in GRID {
        for beta in GRID {
            let fitted = holt(y, alpha, beta);
            if best.as_ref().map_or(true, |b| fitted.sse < b.sse) {
                best = Some(fitted);
            }
        }
    }
    // GRID is non-empty
    best.unwrap_or_else(|| holt(y, GRID[0], GRID[0]))
}

fn holt(y: &[f64], alpha: f64, beta: f64) -> Fitted {
    let mut level = y[0];
    let mut trend = y[1] - y[0];
    let mut sse = 0.0;
    for &value in &y[1..] {
        let predicted = level + trend;
        sse += (value - predicted).powi(2);
        let previous = level;
        level = alpha * value + (1.0 - alpha) * (level + trend);
        trend = beta * (level - previous) + (1.0 - beta) * trend;
    }
    Fitted {
        level,
        trend,
        seasonal: Vec::new(),
        sse,
    }
}

fn best_holt_winters(y: &[f64]) -> Fitted {
    let mut best: Option<Fitted> = None;
    for alpha in GRID {
        for beta in GRID {
            for gamma in GRID {
                let fitted = holt_winters(y, alpha, beta, gamma);
                if best.as_ref().map_or(true, |b| fitted.sse < b.sse) {
                    best = Some(fitted);
                }
            }
        }
    }
    best.unwrap_or_else(|| holt_winters(y, GRID[0], GRID[0], GRID[0]))
}

fn holt_winters(y: &[f64], alpha: f64, beta: f64, gamma: f64) -> Fitted {
    let m = SEASON;
    let first_mean = mean(&y[..m]);
    let second_mean = mean(&y[m..2 * m]);
    let mut level = first_mean;
    let mut trend = (second_mean - first_mean) / m as f64;
    let mut seasonal: Vec<f64> = y[..m].iter().map(|v| v - first_mean).collect();
    let mut sse = 0.0;

    for (t, &value) in y.iter().enumerate().skip(m) {
        let season_ix = t % m;
        let predicted = level + trend + seasonal[season_ix];
        sse += (value - predicted).powi(2);
        let previous = level;
        level = alpha * (value - seasonal[season_ix]) + (1.0 - alpha) * (level + trend);
        trend = beta * (level - previous) + (1.0 - beta) * trend;
        seasonal[season_ix] = gamma * (value - level) + (1.0 - gamma) * seasonal[season_ix];
    }

    // Rotate so that index 0 is the season of the first projected month
    let next = y.len() % m;
    seasonal.rotate_left(next);
    Fitted {
        level,
        trend,
        seasonal,
        sse,
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
