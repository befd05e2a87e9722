//! SVG charts rendered with plotters.

use crate::error::Res;
use crate::forecast::{Forecast, ForecastView};
use crate::model::MonthBucket;
use crate::report::MonthlyTrend;
use plotters::element::Pie;
use plotters::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

const WIDTH: u32 = 860;
const HEIGHT: u32 = 380;
const FONT: &str = "sans-serif";

const INCOME_COLOR: RGBColor = RGBColor(46, 204, 113);
const EXPENSE_COLOR: RGBColor = RGBColor(231, 76, 60);
const BALANCE_COLOR: RGBColor = RGBColor(7, 94, 178);
const GRID_COLOR: RGBColor = RGBColor(235, 235, 235);

const PALETTE: [RGBColor; 8] = [
    RGBColor(7, 94, 178),
    RGBColor(231, 76, 60),
    RGBColor(243, 156, 18),
    RGBColor(142, 68, 173),
    RGBColor(22, 160, 133),
    RGBColor(127, 140, 141),
    RGBColor(211, 84, 0),
    RGBColor(41, 128, 185),
];

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// A y-range that holds every value and zero, with some headroom.
fn y_range(values: impl IntoIterator<Item = f64>) -> std::ops::Range<f64> {
    let (min, max) = values
        .into_iter()
        .fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = (max - min).max(1.0);
    let low = if min < 0.0 { min - span * 0.1 } else { 0.0 };
    low..max + span * 0.1
}

fn month_label(months: &[MonthBucket], value: &SegmentValue<i32>) -> String {
    match value {
        SegmentValue::CenterOf(ix) => usize::try_from(*ix)
            .ok()
            .and_then(|ix| months.get(ix))
            .map(|m| m.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// An empty chart with a centered message.
fn no_data(title: &str) -> Res<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT / 2)).into_drawing_area();
        root.fill(&WHITE)?;
        let style = TextStyle::from((FONT, 16).into_font()).color(&BLACK);
        root.draw(&Text::new(
            format!("{title}: sem dados"),
            (20, (HEIGHT / 4) as i32),
            style,
        ))?;
        root.present()?;
    }
    Ok(svg)
}

/// A pie of expense totals per principal category.
pub fn expense_pie(totals: &[(String, Decimal)]) -> Res<String> {
    let title = "Despesas por categoria";
    let sizes: Vec<f64> = totals.iter().map(|(_, total)| to_f64(*total)).collect();
    if sizes.iter().sum::<f64>() <= 0.0 {
        return no_data(title);
    }
    let labels: Vec<String> = totals.iter().map(|(name, _)| name.clone()).collect();
    let colors: Vec<RGBColor> = (0..sizes.len()).map(|i| PALETTE[i % PALETTE.len()]).collect();

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;
        let root = root.titled(title, (FONT, 20))?;
        let (w, h) = root.dim_in_pixel();
        let center = ((w / 2) as i32, (h / 2) as i32);
        let radius = f64::from(h.min(w)) * 0.35;
        let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
        pie.label_style((FONT, 13).into_font().color(&BLACK));
        pie.percentages((FONT, 12).into_font().color(&WHITE));
        root.draw(&pie)?;
        root.present()?;
    }
    Ok(svg)
}

/// Side-by-side income and expense bars for every month.
pub fn trend_bars(trend: &[MonthlyTrend]) -> Res<String> {
    let title = "Receitas x Despesas por mês";
    if trend.is_empty() {
        return no_data(title);
    }
    let months: Vec<MonthBucket> = trend.iter().map(|row| row.month).collect();
    let n = i32::try_from(trend.len())?;
    let range = y_range(
        trend
            .iter()
            .flat_map(|row| [to_f64(row.income), to_f64(row.expense)]),
    );

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT, 20))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d((0..n).into_segmented(), range)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .bold_line_style(GRID_COLOR)
            .light_line_style(WHITE)
            .x_labels(trend.len())
            .x_label_formatter(&|v| month_label(&months, v))
            .y_label_formatter(&|v| format!("R$ {v:.0}"))
            .draw()?;

        chart
            .draw_series(trend.iter().zip(0..n).map(|(row, ix)| {
                Rectangle::new(
                    [
                        (SegmentValue::Exact(ix), 0.0),
                        (SegmentValue::CenterOf(ix), to_f64(row.income)),
                    ],
                    INCOME_COLOR.filled(),
                )
            }))?
            .label("Receita")
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], INCOME_COLOR.filled()));
        chart
            .draw_series(trend.iter().zip(0..n).map(|(row, ix)| {
                Rectangle::new(
                    [
                        (SegmentValue::CenterOf(ix), 0.0),
                        (SegmentValue::Exact(ix + 1), to_f64(row.expense)),
                    ],
                    EXPENSE_COLOR.filled(),
                )
            }))?
            .label("Despesa")
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], EXPENSE_COLOR.filled()));

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(GRID_COLOR)
            .draw()?;
        root.present()?;
    }
    Ok(svg)
}

/// Income, expense and balance lines over the months of the trend.
pub fn trend_lines(trend: &[MonthlyTrend]) -> Res<String> {
    let title = "Evolução mensal";
    if trend.is_empty() {
        return no_data(title);
    }
    let months: Vec<MonthBucket> = trend.iter().map(|row| row.month).collect();
    let series = [
        ("Receita", INCOME_COLOR, trend.iter().map(|r| to_f64(r.income)).collect::<Vec<_>>()),
        ("Despesa", EXPENSE_COLOR, trend.iter().map(|r| to_f64(r.expense)).collect()),
        ("Saldo", BALANCE_COLOR, trend.iter().map(|r| to_f64(r.balance)).collect()),
    ];
    lines(title, &months, &series, &[])
}

/// The history and projection of the series selected by `view`.
pub fn forecast_lines(forecast: &Forecast, view: ForecastView) -> Res<String> {
    let history = &forecast.history;
    let projection = &forecast.projection;
    let months: Vec<MonthBucket> = history
        .months
        .iter()
        .chain(&projection.months)
        .copied()
        .collect();
    let pick = |name: &'static str, color: RGBColor, past: Vec<Decimal>, future: Vec<Decimal>| {
        (
            (name, color, past.into_iter().map(to_f64).collect::<Vec<_>>()),
            (name, color, future.into_iter().map(to_f64).collect::<Vec<_>>()),
        )
    };
    let chosen = match view {
        ForecastView::Overall => vec![
            pick("Receita", INCOME_COLOR, history.income.clone(), projection.income.clone()),
            pick("Despesa", EXPENSE_COLOR, history.expense.clone(), projection.expense.clone()),
        ],
        ForecastView::Income => vec![pick(
            "Receita",
            INCOME_COLOR,
            history.income.clone(),
            projection.income.clone(),
        )],
        ForecastView::Expense => vec![pick(
            "Despesa",
            EXPENSE_COLOR,
            history.expense.clone(),
            projection.expense.clone(),
        )],
        ForecastView::Balance => vec![pick(
            "Saldo",
            BALANCE_COLOR,
            history.balance(),
            projection.balance(),
        )],
    };
    let (observed, projected): (Vec<Line<'_>>, Vec<Line<'_>>) = chosen.into_iter().unzip();
    lines(view.label(), &months, &observed, &projected)
}

type Line<'a> = (&'a str, RGBColor, Vec<f64>);

/// Draws `observed` from the first month and `projected` right after the last observed month,
/// joined to it.
fn lines(title: &str, months: &[MonthBucket], observed: &[Line<'_>], projected: &[Line<'_>]) -> Res<String> {
    let n = i32::try_from(months.len())?;
    let range = y_range(
        observed
            .iter()
            .chain(projected)
            .flat_map(|(_, _, values)| values.iter().copied()),
    );

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT, 20))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d((0..n).into_segmented(), range)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .bold_line_style(GRID_COLOR)
            .light_line_style(WHITE)
            .x_labels(months.len().min(12))
            .x_label_formatter(&|v| month_label(months, v))
            .y_label_formatter(&|v| format!("R$ {v:.0}"))
            .draw()?;

        for (name, color, values) in observed {
            let color = *color;
            let points: Vec<(SegmentValue<i32>, f64)> = (0..n)
                .zip(values.iter().copied())
                .map(|(ix, v)| (SegmentValue::CenterOf(ix), v))
                .collect();
            chart
                .draw_series(LineSeries::new(points.clone(), color.stroke_width(3)))?
                .label(*name)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));
            chart.draw_series(points.into_iter().map(|p| Circle::new(p, 3, color.filled())))?;
        }

        for ((name, color, values), (_, _, past)) in projected.iter().zip(observed) {
            let color = color.mix(0.5);
            let start = i32::try_from(past.len())?;
            // join the projection to the last observed point
            let joint = past
                .last()
                .map(|v| (SegmentValue::CenterOf(start - 1), *v));
            let points: Vec<(SegmentValue<i32>, f64)> = joint
                .into_iter()
                .chain(
                    (start..n)
                        .zip(values.iter().copied())
                        .map(|(ix, v)| (SegmentValue::CenterOf(ix), v)),
                )
                .collect();
            chart
                .draw_series(LineSeries::new(points, color.stroke_width(2)))?
                .label(format!("{name} (previsão)"))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(GRID_COLOR)
            .draw()?;
        root.present()?;
    }
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{forecast, SeasonalForecaster};
    use std::str::FromStr;

    fn trend() -> Vec<MonthlyTrend> {
        ["Jan/2024", "Feb/2024", "Mar/2024"]
            .iter()
            .zip([("1000", "300"), ("1000", "400"), ("1100", "350")])
            .map(|(month, (income, expense))| {
                let income = Decimal::from_str(income).unwrap();
                let expense = Decimal::from_str(expense).unwrap();
                MonthlyTrend {
                    month: month.parse().unwrap(),
                    income,
                    expense,
                    balance: income - expense,
                }
            })
            .collect()
    }

    #[test]
    fn test_y_range() {
        let r = y_range([10.0, 100.0]);
        assert_eq!(r.start, 0.0);
        assert!(r.end > 100.0);
        let r = y_range([-50.0, 100.0]);
        assert!(r.start < -50.0);
        let r = y_range(Vec::new());
        assert_eq!(r.start, 0.0);
        assert!(r.end > 0.0);
    }

    #[test]
    fn test_month_label() {
        let months: Vec<MonthBucket> = trend().iter().map(|r| r.month).collect();
        assert_eq!(month_label(&months, &SegmentValue::CenterOf(1)), "Feb/2024");
        assert_eq!(month_label(&months, &SegmentValue::CenterOf(7)), "");
        assert_eq!(month_label(&months, &SegmentValue::Exact(0)), "");
    }

    #[test]
    fn test_charts_render_svg() {
        let trend = trend();
        for svg in [trend_bars(&trend).unwrap(), trend_lines(&trend).unwrap()] {
            assert!(svg.contains("<svg"), "{svg}");
            assert!(svg.contains("Jan/2024"));
        }
        let pie = expense_pie(&[
            ("Housing/Bills".to_string(), Decimal::from(700)),
            ("Health".to_string(), Decimal::from(50)),
        ])
        .unwrap();
        assert!(pie.contains("Housing/Bills"));
    }

    #[test]
    fn test_empty_charts_render_placeholder() {
        assert!(trend_bars(&[]).unwrap().contains("sem dados"));
        assert!(expense_pie(&[]).unwrap().contains("sem dados"));
    }

    #[test]
    fn test_forecast_chart() {
        let result = forecast(&trend(), 3, &SeasonalForecaster).unwrap();
        for view in ForecastView::ALL {
            let svg = forecast_lines(&result, view).unwrap();
            assert!(svg.contains("previsão"), "{view}");
        }
    }
}
