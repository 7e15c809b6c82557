use std::collections::HashMap;

use common::{Indicator, Indicators, MaRecommendation, MovingAverages, TimeFrame};

/// Moving-average columns that vote in the MA summary.
pub const MA_COLUMNS: [&str; 15] = [
    "EMA10",
    "SMA10",
    "EMA20",
    "SMA20",
    "EMA30",
    "SMA30",
    "EMA50",
    "SMA50",
    "EMA100",
    "SMA100",
    "EMA200",
    "SMA200",
    "Ichimoku.BLine",
    "VWMA",
    "HullMA9",
];

/// Aggregate moving-average rating, in [-1, 1].
pub const RECOMMEND_MA: &str = "Recommend.MA";

/// Column suffix selecting the candle interval. Daily is the scanner's
/// default and carries no suffix.
pub fn interval_suffix(time_frame: TimeFrame) -> &'static str {
    match time_frame {
        TimeFrame::M1 => "|1",
        TimeFrame::M5 => "|5",
        TimeFrame::M15 => "|15",
        TimeFrame::M30 => "|30",
        TimeFrame::H1 => "|60",
        TimeFrame::H2 => "|120",
        TimeFrame::H4 => "|240",
        TimeFrame::D1 => "",
        TimeFrame::W1 => "|1W",
        TimeFrame::Mo1 => "|1M",
    }
}

/// Unsuffixed column names requested for every snapshot, without duplicates.
/// Response values come back in this order.
pub fn base_columns() -> Vec<&'static str> {
    let mut columns: Vec<&'static str> = Indicator::ALL.iter().map(|i| i.column()).collect();
    for column in MA_COLUMNS.into_iter().chain([RECOMMEND_MA]) {
        if !columns.contains(&column) {
            columns.push(column);
        }
    }
    columns
}

/// Column names with the interval suffix applied.
pub fn request_columns(time_frame: TimeFrame) -> Vec<String> {
    let suffix = interval_suffix(time_frame);
    base_columns()
        .into_iter()
        .map(|c| format!("{c}{suffix}"))
        .collect()
}

/// Bucket a `Recommend.MA` value into a categorical rating.
pub fn recommendation(value: f64) -> MaRecommendation {
    match value {
        v if (-1.0..-0.5).contains(&v) => MaRecommendation::StrongSell,
        v if (-0.5..-0.1).contains(&v) => MaRecommendation::Sell,
        v if (-0.1..=0.1).contains(&v) => MaRecommendation::Neutral,
        v if v > 0.1 && v <= 0.5 => MaRecommendation::Buy,
        v if v > 0.5 && v <= 1.0 => MaRecommendation::StrongBuy,
        _ => MaRecommendation::Other("ERROR".into()),
    }
}

/// Split raw column values into the moving-average bundle and the indicator
/// readings the scorer consumes.
pub fn summarize(values: &HashMap<&str, f64>) -> (MovingAverages, Indicators) {
    let close = values.get(Indicator::Close.column()).copied();

    let mut ma = MovingAverages {
        recommendation: values.get(RECOMMEND_MA).map(|v| recommendation(*v)),
        ..MovingAverages::default()
    };
    if let Some(close) = close {
        for column in MA_COLUMNS {
            match values.get(column) {
                Some(v) if *v < close => ma.buy += 1,
                Some(v) if *v > close => ma.sell += 1,
                Some(_) => ma.neutral += 1,
                None => {}
            }
        }
    }

    let indicators = Indicator::ALL
        .into_iter()
        .filter_map(|i| values.get(i.column()).map(|v| (i, *v)))
        .collect();

    (ma, indicators)
}
