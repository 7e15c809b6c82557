use proptest::prelude::*;

use common::{Indicator, IndicatorSnapshot, Indicators, MaRecommendation, MovingAverages, TimeFrame};
use strategy::{score, ScoringPolicy};

fn recommendation() -> impl Strategy<Value = Option<MaRecommendation>> {
    prop_oneof![
        Just(None),
        Just(Some(MaRecommendation::StrongBuy)),
        Just(Some(MaRecommendation::Buy)),
        Just(Some(MaRecommendation::Neutral)),
        Just(Some(MaRecommendation::Sell)),
        Just(Some(MaRecommendation::StrongSell)),
        Just(Some(MaRecommendation::Other("ERROR".into()))),
    ]
}

/// Each indicator independently present (with a value in a wide range) or absent.
fn indicators() -> impl Strategy<Value = Indicators> {
    proptest::collection::vec(proptest::option::of(-500.0f64..500.0), Indicator::ALL.len()).prop_map(
        |values| {
            Indicator::ALL
                .into_iter()
                .zip(values)
                .filter_map(|(indicator, value)| value.map(|v| (indicator, v)))
                .collect()
        },
    )
}

fn snapshot(recommendation: Option<MaRecommendation>, indicators: Indicators) -> IndicatorSnapshot {
    IndicatorSnapshot {
        symbol: "EURUSD".into(),
        time_frame: TimeFrame::H1,
        moving_averages: MovingAverages {
            recommendation,
            buy: 8,
            sell: 4,
            neutral: 3,
        },
        indicators,
    }
}

proptest! {
    /// WAIT can only come from the aggregate recommendation, and only inside [0.3, 0.7].
    #[test]
    fn wait_only_from_neutral_aggregate(rec in recommendation(), ind in indicators()) {
        let decision = score(&snapshot(rec, ind.clone()));
        if decision.scores.wait > 0 {
            let agg = ind.get(Indicator::RecommendAll);
            prop_assert!(matches!(agg, Some(v) if (0.3..=0.7).contains(&v)));
        }
    }

    /// With close and P.SAR present and nothing else, exactly one side scores.
    #[test]
    fn parabolic_sar_always_picks_one_side(close in -10.0f64..10.0, sar in -10.0f64..10.0) {
        let ind = Indicators::new()
            .with(Indicator::Close, close)
            .with(Indicator::ParabolicSar, sar);
        let decision = score(&snapshot(None, ind));
        prop_assert_eq!(decision.scores.buy + decision.scores.sell, 1);
        prop_assert_eq!(decision.reasoning.len(), 1);
    }

    /// Reasoning never has more lines than there are rules, and scores are
    /// bounded by the sum of all weights.
    #[test]
    fn scores_are_bounded(rec in recommendation(), ind in indicators()) {
        let policy = ScoringPolicy::default();
        let decision = policy.score(&snapshot(rec, ind));
        prop_assert!(decision.reasoning.len() <= 12);
        let w = &policy.weights;
        let max = w.ma_recommendation + w.ema_cross + w.rsi + w.macd + w.bollinger
            + w.stochastic + w.ultimate_oscillator + w.cci + w.recommend_all + w.pivot
            + w.parabolic_sar;
        prop_assert!(decision.scores.total() <= max);
    }

    /// Scoring is a pure function of its input.
    #[test]
    fn scoring_is_deterministic(rec in recommendation(), ind in indicators()) {
        let s = snapshot(rec, ind);
        prop_assert_eq!(score(&s), score(&s));
    }
}

#[test]
fn all_absent_snapshot_is_empty() {
    let decision = score(&snapshot(None, Indicators::new()));
    assert!(decision.reasoning.is_empty());
    assert_eq!(decision.scores.total(), 0);
}
