use tracing::debug;

use common::Candidate;

/// Pick the single best candidate.
///
/// The highest trade score wins; on equal scores the earliest candidate is
/// kept. Returns `None` when the winner scores below `min_score` or there
/// are no candidates. Order-stable: the same input sequence always yields
/// the same result.
pub fn select_best<I>(candidates: I, min_score: u32) -> Option<Candidate>
where
    I: IntoIterator<Item = Candidate>,
{
    let mut best: Option<Candidate> = None;

    for candidate in candidates {
        debug!(
            pair = %candidate.symbol(),
            time_frame = %candidate.time_frame,
            score = candidate.score,
            direction = %candidate.direction,
            reasoning = %candidate.reasoning.join(", "),
            "Candidate"
        );
        let replace = match &best {
            Some(current) => candidate.score > current.score,
            None => true,
        };
        if replace {
            best = Some(candidate);
        }
    }

    best.filter(|c| c.score >= min_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{
        Direction, DirectionScores, Indicators, Instrument, MarketKind, ScoredDecision, TimeFrame,
    };

    fn candidate(symbol: &str, buy: u32, sell: u32) -> Candidate {
        let instrument = Instrument {
            symbol: symbol.into(),
            category: "forex".into(),
            kind: MarketKind::Forex,
            screener: "forex".into(),
            exchange: "FX_IDC".into(),
        };
        let decision = ScoredDecision {
            reasoning: Vec::new(),
            scores: DirectionScores { buy, sell, wait: 0 },
        };
        Candidate::new(instrument, TimeFrame::H1, decision, Indicators::new())
    }

    #[test]
    fn highest_score_wins() {
        let best = select_best(
            vec![candidate("EURUSD", 2, 1), candidate("GBPJPY", 1, 6), candidate("AUDUSD", 4, 0)],
            3,
        )
        .unwrap();
        assert_eq!(best.symbol(), "GBPJPY");
        assert_eq!(best.direction, Direction::Sell);
        assert_eq!(best.score, 6);
    }

    #[test]
    fn first_seen_wins_ties() {
        let best = select_best(
            vec![candidate("EURUSD", 5, 0), candidate("GBPJPY", 0, 5), candidate("AUDUSD", 5, 5)],
            1,
        )
        .unwrap();
        assert_eq!(best.symbol(), "EURUSD");
    }

    #[test]
    fn below_min_score_selects_nothing() {
        assert!(select_best(vec![candidate("EURUSD", 3, 1)], 4).is_none());
    }

    #[test]
    fn empty_input_selects_nothing() {
        assert!(select_best(Vec::new(), 0).is_none());
    }

    #[test]
    fn selection_is_deterministic() {
        let input = vec![candidate("EURUSD", 3, 3), candidate("USDJPY", 2, 3), candidate("GBPUSD", 3, 0)];
        let a = select_best(input.clone(), 1).map(|c| c.instrument.symbol);
        let b = select_best(input, 1).map(|c| c.instrument.symbol);
        assert_eq!(a, b);
        assert_eq!(a.as_deref(), Some("EURUSD"));
    }
}
