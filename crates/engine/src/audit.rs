use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use common::{
    DirectionScores, IndicatorSnapshot, Indicators, MovingAverages, Result, ScoredDecision,
    TimeFrame, Vote,
};

/// One scored decision as written to disk.
#[derive(Debug, Serialize)]
pub struct AuditRecord<'a> {
    pub symbol: &'a str,
    pub time_frame: TimeFrame,
    pub run_time: String,
    pub audit_id: String,
    pub leading: Vote,
    pub scores: DirectionScores,
    pub confidence: u32,
    pub reasoning: &'a [String],
    pub moving_averages: &'a MovingAverages,
    pub indicators: &'a Indicators,
}

/// Writes every scored decision as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{symbol}_{tf}_{leading}_{confidence}_{YYYY_MM_DD_HH_MM}.json`
    pub fn file_name(
        snapshot: &IndicatorSnapshot,
        decision: &ScoredDecision,
        at: DateTime<Utc>,
    ) -> String {
        format!(
            "{}_{}_{}_{}_{}.json",
            snapshot.symbol.to_lowercase(),
            snapshot.time_frame,
            decision.leading(),
            decision.confidence(),
            at.format("%Y_%m_%d_%H_%M")
        )
    }

    pub async fn write(
        &self,
        snapshot: &IndicatorSnapshot,
        decision: &ScoredDecision,
        at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let record = AuditRecord {
            symbol: &snapshot.symbol,
            time_frame: snapshot.time_frame,
            run_time: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            audit_id: format!("{}_{}", snapshot.symbol.to_lowercase(), &id[..8]),
            leading: decision.leading(),
            scores: decision.scores,
            confidence: decision.confidence(),
            reasoning: &decision.reasoning,
            moving_averages: &snapshot.moving_averages,
            indicators: &snapshot.indicators,
        };
        let mut json = serde_json::to_string_pretty(&record)?;
        json.push('\n');

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(snapshot, decision, at));
        tokio::fs::write(&path, json).await?;
        debug!(path = %path.display(), "Decision audit written");
        Ok(path)
    }

    /// Like [`write`](Self::write) but only logs failures.
    pub async fn record(
        &self,
        snapshot: &IndicatorSnapshot,
        decision: &ScoredDecision,
        at: DateTime<Utc>,
    ) {
        if let Err(e) = self.write(snapshot, decision, at).await {
            warn!(pair = %snapshot.symbol, error = %e, "Failed to write decision audit");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::{Indicator, MaRecommendation};

    fn snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            symbol: "EURUSD".into(),
            time_frame: TimeFrame::H1,
            moving_averages: MovingAverages {
                recommendation: Some(MaRecommendation::Buy),
                buy: 9,
                sell: 4,
                neutral: 2,
            },
            indicators: Indicators::new().with(Indicator::Rsi, 25.0),
        }
    }

    fn decision() -> ScoredDecision {
        ScoredDecision {
            reasoning: vec!["RSI is 25.0, indicating oversold conditions, potential BUY".into()],
            scores: DirectionScores { buy: 3, sell: 1, wait: 0 },
        }
    }

    #[test]
    fn file_name_carries_decision_summary() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap();
        assert_eq!(
            AuditLog::file_name(&snapshot(), &decision(), at),
            "eurusd_1h_BUY_75_2024_03_05_14_07.json"
        );
    }

    #[tokio::test]
    async fn writes_pretty_json_record() {
        let dir = std::env::temp_dir().join(format!("pipfarm-audit-{}", uuid::Uuid::new_v4()));
        let log = AuditLog::new(&dir);

        let path = log.write(&snapshot(), &decision(), Utc::now()).await.unwrap();
        assert_eq!(path.parent(), Some(log.dir()));
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["symbol"], "EURUSD");
        assert_eq!(value["time_frame"], "1h");
        assert_eq!(value["scores"]["BUY"], 3);
        assert_eq!(value["confidence"], 75);
        assert_eq!(value["indicators"]["RSI"], 25.0);
        assert_eq!(value["moving_averages"]["RECOMMENDATION"], "BUY");
        assert!(value["audit_id"].as_str().unwrap().starts_with("eurusd_"));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
