//! Row model for the `ic_signals` audit table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use condor_core::Signal;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// One persisted scan result.
///
/// Scalar columns are denormalized from the signal for querying; `payload`
/// is the complete serialized [`Signal`] and is the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IcSignalRecord {
    /// Auto-generated ID (absent for new records)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[sqlx(default)]
    pub id: Option<i64>,
    pub scan_id: Uuid,
    pub bot: String,
    pub ticker: String,
    pub created_at: DateTime<Utc>,
    /// Signal source tag, e.g. `SD_1.2` or `BLOCKED_STALE_DATA`
    pub source: String,
    pub is_valid: bool,
    pub spot: Option<f64>,
    pub vix: Option<f64>,
    pub expected_move: Option<f64>,
    pub put_long: Option<f64>,
    pub put_short: Option<f64>,
    pub call_short: Option<f64>,
    pub call_long: Option<f64>,
    pub total_credit: Option<f64>,
    pub pricing_source: Option<String>,
    pub max_loss: Option<Decimal>,
    pub contracts: i32,
    pub win_probability: f64,
    pub confidence: f64,
    pub prediction_source: Option<String>,
    pub advice: Option<String>,
    pub direction: Option<String>,
    pub reasoning: String,
    pub payload: JsonValue,
}

impl IcSignalRecord {
    /// Flattens a signal into a row.
    ///
    /// # Errors
    /// Returns an error if the signal cannot be serialized.
    pub fn from_signal(signal: &Signal) -> Result<Self> {
        let payload = serde_json::to_value(signal).context("serializing signal payload")?;
        let strikes = signal.strikes.as_ref();
        let snapshot = signal.snapshot.as_ref();
        let pricing = signal.pricing.as_ref();

        Ok(Self {
            id: None,
            scan_id: signal.scan_id,
            bot: signal.bot.clone(),
            ticker: signal.ticker.clone(),
            created_at: signal.created_at,
            source: signal.source.tag(),
            is_valid: signal.is_valid,
            spot: snapshot.map(|s| s.spot),
            vix: snapshot.map(|s| s.vix),
            expected_move: signal.expected_move,
            put_long: strikes.map(|s| s.put_long()),
            put_short: strikes.map(|s| s.put_short()),
            call_short: strikes.map(|s| s.call_short()),
            call_long: strikes.map(|s| s.call_long()),
            total_credit: pricing.map(|p| p.total_credit),
            pricing_source: pricing.map(|p| p.source.as_str().to_string()),
            max_loss: pricing.map(|p| p.max_loss),
            contracts: i32::try_from(signal.contracts).unwrap_or(i32::MAX),
            win_probability: signal.effective_win_probability,
            confidence: signal.confidence,
            prediction_source: signal.prediction_source.map(|k| k.to_string()),
            advice: signal.advice.as_ref().map(|a| a.as_str().to_string()),
            direction: signal.direction.map(|d| d.to_string()),
            reasoning: signal.reasoning.clone(),
            payload,
        })
    }

    /// Rebuilds the full signal from the JSON payload.
    ///
    /// # Errors
    /// Returns an error if the payload does not decode as a signal.
    pub fn to_signal(&self) -> Result<Signal> {
        serde_json::from_value(self.payload.clone())
            .with_context(|| format!("decoding payload of scan {}", self.scan_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use condor_core::{
        Advice, AdvisorKind, Direction, GexRegime, MarketSnapshot, Pricing, PricingSource,
        SignalSource, StrikeSet, StrikeSource,
    };

    fn valid_signal() -> Signal {
        let mut signal = Signal::blocked("FORTRESS", "SPY", SignalSource::BlockedNoData, "");
        signal.snapshot = Some(MarketSnapshot {
            ticker: "SPY".to_string(),
            spot: 600.0,
            vix: 15.0,
            regime: GexRegime::Positive,
            net_gex: 1.2e9,
            call_wall: Some(608.0),
            put_wall: Some(592.0),
            flip_point: None,
            timestamp: Utc::now(),
        });
        signal.expected_move = Some(5.67);
        signal.strikes =
            Some(StrikeSet::new(600.0, 593.0, 607.0, 2.0, StrikeSource::Sd(1.2)).unwrap());
        signal.pricing = Some(Pricing::from_credits(
            0.22,
            0.18,
            2.0,
            2,
            PricingSource::Estimated,
        ));
        signal.contracts = 2;
        signal.effective_win_probability = 0.66;
        signal.confidence = 0.7;
        signal.prediction_source = Some(AdvisorKind::Oracle);
        signal.advice = Some(Advice::TradeFull);
        signal.direction = Some(Direction::Neutral);
        signal.source = SignalSource::Strikes(StrikeSource::Sd(1.2));
        signal.reasoning = "ORACLE: TRADE_FULL".to_string();
        signal.is_valid = true;
        signal
    }

    #[test]
    fn test_record_flattens_valid_signal() {
        let record = IcSignalRecord::from_signal(&valid_signal()).unwrap();

        assert!(record.id.is_none());
        assert_eq!(record.source, "SD_1.2");
        assert!(record.is_valid);
        assert_eq!(record.spot, Some(600.0));
        assert_eq!(record.put_short, Some(593.0));
        assert_eq!(record.call_long, Some(609.0));
        assert!((record.total_credit.unwrap() - 0.40).abs() < 1e-9);
        assert_eq!(record.pricing_source.as_deref(), Some("ESTIMATED"));
        assert_eq!(record.contracts, 2);
        assert_eq!(record.prediction_source.as_deref(), Some("ORACLE"));
        assert_eq!(record.advice.as_deref(), Some("TRADE_FULL"));
        assert_eq!(record.direction.as_deref(), Some("NEUTRAL"));
        assert_eq!(record.payload["bot"], "FORTRESS");
    }

    #[test]
    fn test_blocked_signal_leaves_trade_columns_empty() {
        let signal = Signal::blocked(
            "PEGASUS",
            "SPX",
            SignalSource::BlockedStaleData,
            "snapshot 400s old",
        );
        let record = IcSignalRecord::from_signal(&signal).unwrap();

        assert_eq!(record.source, "BLOCKED_STALE_DATA");
        assert!(!record.is_valid);
        assert!(record.spot.is_none());
        assert!(record.put_short.is_none());
        assert!(record.max_loss.is_none());
        assert_eq!(record.contracts, 0);
    }

    #[test]
    fn test_payload_restores_signal() {
        let original = valid_signal();
        let restored = IcSignalRecord::from_signal(&original)
            .unwrap()
            .to_signal()
            .unwrap();

        assert_eq!(restored.scan_id, original.scan_id);
        assert_eq!(restored.source, original.source);
        assert_eq!(restored.strikes, original.strikes);
    }
}
