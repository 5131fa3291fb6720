//! Trade levels — entry zone, stop loss, take profit.
//!
//! Engines persist levels as plain numbers, `{from, to}` ranges, or free text
//! such as `"71.20 - 71.80"`. This module turns any of those into a point
//! value and derives the stop / target distance and risk-reward ratio.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Setup;

/// A level as it appears on a persisted setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LevelValue {
    Number(f64),
    Range { from: Option<f64>, to: Option<f64> },
    Text(String),
}

impl LevelValue {
    /// All finite numbers carried by this value, in order.
    pub fn numbers(&self) -> Vec<f64> {
        match self {
            LevelValue::Number(n) => vec![*n],
            LevelValue::Range { from, to } => [*from, *to].into_iter().flatten().collect(),
            LevelValue::Text(text) => numeric_tokens(text),
        }
        .into_iter()
        .filter(|n| n.is_finite())
        .collect()
    }

    pub fn is_valid(&self) -> bool {
        !self.numbers().is_empty()
    }

    /// Midpoint of the first two numbers (or the only number).
    pub fn midpoint(&self) -> Option<f64> {
        match self.numbers().as_slice() {
            [] => None,
            [single] => Some(*single),
            [a, b, ..] => Some((a + b) / 2.0),
        }
    }

    /// First number carried by this value.
    pub fn first(&self) -> Option<f64> {
        self.numbers().first().copied()
    }
}

/// Unsigned decimal tokens in a free-text level. A `-` between two numbers
/// is a range separator, never a sign.
fn numeric_tokens(text: &str) -> Vec<f64> {
    let mut out = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() || (c == '.' && !current.is_empty() && !current.contains('.')) {
            current.push(c);
        } else if c == ',' && !current.is_empty() {
            // thousands separator
            continue;
        } else if !current.is_empty() {
            out.extend(current.trim_end_matches('.').parse::<f64>().ok());
            current.clear();
        }
    }
    if !current.is_empty() {
        out.extend(current.trim_end_matches('.').parse::<f64>().ok());
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelParseError {
    #[error("{field} is missing")]
    Missing { field: &'static str },

    #[error("{field} has no numeric value: {raw}")]
    NotNumeric { field: &'static str, raw: String },

    #[error("entry price must be positive")]
    NonPositiveEntry,
}

/// Point values for one setup's levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeLevels {
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
}

impl TradeLevels {
    pub fn from_setup(setup: &Setup) -> Result<Self, LevelParseError> {
        let entry = point("entryZone", setup.entry_zone.as_ref(), LevelValue::midpoint)?;
        let stop = point("stopLoss", setup.stop_loss.as_ref(), LevelValue::first)?;
        let target = point("takeProfit", setup.take_profit.as_ref(), LevelValue::first)?;
        if entry <= 0.0 {
            return Err(LevelParseError::NonPositiveEntry);
        }
        Ok(Self {
            entry,
            stop,
            target,
        })
    }

    /// Stop distance as a percentage of entry.
    pub fn stop_pct(&self) -> f64 {
        (self.entry - self.stop).abs() / self.entry * 100.0
    }

    /// Target distance as a percentage of entry.
    pub fn target_pct(&self) -> f64 {
        (self.target - self.entry).abs() / self.entry * 100.0
    }

    /// Reward over risk. `None` when the stop sits on the entry.
    pub fn rrr(&self) -> Option<f64> {
        let stop = self.stop_pct();
        (stop > 0.0).then(|| self.target_pct() / stop)
    }
}

fn point(
    field: &'static str,
    value: Option<&LevelValue>,
    pick: fn(&LevelValue) -> Option<f64>,
) -> Result<f64, LevelParseError> {
    let value = value.ok_or(LevelParseError::Missing { field })?;
    pick(value).ok_or_else(|| LevelParseError::NotNumeric {
        field,
        raw: match value {
            LevelValue::Text(t) => t.clone(),
            other => format!("{other:?}"),
        },
    })
}

/// True when the setup carries at least one level field.
pub fn has_any_level(setup: &Setup) -> bool {
    setup.entry_zone.is_some() || setup.stop_loss.is_some() || setup.take_profit.is_some()
}

/// True when all three levels are present and each carries a number.
pub fn levels_complete(setup: &Setup) -> bool {
    [&setup.entry_zone, &setup.stop_loss, &setup.take_profit]
        .iter()
        .all(|v| v.as_ref().is_some_and(LevelValue::is_valid))
}

/// Risk-reward histogram bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RrrBucket {
    Below1,
    From1To1_5,
    From1_5To2,
    From2To3,
    AtLeast3,
}

impl RrrBucket {
    pub const ALL: [RrrBucket; 5] = [
        RrrBucket::Below1,
        RrrBucket::From1To1_5,
        RrrBucket::From1_5To2,
        RrrBucket::From2To3,
        RrrBucket::AtLeast3,
    ];

    pub fn of(rrr: f64) -> Self {
        if rrr < 1.0 {
            RrrBucket::Below1
        } else if rrr < 1.5 {
            RrrBucket::From1To1_5
        } else if rrr < 2.0 {
            RrrBucket::From1_5To2
        } else if rrr < 3.0 {
            RrrBucket::From2To3
        } else {
            RrrBucket::AtLeast3
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RrrBucket::Below1 => "<1",
            RrrBucket::From1To1_5 => "1-1.5",
            RrrBucket::From1_5To2 => "1.5-2",
            RrrBucket::From2To3 => "2-3",
            RrrBucket::AtLeast3 => ">=3",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<LevelValue> {
        Some(LevelValue::Text(s.to_string()))
    }

    #[test]
    fn text_range_uses_midpoint() {
        let v = LevelValue::Text("71.20 - 71.80".into());
        assert_eq!(v.numbers(), vec![71.2, 71.8]);
        assert!((v.midpoint().unwrap() - 71.5).abs() < 1e-9);
    }

    #[test]
    fn thousands_separator_is_ignored() {
        let v = LevelValue::Text("2,345.5".into());
        assert_eq!(v.first(), Some(2345.5));
    }

    #[test]
    fn garbage_text_is_invalid() {
        assert!(!LevelValue::Text("n/a".into()).is_valid());
        assert!(!LevelValue::Range { from: None, to: None }.is_valid());
        assert!(LevelValue::Range { from: Some(1.0), to: None }.is_valid());
    }

    #[test]
    fn computes_distances_and_rrr() {
        let setup = Setup {
            entry_zone: text("100 - 100"),
            stop_loss: Some(LevelValue::Number(98.0)),
            take_profit: text("105"),
            ..Default::default()
        };
        let levels = TradeLevels::from_setup(&setup).unwrap();
        assert!((levels.stop_pct() - 2.0).abs() < 1e-9);
        assert!((levels.target_pct() - 5.0).abs() < 1e-9);
        assert!((levels.rrr().unwrap() - 2.5).abs() < 1e-9);
        assert_eq!(RrrBucket::of(levels.rrr().unwrap()), RrrBucket::From2To3);
    }

    #[test]
    fn missing_stop_is_a_parse_error() {
        let setup = Setup {
            entry_zone: text("100"),
            take_profit: text("105"),
            ..Default::default()
        };
        assert_eq!(
            TradeLevels::from_setup(&setup),
            Err(LevelParseError::Missing { field: "stopLoss" })
        );
    }

    #[test]
    fn unparseable_target_is_a_parse_error() {
        let setup = Setup {
            entry_zone: text("100"),
            stop_loss: text("95"),
            take_profit: text("tbd"),
            ..Default::default()
        };
        assert!(matches!(
            TradeLevels::from_setup(&setup),
            Err(LevelParseError::NotNumeric { field: "takeProfit", .. })
        ));
    }

    #[test]
    fn stop_on_entry_has_no_rrr() {
        let levels = TradeLevels {
            entry: 10.0,
            stop: 10.0,
            target: 12.0,
        };
        assert_eq!(levels.rrr(), None);
    }

    #[test]
    fn rrr_bucket_edges() {
        assert_eq!(RrrBucket::of(0.99), RrrBucket::Below1);
        assert_eq!(RrrBucket::of(1.0), RrrBucket::From1To1_5);
        assert_eq!(RrrBucket::of(1.5), RrrBucket::From1_5To2);
        assert_eq!(RrrBucket::of(2.0), RrrBucket::From2To3);
        assert_eq!(RrrBucket::of(3.0), RrrBucket::AtLeast3);
    }

    #[test]
    fn level_presence_checks() {
        let empty = Setup::default();
        assert!(!has_any_level(&empty));
        assert!(!levels_complete(&empty));

        let full = Setup {
            entry_zone: Some(LevelValue::Range {
                from: Some(1.0),
                to: Some(2.0),
            }),
            stop_loss: Some(LevelValue::Number(0.5)),
            take_profit: text("3"),
            ..Default::default()
        };
        assert!(has_any_level(&full));
        assert!(levels_complete(&full));
    }

    #[test]
    fn deserializes_all_shapes() {
        let n: LevelValue = serde_json::from_str("69.5").unwrap();
        assert_eq!(n, LevelValue::Number(69.5));
        let r: LevelValue = serde_json::from_str(r#"{"from":1.0,"to":2.0}"#).unwrap();
        assert_eq!(r.midpoint(), Some(1.5));
        let t: LevelValue = serde_json::from_str(r#""1.10 - 1.12""#).unwrap();
        assert!(matches!(t, LevelValue::Text(_)));
    }
}
