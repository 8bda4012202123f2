//! Run-length codec for tick-indexed series.
//!
//! Consecutive equal samples collapse to a `[value, runLength]` pair; a run
//! of length one is stored as the bare value. `null` means "no data this
//! tick" and survives the round trip exactly. The wire form is a compact
//! JSON array string, so any consumer with a JSON parser can read it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;

/// A recorded series value: a numeric reading or an enum-like label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesValue {
    Number(f64),
    Label(String),
}

impl From<f64> for SeriesValue {
    fn from(v: f64) -> Self {
        SeriesValue::Number(v)
    }
}

impl From<&str> for SeriesValue {
    fn from(v: &str) -> Self {
        SeriesValue::Label(v.to_string())
    }
}

/// One slot in a series. `None` is "no data this tick".
pub type Sample = Option<SeriesValue>;

fn sample_to_json(sample: &Sample) -> Value {
    match sample {
        None => Value::Null,
        Some(SeriesValue::Number(n)) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(SeriesValue::Label(s)) => Value::String(s.clone()),
    }
}

fn json_to_sample(value: &Value, index: usize) -> Result<Sample, CodecError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(|v| Some(SeriesValue::Number(v)))
            .ok_or(CodecError::UnsupportedValue { index }),
        Value::String(s) => Ok(Some(SeriesValue::Label(s.clone()))),
        _ => Err(CodecError::UnsupportedValue { index }),
    }
}

/// Encode a series as a run-length-compressed JSON array string.
///
/// `[72, 72, 72, null, "warm"]` encodes as `[[72.0,3],null,"warm"]`.
pub fn encode_series(samples: &[Sample]) -> String {
    let mut items: Vec<Value> = Vec::new();
    let mut iter = samples.iter();
    let mut current = match iter.next() {
        Some(first) => first,
        None => return "[]".to_string(),
    };
    let mut run: u64 = 1;

    let flush = |sample: &Sample, run: u64, items: &mut Vec<Value>| {
        if run == 1 {
            items.push(sample_to_json(sample));
        } else {
            items.push(Value::Array(vec![
                sample_to_json(sample),
                Value::Number(run.into()),
            ]));
        }
    };

    for sample in iter {
        if sample == current {
            run += 1;
        } else {
            flush(current, run, &mut items);
            current = sample;
            run = 1;
        }
    }
    flush(current, run, &mut items);

    Value::Array(items).to_string()
}

/// Decode a run-length-compressed series string back into samples.
///
/// The empty string decodes to an empty series; callers that find a series
/// key absent entirely must treat it as all-null at the timeline's length.
pub fn decode_series(encoded: &str) -> Result<Vec<Sample>, CodecError> {
    if encoded.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parsed: Value = serde_json::from_str(encoded)?;
    let items = parsed.as_array().ok_or(CodecError::NotAnArray)?;

    let mut samples = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match item {
            Value::Array(pair) => {
                if pair.len() != 2 {
                    return Err(CodecError::InvalidRun { index });
                }
                let run = pair[1]
                    .as_u64()
                    .filter(|&n| n > 0)
                    .ok_or(CodecError::InvalidRun { index })?;
                let sample = json_to_sample(&pair[0], index)?;
                for _ in 0..run {
                    samples.push(sample.clone());
                }
            }
            other => samples.push(json_to_sample(other, index)?),
        }
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn num(v: f64) -> Sample {
        Some(SeriesValue::Number(v))
    }

    fn label(v: &str) -> Sample {
        Some(SeriesValue::Label(v.to_string()))
    }

    #[test]
    fn empty_series_round_trips() {
        let encoded = encode_series(&[]);
        assert_eq!(encoded, "[]");
        assert_eq!(decode_series(&encoded).unwrap(), Vec::<Sample>::new());
    }

    #[test]
    fn single_value_stays_bare() {
        let series = vec![num(72.0)];
        let encoded = encode_series(&series);
        assert_eq!(encoded, "[72.0]");
        assert_eq!(decode_series(&encoded).unwrap(), series);
    }

    #[test]
    fn runs_collapse_to_pairs() {
        let series = vec![num(72.0), num(72.0), num(72.0), num(80.0)];
        let encoded = encode_series(&series);
        assert_eq!(encoded, "[[72.0,3],80.0]");
        assert_eq!(decode_series(&encoded).unwrap(), series);
    }

    #[test]
    fn nulls_are_preserved() {
        let series = vec![None, None, num(65.0), None];
        let encoded = encode_series(&series);
        assert_eq!(encoded, "[[null,2],65.0,null]");
        assert_eq!(decode_series(&encoded).unwrap(), series);
    }

    #[test]
    fn all_null_series_round_trips() {
        let series = vec![None, None, None, None, None];
        let decoded = decode_series(&encode_series(&series)).unwrap();
        assert_eq!(decoded, series);
    }

    #[test]
    fn labels_round_trip() {
        let series = vec![label("warm"), label("warm"), label("hot"), None];
        assert_eq!(decode_series(&encode_series(&series)).unwrap(), series);
    }

    #[test]
    fn zero_run_length_is_rejected() {
        assert!(matches!(
            decode_series("[[72.0,0]]"),
            Err(CodecError::InvalidRun { index: 0 })
        ));
    }

    #[test]
    fn nested_array_value_is_rejected() {
        assert!(matches!(
            decode_series("[[[1,2],3]]"),
            Err(CodecError::UnsupportedValue { index: 0 })
        ));
    }

    #[test]
    fn non_array_payload_is_rejected() {
        assert!(matches!(decode_series("{}"), Err(CodecError::NotAnArray)));
    }

    fn sample_strategy() -> impl Strategy<Value = Sample> {
        prop_oneof![
            Just(None),
            (-500.0f64..500.0).prop_map(|v| Some(SeriesValue::Number(v))),
            prop_oneof![
                Just("cool"),
                Just("active"),
                Just("warm"),
                Just("hot"),
                Just("fire")
            ]
            .prop_map(|s| Some(SeriesValue::Label(s.to_string()))),
        ]
    }

    proptest! {
        #[test]
        fn round_trip_law(series in prop::collection::vec(sample_strategy(), 0..64)) {
            let decoded = decode_series(&encode_series(&series)).unwrap();
            prop_assert_eq!(decoded, series);
        }
    }
}
