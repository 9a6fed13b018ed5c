//! Serde helpers for configuration values

/// Serialize a `Duration` as seconds
///
/// Whole durations are written as integers (`timeout = 30`), others as
/// floats (`reconnect_delay = 0.5`). Both forms are accepted when reading.
pub mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Secs {
        Whole(u64),
        Fractional(f64),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_u64(duration.as_secs())
        } else {
            serializer.serialize_f64(duration.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Secs::deserialize(deserializer)? {
            Secs::Whole(secs) => Ok(Duration::from_secs(secs)),
            Secs::Fractional(secs) if secs.is_finite() && secs >= 0.0 => {
                Ok(Duration::from_secs_f64(secs))
            }
            Secs::Fractional(secs) => Err(serde::de::Error::custom(format!(
                "invalid duration: {} seconds",
                secs
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        #[serde(with = "duration_secs")]
        delay: Duration,
    }

    #[test]
    fn test_whole_seconds_written_as_integer() {
        let config = TestConfig {
            delay: Duration::from_secs(2),
        };
        assert_eq!(serde_json::to_string(&config).unwrap(), r#"{"delay":2}"#);
    }

    #[test]
    fn test_fractional_seconds() {
        let config: TestConfig = toml::from_str("delay = 0.5").unwrap();
        assert_eq!(config.delay, Duration::from_millis(500));

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"delay":0.5}"#);
    }

    #[test]
    fn test_negative_rejected() {
        assert!(toml::from_str::<TestConfig>("delay = -1.5").is_err());
    }
}
