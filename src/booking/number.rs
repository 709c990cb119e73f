use chrono::{DateTime, Utc};

/// Display-facing booking number: `BK`, the epoch milliseconds at
/// generation time, then the next sequence value padded to four digits.
///
/// Uniqueness rests on the count being read consistently; the store
/// enforces it with a unique index and the caller regenerates on collision.
pub fn generate(sequence_count: u64, now: DateTime<Utc>) -> String {
    format!("BK{}{:04}", now.timestamp_millis(), sequence_count + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format() {
        let now = Utc.timestamp_millis_opt(1_735_689_600_123).unwrap();
        assert_eq!(generate(0, now), "BK17356896001230001");
        assert_eq!(generate(41, now), "BK17356896001230042");
    }

    #[test]
    fn test_sequence_wider_than_padding() {
        let now = Utc.timestamp_millis_opt(1_000).unwrap();
        assert_eq!(generate(12_345, now), "BK100012346");
    }
}
