//! Zone classification
//!
//! Maps a heart rate and a maximum heart rate to one of four training zones using
//! half-open percentage bands (lower bound inclusive):
//! - Rest: below 60%
//! - Fat Burn: 60% to 70%
//! - Cardio: 70% to 85%
//! - Peak: 85% and above, including readings above the maximum

use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Lower bound (percent of max) of the Fat Burn zone
pub const FAT_BURN_THRESHOLD_PCT: f64 = 60.0;
/// Lower bound (percent of max) of the Cardio zone
pub const CARDIO_THRESHOLD_PCT: f64 = 70.0;
/// Lower bound (percent of max) of the Peak zone
pub const PEAK_THRESHOLD_PCT: f64 = 85.0;

/// Age-predicted maximum heart rate offset (220 - age)
pub const MAX_HEART_RATE_BASE: u32 = 220;

/// Training zone, ordered by ascending intensity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    #[default]
    Rest,
    FatBurn,
    Cardio,
    Peak,
}

impl Zone {
    /// All zones in ascending intensity
    pub const ALL: [Zone; 4] = [Zone::Rest, Zone::FatBurn, Zone::Cardio, Zone::Peak];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Rest => "rest",
            Zone::FatBurn => "fat_burn",
            Zone::Cardio => "cardio",
            Zone::Peak => "peak",
        }
    }

    /// Lower bound of this zone as a percentage of max heart rate
    pub fn lower_bound_pct(&self) -> f64 {
        match self {
            Zone::Rest => 0.0,
            Zone::FatBurn => FAT_BURN_THRESHOLD_PCT,
            Zone::Cardio => CARDIO_THRESHOLD_PCT,
            Zone::Peak => PEAK_THRESHOLD_PCT,
        }
    }

    /// Exclusive upper bound, `None` for Peak
    pub fn upper_bound_pct(&self) -> Option<f64> {
        match self {
            Zone::Rest => Some(FAT_BURN_THRESHOLD_PCT),
            Zone::FatBurn => Some(CARDIO_THRESHOLD_PCT),
            Zone::Cardio => Some(PEAK_THRESHOLD_PCT),
            Zone::Peak => None,
        }
    }

    /// Stable index for C callers (Rest = 0 .. Peak = 3)
    pub fn index(&self) -> i32 {
        match self {
            Zone::Rest => 0,
            Zone::FatBurn => 1,
            Zone::Cardio => 2,
            Zone::Peak => 3,
        }
    }

    pub fn from_index(index: i32) -> Option<Zone> {
        Zone::ALL.get(usize::try_from(index).ok()?).copied()
    }
}

/// Heart rate as a percentage of the maximum.
///
/// Fails with `InvalidParameter` when `max_heart_rate` is not a positive finite
/// number or `bpm` is not finite.
pub fn percentage_of_max(bpm: f64, max_heart_rate: f64) -> Result<f64, MonitorError> {
    if !max_heart_rate.is_finite() || max_heart_rate <= 0.0 {
        return Err(MonitorError::InvalidParameter(format!(
            "max heart rate must be positive, got {max_heart_rate}"
        )));
    }
    if !bpm.is_finite() {
        return Err(MonitorError::InvalidParameter(format!(
            "heart rate must be finite, got {bpm}"
        )));
    }
    Ok(bpm / max_heart_rate * 100.0)
}

/// Classify a heart rate into a training zone.
///
/// # Example
/// ```
/// use heartzone::zone::{classify, Zone};
///
/// assert_eq!(classify(100.0, 190.0).unwrap(), Zone::Rest);
/// assert_eq!(classify(165.0, 190.0).unwrap(), Zone::Peak);
/// ```
pub fn classify(bpm: f64, max_heart_rate: f64) -> Result<Zone, MonitorError> {
    let percentage = percentage_of_max(bpm, max_heart_rate)?;
    Ok(zone_for_percentage(percentage))
}

/// Band lookup on an already computed percentage
pub fn zone_for_percentage(percentage: f64) -> Zone {
    if percentage >= PEAK_THRESHOLD_PCT {
        Zone::Peak
    } else if percentage >= CARDIO_THRESHOLD_PCT {
        Zone::Cardio
    } else if percentage >= FAT_BURN_THRESHOLD_PCT {
        Zone::FatBurn
    } else {
        Zone::Rest
    }
}

/// Age-predicted maximum heart rate (220 - age)
pub fn max_heart_rate_for_age(age: u32) -> Result<f64, MonitorError> {
    if age >= MAX_HEART_RATE_BASE {
        return Err(MonitorError::InvalidParameter(format!(
            "age must be below {MAX_HEART_RATE_BASE}, got {age}"
        )));
    }
    Ok(f64::from(MAX_HEART_RATE_BASE - age))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_bands() {
        assert_eq!(classify(0.0, 190.0).unwrap(), Zone::Rest);
        assert_eq!(classify(100.0, 190.0).unwrap(), Zone::Rest);
        assert_eq!(classify(120.0, 190.0).unwrap(), Zone::FatBurn);
        assert_eq!(classify(140.0, 190.0).unwrap(), Zone::Cardio);
        assert_eq!(classify(165.0, 190.0).unwrap(), Zone::Peak);
    }

    #[test]
    fn test_boundaries_go_to_higher_zone() {
        // max 200 keeps the boundary percentages exact
        assert_eq!(classify(120.0, 200.0).unwrap(), Zone::FatBurn);
        assert_eq!(classify(140.0, 200.0).unwrap(), Zone::Cardio);
        assert_eq!(classify(170.0, 200.0).unwrap(), Zone::Peak);

        assert_eq!(classify(119.99, 200.0).unwrap(), Zone::Rest);
        assert_eq!(classify(139.99, 200.0).unwrap(), Zone::FatBurn);
        assert_eq!(classify(169.99, 200.0).unwrap(), Zone::Cardio);
    }

    #[test]
    fn test_above_max_is_peak() {
        assert_eq!(classify(250.0, 190.0).unwrap(), Zone::Peak);
    }

    #[test]
    fn test_non_positive_bpm_is_rest() {
        assert_eq!(classify(-10.0, 190.0).unwrap(), Zone::Rest);
    }

    #[test]
    fn test_invalid_max_heart_rate_rejected() {
        assert!(matches!(
            classify(100.0, 0.0),
            Err(MonitorError::InvalidParameter(_))
        ));
        assert!(matches!(
            classify(100.0, -190.0),
            Err(MonitorError::InvalidParameter(_))
        ));
        assert!(matches!(
            classify(100.0, f64::NAN),
            Err(MonitorError::InvalidParameter(_))
        ));
        assert!(matches!(
            classify(f64::INFINITY, 190.0),
            Err(MonitorError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_every_percentage_falls_in_exactly_one_zone() {
        for tenth in 0..=1500 {
            let pct = tenth as f64 / 10.0;
            let zone = zone_for_percentage(pct);
            let matching = Zone::ALL
                .iter()
                .filter(|z| {
                    pct >= z.lower_bound_pct() && z.upper_bound_pct().map_or(true, |u| pct < u)
                })
                .count();
            assert_eq!(matching, 1, "percentage {pct}");
            assert!(pct >= zone.lower_bound_pct());
        }
    }

    #[test]
    fn test_zone_ordering() {
        assert!(Zone::Rest < Zone::FatBurn);
        assert!(Zone::FatBurn < Zone::Cardio);
        assert!(Zone::Cardio < Zone::Peak);
        assert_eq!(Zone::from_index(Zone::Cardio.index()), Some(Zone::Cardio));
        assert_eq!(Zone::from_index(4), None);
        assert_eq!(Zone::from_index(-1), None);
    }

    #[test]
    fn test_max_heart_rate_for_age() {
        assert_eq!(max_heart_rate_for_age(30).unwrap(), 190.0);
        assert_eq!(max_heart_rate_for_age(0).unwrap(), 220.0);
        assert!(max_heart_rate_for_age(220).is_err());
    }
}
