//! Display metadata for zones and statistics
//!
//! Kept apart from [`Zone`] so the core stays free of UI concerns. Hosts render
//! these values however they like; the CLI prints them as a table.

use serde::Serialize;

use crate::types::SessionStats;
use crate::zone::Zone;

/// RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#rrggbb`
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// How a zone is shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneAppearance {
    pub zone: Zone,
    pub label: &'static str,
    pub description: &'static str,
    /// SF Symbols style icon name
    pub icon: &'static str,
    pub color: Rgb,
    pub range: &'static str,
}

const APPEARANCES: [ZoneAppearance; 4] = [
    ZoneAppearance {
        zone: Zone::Rest,
        label: "Rest",
        description: "Recovery zone",
        icon: "figure.stand",
        color: Rgb::new(0x34, 0xc7, 0x59),
        range: "50-60%",
    },
    ZoneAppearance {
        zone: Zone::FatBurn,
        label: "Fat Burn",
        description: "Light exercise",
        icon: "flame",
        color: Rgb::new(0xff, 0xcc, 0x00),
        range: "60-70%",
    },
    ZoneAppearance {
        zone: Zone::Cardio,
        label: "Cardio",
        description: "Moderate intensity",
        icon: "figure.run",
        color: Rgb::new(0xff, 0x95, 0x00),
        range: "70-85%",
    },
    ZoneAppearance {
        zone: Zone::Peak,
        label: "Peak",
        description: "Maximum effort",
        icon: "bolt.heart.fill",
        color: Rgb::new(0xff, 0x3b, 0x30),
        range: "85-100%",
    },
];

pub fn appearance(zone: Zone) -> &'static ZoneAppearance {
    &APPEARANCES[zone as usize]
}

/// All zones in ascending intensity
pub fn appearances() -> &'static [ZoneAppearance] {
    &APPEARANCES
}

/// Displayed band per zone in whole percent of max heart rate. Rest is shown
/// from 50% and Peak up to 100%, although classification is open-ended.
const DISPLAY_BANDS_PCT: [(u32, u32); 4] = [(50, 60), (60, 70), (70, 85), (85, 100)];

/// Beats-per-minute range shown for a zone, e.g. `161-190`
pub fn bpm_range(zone: Zone, max_heart_rate: f64) -> String {
    let (low, high) = DISPLAY_BANDS_PCT[zone as usize];
    format!(
        "{}-{}",
        format_bpm(max_heart_rate * f64::from(low) / 100.0),
        format_bpm(max_heart_rate * f64::from(high) / 100.0)
    )
}

/// Whole beats per minute, truncated
pub fn format_bpm(bpm: f64) -> String {
    format!("{}", bpm.trunc() as i64)
}

/// `MM:SS`, minutes keep counting past 59
pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Stats formatted for a summary card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    pub average: String,
    pub min: String,
    pub max: String,
    pub samples: usize,
    pub duration: String,
}

impl From<&SessionStats> for StatsSummary {
    fn from(stats: &SessionStats) -> Self {
        Self {
            average: format_bpm(stats.average),
            min: format_bpm(stats.min),
            max: format_bpm(stats.max),
            samples: stats.count,
            duration: format_duration(stats.duration_secs),
        }
    }
}
