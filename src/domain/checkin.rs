//! Check-in Entity
//!
//! A standalone mood/stress journal entry, not linked to any task.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::entity::{DomainError, DomainResult, Entity};
use super::task::validate_stress_level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    #[default]
    Neutral,
    Sad,
    Stressed,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Neutral => "neutral",
            Mood::Sad => "sad",
            Mood::Stressed => "stressed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "happy" => Mood::Happy,
            "sad" => Mood::Sad,
            "stressed" => Mood::Stressed,
            _ => Mood::Neutral,
        }
    }

    /// Strict variant for user input
    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "happy" => Ok(Mood::Happy),
            "neutral" => Ok(Mood::Neutral),
            "sad" => Ok(Mood::Sad),
            "stressed" => Ok(Mood::Stressed),
            other => Err(DomainError::InvalidInput(format!(
                "Unknown mood '{}' (expected happy, neutral, sad or stressed)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    pub id: u32,
    /// Calendar day of the entry (YYYY-MM-DD)
    pub date: NaiveDate,
    pub stress_level: u8,
    #[serde(default)]
    pub mood: Mood,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub breathing_minutes: u32,
}

impl CheckIn {
    pub fn new(date: NaiveDate, stress_level: u8, mood: Mood, note: String, breathing_minutes: u32) -> Self {
        Self {
            id: 0,
            date,
            stress_level,
            mood,
            note,
            breathing_minutes,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        validate_stress_level(self.stress_level)
    }
}

impl Entity for CheckIn {
    type Id = u32;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkin_creation() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let checkin = CheckIn::new(date, 7, Mood::Stressed, "deadline week".into(), 3);
        assert_eq!(checkin.id(), 0);
        assert!(checkin.validate().is_ok());
    }

    #[test]
    fn test_stress_out_of_range() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let checkin = CheckIn::new(date, 12, Mood::Sad, String::new(), 0);
        assert!(checkin.validate().is_err());
    }

    #[test]
    fn test_mood_strings() {
        assert_eq!(Mood::from_str("happy"), Mood::Happy);
        assert_eq!(Mood::from_str("unknown"), Mood::Neutral);
        assert_eq!(Mood::Stressed.as_str(), "stressed");
        assert_eq!(Mood::parse(" Sad ").unwrap(), Mood::Sad);
        assert!(Mood::parse("angry").is_err());
    }

    #[test]
    fn test_date_serializes_as_plain_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let checkin = CheckIn::new(date, 2, Mood::Happy, String::new(), 0);
        let json = serde_json::to_value(&checkin).unwrap();
        assert_eq!(json["date"], "2024-03-10");
        assert_eq!(json["breathingMinutes"], 0);
    }
}
