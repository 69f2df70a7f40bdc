//! Weekly Topic Schedule
//!
//! Loads the weekly theme table (`Day`, `Theme`, `SubTopics` columns) and picks
//! today's theme and sub-topic. A missing row for today is not an error: the
//! first row of the table is used instead.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Failed to open schedule {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Schedule CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Malformed schedule row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },
    #[error("Schedule has no entries")]
    Empty,
}

/// One row of the weekly table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// ISO weekday, 1 = Monday .. 7 = Sunday
    pub day: u8,
    pub theme: String,
    pub subtopics: Vec<String>,
}

/// Today's theme and the sub-topic drawn from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub theme: String,
    pub subtopic: String,
}

#[derive(Debug, Deserialize)]
struct ScheduleRow {
    #[serde(rename = "Day")]
    day: String,
    #[serde(rename = "Theme")]
    theme: String,
    #[serde(rename = "SubTopics")]
    subtopics: String,
}

impl ScheduleRow {
    fn into_entry(self, row: usize) -> Result<ScheduleEntry, ScheduleError> {
        let malformed = |reason: String| ScheduleError::MalformedRow { row, reason };

        let day: u8 = self
            .day
            .trim()
            .parse()
            .map_err(|_| malformed(format!("day '{}' is not a number", self.day)))?;
        if !(1..=7).contains(&day) {
            return Err(malformed(format!("day {} is outside 1..=7", day)));
        }

        let theme = self.theme.trim().to_string();
        if theme.is_empty() {
            return Err(malformed("theme is empty".to_string()));
        }

        let subtopics: Vec<String> = self
            .subtopics
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if subtopics.is_empty() {
            return Err(malformed("no sub-topics listed".to_string()));
        }

        Ok(ScheduleEntry {
            day,
            theme,
            subtopics,
        })
    }
}

/// The loaded, immutable weekly table
#[derive(Debug, Clone)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn load(path: &Path) -> Result<Self, ScheduleError> {
        let file = File::open(path).map_err(|source| ScheduleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let schedule = Self::from_reader(file)?;
        info!(
            "Loaded schedule with {} entries from {}",
            schedule.entries.len(),
            path.display()
        );
        Ok(schedule)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ScheduleError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (idx, record) in csv_reader.deserialize::<ScheduleRow>().enumerate() {
            entries.push(record?.into_entry(idx + 1)?);
        }

        if entries.is_empty() {
            return Err(ScheduleError::Empty);
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Entry for an ISO weekday, falling back to the first row of the table
    pub fn entry_for_day(&self, day: u8) -> &ScheduleEntry {
        match self.entries.iter().find(|e| e.day == day) {
            Some(entry) => entry,
            None => {
                warn!(
                    "No schedule entry for day {}, falling back to first entry (day {})",
                    day, self.entries[0].day
                );
                &self.entries[0]
            }
        }
    }

    /// Pick the theme for `today` and draw one of its sub-topics uniformly
    pub fn resolve<R: Rng + ?Sized>(&self, today: NaiveDate, rng: &mut R) -> Topic {
        let day = today.weekday().number_from_monday() as u8;
        let entry = self.entry_for_day(day);

        // Rows are validated to carry at least one sub-topic.
        let subtopic = entry
            .subtopics
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| entry.theme.clone());

        Topic {
            theme: entry.theme.clone(),
            subtopic,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    const WEEK: &str = "\
Day,Theme,SubTopics
1,Idioms,\"break the ice, hit the sack\"
2,Grammar,\"present perfect, articles\"
3,Phrasal Verbs,\"give up, look forward to\"
4,Pronunciation,\"th sound, silent letters\"
5,Vocabulary,\"travel words, food words\"
6,Listening,\"fast speech\"
7,Review,\"weekly quiz, mistakes recap\"
";

    fn date_for_weekday(day: u32) -> NaiveDate {
        // 2026-10-12 is a Monday.
        NaiveDate::from_ymd_opt(2026, 10, 11 + day).unwrap()
    }

    #[test]
    fn test_wednesday_phrasal_verbs() {
        let schedule =
            Schedule::from_reader("Day,Theme,SubTopics\n3,Phrasal Verbs,\"give up, look forward to\"\n".as_bytes())
                .unwrap();
        let wednesday = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let topic = schedule.resolve(wednesday, &mut rng);
        assert_eq!(topic.theme, "Phrasal Verbs");
        assert!(["give up", "look forward to"].contains(&topic.subtopic.as_str()));
    }

    #[test]
    fn test_every_weekday_draws_from_its_row() {
        let schedule = Schedule::from_reader(WEEK.as_bytes()).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        for day in 1..=7u32 {
            let entry = schedule.entries().iter().find(|e| e.day as u32 == day).unwrap();
            for _ in 0..20 {
                let topic = schedule.resolve(date_for_weekday(day), &mut rng);
                assert_eq!(topic.theme, entry.theme);
                assert!(entry.subtopics.contains(&topic.subtopic));
            }
        }
    }

    #[test]
    fn test_missing_day_falls_back_to_first_row() {
        let csv = "Day,Theme,SubTopics\n2,Grammar,\"articles\"\n5,Vocabulary,\"travel words\"\n";
        let schedule = Schedule::from_reader(csv.as_bytes()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let topic = schedule.resolve(date_for_weekday(7), &mut rng);
        assert_eq!(
            topic,
            Topic {
                theme: "Grammar".to_string(),
                subtopic: "articles".to_string()
            }
        );
    }

    #[test]
    fn test_subtopics_are_trimmed_and_blank_items_dropped() {
        let csv = "Day,Theme,SubTopics\n1,Idioms,\" break the ice ,, hit the sack \"\n";
        let schedule = Schedule::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(
            schedule.entries()[0].subtopics,
            vec!["break the ice".to_string(), "hit the sack".to_string()]
        );
    }

    #[test]
    fn test_empty_table_is_error() {
        let result = Schedule::from_reader("Day,Theme,SubTopics\n".as_bytes());
        assert!(matches!(result, Err(ScheduleError::Empty)));
    }

    #[test]
    fn test_malformed_rows_are_errors() {
        let bad_day = Schedule::from_reader("Day,Theme,SubTopics\nMonday,Idioms,x\n".as_bytes());
        assert!(matches!(bad_day, Err(ScheduleError::MalformedRow { row: 1, .. })));

        let out_of_range = Schedule::from_reader("Day,Theme,SubTopics\n8,Idioms,x\n".as_bytes());
        assert!(matches!(out_of_range, Err(ScheduleError::MalformedRow { .. })));

        let no_topics = Schedule::from_reader("Day,Theme,SubTopics\n1,Idioms,\" , \"\n".as_bytes());
        assert!(matches!(no_topics, Err(ScheduleError::MalformedRow { .. })));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Schedule::load(&dir.path().join("nope.csv"));
        assert!(matches!(result, Err(ScheduleError::Io { .. })));
    }
}
