use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("Invalid completion key: {0}")]
pub struct InvalidKey(pub String);

/// Natural key of one tracked paper: subject, year, exam session, paper
/// and an optional timezone variant. An empty timezone string is the
/// same as no timezone at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperKey {
    pub subject_id: String,
    pub year: i32,
    pub session: String,
    pub paper: String,
    pub timezone: Option<String>,
}

impl PaperKey {
    pub fn new(
        subject_id: String,
        year: i32,
        session: String,
        paper: String,
        timezone: Option<String>,
    ) -> Self {
        Self {
            subject_id,
            year,
            session,
            paper,
            timezone: timezone.filter(|tz| !tz.is_empty()),
        }
    }
}

/// Parses `subjectId-year-session-paper[-timezone]`, the composite form
/// used by the bulk endpoint and the completion map.
impl FromStr for PaperKey {
    type Err = InvalidKey;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split('-').collect();
        if parts.len() != 4 && parts.len() != 5 {
            return Err(InvalidKey(raw.to_owned()));
        }
        if parts[0].is_empty() || parts[2].is_empty() || parts[3].is_empty() {
            return Err(InvalidKey(raw.to_owned()));
        }
        let year = parts[1]
            .parse::<i32>()
            .map_err(|_| InvalidKey(raw.to_owned()))?;
        let timezone = parts.get(4).map(|tz| tz.to_string());
        Ok(Self::new(
            parts[0].to_owned(),
            year,
            parts[2].to_owned(),
            parts[3].to_owned(),
            timezone,
        ))
    }
}

impl fmt::Display for PaperKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.subject_id, self.year, self.session, self.paper
        )?;
        if let Some(tz) = &self.timezone {
            write!(f, "-{}", tz)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_without_timezone() {
        let key: PaperKey = "Biology-2023-May-Paper1".parse().expect("parse");
        assert_eq!(key.subject_id, "Biology");
        assert_eq!(key.year, 2023);
        assert_eq!(key.session, "May");
        assert_eq!(key.paper, "Paper1");
        assert_eq!(key.timezone, None);
    }

    #[test]
    fn parses_key_with_timezone() {
        let key: PaperKey = "Chemistry-2022-Nov-Paper2-TZ2".parse().expect("parse");
        assert_eq!(key.subject_id, "Chemistry");
        assert_eq!(key.year, 2022);
        assert_eq!(key.timezone.as_deref(), Some("TZ2"));
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!("Biology-2023-May".parse::<PaperKey>().is_err());
        assert!("Biology-2023-May-Paper1-TZ1-extra"
            .parse::<PaperKey>()
            .is_err());
        assert!("".parse::<PaperKey>().is_err());
    }

    #[test]
    fn rejects_non_numeric_year() {
        assert!("Biology-twenty23-May-Paper1".parse::<PaperKey>().is_err());
    }

    #[test]
    fn empty_timezone_segment_normalizes_to_none() {
        let key: PaperKey = "Biology-2023-May-Paper1-".parse().expect("parse");
        assert_eq!(key.timezone, None);
    }

    #[test]
    fn display_roundtrips() {
        for raw in ["Biology-2023-May-Paper1", "Chemistry-2022-Nov-Paper2-TZ2"] {
            let key: PaperKey = raw.parse().expect("parse");
            assert_eq!(key.to_string(), raw);
        }
    }

    #[test]
    fn new_normalizes_empty_timezone() {
        let key = PaperKey::new(
            "Biology".into(),
            2023,
            "May".into(),
            "Paper1".into(),
            Some(String::new()),
        );
        assert_eq!(key.timezone, None);
        assert_eq!(key.to_string(), "Biology-2023-May-Paper1");
    }
}
