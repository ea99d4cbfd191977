use jiff::{Timestamp, civil::Date, tz::TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    #[serde(rename = "laki-laki", alias = "male")]
    Male,
    #[serde(rename = "perempuan", alias = "female")]
    Female,
}

impl Gender {
    pub const ALL: [Self; 2] = [Self::Male, Self::Female];

    pub const fn as_wire_str(self) -> &'static str {
        match self {
            Self::Male => "laki-laki",
            Self::Female => "perempuan",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "laki-laki" | "male" => Some(Self::Male),
            "perempuan" | "female" => Some(Self::Female),
            _ => None,
        }
    }
}

impl Display for Gender {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => write!(f, "Laki-laki"),
            Self::Female => write!(f, "Perempuan"),
        }
    }
}

/// Everything the spreadsheet knows about a student apart from their identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentDetails {
    pub national_number: String,
    pub name: String,
    pub gender: Gender,
    pub date_of_birth: Option<Date>,
    ///what the sheet held when it wasn't a date we understand, sent back untouched
    pub unparsed_date_of_birth: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentRecord {
    pub identifier: String,
    pub national_number: String,
    pub name: String,
    pub gender: Gender,
    pub date_of_birth: Option<Date>,
    pub unparsed_date_of_birth: Option<String>,
}

impl StudentRecord {
    pub fn populate(&mut self, details: StudentDetails) {
        let StudentDetails {
            national_number,
            name,
            gender,
            date_of_birth,
            unparsed_date_of_birth,
        } = details;

        self.national_number = national_number;
        self.name = name;
        self.gender = gender;
        self.date_of_birth = date_of_birth;
        self.unparsed_date_of_birth = unparsed_date_of_birth;
    }

    ///keeps the identifier, everything else goes back to defaults
    pub fn clear_details(&mut self) {
        self.populate(StudentDetails::default());
    }

    pub fn date_of_birth_wire(&self) -> String {
        match (self.date_of_birth, &self.unparsed_date_of_birth) {
            (Some(dob), _) => dob.to_string(),
            (None, Some(raw)) => raw.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Parses a `yyyy-mm-dd` date of birth. Blank means "not entered", and anything after the date
/// (eg. `2010-05-01 00:00:00`) is ignored.
pub fn parse_date_of_birth(raw: &str) -> Result<Option<Date>, jiff::Error> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let date_part = raw.split(['T', ' ']).next().unwrap_or(raw);
    date_part.parse().map(Some)
}

/// A date of birth as the sheet sends it. Date cells are serialised as the UTC instant of midnight
/// in the sheet's time zone (`2010-04-30T17:00:00.000Z` for 1 May in Jakarta), so instants are
/// brought back into `time_zone` before taking the date.
pub fn parse_remote_date_of_birth(
    raw: &str,
    time_zone: &TimeZone,
) -> Result<Option<Date>, jiff::Error> {
    match raw.trim().parse::<Timestamp>() {
        Ok(instant) => Ok(Some(instant.to_zoned(time_zone.clone()).date())),
        Err(_) => parse_date_of_birth(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn gender_uses_indonesian_wire_names() {
        assert_eq!(
            serde_json::to_string(&Gender::Female).unwrap(),
            "\"perempuan\""
        );
        assert_eq!(
            serde_json::from_str::<Gender>("\"laki-laki\"").unwrap(),
            Gender::Male
        );
        assert_eq!(
            serde_json::from_str::<Gender>("\"female\"").unwrap(),
            Gender::Female
        );
        assert_eq!(Gender::from_wire_str(" Perempuan "), Some(Gender::Female));
        assert_eq!(Gender::from_wire_str("unknown"), None);
    }

    #[test]
    fn date_of_birth_parsing() {
        assert_eq!(parse_date_of_birth("").unwrap(), None);
        assert_eq!(parse_date_of_birth("  ").unwrap(), None);
        assert_eq!(
            parse_date_of_birth("2010-05-01").unwrap(),
            Some(date(2010, 5, 1))
        );
        assert_eq!(
            parse_date_of_birth("2010-05-01 00:00:00").unwrap(),
            Some(date(2010, 5, 1))
        );
        assert!(parse_date_of_birth("01/05/2010").is_err());
        assert!(parse_date_of_birth("2010-13-01").is_err());
    }

    #[test]
    fn sheet_instants_are_read_in_the_sheet_time_zone() {
        let jakarta = TimeZone::fixed(jiff::tz::offset(7));
        assert_eq!(
            parse_remote_date_of_birth("2010-04-30T17:00:00.000Z", &jakarta).unwrap(),
            Some(date(2010, 5, 1))
        );
        assert_eq!(
            parse_remote_date_of_birth("2010-05-01T00:00:00+07:00", &jakarta).unwrap(),
            Some(date(2010, 5, 1))
        );
        assert_eq!(
            parse_remote_date_of_birth("2010-05-01", &jakarta).unwrap(),
            Some(date(2010, 5, 1))
        );
        assert_eq!(parse_remote_date_of_birth("", &jakarta).unwrap(), None);
        assert!(parse_remote_date_of_birth("01/05/2010", &jakarta).is_err());
    }

    #[test]
    fn unparsed_date_goes_back_as_it_came() {
        let record = StudentRecord {
            unparsed_date_of_birth: Some("01/05/2010".into()),
            ..Default::default()
        };
        assert_eq!(record.date_of_birth_wire(), "01/05/2010");
    }

    #[test]
    fn populate_then_clear_keeps_identifier() {
        let mut record = StudentRecord {
            identifier: "A123".into(),
            ..Default::default()
        };
        record.populate(StudentDetails {
            national_number: "001".into(),
            name: "Budi".into(),
            gender: Gender::Male,
            date_of_birth: Some(date(2010, 5, 1)),
            unparsed_date_of_birth: None,
        });
        assert_eq!(record.name, "Budi");
        assert_eq!(record.date_of_birth_wire(), "2010-05-01");

        record.clear_details();
        assert_eq!(
            record,
            StudentRecord {
                identifier: "A123".into(),
                ..Default::default()
            }
        );
        assert_eq!(record.date_of_birth_wire(), "");
    }
}
