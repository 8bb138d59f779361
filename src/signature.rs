use crate::error::{Error, Result};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// seconds since the epoch, as carried by a commit/tag's author/committer
/// line. this crate never constructs one from the system clock - it only
/// ever parses one out of an existing object.
#[derive(PartialEq, Clone, Debug, Hash, Ord, PartialOrd, Eq, Copy)]
pub struct EpochTime(i64);

impl EpochTime {
    pub fn new(secs: i64) -> Self {
        Self(secs)
    }

    pub fn as_secs(self) -> i64 {
        self.0
    }
}

/// timezone offset in minutes, as written in the signature's `±HHMM` field
#[derive(PartialEq, Clone, Debug, Hash, Ord, PartialOrd, Eq, Copy)]
pub struct TimeZoneOffset(i32);

impl TimeZoneOffset {
    pub fn new(offset_minutes: i32) -> Self {
        Self(offset_minutes)
    }

    pub fn as_minutes(self) -> i32 {
        self.0
    }
}

#[derive(PartialEq, Clone, Debug, PartialOrd, Eq, Ord, Hash, Copy)]
pub struct Time {
    pub time: EpochTime,
    pub offset: TimeZoneOffset,
}

/// spec section 3 models the email as optional: a handful of signatures in
/// the wild omit the `<...>` pair entirely.
#[derive(PartialEq, Clone, Debug)]
pub struct Signature {
    pub name: String,
    pub email: Option<String>,
    pub time: Time,
}

impl FromStr for TimeZoneOffset {
    type Err = Error;

    // format: (+|-)HHMM
    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::malformed_object(crate::hash::ObjectId::UNKNOWN, format!("invalid timezone offset `{s}`"));
        if s.len() != 5 {
            return Err(malformed());
        }
        let sign = match &s[0..1] {
            "+" => 1,
            "-" => -1,
            _ => return Err(malformed()),
        };
        let hours: i32 = s[1..3].parse().map_err(|_| malformed())?;
        let minutes: i32 = s[3..5].parse().map_err(|_| malformed())?;
        Ok(Self(sign * (hours * 60 + minutes)))
    }
}

impl FromStr for EpochTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse()
            .map(Self)
            .map_err(|_| Error::malformed_object(crate::hash::ObjectId::UNKNOWN, format!("invalid epoch time `{s}`")))
    }
}

impl FromStr for Time {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::malformed_object(crate::hash::ObjectId::UNKNOWN, format!("invalid time `{s}`"));
        let mut splits = s.split_ascii_whitespace();
        let time = splits.next().ok_or_else(malformed)?.parse()?;
        let offset = splits.next().ok_or_else(malformed)?.parse()?;
        Ok(Self { time, offset })
    }
}

impl FromStr for Signature {
    type Err = Error;

    // Andy Yu <andyyu2004@gmail.com> 1616061862 +1300
    // or, when the email is absent: Andy Yu 1616061862 +1300
    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::malformed_object(crate::hash::ObjectId::UNKNOWN, format!("invalid signature `{s}`"));
        match (s.find('<'), s.find('>')) {
            (Some(email_start), Some(email_end)) if email_start != 0 && email_end > email_start => {
                let name = s[..email_start - 1].to_owned();
                let email = Some(s[email_start + 1..email_end].to_owned());
                let time = s[email_end + 1..].trim_start().parse()?;
                Ok(Self { name, email, time })
            }
            _ => {
                // no bracketed email: the trailing two whitespace-separated
                // fields are the epoch time and offset, everything before is
                // the name
                let mut parts: Vec<&str> = s.rsplitn(3, ' ').collect();
                if parts.len() != 3 {
                    return Err(malformed());
                }
                parts.reverse();
                let name = parts[0].to_owned();
                let time: Time = format!("{} {}", parts[1], parts[2]).parse()?;
                Ok(Self { name, email: None, time })
            }
        }
    }
}

impl Display for EpochTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for TimeZoneOffset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let sign = if self.0 >= 0 { '+' } else { '-' };
        let offset = self.0.abs();
        write!(f, "{sign}{:02}{:02}", offset / 60, offset % 60)
    }
}

impl Display for Time {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.time, self.offset)
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) => write!(f, "{} <{}> {}", self.name, email, self.time),
            None => write!(f, "{} {}", self.name, self.time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_signature() {
        let s: Signature = "Andy Yu <andyyu2004@gmail.com> 1616061862 +1300".parse().unwrap();
        assert_eq!(s.name, "Andy Yu");
        assert_eq!(s.email.as_deref(), Some("andyyu2004@gmail.com"));
        assert_eq!(s.time.time.as_secs(), 1616061862);
        assert_eq!(s.time.offset.as_minutes(), 13 * 60);
        assert_eq!(s.to_string(), "Andy Yu <andyyu2004@gmail.com> 1616061862 +1300");
    }

    #[test]
    fn parses_signature_with_no_email() {
        let s: Signature = "Andy Yu 1616061862 +1300".parse().unwrap();
        assert_eq!(s.name, "Andy Yu");
        assert_eq!(s.email, None);
        assert_eq!(s.to_string(), "Andy Yu 1616061862 +1300");
    }

    #[test]
    fn rejects_negative_offset_correctly() {
        let offset: TimeZoneOffset = "-0530".parse().unwrap();
        assert_eq!(offset.as_minutes(), -(5 * 60 + 30));
        assert_eq!(offset.to_string(), "-0530");
    }

    #[test]
    fn rejects_malformed_signature() {
        assert!("no angle brackets here".parse::<Signature>().is_err());
    }
}
