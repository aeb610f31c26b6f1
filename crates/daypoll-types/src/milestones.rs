//! Participant-count milestones and their follow-up content.
//!
//! A poll carries an ordered map from threshold to follow-up content
//! identifier. The wire and storage encoding is a comma-separated list of
//! `threshold:followUpID` pairs, e.g. `"2:followA,4:followB"`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors produced by strict milestone parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MilestoneParseError {
    /// A pair was not of the form `threshold:followUpID`.
    #[error("malformed milestone pair: {0:?}")]
    MalformedPair(String),

    /// The threshold was not a positive integer.
    #[error("invalid milestone threshold: {0:?}")]
    InvalidThreshold(String),

    /// The follow-up identifier was empty.
    #[error("empty follow-up identifier for threshold {0}")]
    EmptyFollowUp(u64),

    /// The same threshold appeared more than once.
    #[error("duplicate milestone threshold {0}")]
    DuplicateThreshold(u64),
}

/// Ordered mapping from participant threshold to follow-up content id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Milestones(BTreeMap<u64, String>);

impl Milestones {
    /// An empty milestone map.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert a milestone, returning the follow-up it replaced.
    pub fn insert(&mut self, threshold: u64, follow_up: impl Into<String>) -> Option<String> {
        self.0.insert(threshold, follow_up.into())
    }

    /// The follow-up configured for `threshold`, if any.
    pub fn get(&self, threshold: u64) -> Option<&str> {
        self.0.get(&threshold).map(String::as_str)
    }

    /// Number of configured thresholds.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no thresholds are configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All milestones in ascending threshold order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &str)> {
        self.0.iter().map(|(t, f)| (*t, f.as_str()))
    }

    /// Milestones whose threshold is at or below `total`, ascending.
    pub fn reached(&self, total: u64) -> impl Iterator<Item = (u64, &str)> {
        self.0.range(..=total).map(|(t, f)| (*t, f.as_str()))
    }

    /// Decode a stored milestone string, skipping pairs that do not parse.
    ///
    /// A single bad pair never hides the remaining milestones.
    pub fn parse_lenient(raw: &str) -> Self {
        let mut out = Self::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Ok((threshold, follow_up)) = parse_pair(pair) {
                out.0.entry(threshold).or_insert_with(|| follow_up.to_owned());
            }
        }
        out
    }
}

fn parse_pair(pair: &str) -> Result<(u64, &str), MilestoneParseError> {
    let (raw_threshold, follow_up) = pair
        .split_once(':')
        .ok_or_else(|| MilestoneParseError::MalformedPair(pair.to_owned()))?;
    if follow_up.contains(':') {
        return Err(MilestoneParseError::MalformedPair(pair.to_owned()));
    }
    let threshold = raw_threshold
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|t| *t > 0)
        .ok_or_else(|| MilestoneParseError::InvalidThreshold(raw_threshold.to_owned()))?;
    let follow_up = follow_up.trim();
    if follow_up.is_empty() {
        return Err(MilestoneParseError::EmptyFollowUp(threshold));
    }
    Ok((threshold, follow_up))
}

impl FromStr for Milestones {
    type Err = MilestoneParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut out = Self::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (threshold, follow_up) = parse_pair(pair)?;
            if out.insert(threshold, follow_up).is_some() {
                return Err(MilestoneParseError::DuplicateThreshold(threshold));
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Milestones {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (threshold, follow_up)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{threshold}:{follow_up}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Milestones {
    type Error = MilestoneParseError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<Milestones> for String {
    fn from(m: Milestones) -> Self {
        m.to_string()
    }
}

impl FromIterator<(u64, String)> for Milestones {
    fn from_iter<I: IntoIterator<Item = (u64, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_orders_pairs() {
        let m: Milestones = "4:followB, 2:followA".parse().unwrap_or_default();
        let pairs: Vec<_> = m.iter().collect();
        assert_eq!(pairs, vec![(2, "followA"), (4, "followB")]);
        assert_eq!(m.to_string(), "2:followA,4:followB");
    }

    #[test]
    fn empty_string_is_no_milestones() {
        let m: Result<Milestones, _> = "".parse();
        assert_eq!(m, Ok(Milestones::new()));
    }

    #[test]
    fn strict_parse_rejects_bad_input() {
        assert_eq!(
            "abc:x".parse::<Milestones>(),
            Err(MilestoneParseError::InvalidThreshold("abc".to_owned()))
        );
        assert_eq!(
            "0:x".parse::<Milestones>(),
            Err(MilestoneParseError::InvalidThreshold("0".to_owned()))
        );
        assert_eq!(
            "5".parse::<Milestones>(),
            Err(MilestoneParseError::MalformedPair("5".to_owned()))
        );
        assert_eq!(
            "5:".parse::<Milestones>(),
            Err(MilestoneParseError::EmptyFollowUp(5))
        );
        assert_eq!(
            "5:a:b".parse::<Milestones>(),
            Err(MilestoneParseError::MalformedPair("5:a:b".to_owned()))
        );
        assert_eq!(
            "5:a,5:b".parse::<Milestones>(),
            Err(MilestoneParseError::DuplicateThreshold(5))
        );
    }

    #[test]
    fn lenient_parse_skips_bad_pairs() {
        let m = Milestones::parse_lenient("x:y,10:ten,bogus,3:three");
        let pairs: Vec<_> = m.iter().collect();
        assert_eq!(pairs, vec![(3, "three"), (10, "ten")]);
    }

    #[test]
    fn reached_is_inclusive_and_ascending() {
        let m = Milestones::parse_lenient("50:half,100:full,10:start");
        let hit: Vec<_> = m.reached(50).map(|(t, _)| t).collect();
        assert_eq!(hit, vec![10, 50]);
        assert_eq!(m.reached(9).count(), 0);
    }

    #[test]
    fn serde_uses_the_string_encoding() {
        let m = Milestones::parse_lenient("2:followA");
        let json = serde_json::to_string(&m).ok();
        assert_eq!(json.as_deref(), Some("\"2:followA\""));
        let back: Result<Milestones, _> = serde_json::from_str("\"2:followA\"");
        assert_eq!(back.ok(), Some(m));
        assert!(serde_json::from_str::<Milestones>("\"nope\"").is_err());
    }
}
