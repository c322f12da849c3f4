//! Age buckets an activity is offered to.
//!
//! The bucket set is the ground truth; the numeric `{min, max}` pair is always
//! re-derived from it. Older records carry a single `ageGroup` string instead
//! of a bucket list, which is still accepted on load.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeBucket {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "3-5")]
    ThreeToFive,
    #[serde(rename = "6-8")]
    SixToEight,
    #[serde(rename = "9-12")]
    NineToTwelve,
    #[serde(rename = "13+")]
    ThirteenPlus,
}

impl AgeBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeBucket::All => "all",
            AgeBucket::ThreeToFive => "3-5",
            AgeBucket::SixToEight => "6-8",
            AgeBucket::NineToTwelve => "9-12",
            AgeBucket::ThirteenPlus => "13+",
        }
    }

    /// Inclusive bounds; `None` as the upper bound means open-ended.
    fn bounds(&self) -> Option<(u8, Option<u8>)> {
        match self {
            AgeBucket::All => None,
            AgeBucket::ThreeToFive => Some((3, Some(5))),
            AgeBucket::SixToEight => Some((6, Some(8))),
            AgeBucket::NineToTwelve => Some((9, Some(12))),
            AgeBucket::ThirteenPlus => Some((13, None)),
        }
    }
}

impl FromStr for AgeBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(AgeBucket::All),
            "3-5" => Ok(AgeBucket::ThreeToFive),
            "6-8" => Ok(AgeBucket::SixToEight),
            "9-12" => Ok(AgeBucket::NineToTwelve),
            "13+" => Ok(AgeBucket::ThirteenPlus),
            other => Err(format!("unknown age bucket '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgeBounds {
    pub min: Option<u8>,
    pub max: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AgeRangeRecord", into = "AgeRangeRecord")]
pub struct AgeRange {
    buckets: BTreeSet<AgeBucket>,
}

impl Default for AgeRange {
    fn default() -> Self {
        AgeRange::from_buckets([AgeBucket::All])
    }
}

impl AgeRange {
    pub fn from_buckets(buckets: impl IntoIterator<Item = AgeBucket>) -> Self {
        let mut range = AgeRange {
            buckets: BTreeSet::new(),
        };
        for bucket in buckets {
            range.select(bucket);
        }
        range
    }

    pub fn buckets(&self) -> impl Iterator<Item = AgeBucket> + '_ {
        self.buckets.iter().copied()
    }

    pub fn contains(&self, bucket: AgeBucket) -> bool {
        self.buckets.contains(&bucket)
    }

    /// Add a bucket. `all` and the specific buckets exclude each other.
    pub fn select(&mut self, bucket: AgeBucket) {
        if bucket == AgeBucket::All {
            self.buckets.clear();
        } else {
            self.buckets.remove(&AgeBucket::All);
        }
        self.buckets.insert(bucket);
    }

    /// Flip a bucket. Deselecting the last specific bucket falls back to `all`.
    pub fn toggle(&mut self, bucket: AgeBucket) {
        if self.buckets.contains(&bucket) {
            self.buckets.remove(&bucket);
            if self.buckets.is_empty() {
                self.buckets.insert(AgeBucket::All);
            }
        } else {
            self.select(bucket);
        }
    }

    pub fn bounds(&self) -> AgeBounds {
        let mut min: Option<u8> = None;
        let mut max: Option<u8> = None;
        let mut open_ended = false;

        for bucket in &self.buckets {
            let Some((lo, hi)) = bucket.bounds() else {
                return AgeBounds {
                    min: None,
                    max: None,
                };
            };
            min = Some(min.map_or(lo, |m| m.min(lo)));
            match hi {
                Some(hi) => max = Some(max.map_or(hi, |m| m.max(hi))),
                None => open_ended = true,
            }
        }

        AgeBounds {
            min,
            max: if open_ended { None } else { max },
        }
    }

    /// Mirror written for older readers; only a lone bucket has one.
    fn legacy_group(&self) -> Option<AgeBucket> {
        match self.buckets.len() {
            1 => self.buckets.iter().next().copied(),
            _ => None,
        }
    }
}

/// Stored shape of an [`AgeRange`]; `min`/`max` are written for consumers but
/// ignored on read.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgeRangeRecord {
    #[serde(default)]
    buckets: Vec<AgeBucket>,
    #[serde(default)]
    min: Option<u8>,
    #[serde(default)]
    max: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    age_group: Option<String>,
}

impl From<AgeRangeRecord> for AgeRange {
    fn from(record: AgeRangeRecord) -> Self {
        if !record.buckets.is_empty() {
            return AgeRange::from_buckets(record.buckets);
        }

        match record.age_group.as_deref().map(str::parse::<AgeBucket>) {
            Some(Ok(bucket)) => AgeRange::from_buckets([bucket]),
            _ => AgeRange::default(),
        }
    }
}

impl From<AgeRange> for AgeRangeRecord {
    fn from(range: AgeRange) -> Self {
        let bounds = range.bounds();
        AgeRangeRecord {
            age_group: range.legacy_group().map(|b| b.as_str().to_string()),
            buckets: range.buckets.into_iter().collect(),
            min: bounds.min,
            max: bounds.max,
        }
    }
}
