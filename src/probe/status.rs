//! Expected-status predicate.

use std::fmt;
use std::ops::RangeInclusive;

use super::ProbeError;

/// Set of HTTP status codes that count as "up".
///
/// Parsed from a comma list of codes and inclusive ranges, e.g. `200-299,301`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMatcher {
    ranges: Vec<RangeInclusive<u16>>,
}

impl StatusMatcher {
    pub fn parse(list: &str) -> Result<Self, ProbeError> {
        let mut ranges = Vec::new();

        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let range = match part.split_once('-') {
                Some((lo, hi)) => parse_code(lo)?..=parse_code(hi)?,
                None => {
                    let code = parse_code(part)?;
                    code..=code
                }
            };
            if range.is_empty() {
                return Err(ProbeError::Config(format!("status range {} is reversed", part)));
            }
            ranges.push(range);
        }

        if ranges.is_empty() {
            return Err(ProbeError::Config("expected status list is empty".to_string()));
        }

        Ok(Self { ranges })
    }

    pub fn matches(&self, code: u16) -> bool {
        self.ranges.iter().any(|r| r.contains(&code))
    }
}

impl Default for StatusMatcher {
    fn default() -> Self {
        Self {
            ranges: vec![200..=200],
        }
    }
}

impl fmt::Display for StatusMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .ranges
            .iter()
            .map(|r| {
                if r.start() == r.end() {
                    r.start().to_string()
                } else {
                    format!("{}-{}", r.start(), r.end())
                }
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

fn parse_code(s: &str) -> Result<u16, ProbeError> {
    let code: u16 = s
        .trim()
        .parse()
        .map_err(|_| ProbeError::Config(format!("invalid status code: {:?}", s)))?;
    if !(100..=599).contains(&code) {
        return Err(ProbeError::Config(format!("status code {} out of range", code)));
    }
    Ok(code)
}
