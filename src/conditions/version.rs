//! version string ordering
//!
//! versions in plugin descriptions are free text, so the ordering is permissive:
//! anything that is not a number is compared as lowercase text instead of being
//! rejected. a string like "1.0b" is therefore ordered after "1.0", and a
//! string with no digits at all still has a well-defined place.

use std::cmp::Ordering;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // OBSE and SKSE write versions as "0, 1, 2, 3"
    static ref COMMA_SEPARATED: Regex = Regex::new(r"\d+, \d+, \d+, \d+").unwrap();
}

/// a single dot-separated component
#[derive(Debug, Clone)]
enum Id {
    Numeric(u32),
    Text(String),
}

impl Id {
    fn parse(s: &str) -> Self {
        match s.trim().parse() {
            Ok(n) => Id::Numeric(n),
            Err(_) => Id::Text(s.to_lowercase()),
        }
    }

    fn cmp_release(&self, other: &Id) -> Ordering {
        match (self, other) {
            (Id::Numeric(a), Id::Numeric(b)) => a.cmp(b),
            (Id::Text(a), Id::Text(b)) => a.cmp(b),
            (Id::Numeric(n), Id::Text(s)) => cmp_number_with_text(*n, s),
            (Id::Text(s), Id::Numeric(n)) => cmp_number_with_text(*n, s).reverse(),
        }
    }

    fn cmp_pre_release(&self, other: &Id) -> Ordering {
        match (self, other) {
            (Id::Numeric(a), Id::Numeric(b)) => a.cmp(b),
            (Id::Text(a), Id::Text(b)) => a.cmp(b),
            (Id::Numeric(_), Id::Text(_)) => Ordering::Less,
            (Id::Text(_), Id::Numeric(_)) => Ordering::Greater,
        }
    }
}

/// compare a number against the leading digits of a text id
///
/// text without leading digits is greater, and so is text whose digits tie
fn cmp_number_with_text(n: u32, text: &str) -> Ordering {
    let digits_end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());

    match text[..digits_end].parse::<u32>() {
        Ok(leading) => match n.cmp(&leading) {
            Ordering::Equal => Ordering::Less,
            order => order,
        },
        Err(_) => Ordering::Less,
    }
}

/// a parsed version: release ids plus optional pre-release ids
#[derive(Debug, Clone)]
pub struct Version {
    release: Vec<Id>,
    pre_release: Vec<Id>,
}

impl Version {
    pub fn parse(text: &str) -> Self {
        let text = strip_metadata(text);

        let (release, pre_release) = if COMMA_SEPARATED.is_match(text) {
            (text, "")
        } else {
            text.split_once(is_separator).unwrap_or((text, ""))
        };

        Self {
            release: release.split(['.', ',']).map(Id::parse).collect(),
            pre_release: pre_release
                .split_terminator(|c| c == '.' || is_separator(c))
                .map(Id::parse)
                .collect(),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let zero = Id::Numeric(0);
        let len = self.release.len().max(other.release.len());

        for i in 0..len {
            let a = self.release.get(i).unwrap_or(&zero);
            let b = other.release.get(i).unwrap_or(&zero);
            match a.cmp_release(b) {
                Ordering::Equal => {}
                order => return order,
            }
        }

        match (self.pre_release.is_empty(), other.pre_release.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                for (a, b) in self.pre_release.iter().zip(&other.pre_release) {
                    match a.cmp_pre_release(b) {
                        Ordering::Equal => {}
                        order => return order,
                    }
                }
                self.pre_release.len().cmp(&other.pre_release.len())
            }
        }
    }
}

/// order two version strings
pub fn compare(actual: &str, expected: &str) -> Ordering {
    Version::parse(actual).cmp(&Version::parse(expected))
}

fn is_separator(c: char) -> bool {
    matches!(c, '-' | ' ' | ':' | '_')
}

fn strip_metadata(text: &str) -> &str {
    if text.is_empty() {
        return "0";
    }
    text.split_once('+').map_or(text, |(prefix, _)| prefix)
}
