use chrono::NaiveDate;
use std::fmt::{self, Display};

use crate::format::imap_date;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceRange {
    Single(u32),
    Range(u32, u32),
}

/// Set of message numbers or UIDs as written on the wire (`1:3,7,9:12`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceSet {
    pub(crate) parts: Vec<SequenceRange>,
}

impl SequenceSet {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Builds the shortest set covering `ids`, in any order and with duplicates.
    pub fn from_ids(ids: &[u32]) -> Self {
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut set = Self::new();
        let mut iter = sorted.into_iter();
        let Some(first) = iter.next() else {
            return set;
        };

        let (mut start, mut end) = (first, first);
        for id in iter {
            if end.checked_add(1) == Some(id) {
                end = id;
                continue;
            }
            set = set.add_span(start, end);
            start = id;
            end = id;
        }
        set.add_span(start, end)
    }

    pub fn add_single(mut self, n: u32) -> Self {
        self.parts.push(SequenceRange::Single(n));
        self
    }

    pub fn add_range(mut self, start: u32, end: u32) -> Self {
        self.parts.push(SequenceRange::Range(start, end));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn add_span(self, start: u32, end: u32) -> Self {
        if start == end {
            self.add_single(start)
        } else {
            self.add_range(start, end)
        }
    }
}

impl Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceRange::Single(n) => write!(f, "{}", n),
            SequenceRange::Range(s, e) => write!(f, "{}:{}", s, e),
        }
    }
}

impl Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.parts {
            if !first {
                f.write_str(",")?;
            } else {
                first = false;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

/// Criteria accepted by [`Session::search`](crate::Session::search): date
/// windows over the internal date, optionally narrowed to unread mail.
///
/// Date keys only carry a day: IMAP compares dates, not instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    All,
    /// Every key must match.
    And(Vec<SearchKey>),
    Before(NaiveDate),
    Not(Box<SearchKey>),
    On(NaiveDate),
    Since(NaiveDate),
    Unseen,
}

impl Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SearchKey as K;
        match self {
            K::All => f.write_str("ALL"),
            K::And(keys) => {
                let mut first = true;
                for key in keys {
                    if !first {
                        f.write_str(" ")?;
                    } else {
                        first = false;
                    }
                    write!(f, "{}", key)?;
                }
                Ok(())
            }
            K::Before(d) => write!(f, "BEFORE {}", imap_date(*d)),
            K::Not(k) => write!(f, "NOT ({})", k),
            K::On(d) => write!(f, "ON {}", imap_date(*d)),
            K::Since(d) => write!(f, "SINCE {}", imap_date(*d)),
            K::Unseen => f.write_str("UNSEEN"),
        }
    }
}
