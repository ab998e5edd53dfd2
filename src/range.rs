use std::fmt;
use std::str::FromStr;

use crate::{RangeError, StreamingPolicy};

const BYTES_UNIT: &str = "bytes";

/// A single byte range as written in a `Range` header, before it has been
/// checked against the size of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=<start>-<end>`
    Bounded { start: u64, end: u64 },
    /// `bytes=<start>-`
    From { start: u64 },
    /// `bytes=-<len>`, the last `len` bytes.
    Suffix { len: u64 },
}

impl RangeSpec {
    /// Parses the value of a `Range` header.
    ///
    /// Only a single range is supported. Anything else, including
    /// `bytes=0-1,5-6`, is rejected as [`RangeError::Malformed`].
    pub fn parse(header: &str) -> Result<RangeSpec, RangeError> {
        let malformed = || RangeError::Malformed(header.to_string());

        let (unit, set) = header.trim().split_once('=').ok_or_else(malformed)?;
        if !unit.trim().eq_ignore_ascii_case(BYTES_UNIT) {
            return Err(malformed());
        }
        if set.contains(',') {
            return Err(malformed());
        }

        let (first, last) = set.split_once('-').ok_or_else(malformed)?;
        match (parse_pos(first), parse_pos(last)) {
            (Ok(Some(start)), Ok(Some(end))) => Ok(RangeSpec::Bounded { start, end }),
            (Ok(Some(start)), Ok(None)) => Ok(RangeSpec::From { start }),
            (Ok(None), Ok(Some(len))) => Ok(RangeSpec::Suffix { len }),
            _ => Err(malformed()),
        }
    }

    /// Resolves this range against a resource of `total_size` bytes.
    ///
    /// The open-ended form is capped at [`StreamingPolicy::chunk_cap_bytes`]
    /// so that seeking clients receive the file a chunk at a time. Explicit
    /// windows are taken as given and are not clamped to the resource.
    pub fn resolve(self, total_size: u64, policy: &StreamingPolicy) -> Result<ByteRange, RangeError> {
        let not_satisfiable = || RangeError::NotSatisfiable { spec: self, total_size };

        let last = total_size.checked_sub(1).ok_or_else(not_satisfiable)?;

        let (start, end) = match self {
            RangeSpec::Bounded { start, end } => (start, end),
            RangeSpec::From { start } => {
                let cap = policy.chunk_cap_bytes.max(1);
                (start, start.saturating_add(cap - 1).min(last))
            }
            RangeSpec::Suffix { len } => (total_size.saturating_sub(len), last),
        };

        if start >= total_size || end >= total_size || start > end {
            return Err(not_satisfiable());
        }

        Ok(ByteRange { start, end })
    }
}

/// Parses one side of `<first>-<last>`. An empty side is `None`; leading
/// signs and whitespace are not allowed.
fn parse_pos(s: &str) -> Result<Option<u64>, ()> {
    if s.is_empty() {
        return Ok(None);
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(());
    }
    s.parse::<u64>().map(Some).map_err(|_| ())
}

impl FromStr for RangeSpec {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RangeSpec::parse(s)
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeSpec::Bounded { start, end } => write!(f, "{BYTES_UNIT}={start}-{end}"),
            RangeSpec::From { start } => write!(f, "{BYTES_UNIT}={start}-"),
            RangeSpec::Suffix { len } => write!(f, "{BYTES_UNIT}=-{len}"),
        }
    }
}

/// A satisfiable, inclusive byte window `start..=end` into a resource.
///
/// Only [`RangeSpec::resolve`] produces these, so `start <= end` always holds
/// and `end` is within the resource the range was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// Offset of the first byte.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Offset of the last byte, inclusive.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes in the window, `end - start + 1`.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always `false`: a resolved range covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    use super::*;

    const MIB: u64 = 1_048_576;

    fn policy() -> StreamingPolicy {
        StreamingPolicy::default()
    }

    fn resolve(header: &str, total: u64) -> Result<(u64, u64), RangeError> {
        RangeSpec::parse(header)?
            .resolve(total, &policy())
            .map(|r| (r.start(), r.end()))
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(RangeSpec::Bounded { start: 0, end: 29 }, "bytes=0-29".parse::<RangeSpec>().unwrap());
        assert_eq!(RangeSpec::From { start: 40 }, "bytes=40-".parse::<RangeSpec>().unwrap());
        assert_eq!(RangeSpec::Suffix { len: 20 }, "bytes=-20".parse::<RangeSpec>().unwrap());
        assert_eq!(RangeSpec::From { start: 7 }, " Bytes=7- ".parse::<RangeSpec>().unwrap());
    }

    #[test]
    fn test_parse_malformed() {
        for header in [
            "",
            "bytes",
            "bytes=",
            "bytes=-",
            "bytes=a-b",
            "bytes=1-2-3",
            "bytes=+1-2",
            "bytes= 1-2",
            "bytes=0-4,-1",
            "items=0-4",
            "0-4",
            "bytes=99999999999999999999-",
        ] {
            assert_matches!(RangeSpec::parse(header), Err(RangeError::Malformed(_)), "{header:?}");
        }
    }

    #[test]
    fn test_display_round_trips() {
        for header in ["bytes=3-9", "bytes=3-", "bytes=-9"] {
            assert_eq!(header, RangeSpec::parse(header).unwrap().to_string());
        }
    }

    #[test]
    fn test_open_ended_is_capped() {
        assert_eq!(Ok((0, MIB - 1)), resolve("bytes=0-", 5_000_000));
        assert_eq!(Ok((4_500_000, 4_999_999)), resolve("bytes=4500000-", 5_000_000));
        assert_eq!(Ok((1990, 1999)), resolve("bytes=1990-", 2000));
    }

    #[test]
    fn test_explicit_end_past_size_is_unsatisfiable() {
        assert_matches!(
            resolve("bytes=1990-2500", 2000),
            Err(RangeError::NotSatisfiable { total_size: 2000, .. })
        );
    }

    #[test]
    fn test_suffix() {
        assert_eq!(Ok((1900, 1999)), resolve("bytes=-100", 2000));
        assert_eq!(Ok((0, 1999)), resolve("bytes=-5000", 2000));
        assert_matches!(resolve("bytes=-0", 2000), Err(RangeError::NotSatisfiable { .. }));
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(Ok((0, 0)), resolve("bytes=0-0", 2000));
        assert_matches!(resolve("bytes=2000-", 2000), Err(RangeError::NotSatisfiable { .. }));
        assert_matches!(resolve("bytes=30-29", 2000), Err(RangeError::NotSatisfiable { .. }));
        assert_matches!(resolve("bytes=0-", 0), Err(RangeError::NotSatisfiable { total_size: 0, .. }));
        assert_matches!(resolve("bytes=-10", 0), Err(RangeError::NotSatisfiable { .. }));
    }

    #[test]
    fn test_custom_chunk_cap() {
        let policy = StreamingPolicy { chunk_cap_bytes: 10, ..StreamingPolicy::default() };
        let range = RangeSpec::From { start: 5 }.resolve(100, &policy).unwrap();
        assert_eq!((5, 14), (range.start(), range.end()));
        assert_eq!(10, range.len());
        assert!(!range.is_empty());
    }

    proptest! {
        #[test]
        fn prop_explicit_window_is_exact(total in 1u64..u64::MAX / 2, a in any::<u64>(), b in any::<u64>()) {
            let (a, b) = (a % total, b % total);
            let (a, b) = (a.min(b), a.max(b));
            let range = RangeSpec::Bounded { start: a, end: b }.resolve(total, &policy()).unwrap();
            prop_assert_eq!((a, b), (range.start(), range.end()));
            prop_assert_eq!(b - a + 1, range.len());
        }

        #[test]
        fn prop_open_ended_end_is_bounded(total in 1u64..(64 * MIB), a in any::<u64>()) {
            let a = a % total;
            let range = RangeSpec::From { start: a }.resolve(total, &policy()).unwrap();
            prop_assert_eq!(a, range.start());
            prop_assert_eq!((a + MIB - 1).min(total - 1), range.end());
            prop_assert!(range.end() >= a);
        }

        #[test]
        fn prop_suffix_takes_the_tail(total in 1u64..u64::MAX, n in any::<u64>()) {
            let n = n % total + 1;
            let range = RangeSpec::Suffix { len: n }.resolve(total, &policy()).unwrap();
            prop_assert_eq!(total - n, range.start());
            prop_assert_eq!(total - 1, range.end());
        }

        #[test]
        fn prop_resolved_ranges_fit(total in 0u64..10_000, header in "bytes=[0-9]{0,5}-[0-9]{0,5}") {
            if let Ok(spec) = RangeSpec::parse(&header) {
                if let Ok(range) = spec.resolve(total, &policy()) {
                    prop_assert!(range.start() <= range.end());
                    prop_assert!(range.end() < total);
                }
            }
        }
    }
}
