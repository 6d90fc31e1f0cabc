//! HTTP byte ranges for audio streaming.
//!
//! Only single ranges in the `bytes` unit are honoured. Anything else,
//! including multi-range requests, is treated as if no `Range` header had
//! been sent, which makes the proxy answer with the full file.

use std::fmt;

/// A parsed `Range: bytes=...` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=a-b`, both inclusive
    Bounded { start: u64, end: u64 },
    /// `bytes=a-`
    From { start: u64 },
    /// `bytes=-n`, the last `n` bytes
    Suffix { length: u64 },
}

/// The requested range cannot be served for a file of `size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsatisfiable {
    pub size: u64,
}

impl Unsatisfiable {
    /// `Content-Range` value of a 416 response.
    pub fn content_range(&self) -> String {
        format!("bytes */{}", self.size)
    }
}

/// A range resolved against a file size. Both ends inclusive, never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    pub end: u64,
    pub size: u64,
}

impl ResolvedRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false: a resolved range holds at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` value of a 206 response.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.size)
    }

    /// Range to request upstream for exactly these bytes.
    pub fn to_request(&self) -> ByteRange {
        ByteRange::Bounded {
            start: self.start,
            end: self.end,
        }
    }

    /// Covers the whole file.
    pub fn is_full(&self) -> bool {
        self.start == 0 && self.end + 1 == self.size
    }
}

impl ByteRange {
    /// Parses a `Range` header value. Returns `None` for headers that must
    /// be ignored.
    ///
    /// ```
    /// use provider_google_drive::range::ByteRange;
    ///
    /// assert_eq!(ByteRange::parse("bytes=0-1023"), Some(ByteRange::Bounded { start: 0, end: 1023 }));
    /// assert_eq!(ByteRange::parse("bytes=500-"), Some(ByteRange::From { start: 500 }));
    /// assert_eq!(ByteRange::parse("bytes=-200"), Some(ByteRange::Suffix { length: 200 }));
    /// assert_eq!(ByteRange::parse("bytes=0-10,20-30"), None);
    /// assert_eq!(ByteRange::parse("items=0-1"), None);
    /// ```
    pub fn parse(header: &str) -> Option<Self> {
        let (unit, ranges) = header.trim().split_once('=')?;
        if !unit.trim().eq_ignore_ascii_case("bytes") || ranges.contains(',') {
            return None;
        }
        let (first, last) = ranges.trim().split_once('-')?;
        let (first, last) = (first.trim(), last.trim());

        match (first.is_empty(), last.is_empty()) {
            (true, true) => None,
            (true, false) => Some(ByteRange::Suffix {
                length: parse_position(last)?,
            }),
            (false, true) => Some(ByteRange::From {
                start: parse_position(first)?,
            }),
            (false, false) => {
                let start = parse_position(first)?;
                let end = parse_position(last)?;
                (start <= end).then_some(ByteRange::Bounded { start, end })
            }
        }
    }

    /// Resolves the range against a file of `size` bytes, clamping the end
    /// to the last byte.
    pub fn resolve(&self, size: u64) -> Result<ResolvedRange, Unsatisfiable> {
        let unsatisfiable = Unsatisfiable { size };
        if size == 0 {
            return Err(unsatisfiable);
        }
        let last = size - 1;

        let (start, end) = match *self {
            ByteRange::Bounded { start, end } => (start, end.min(last)),
            ByteRange::From { start } => (start, last),
            ByteRange::Suffix { length } => {
                if length == 0 {
                    return Err(unsatisfiable);
                }
                (size.saturating_sub(length), last)
            }
        };

        if start > last {
            return Err(unsatisfiable);
        }
        Ok(ResolvedRange { start, end, size })
    }
}

impl fmt::Display for ByteRange {
    /// Formats as a `Range` header value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteRange::Bounded { start, end } => write!(f, "bytes={}-{}", start, end),
            ByteRange::From { start } => write!(f, "bytes={}-", start),
            ByteRange::Suffix { length } => write!(f, "bytes=-{}", length),
        }
    }
}

fn parse_position(value: &str) -> Option<u64> {
    if value.bytes().all(|b| b.is_ascii_digit()) {
        value.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tolerates_whitespace_and_case() {
        assert_eq!(
            ByteRange::parse(" Bytes = 10 - 20 "),
            Some(ByteRange::Bounded { start: 10, end: 20 })
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for header in ["", "bytes", "bytes=", "bytes=-", "bytes=a-b", "bytes=20-10", "bytes=+5-", "bytes=1-2-3"] {
            assert_eq!(ByteRange::parse(header), None, "{header:?}");
        }
    }

    #[test]
    fn test_resolve_bounded() {
        let range = ByteRange::Bounded { start: 0, end: 1023 }.resolve(4096).unwrap();
        assert_eq!(range.len(), 1024);
        assert_eq!(range.content_range(), "bytes 0-1023/4096");
        assert!(!range.is_full());
    }

    #[test]
    fn test_resolve_clamps_end() {
        let range = ByteRange::Bounded { start: 4000, end: 9999 }.resolve(4096).unwrap();
        assert_eq!((range.start, range.end), (4000, 4095));
    }

    #[test]
    fn test_resolve_open_and_suffix() {
        let open = ByteRange::From { start: 96 }.resolve(100).unwrap();
        assert_eq!(open.content_range(), "bytes 96-99/100");

        let suffix = ByteRange::Suffix { length: 10 }.resolve(100).unwrap();
        assert_eq!(suffix.content_range(), "bytes 90-99/100");

        let oversized = ByteRange::Suffix { length: 500 }.resolve(100).unwrap();
        assert!(oversized.is_full());
    }

    #[test]
    fn test_unsatisfiable_ranges() {
        assert_eq!(
            ByteRange::From { start: 100 }.resolve(100),
            Err(Unsatisfiable { size: 100 })
        );
        assert!(ByteRange::Suffix { length: 0 }.resolve(100).is_err());
        assert!(ByteRange::Bounded { start: 0, end: 0 }.resolve(0).is_err());
        assert_eq!(Unsatisfiable { size: 100 }.content_range(), "bytes */100");
    }

    #[test]
    fn test_display_as_header() {
        assert_eq!(ByteRange::Bounded { start: 5, end: 9 }.to_string(), "bytes=5-9");
        assert_eq!(ByteRange::From { start: 5 }.to_string(), "bytes=5-");
        assert_eq!(ByteRange::Suffix { length: 5 }.to_string(), "bytes=-5");
    }
}
