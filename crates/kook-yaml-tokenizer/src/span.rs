//! Byte ranges into the source text.

/// A half-open byte range `[start, end)` in the source text.
///
/// Offsets are `u32`: configuration files are far below 4 GiB, and tokens
/// stay small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Byte offset of the first byte of the range.
    pub start: u32,
    /// Byte offset one past the last byte of the range.
    pub end: u32,
}

impl Span {
    /// Span from `start` up to, not including, `end`.
    #[inline]
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span starts after it ends: {start}..{end}");
        Self { start, end }
    }

    /// A zero-width span at `pos`, used for missing nodes such as the null
    /// value of `key:`.
    #[inline]
    pub fn empty(pos: u32) -> Self {
        Self::new(pos, pos)
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both `self` and `other`, e.g. from a
    /// collection's first token to its last.
    #[inline]
    pub fn extend(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// The text this span covers in `source`.
    #[inline]
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start as usize..self.end as usize]
    }
}

/// Diagnostics renderers take `usize` ranges.
impl From<Span> for std::ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start as usize..span.end as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_and_len() {
        let source = "key: value";
        let value = Span::new(5, 10);
        assert_eq!(value.slice(source), "value");
        assert_eq!(value.len(), 5);
        assert!(!value.is_empty());
        assert!(Span::empty(4).is_empty());
        assert_eq!(Span::empty(4).slice(source), "");
    }

    #[test]
    fn test_extend_covers_both_in_any_order() {
        let key = Span::new(0, 3);
        let value = Span::new(5, 10);
        assert_eq!(key.extend(value), Span::new(0, 10));
        assert_eq!(value.extend(key), Span::new(0, 10));
        assert_eq!(key.extend(Span::empty(1)), key);
    }

    #[test]
    fn test_into_range() {
        let range: std::ops::Range<usize> = Span::new(2, 7).into();
        assert_eq!(range, 2..7);
    }
}
