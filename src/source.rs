use std::fmt;
use std::ops::Range;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)] // Default for runtime-built nodes
pub struct Span {
    pub start: usize, // Byte offset
    pub end: usize,   // Byte offset (exclusive)
}

impl Span {
    /// Marks code that was not read from user input, such as the prelude.
    pub const DETACHED: Span = Span {
        start: usize::MAX,
        end: usize::MAX,
    };

    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    // Helper to merge two spans (e.g., for lists)
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn is_detached(self) -> bool {
        self == Span::DETACHED
    }

    pub fn to_range(self) -> Range<usize> {
        self.start..self.end
    }

    /// Clamps the span into `0..=len`, for spans that may not belong to the
    /// text being reported on.
    pub fn clamp(self, len: usize) -> Span {
        let start = self.start.min(len);
        Span {
            start,
            end: self.end.clamp(start, len),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
