//! Line/column ranges a diagnostic points at.

use std::fmt;

/// A line/column position. Engines report `0` when a coordinate is unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl From<(u32, u32)> for Position {
    fn from((line, column): (u32, u32)) -> Self {
        Self::new(line, column)
    }
}

/// A start/end range of positions. Ordered by start, then end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextSpan {
    pub start: Position,
    pub end: Position,
}

impl TextSpan {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Span built from raw engine coordinates.
    pub const fn from_coords(line: u32, column: u32, end_line: u32, end_column: u32) -> Self {
        Self::new(Position::new(line, column), Position::new(end_line, end_column))
    }

    pub fn is_empty(&self) -> bool {
        *self == TextSpan::default()
    }
}

impl From<((u32, u32), (u32, u32))> for TextSpan {
    fn from((start, end): ((u32, u32), (u32, u32))) -> Self {
        Self::new(start.into(), end.into())
    }
}

impl fmt::Display for TextSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{},{}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}
