use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, ProfileResult};

/// Hours `[start_index, start_index + length - 1]` of the profile tables.
///
/// `start_index` is 1-based, so hour 1 is the first table row. Absolute hour
/// numbers in results use the same numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalWindow {
    pub start_index: usize,
    pub length: usize,
}

impl IntervalWindow {
    pub fn new(start_index: usize, length: usize) -> ProfileResult<Self> {
        if start_index == 0 || length == 0 || start_index.checked_add(length).is_none() {
            return Err(ProfileError::InvalidWindow {
                start_index,
                length,
            });
        }
        Ok(Self {
            start_index,
            length,
        })
    }

    /// Window `i` (0-based) of a horizon tiled by `length`-hour windows
    /// starting at `start_index`.
    pub fn nth(start_index: usize, length: usize, i: usize) -> ProfileResult<Self> {
        let start = i
            .checked_mul(length)
            .and_then(|offset| offset.checked_add(start_index))
            .ok_or(ProfileError::WindowOverflow {
                start_index,
                length,
                interval: i,
            })?;
        Self::new(start, length)
    }

    /// Last hour covered, inclusive.
    pub fn end_index(&self) -> usize {
        self.start_index + self.length - 1
    }

    /// 0-based row range into the profile tables.
    pub fn rows(&self) -> Range<usize> {
        self.start_index - 1..self.start_index - 1 + self.length
    }

    /// Absolute 1-based hour numbers covered.
    pub fn hours(&self) -> impl Iterator<Item = usize> {
        self.start_index..=self.end_index()
    }

    /// The window immediately following this one.
    pub fn next(&self) -> Self {
        Self {
            start_index: self.start_index + self.length,
            length: self.length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_ranges() {
        let w = IntervalWindow::new(25, 24).unwrap();
        assert_eq!(w.end_index(), 48);
        assert_eq!(w.rows(), 24..48);
        assert_eq!(w.hours().next(), Some(25));
        assert_eq!(w.hours().last(), Some(48));
    }

    #[test]
    fn test_windows_tile_contiguously() {
        let first = IntervalWindow::nth(1, 6, 0).unwrap();
        let third = IntervalWindow::nth(1, 6, 2).unwrap();
        assert_eq!(first.next().next(), third);
        assert_eq!(first.next().start_index, first.end_index() + 1);
        assert_eq!(third.rows(), 12..18);
    }

    #[test]
    fn test_invalid_window() {
        assert!(IntervalWindow::new(0, 24).is_err());
        assert!(IntervalWindow::new(1, 0).is_err());
        assert!(IntervalWindow::new(usize::MAX, 1).is_err());
    }

    #[test]
    fn test_nth_overflow_is_an_error() {
        assert!(matches!(
            IntervalWindow::nth(1, usize::MAX / 2, 3),
            Err(ProfileError::WindowOverflow { interval: 3, .. })
        ));
        let last = IntervalWindow::nth(1, usize::MAX / 2, 1).unwrap();
        assert_eq!(last.end_index(), usize::MAX - 1);
    }
}
