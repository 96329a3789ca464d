//! Section/step navigation state machine for the onboarding guide.
//!
//! Positions are 1-based indexes into the ordered section list and the ordered
//! step list of the current section. The machine only needs list lengths; the
//! caller resolves entities.

use std::fmt;

/// Current position in the guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuideCursor {
    section: u32,
    step: u32,
}

/// Result of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// The request was not applicable (first/last position); state unchanged.
    Stay,
    /// Moved within the current section.
    Step(GuideCursor),
    /// Moved into another section. `left` is the section position that was left.
    CrossSection { left: u32, to: GuideCursor },
}

impl Move {
    /// Destination cursor, if the move changed the position.
    #[must_use]
    pub fn target(self) -> Option<GuideCursor> {
        match self {
            Move::Stay => None,
            Move::Step(to) | Move::CrossSection { to, .. } => Some(to),
        }
    }
}

impl Default for GuideCursor {
    fn default() -> Self {
        Self::start()
    }
}

impl GuideCursor {
    /// The initial position `(1, 1)`.
    #[must_use]
    pub fn start() -> Self {
        Self { section: 1, step: 1 }
    }

    /// Builds a cursor, treating zero as position 1.
    #[must_use]
    pub fn at(section: u32, step: u32) -> Self {
        Self {
            section: section.max(1),
            step: step.max(1),
        }
    }

    #[must_use]
    pub fn section(&self) -> u32 {
        self.section
    }

    #[must_use]
    pub fn step(&self) -> u32 {
        self.step
    }

    /// Zero-based section index.
    #[must_use]
    pub fn section_index(&self) -> usize {
        usize::try_from(self.section - 1).unwrap_or(usize::MAX)
    }

    /// Zero-based step index within the section.
    #[must_use]
    pub fn step_index(&self) -> usize {
        usize::try_from(self.step - 1).unwrap_or(usize::MAX)
    }

    /// True on the final step of the final section, where "next" is disabled.
    #[must_use]
    pub fn is_last(&self, section_len: u32, section_count: u32) -> bool {
        self.section >= section_count && self.step >= section_len
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.section == 1 && self.step == 1
    }

    /// Advance one step, crossing into the next section after its last step.
    #[must_use]
    pub fn next(self, section_len: u32, section_count: u32) -> Move {
        if self.step < section_len {
            return Move::Step(Self {
                section: self.section,
                step: self.step + 1,
            });
        }
        if self.section < section_count {
            return Move::CrossSection {
                left: self.section,
                to: Self::at(self.section + 1, 1),
            };
        }
        Move::Stay
    }

    /// Go back one step. From the first step of a section this lands on the last
    /// step of the previous section, or its first step when that section is empty.
    #[must_use]
    pub fn prev(self, previous_section_len: u32) -> Move {
        if self.step > 1 {
            return Move::Step(Self {
                section: self.section,
                step: self.step - 1,
            });
        }
        if self.section > 1 {
            return Move::CrossSection {
                left: self.section,
                to: Self::at(self.section - 1, previous_section_len),
            };
        }
        Move::Stay
    }

    /// Jump to the first step of the next section without any completion check.
    #[must_use]
    pub fn skip_section(self, section_count: u32) -> Move {
        if self.section < section_count {
            Move::CrossSection {
                left: self.section,
                to: Self::at(self.section + 1, 1),
            }
        } else {
            Move::Stay
        }
    }
}

impl fmt::Display for GuideCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_within_section() {
        let moved = GuideCursor::start().next(3, 2);
        assert_eq!(moved, Move::Step(GuideCursor::at(1, 2)));
    }

    #[test]
    fn next_crosses_section_boundary() {
        let moved = GuideCursor::at(1, 3).next(3, 2);
        assert_eq!(
            moved,
            Move::CrossSection {
                left: 1,
                to: GuideCursor::at(2, 1)
            }
        );
    }

    #[test]
    fn next_from_terminal_is_noop() {
        let cursor = GuideCursor::at(2, 4);
        assert!(cursor.is_last(4, 2));
        assert_eq!(cursor.next(4, 2), Move::Stay);
    }

    #[test]
    fn prev_from_start_is_noop() {
        assert_eq!(GuideCursor::start().prev(0), Move::Stay);
    }

    #[test]
    fn prev_lands_on_last_step_of_previous_section() {
        let moved = GuideCursor::at(3, 1).prev(5);
        assert_eq!(
            moved,
            Move::CrossSection {
                left: 3,
                to: GuideCursor::at(2, 5)
            }
        );
    }

    #[test]
    fn prev_into_empty_section_lands_on_first_step() {
        let moved = GuideCursor::at(2, 1).prev(0);
        assert_eq!(moved.target(), Some(GuideCursor::at(1, 1)));
    }

    #[test]
    fn skip_section_ignores_step_position() {
        let moved = GuideCursor::at(1, 2).skip_section(3);
        assert_eq!(moved.target(), Some(GuideCursor::at(2, 1)));
        assert_eq!(GuideCursor::at(3, 1).skip_section(3), Move::Stay);
    }

    #[test]
    fn zero_positions_are_normalised() {
        assert_eq!(GuideCursor::at(0, 0), GuideCursor::start());
        assert_eq!(GuideCursor::at(2, 3).to_string(), "2.3");
    }
}
