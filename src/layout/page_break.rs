//! # Page Break Decisions
//!
//! Whether a band goes on the current page, moves to a new one, or is
//! placed anyway because even an empty page could not hold it.

/// What to do with a band of known height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakDecision {
    /// The band fits above the reserved space.
    Place,
    /// Close this page and place the band on the next one.
    NewPage,
    /// The band does not fit but the page holds nothing except its head,
    /// so a new page would not help. Place it and let it overflow.
    Overflow,
}

/// `required` is the band height plus everything that must still fit below
/// it (the page foot and the bottom margin). A band that would end exactly
/// on the page edge does not fit.
pub fn decide_break(required: f64, y: f64, page_height: f64, page_is_fresh: bool) -> BreakDecision {
    if y + required < page_height {
        BreakDecision::Place
    } else if page_is_fresh {
        BreakDecision::Overflow
    } else {
        BreakDecision::NewPage
    }
}
