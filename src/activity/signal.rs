//! Raw page signals fed by the embedding host.

/// Page visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// The page is in the foreground.
    Visible,
    /// The tab is hidden or minimized.
    Hidden,
}

/// One raw observation from the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageSignal {
    /// The page scrolled.
    Scroll {
        /// Current vertical offset.
        offset: f64,
        /// Largest reachable offset (document height minus viewport height).
        max_scrollable: f64,
    },
    /// The visitor clicked.
    Click,
    /// Visibility changed.
    Visibility(Visibility),
}

impl PageSignal {
    /// Creates a scroll signal.
    #[inline]
    #[must_use]
    pub const fn scroll(offset: f64, max_scrollable: f64) -> Self {
        Self::Scroll {
            offset,
            max_scrollable,
        }
    }
}

/// Converts a scroll position into a percentage in `[0, 100]`.
///
/// A page that cannot scroll counts as fully scrolled. Returns `None` for
/// non-finite input.
pub(crate) fn scroll_percentage(offset: f64, max_scrollable: f64) -> Option<f64> {
    if !offset.is_finite() || !max_scrollable.is_finite() {
        return None;
    }
    if max_scrollable <= 0.0 {
        return Some(100.0);
    }
    Some((offset * 100.0 / max_scrollable).clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_percentage() {
        assert_eq!(scroll_percentage(0.0, 1000.0), Some(0.0));
        assert_eq!(scroll_percentage(250.0, 1000.0), Some(25.0));
        assert_eq!(scroll_percentage(1500.0, 1000.0), Some(100.0));
        assert_eq!(scroll_percentage(-20.0, 1000.0), Some(0.0));
    }

    #[test]
    fn test_unscrollable_page_counts_as_full() {
        assert_eq!(scroll_percentage(0.0, 0.0), Some(100.0));
    }

    #[test]
    fn test_non_finite_is_rejected() {
        assert_eq!(scroll_percentage(f64::NAN, 100.0), None);
        assert_eq!(scroll_percentage(10.0, f64::INFINITY), None);
    }
}
