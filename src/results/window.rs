use crate::core::error::{Error, Result};
use crate::results::fetch::HitFetcher;
use crate::results::store::HitsStore;

/// A page of results: `number` hits starting at `first`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub first: usize,
    pub number: usize,
}

impl Window {
    pub fn new(first: usize, number: usize) -> Self {
        Window { first, number }
    }
}

/// The hits of one window, and whether there is more on either side
#[derive(Debug, Clone)]
pub struct HitsWindow {
    hits: HitsStore,
    window: Window,
    has_next: bool,
}

impl HitsWindow {
    pub fn hits(&self) -> &HitsStore {
        &self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn first(&self) -> usize {
        self.window.first
    }

    /// Requested size; the window may hold fewer hits at the end
    pub fn requested(&self) -> usize {
        self.window.number
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn has_previous(&self) -> bool {
        self.window.first > 0
    }

    pub fn next_window(&self) -> Option<Window> {
        self.has_next.then(|| Window::new(self.window.first + self.window.number, self.window.number))
    }
}

fn check_first(first: usize, available: usize) -> Result<()> {
    if first > 0 && first >= available {
        return Err(Error::invalid_argument(format!(
            "window start {} out of range ({} hits)",
            first, available
        )));
    }
    Ok(())
}

impl HitsStore {
    pub fn window(&self, first: usize, number: usize) -> Result<HitsWindow> {
        check_first(first, self.len())?;
        let end = first.saturating_add(number);
        Ok(HitsWindow {
            hits: self.range(first..end),
            window: Window::new(first, number),
            has_next: self.len() > end,
        })
    }
}

impl HitFetcher {
    /// Window over hits that may still be being fetched. Reads one hit past
    /// the window to know whether there is a next one.
    pub fn window(&self, first: usize, number: usize) -> Result<HitsWindow> {
        let end = first.saturating_add(number);
        self.ensure_results_read(end.saturating_add(1).min(i64::MAX as usize) as i64)?;
        let available = self.stats().processed_so_far().max(0) as usize;
        check_first(first, available)?;
        Ok(HitsWindow {
            hits: self.hits_range(first..end),
            window: Window::new(first, number),
            has_next: available > end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::results::hit::Hit;

    fn store(n: i32) -> HitsStore {
        let hits: Vec<Hit> = (0..n).map(|i| Hit::new(i / 3, i % 3, i % 3 + 1)).collect();
        HitsStore::from_hits(&hits).unwrap()
    }

    #[test]
    fn last_window_is_short() {
        let window = store(12).window(5, 10).unwrap();
        assert_eq!(window.len(), 7);
        assert!(!window.has_next());
        assert!(window.has_previous());
        assert_eq!(window.requested(), 10);
        assert!(window.next_window().is_none());
    }

    #[test]
    fn full_window_has_next() {
        let window = store(12).window(0, 5).unwrap();
        assert_eq!(window.len(), 5);
        assert!(window.has_next());
        assert_eq!(window.next_window(), Some(Window::new(5, 5)));
        assert!(!store(10).window(5, 5).unwrap().has_next());
    }

    #[test]
    fn start_out_of_range() {
        assert!(store(0).window(0, 10).unwrap().is_empty());
        assert!(store(3).window(3, 1).unwrap_err().is(ErrorKind::InvalidArgument));
    }
}
