use crate::backend::catalog::ImageRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// Full-screen viewer over the current filtered view.
///
/// While `loading` is set, navigation is refused so a slow image can't be
/// overtaken by the next one. Closing is never refused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Viewer {
    #[default]
    Closed,
    Open {
        index: usize,
        /// Id at `index`, used to find the image again when the view changes.
        id: String,
        loading: bool,
    },
}

impl Viewer {
    pub fn is_open(&self) -> bool {
        matches!(self, Viewer::Open { .. })
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Viewer::Open { loading: true, .. })
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Viewer::Open { index, .. } => Some(*index),
            Viewer::Closed => None,
        }
    }

    /// Opens on `id`. Does nothing if `id` is not part of `view`.
    pub fn open(&mut self, view: &[ImageRecord], id: &str) -> Option<usize> {
        let index = view.iter().position(|r| r.id == id)?;
        *self = Viewer::Open {
            index,
            id: id.to_string(),
            loading: true,
        };
        Some(index)
    }

    /// Steps with wraparound. Returns the new index, or `None` when the step
    /// was ignored (closed, loading, or nothing to step to).
    pub fn navigate(&mut self, view: &[ImageRecord], direction: Direction) -> Option<usize> {
        let Viewer::Open { index, id, loading } = self else {
            return None;
        };
        let len = view.len();
        if *loading || len <= 1 {
            return None;
        }

        let next = match direction {
            Direction::Prev => (*index + len - 1) % len,
            Direction::Next => (*index + 1) % len,
        };
        *index = next;
        *id = view[next].id.clone();
        *loading = true;
        Some(next)
    }

    /// The displayed image finished, successfully or not.
    pub fn image_loaded(&mut self) {
        if let Viewer::Open { loading, .. } = self {
            *loading = false;
        }
    }

    pub fn close(&mut self) {
        *self = Viewer::Closed;
    }

    /// Re-locates the open image after the view was recomputed, closing the
    /// viewer if the image is no longer part of it. Returns true if the
    /// viewer was closed.
    pub fn reconcile(&mut self, view: &[ImageRecord]) -> bool {
        let Viewer::Open { index, id, .. } = self else {
            return false;
        };
        match view.iter().position(|r| r.id == *id) {
            Some(found) => {
                *index = found;
                false
            }
            None => {
                self.close();
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(n: usize) -> Vec<ImageRecord> {
        (0..n).map(|i| ImageRecord::new(format!("{i:03}"))).collect()
    }

    fn open_at(view: &[ImageRecord], index: usize) -> Viewer {
        let mut viewer = Viewer::default();
        viewer.open(view, &view[index].id).unwrap();
        viewer.image_loaded();
        viewer
    }

    #[test]
    fn test_open_sets_loading() {
        let v = view(3);
        let mut viewer = Viewer::default();
        assert_eq!(viewer.open(&v, "001"), Some(1));
        assert!(viewer.is_loading());
        assert_eq!(viewer.index(), Some(1));
    }

    #[test]
    fn test_open_missing_is_noop() {
        let mut viewer = Viewer::default();
        assert_eq!(viewer.open(&view(3), "missing"), None);
        assert_eq!(viewer, Viewer::Closed);
    }

    #[test]
    fn test_next_and_wrap() {
        let v = view(5);
        let mut viewer = open_at(&v, 2);
        assert_eq!(viewer.navigate(&v, Direction::Next), Some(3));

        let mut viewer = open_at(&v, 4);
        assert_eq!(viewer.navigate(&v, Direction::Next), Some(0));
        viewer.image_loaded();
        assert_eq!(viewer.navigate(&v, Direction::Prev), Some(4));
    }

    #[test]
    fn test_prev_n_times_returns_home() {
        for n in 2..7 {
            let v = view(n);
            let mut viewer = open_at(&v, 0);
            for _ in 0..n {
                viewer.navigate(&v, Direction::Prev).unwrap();
                viewer.image_loaded();
            }
            assert_eq!(viewer.index(), Some(0));
        }
    }

    #[test]
    fn test_next_then_prev_is_identity() {
        let v = view(4);
        for start in 0..4 {
            let mut viewer = open_at(&v, start);
            viewer.navigate(&v, Direction::Next);
            viewer.image_loaded();
            viewer.navigate(&v, Direction::Prev);
            assert_eq!(viewer.index(), Some(start));
        }
    }

    #[test]
    fn test_navigation_blocked_while_loading() {
        let v = view(3);
        let mut viewer = Viewer::default();
        viewer.open(&v, "000");
        assert_eq!(viewer.navigate(&v, Direction::Next), None);
        assert_eq!(viewer.index(), Some(0));

        viewer.image_loaded();
        assert_eq!(viewer.navigate(&v, Direction::Next), Some(1));
    }

    #[test]
    fn test_single_image_does_not_move() {
        let v = view(1);
        let mut viewer = open_at(&v, 0);
        assert_eq!(viewer.navigate(&v, Direction::Next), None);
        assert_eq!(viewer.index(), Some(0));
        assert!(!viewer.is_loading());
    }

    #[test]
    fn test_close_allowed_while_loading() {
        let v = view(2);
        let mut viewer = Viewer::default();
        viewer.open(&v, "000");
        viewer.close();
        assert!(!viewer.is_open());
        assert_eq!(viewer.navigate(&v, Direction::Next), None);
    }

    #[test]
    fn test_reconcile_follows_image_or_closes() {
        let v = view(5);
        let mut viewer = open_at(&v, 3);

        let narrowed: Vec<_> = v.iter().skip(2).cloned().collect();
        assert!(!viewer.reconcile(&narrowed));
        assert_eq!(viewer.index(), Some(1));

        let without: Vec<_> = v.iter().take(2).cloned().collect();
        assert!(viewer.reconcile(&without));
        assert!(!viewer.is_open());
    }
}
