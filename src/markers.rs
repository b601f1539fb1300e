use log::debug;

/// Markers closer than this are the same marker.
pub const MARKER_EPSILON: f64 = 1e-4;

/// How close a click must land to an existing marker to remove it.
pub const CLICK_TOLERANCE: f64 = 0.05;

/// Chop boundaries in seconds, manual and detected alike.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarkerSet {
    times: Vec<f64>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a marker unless one already sits within `MARKER_EPSILON`.
    /// Returns whether the set changed.
    pub fn add(&mut self, time: f64) -> bool {
        if !time.is_finite() || self.position_near(time, MARKER_EPSILON).is_some() {
            return false;
        }
        self.times.push(time);
        true
    }

    /// Removes the first marker within `tolerance` of `time`.
    pub fn remove_near(&mut self, time: f64, tolerance: f64) -> Option<f64> {
        let idx = self.position_near(time, tolerance)?;
        Some(self.times.remove(idx))
    }

    /// Click semantics: a click near an existing marker removes it, anywhere
    /// else adds one. `Unchanged` when the time can't be a marker.
    pub fn toggle(&mut self, time: f64, tolerance: f64) -> MarkerToggle {
        match self.remove_near(time, tolerance) {
            Some(removed) => {
                debug!("Removed marker at {:.3}s", removed);
                MarkerToggle::Removed(removed)
            }
            None if self.add(time) => {
                debug!("Added marker at {:.3}s", time);
                MarkerToggle::Added(time)
            }
            None => MarkerToggle::Unchanged,
        }
    }

    /// Sorts ascending and folds markers within `MARKER_EPSILON` together.
    pub fn sort(&mut self) {
        self.times.sort_by(f64::total_cmp);
        self.times.dedup_by(|later, earlier| (*later - *earlier).abs() < MARKER_EPSILON);
    }

    /// Replaces every marker, e.g. with a fresh onset detection.
    pub fn replace(&mut self, times: impl IntoIterator<Item = f64>) {
        self.times.clear();
        for t in times {
            self.add(t);
        }
    }

    pub fn clear(&mut self) {
        self.times.clear();
    }

    pub fn count(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Markers in insertion order, or ascending once `sort` has run.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// A sorted copy with everything outside `[0, duration)` dropped.
    pub fn sorted_within(&self, duration: f64) -> Vec<f64> {
        let mut sorted = self.clone();
        sorted.sort();
        sorted
            .times
            .into_iter()
            .filter(|&t| (0.0..duration).contains(&t))
            .collect()
    }

    fn position_near(&self, time: f64, tolerance: f64) -> Option<usize> {
        self.times.iter().position(|m| (m - time).abs() < tolerance)
    }
}

impl FromIterator<f64> for MarkerSet {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut set = MarkerSet::new();
        set.times.extend(iter.into_iter().filter(|t| t.is_finite()));
        set
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarkerToggle {
    Added(f64),
    Removed(f64),
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_near_marker_removes_it() {
        let mut set = MarkerSet::new();
        set.add(1.0);
        assert_eq!(set.toggle(1.03, CLICK_TOLERANCE), MarkerToggle::Removed(1.0));
        assert!(set.is_empty());
    }

    #[test]
    fn click_elsewhere_adds() {
        let mut set = MarkerSet::new();
        set.add(1.0);
        assert_eq!(set.toggle(2.0, CLICK_TOLERANCE), MarkerToggle::Added(2.0));
        assert_eq!(set.count(), 2);
    }

    #[test]
    fn refused_click_is_not_reported_as_added() {
        let mut set = MarkerSet::new();
        set.add(1.0);
        assert_eq!(set.toggle(f64::NAN, CLICK_TOLERANCE), MarkerToggle::Unchanged);
        // Tolerance tighter than the identity epsilon: not removed, not added.
        assert_eq!(set.toggle(1.0 + MARKER_EPSILON / 2.0, MARKER_EPSILON / 10.0), MarkerToggle::Unchanged);
        assert_eq!(set.times(), &[1.0]);
    }

    #[test]
    fn add_then_toggle_restores_the_set() {
        let mut set: MarkerSet = [0.5, 3.0].into_iter().collect();
        let before = set.clone();
        set.toggle(1.7, CLICK_TOLERANCE);
        set.toggle(1.7, CLICK_TOLERANCE);
        assert_eq!(set, before);
    }

    #[test]
    fn sort_orders_and_dedups() {
        let mut set: MarkerSet = [2.0, 5.0, 2.0].into_iter().collect();
        assert_eq!(set.count(), 3);
        set.sort();
        assert_eq!(set.times(), &[2.0, 5.0]);
    }

    #[test]
    fn add_ignores_duplicates() {
        let mut set = MarkerSet::new();
        assert!(set.add(2.0));
        assert!(!set.add(2.0 + MARKER_EPSILON / 2.0));
        assert!(!set.add(f64::NAN));
        assert_eq!(set.count(), 1);
    }

    #[test]
    fn remove_near_is_a_no_op_when_nothing_is_close() {
        let mut set: MarkerSet = [1.0].into_iter().collect();
        assert_eq!(set.remove_near(1.5, 0.1), None);
        assert_eq!(set.count(), 1);
    }

    #[test]
    fn sorted_within_drops_out_of_range() {
        let set: MarkerSet = [9.0, -0.5, 4.0, 10.0, 12.0].into_iter().collect();
        assert_eq!(set.sorted_within(10.0), vec![4.0, 9.0]);
    }
}
