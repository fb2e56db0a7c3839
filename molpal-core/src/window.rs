//! Fixed-capacity window of recent top-k averages

use std::collections::VecDeque;

/// Ring buffer of the most recent top-k averages.
///
/// Once full, every push drops the oldest average.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentAverages {
    buffer: VecDeque<f64>,
    capacity: usize,
}

impl RecentAverages {
    /// Create an empty window holding at most `capacity` averages
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an average, dropping the oldest if at capacity
    pub fn push(&mut self, average: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(average);
    }

    /// Arithmetic mean of the window, or `None` when empty
    pub fn mean(&self) -> Option<f64> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(self.buffer.iter().sum::<f64>() / self.buffer.len() as f64)
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.buffer.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_empty_window() {
        let window = RecentAverages::new(3);
        assert!(window.is_empty());
        assert!(!window.is_full());
        assert_eq!(window.mean(), None);
    }

    #[test]
    fn push_until_full() {
        let mut window = RecentAverages::new(3);
        window.push(1.0);
        window.push(2.0);
        assert!(!window.is_full());
        window.push(3.0);
        assert!(window.is_full());
        assert_eq!(window.mean(), Some(2.0));
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut window = RecentAverages::new(2);
        window.push(1.0);
        window.push(2.0);
        window.push(6.0);
        assert_eq!(window.len(), 2);
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![2.0, 6.0]);
        assert_eq!(window.mean(), Some(4.0));
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut window = RecentAverages::new(4);
        for i in 0..100 {
            window.push(i as f64);
            assert!(window.len() <= 4);
        }
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![96.0, 97.0, 98.0, 99.0]);
    }
}
