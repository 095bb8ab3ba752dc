use std::collections::VecDeque;

/// Incrementally maintained aggregate over the contents of a bounded window.
///
/// `combine` is called for every inserted element and `uncombine` for every
/// evicted one, so the aggregate stays exact without rescanning the window.
pub trait WindowAggregate<T> {
    fn combine(&mut self, item: &T);
    fn uncombine(&mut self, item: &T);
    fn clear(&mut self);
}

/// No-op aggregate for windows whose statistic cannot be maintained
/// incrementally and is recomputed from the live contents instead.
impl<T> WindowAggregate<T> for () {
    fn combine(&mut self, _item: &T) {}
    fn uncombine(&mut self, _item: &T) {}
    fn clear(&mut self) {}
}

/// Bounded FIFO window with add-on-insert / subtract-on-evict aggregate
/// maintenance.
#[derive(Debug)]
pub struct BoundedWindow<T, A: WindowAggregate<T>> {
    capacity: usize,
    buf: VecDeque<T>,
    agg: A,
}

impl<T, A: WindowAggregate<T>> BoundedWindow<T, A> {
    /// `capacity` must be > 0; callers validate their window sizes before
    /// constructing.
    pub fn new(capacity: usize, agg: A) -> Self {
        debug_assert!(capacity > 0);
        Self {
            capacity,
            buf: VecDeque::with_capacity(capacity),
            agg,
        }
    }

    /// Insert one element, evicting the oldest when at capacity. The evicted
    /// element is subtracted from the aggregate before the new one is added.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.buf.len() == self.capacity {
            let old = self.buf.pop_front();
            if let Some(old) = &old {
                self.agg.uncombine(old);
            }
            old
        } else {
            None
        };
        self.agg.combine(&item);
        self.buf.push_back(item);
        evicted
    }

    pub fn aggregate(&self) -> &A {
        &self.agg
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn back(&self) -> Option<&T> {
        self.buf.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.agg.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Sum(f64);

    impl WindowAggregate<f64> for Sum {
        fn combine(&mut self, item: &f64) {
            self.0 += *item;
        }
        fn uncombine(&mut self, item: &f64) {
            self.0 -= *item;
        }
        fn clear(&mut self) {
            self.0 = 0.0;
        }
    }

    #[test]
    fn maintains_aggregate_across_eviction() {
        let mut w = BoundedWindow::new(3, Sum::default());
        assert!(w.push(1.0).is_none());
        assert!(w.push(2.0).is_none());
        assert!(w.push(3.0).is_none());
        assert!(w.is_full());
        assert_eq!(w.aggregate().0, 6.0);

        // Oldest (1.0) leaves, 4.0 enters.
        assert_eq!(w.push(4.0), Some(1.0));
        assert_eq!(w.len(), 3);
        assert_eq!(w.aggregate().0, 9.0);
        assert_eq!(w.back(), Some(&4.0));
    }

    #[test]
    fn clear_resets_buffer_and_aggregate() {
        let mut w = BoundedWindow::new(2, Sum::default());
        w.push(5.0);
        w.push(7.0);
        w.clear();
        assert!(w.is_empty());
        assert_eq!(w.aggregate().0, 0.0);
    }

    #[test]
    fn noop_aggregate_window_evicts_in_order() {
        let mut w = BoundedWindow::new(2, ());
        w.push(1);
        w.push(2);
        assert_eq!(w.push(3), Some(1));
        let items: Vec<_> = w.iter().copied().collect();
        assert_eq!(items, vec![2, 3]);
    }
}
