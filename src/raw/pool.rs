use super::handle::BucketRef;

/// Slot storage for buckets with a free-list of released slots.
///
/// Released slots keep their element (and whatever it has allocated); the owner resets it before
/// releasing, and the next allocation hands the same slot back out.
pub(crate) struct Pool<T> {
    slots: Vec<T>,
    free: Vec<BucketRef>,
    limit: Option<usize>,
}

impl<T> Pool<T> {
    pub(crate) fn new(preallocate: usize, limit: Option<usize>) -> Self {
        Self {
            slots: Vec::with_capacity(preallocate),
            free: Vec::new(),
            limit,
        }
    }

    /// Number of slots currently handed out.
    #[cfg(test)]
    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Number of released slots waiting on the free-list.
    pub(crate) fn free_len(&self) -> usize {
        self.free.len()
    }

    /// How many allocations can still succeed without releasing anything.
    pub(crate) fn available(&self) -> usize {
        let headroom = match self.limit {
            Some(limit) => limit.saturating_sub(self.slots.len()),
            None => BucketRef::MAX.saturating_sub(self.slots.len()),
        };
        self.free.len().saturating_add(headroom)
    }

    /// Hands out a slot, preferring the free-list. `fresh` builds the element only when the pool has
    /// to grow.
    ///
    /// Callers check [`available`](Self::available) first; running past the limit is a bug.
    pub(crate) fn alloc(&mut self, fresh: impl FnOnce() -> T) -> BucketRef {
        if let Some(handle) = self.free.pop() {
            return handle;
        }
        assert!(self.available() > 0, "`Pool::alloc()` - pool is exhausted ({} slots)", self.slots.len());
        self.slots.push(fresh());
        BucketRef::from_slot(self.slots.len() - 1)
    }

    #[inline]
    pub(crate) fn get(&self, handle: BucketRef) -> &T {
        &self.slots[handle.slot()]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: BucketRef) -> &mut T {
        &mut self.slots[handle.slot()]
    }

    /// Returns two distinct slots mutably, in argument order.
    pub(crate) fn pair_mut(&mut self, a: BucketRef, b: BucketRef) -> (&mut T, &mut T) {
        let (i, j) = (a.slot(), b.slot());
        assert_ne!(i, j, "`Pool::pair_mut()` - both handles refer to slot {i}");
        if i < j {
            let (low, high) = self.slots.split_at_mut(j);
            (&mut low[i], &mut high[0])
        } else {
            let (low, high) = self.slots.split_at_mut(i);
            (&mut high[0], &mut low[j])
        }
    }

    /// Puts a slot on the free-list. The element stays in place for reuse.
    pub(crate) fn release(&mut self, handle: BucketRef) {
        debug_assert!(!self.free.contains(&handle), "`Pool::release()` - {handle} released twice");
        self.free.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn released_slots_are_reused_before_growing() {
        let mut pool: Pool<Vec<u32>> = Pool::new(4, None);
        let a = pool.alloc(Vec::new);
        let b = pool.alloc(Vec::new);
        pool.get_mut(a).extend([1, 2, 3]);
        pool.release(a);
        assert_eq!(pool.free_len(), 1);
        assert_eq!(pool.live(), 1);

        let c = pool.alloc(|| unreachable!("free slot should be reused"));
        assert_eq!(c, a);
        // The element survives release untouched; the owner is responsible for resetting it.
        assert_eq!(pool.get(c), &vec![1, 2, 3]);
        assert_ne!(b, c);
    }

    #[test]
    fn limit_counts_free_slots_as_available() {
        let mut pool: Pool<u8> = Pool::new(0, Some(2));
        assert_eq!(pool.available(), 2);
        let a = pool.alloc(|| 0);
        let _b = pool.alloc(|| 0);
        assert_eq!(pool.available(), 0);
        pool.release(a);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    #[should_panic(expected = "pool is exhausted")]
    fn alloc_past_limit_panics() {
        let mut pool: Pool<u8> = Pool::new(0, Some(1));
        pool.alloc(|| 0);
        pool.alloc(|| 0);
    }

    #[test]
    fn pair_mut_returns_in_argument_order() {
        let mut pool: Pool<u8> = Pool::new(0, None);
        let a = pool.alloc(|| 1);
        let b = pool.alloc(|| 2);
        let (x, y) = pool.pair_mut(b, a);
        assert_eq!((*x, *y), (2, 1));
        core::mem::swap(x, y);
        assert_eq!((*pool.get(a), *pool.get(b)), (2, 1));
    }

    #[derive(Clone, Debug)]
    enum Operation {
        Alloc(u32),
        Release(usize),
        Set(usize, u32),
    }

    fn strategy() -> impl Strategy<Value = Operation> {
        prop_oneof![
            5 => any::<u32>().prop_map(Operation::Alloc),
            3 => any::<usize>().prop_map(Operation::Release),
            2 => (any::<usize>(), any::<u32>()).prop_map(|(which, value)| Operation::Set(which, value)),
        ]
    }

    proptest! {
        #[test]
        fn pool_tracks_live_slots(operations in prop::collection::vec(strategy(), 0..256)) {
            let mut model: Vec<(BucketRef, u32)> = Vec::new();
            let mut pool: Pool<u32> = Pool::new(0, None);

            for operation in operations {
                match operation {
                    Operation::Alloc(value) => {
                        let handle = pool.alloc(|| value);
                        *pool.get_mut(handle) = value;
                        prop_assert!(model.iter().all(|&(h, _)| h != handle));
                        model.push((handle, value));
                    }
                    Operation::Release(which) => {
                        if model.is_empty() {
                            continue;
                        }
                        let (handle, _) = model.swap_remove(which % model.len());
                        pool.release(handle);
                    }
                    Operation::Set(which, value) => {
                        if model.is_empty() {
                            continue;
                        }
                        let index = which % model.len();
                        *pool.get_mut(model[index].0) = value;
                        model[index].1 = value;
                    }
                }

                prop_assert_eq!(pool.live(), model.len());
                for &(handle, value) in &model {
                    prop_assert_eq!(*pool.get(handle), value);
                }
            }
        }
    }
}
