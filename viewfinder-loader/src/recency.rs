use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use viewfinder_model::ResourceUrl;

/// Fixed-capacity LRU set of resource URLs: the durable memory of "this
/// was already fully rendered once".
///
/// One instance is constructed at process start and handed to every
/// controller; the handle is a cheap clone over shared state. Mutations
/// serialize through a mutex so interleaved calls from many concurrently
/// active controllers stay atomic. `touch` on an existing member refreshes
/// its recency without growing the set; inserting past capacity evicts the
/// least-recently-touched member. Infallible by construction.
#[derive(Debug, Clone)]
pub struct BoundedRecencySet {
    inner: Arc<Mutex<RecencyList>>,
}

impl BoundedRecencySet {
    /// Create a set holding at most `capacity` URLs. Capacity is fixed for
    /// the set's lifetime to bound worst-case memory.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "recency set capacity must be non-zero");
        Self {
            inner: Arc::new(Mutex::new(RecencyList::new(capacity))),
        }
    }

    /// Membership lookup; does not refresh recency.
    pub fn has(&self, url: &ResourceUrl) -> bool {
        self.inner.lock().contains(url)
    }

    /// Insert-or-refresh: `url` becomes the most recently used member,
    /// evicting the least recent one if the set was full.
    pub fn touch(&self, url: &ResourceUrl) {
        self.inner.lock().touch(url);
    }

    /// Current number of members.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed capacity chosen at construction.
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }
}

// Classic LRU: slab-backed doubly-linked recency order plus a HashMap
// index, O(1) for touch and eviction. Indices into `nodes` are stable;
// freed slots are recycled through `free`.
#[derive(Debug)]
struct RecencyList {
    capacity: usize,
    map: HashMap<ResourceUrl, usize>,
    nodes: Vec<Node>,
    free: Vec<usize>,
    /// Most recently touched.
    head: Option<usize>,
    /// Least recently touched; eviction end.
    tail: Option<usize>,
}

#[derive(Debug)]
struct Node {
    key: ResourceUrl,
    prev: Option<usize>,
    next: Option<usize>,
}

impl RecencyList {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn contains(&self, url: &ResourceUrl) -> bool {
        self.map.contains_key(url)
    }

    fn touch(&mut self, url: &ResourceUrl) {
        if let Some(&idx) = self.map.get(url) {
            self.unlink(idx);
            self.push_front(idx);
            return;
        }

        if self.map.len() == self.capacity {
            self.evict_tail();
        }

        let node = Node {
            key: url.clone(),
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.map.insert(url.clone(), idx);
        self.push_front(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        if let Some(old_head) = self.head {
            self.nodes[old_head].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn evict_tail(&mut self) {
        let Some(idx) = self.tail else {
            return;
        };
        self.unlink(idx);
        let key = self.nodes[idx].key.clone();
        self.map.remove(&key);
        self.free.push(idx);
        log::trace!("recency set evicted {key}");
    }
}

#[cfg(test)]
mod tests {
    use super::BoundedRecencySet;
    use viewfinder_model::ResourceUrl;

    fn url(n: usize) -> ResourceUrl {
        ResourceUrl::from(format!("https://img.example/{n}.jpg"))
    }

    #[test]
    fn touch_inserts_and_has_reports_membership() {
        let set = BoundedRecencySet::new(4);
        assert!(!set.has(&url(1)));
        set.touch(&url(1));
        assert!(set.has(&url(1)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn touching_an_existing_member_does_not_grow_the_set() {
        let set = BoundedRecencySet::new(4);
        set.touch(&url(1));
        set.touch(&url(1));
        set.touch(&url(1));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn capacity_bound_holds_for_any_insertion_order() {
        let set = BoundedRecencySet::new(5);
        for n in 0..20 {
            set.touch(&url(n));
            assert!(set.len() <= 5);
        }
        // The five most recent survive; everything older is gone.
        for n in 15..20 {
            assert!(set.has(&url(n)), "expected {n} to be retained");
        }
        for n in 0..15 {
            assert!(!set.has(&url(n)), "expected {n} to be evicted");
        }
    }

    #[test]
    fn touch_refreshes_recency_order() {
        let set = BoundedRecencySet::new(3);
        set.touch(&url(1));
        set.touch(&url(2));
        set.touch(&url(3));

        // 1 is least recent; refreshing it shifts eviction onto 2.
        set.touch(&url(1));
        set.touch(&url(4));

        assert!(set.has(&url(1)));
        assert!(!set.has(&url(2)));
        assert!(set.has(&url(3)));
        assert!(set.has(&url(4)));
    }

    #[test]
    fn has_does_not_refresh_recency() {
        let set = BoundedRecencySet::new(2);
        set.touch(&url(1));
        set.touch(&url(2));

        // A lookup must not rescue 1 from eviction.
        assert!(set.has(&url(1)));
        set.touch(&url(3));

        assert!(!set.has(&url(1)));
        assert!(set.has(&url(2)));
        assert!(set.has(&url(3)));
    }

    #[test]
    fn evicted_slots_are_reused() {
        let set = BoundedRecencySet::new(2);
        for n in 0..100 {
            set.touch(&url(n));
        }
        assert_eq!(set.len(), 2);
        assert!(set.has(&url(98)));
        assert!(set.has(&url(99)));
    }

    #[test]
    fn clones_share_state() {
        let set = BoundedRecencySet::new(4);
        let other = set.clone();
        set.touch(&url(1));
        assert!(other.has(&url(1)));
    }
}
