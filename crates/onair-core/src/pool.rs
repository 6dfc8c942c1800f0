// crates/onair-core/src/pool.rs
//
// Generic keyed object pool. The mixer uses one instance of this keyed
// by `(width, height, stride, depth_bytes)` for host-side scratch
// buffers, and onair-mixer's device layer uses another keyed the same
// way for intermediate render targets — allocation at broadcast frame
// rates is not something a tick's deadline can absorb, so both reuse
// buffers of a given shape instead of allocating fresh ones per tick.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

/// Shared pool of reusable `T`s, bucketed by key `K`. `factory` builds a
/// fresh `T` on a bucket miss.
pub struct Pool<K, T> {
    inner: Arc<Mutex<Inner<K, T>>>,
}

struct Inner<K, T> {
    buckets: HashMap<K, Vec<T>>,
    factory: Box<dyn Fn(&K) -> T + Send>,
}

impl<K, T> Clone for Pool<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T> Pool<K, T>
where
    K: Eq + Hash + Clone,
{
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&K) -> T + Send + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                buckets: HashMap::new(),
                factory: Box::new(factory),
            })),
        }
    }

    /// Take an item for `key`, reusing a returned one if the bucket is
    /// non-empty, otherwise building a fresh one via the factory.
    pub fn acquire(&self, key: K) -> Pooled<K, T> {
        let value = {
            let mut inner = self.inner.lock().unwrap();
            match inner.buckets.get_mut(&key).and_then(Vec::pop) {
                Some(v) => v,
                None => (inner.factory)(&key),
            }
        };
        Pooled {
            pool: self.clone(),
            key,
            value: Some(value),
        }
    }

    /// Number of idle items currently held across all buckets, for tests
    /// and telemetry.
    pub fn idle_count(&self) -> usize {
        self.inner.lock().unwrap().buckets.values().map(Vec::len).sum()
    }

    fn release(&self, key: K, value: T) {
        let mut inner = self.inner.lock().unwrap();
        inner.buckets.entry(key).or_default().push(value);
    }
}

/// RAII handle: returns its value to the pool's bucket when dropped.
pub struct Pooled<K, T>
where
    K: Eq + Hash + Clone,
{
    pool: Pool<K, T>,
    key: K,
    value: Option<T>,
}

impl<K, T> std::ops::Deref for Pooled<K, T>
where
    K: Eq + Hash + Clone,
{
    type Target = T;
    fn deref(&self) -> &T {
        self.value.as_ref().expect("pooled value taken before drop")
    }
}

impl<K, T> std::ops::DerefMut for Pooled<K, T>
where
    K: Eq + Hash + Clone,
{
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("pooled value taken before drop")
    }
}

impl<K, T> Drop for Pooled<K, T>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.release(self.key.clone(), value);
        }
    }
}
