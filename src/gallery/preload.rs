use image::DynamicImage;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::backend::catalog::ImageRecord;
use crate::backend::urls::DeliveryUrls;

pub const PRELOAD_CAPACITY: usize = 10;
pub const PRELOAD_RADIUS: usize = 2;

/// Distinct view indices within `radius` of `center`, nearest first,
/// wrapping around the ends like viewer navigation.
pub fn window(center: usize, len: usize, radius: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let center = center % len;
    let mut indices = vec![center];
    for step in 1..=radius {
        for idx in [(center + step) % len, (center + len - step % len) % len] {
            if !indices.contains(&idx) {
                indices.push(idx);
            }
        }
    }
    indices
}

/// Decoded full-size images around the viewer position, keyed by delivery URL.
///
/// Eviction follows insertion order only: reading an entry does not make it
/// younger.
pub struct PreloadCache {
    images: HashMap<String, DynamicImage>,
    insertion_order: VecDeque<String>,
    in_flight: HashSet<String>,
    capacity: usize,
    radius: usize,
}

impl PreloadCache {
    pub fn new() -> Self {
        Self::with_capacity(PRELOAD_CAPACITY, PRELOAD_RADIUS)
    }

    pub fn with_capacity(capacity: usize, radius: usize) -> Self {
        Self {
            images: HashMap::new(),
            insertion_order: VecDeque::new(),
            in_flight: HashSet::new(),
            capacity,
            radius,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[cfg(test)]
    pub fn contains(&self, url: &str) -> bool {
        self.images.contains_key(url)
    }

    #[cfg(test)]
    pub fn is_in_flight(&self, url: &str) -> bool {
        self.in_flight.contains(url)
    }

    pub fn get(&self, url: &str) -> Option<&DynamicImage> {
        self.images.get(url)
    }

    /// URLs in insertion order, oldest first.
    #[cfg(test)]
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.insertion_order.iter().map(String::as_str)
    }

    /// Marks the window around `center` as wanted and returns the URLs the
    /// caller should start loading. Cached and already-requested URLs are skipped.
    pub fn request(
        &mut self,
        center: usize,
        view: &[ImageRecord],
        urls: &DeliveryUrls,
    ) -> Vec<String> {
        let mut issued = Vec::new();
        for idx in window(center, view.len(), self.radius) {
            let url = urls.full_size(&view[idx].id);
            if self.images.contains_key(&url) || self.in_flight.contains(&url) {
                continue;
            }
            self.in_flight.insert(url.clone());
            issued.push(url);
        }
        issued
    }

    /// Records the outcome of a load started by [`request`](Self::request).
    /// Failures are dropped without a trace.
    pub fn complete(&mut self, url: &str, image: Option<DynamicImage>) {
        self.in_flight.remove(url);
        let Some(image) = image else {
            return;
        };

        if self.images.insert(url.to_string(), image).is_none() {
            self.insertion_order.push_back(url.to_string());
        }

        while self.images.len() > self.capacity {
            let Some(oldest) = self.insertion_order.pop_front() else {
                break;
            };
            self.images.remove(&oldest);
        }
    }
}

impl Default for PreloadCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> DeliveryUrls {
        DeliveryUrls::new("https://res.example", "demo")
    }

    fn view(n: usize) -> Vec<ImageRecord> {
        (0..n).map(|i| ImageRecord::new(format!("{i:03}"))).collect()
    }

    fn pixel() -> Option<DynamicImage> {
        Some(DynamicImage::new_rgb8(1, 1))
    }

    #[test]
    fn test_window_wraps_nearest_first() {
        assert_eq!(window(0, 10, 2), vec![0, 1, 9, 2, 8]);
        assert_eq!(window(5, 10, 2), vec![5, 6, 4, 7, 3]);
        assert_eq!(window(9, 10, 2), vec![9, 0, 8, 1, 7]);
    }

    #[test]
    fn test_window_small_views_dedupe() {
        assert_eq!(window(0, 0, 2), Vec::<usize>::new());
        assert_eq!(window(0, 1, 2), vec![0]);
        assert_eq!(window(1, 2, 2), vec![1, 0]);
        assert_eq!(window(0, 3, 2), vec![0, 1, 2]);
    }

    #[test]
    fn test_request_skips_cached_and_in_flight() {
        let v = view(10);
        let u = urls();
        let mut cache = PreloadCache::new();

        let first = cache.request(5, &v, &u);
        assert_eq!(first.len(), 5);
        assert_eq!(first[0], u.full_size("005"));
        assert!(first.iter().all(|url| cache.is_in_flight(url)));

        assert!(cache.request(5, &v, &u).is_empty());

        cache.complete(&first[0], pixel());
        cache.complete(&first[1], None);
        assert!(cache.contains(&first[0]));
        assert!(!cache.contains(&first[1]));
        assert!(!cache.is_in_flight(&first[1]));

        let again = cache.request(5, &v, &u);
        assert_eq!(again, vec![first[1].clone()]);
    }

    #[test]
    fn test_never_exceeds_capacity_and_evicts_oldest() {
        let v = view(40);
        let u = urls();
        let mut cache = PreloadCache::new();
        let mut inserted = Vec::new();

        for center in (0..40).step_by(3) {
            for url in cache.request(center, &v, &u) {
                cache.complete(&url, pixel());
                inserted.push(url);
                assert!(cache.len() <= PRELOAD_CAPACITY);
            }
        }

        let expected: Vec<&str> = inserted[inserted.len() - PRELOAD_CAPACITY..]
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(cache.urls().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_hits_do_not_refresh_recency() {
        let mut cache = PreloadCache::with_capacity(2, 0);
        cache.complete("a", pixel());
        cache.complete("b", pixel());
        assert!(cache.get("a").is_some());

        cache.complete("c", pixel());
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_late_completion_after_window_moved_still_lands() {
        let v = view(20);
        let u = urls();
        let mut cache = PreloadCache::new();

        let old_window = cache.request(0, &v, &u);
        let new_window = cache.request(10, &v, &u);
        for url in new_window.iter().chain(old_window.iter()) {
            cache.complete(url, pixel());
        }
        assert_eq!(cache.len(), 10);
        assert!(cache.contains(&old_window[0]));
    }
}
