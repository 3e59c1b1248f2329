//! Grid slots and the synchronizer that merges a component's backend array
//! into them.
//!
//! The slot array belongs to the caller and its length is the grid's cell
//! count. Synchronization overwrites indices in bounds and never resizes.

use crate::scaler;
use crate::{Backend, Error, Result, ThumbnailSize, EMPTY_SLOT_SENTINEL};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// One grid cell's image reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub src: Option<String>,
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaled_src: Option<String>,
}

impl Slot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.src = None;
        self.file_name = None;
        self.scaled_src = None;
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_none()
    }

    /// What the grid should display: the thumbnail when there is one.
    pub fn display_src(&self) -> Option<&str> {
        self.scaled_src.as_deref().or(self.src.as_deref())
    }
}

/// One `[id, fileName]` pair from `/getArray`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayEntry {
    pub id: i64,
    pub file_name: Option<String>,
}

impl ArrayEntry {
    pub fn new(id: i64, file_name: Option<&str>) -> Self {
        Self { id, file_name: file_name.map(|s| s.to_string()) }
    }

    /// No image assigned: missing name, or the backend's `"[]"` marker.
    pub fn is_empty_slot(&self) -> bool {
        match self.file_name.as_deref() {
            None => true,
            Some(name) => name.is_empty() || name == EMPTY_SLOT_SENTINEL,
        }
    }
}

/// Decode a `/getArray` body, checking its shape before anything is applied.
pub fn parse_array(value: &serde_json::Value) -> Result<Vec<ArrayEntry>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::MalformedResponse(format!("expected an array, got {}", value)))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let pair = item
                .as_array()
                .filter(|p| p.len() >= 2)
                .ok_or_else(|| Error::MalformedResponse(format!("entry {} is not an [id, fileName] pair: {}", i, item)))?;
            let id = pair[0]
                .as_i64()
                .or_else(|| pair[0].as_f64().map(|f| f as i64))
                .ok_or_else(|| Error::MalformedResponse(format!("entry {} has a non-numeric id: {}", i, pair[0])))?;
            let file_name = match &pair[1] {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some(s.clone()),
                // An empty JSON list is how some backends spell the marker.
                serde_json::Value::Array(a) if a.is_empty() => Some(EMPTY_SLOT_SENTINEL.to_string()),
                other => {
                    return Err(Error::MalformedResponse(format!(
                        "entry {} has a non-string fileName: {}",
                        i, other
                    )))
                }
            };
            Ok(ArrayEntry { id, file_name })
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Produce a thumbnail for every assigned slot
    pub scale: bool,
    pub thumbnail: ThumbnailSize,
    pub jpeg_quality: u8,
    /// Upper bound on concurrent thumbnail jobs (0 is treated as 1)
    pub parallelism: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            scale: false,
            thumbnail: ThumbnailSize::default(),
            jpeg_quality: 80,
            parallelism: num_cpus::get(),
        }
    }
}

/// What a synchronization changed
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Slots that received an image
    pub assigned: usize,
    /// Slots reset to empty
    pub cleared: usize,
    /// Backend entries beyond the end of the slot array
    pub ignored: usize,
    /// Thumbnail failures by slot index; those slots keep their full `src`
    pub scale_failures: Vec<(usize, Error)>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.scale_failures.is_empty()
    }
}

/// Pull `component_name`'s array from the backend and merge it into `slots`.
///
/// Entries are re-sorted by id. Index `i` of the sorted list drives
/// `slots[i]`; slots past the end of the list are left alone. A fetch or shape
/// error leaves every slot untouched. Thumbnail failures are per slot and do
/// not stop the batch.
pub fn synchronize<B: Backend + ?Sized>(
    backend: &B,
    component_name: &str,
    slots: &mut [Slot],
    options: &SyncOptions,
) -> Result<SyncReport> {
    let mut entries = backend.get_array(component_name).map_err(|e| {
        log::error!("Error fetching grid array for {}: {}", component_name, e);
        e
    })?;
    entries.sort_by_key(|e| e.id);

    let mut report = SyncReport::default();
    let mut jobs: Vec<(usize, String)> = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        let Some(slot) = slots.get_mut(i) else {
            report.ignored += 1;
            continue;
        };
        if entry.is_empty_slot() {
            slot.clear();
            report.cleared += 1;
            continue;
        }
        let name = entry.file_name.clone().unwrap_or_default();
        let src = backend.image_url(&name);
        slot.file_name = Some(name);
        slot.src = Some(src.clone());
        slot.scaled_src = None;
        report.assigned += 1;
        if options.scale {
            jobs.push((i, src));
        }
    }

    if report.ignored > 0 {
        log::warn!(
            "{}: backend sent {} entries for {} slots, ignoring the rest",
            component_name,
            entries.len(),
            slots.len()
        );
    }

    for (i, result) in scale_all(backend, &jobs, options) {
        match result {
            Ok(thumb) => slots[i].scaled_src = Some(thumb.data_url),
            Err(e) => {
                log::warn!("Failed to scale image for slot {}: {}", i, e);
                report.scale_failures.push((i, e));
            }
        }
    }

    log::info!(
        "synchronized {}: {} assigned, {} cleared, {} thumbnail failures",
        component_name,
        report.assigned,
        report.cleared,
        report.scale_failures.len()
    );
    Ok(report)
}

/// Same as [`synchronize`] with thumbnailing forced on.
pub fn update_collage_items<B: Backend + ?Sized>(
    backend: &B,
    component_name: &str,
    slots: &mut [Slot],
    options: &SyncOptions,
) -> Result<SyncReport> {
    let options = SyncOptions { scale: true, ..*options };
    synchronize(backend, component_name, slots, &options)
}

// Thumbnails are independent. They run on a pool bounded by
// `options.parallelism`; results come back in job order and are applied by
// slot index.
fn scale_all<B: Backend + ?Sized>(
    backend: &B,
    jobs: &[(usize, String)],
    options: &SyncOptions,
) -> Vec<(usize, Result<scaler::Thumbnail>)> {
    let scale_one = |(i, url): &(usize, String)| {
        (*i, scaler::scale_image(backend, url, options.thumbnail, options.jpeg_quality))
    };
    if jobs.len() < 2 {
        return jobs.iter().map(scale_one).collect();
    }

    let threads = options.parallelism.max(1).min(jobs.len());
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(|| jobs.par_iter().map(scale_one).collect()),
        Err(e) => {
            log::warn!("thumbnail pool unavailable, scaling sequentially: {}", e);
            jobs.iter().map(scale_one).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// In-memory backend: a fixed array and a set of fetchable images.
    struct FakeBackend {
        array: Result<Vec<ArrayEntry>>,
        images: Vec<(String, Vec<u8>)>,
        fetched: Mutex<Vec<String>>,
        /// Fetching this url blocks until `wait_for` other fetches finished
        slow: Option<(String, usize)>,
        finished: AtomicUsize,
        slow_saw_others: AtomicBool,
    }

    impl FakeBackend {
        fn with_array(entries: Vec<ArrayEntry>) -> Self {
            Self {
                array: Ok(entries),
                images: Vec::new(),
                fetched: Mutex::new(Vec::new()),
                slow: None,
                finished: AtomicUsize::new(0),
                slow_saw_others: AtomicBool::new(false),
            }
        }
    }

    impl Backend for FakeBackend {
        fn api_url(&self) -> &str {
            "http://api.test"
        }
        fn get_images(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
        fn get_array(&self, _component_name: &str) -> Result<Vec<ArrayEntry>> {
            match &self.array {
                Ok(v) => Ok(v.clone()),
                Err(_) => Err(Error::HttpStatus { endpoint: "/getArray".into(), status: 503 }),
            }
        }
        fn post_positions(&self, _: &str, _: &str, _: Option<&str>) -> Result<()> {
            Ok(())
        }
        fn clear_collage(&self, _: &str) -> Result<()> {
            Ok(())
        }
        fn update_image_selection_mode(&self, _: &str) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        fn new_selection(&self, _: &str, _: u32) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
            self.fetched.lock().unwrap().push(url.to_string());
            match &self.slow {
                Some((slow, wait_for)) if slow == url => {
                    let deadline = Instant::now() + Duration::from_secs(5);
                    while self.finished.load(Ordering::SeqCst) < *wait_for && Instant::now() < deadline {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    self.slow_saw_others
                        .store(self.finished.load(Ordering::SeqCst) >= *wait_for, Ordering::SeqCst);
                }
                _ => {
                    self.finished.fetch_add(1, Ordering::SeqCst);
                }
            }
            self.images
                .iter()
                .find(|(u, _)| u == url)
                .map(|(_, b)| b.clone())
                .ok_or_else(|| Error::HttpStatus { endpoint: url.to_string(), status: 404 })
        }
    }

    fn filled(name: &str) -> Slot {
        Slot { src: Some(format!("old/{}", name)), file_name: Some(name.into()), scaled_src: None }
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([0, 0, 255, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn sentinel_and_missing_names_mark_empty_slots() {
        assert!(ArrayEntry::new(0, Some("[]")).is_empty_slot());
        assert!(ArrayEntry::new(0, None).is_empty_slot());
        assert!(ArrayEntry::new(0, Some("")).is_empty_slot());
        assert!(!ArrayEntry::new(0, Some("a.jpg")).is_empty_slot());
    }

    #[test]
    fn parse_array_checks_shape() {
        let ok = parse_array(&json!([[1, "a.jpg"], [0, null], [2, []]])).unwrap();
        assert_eq!(ok[0], ArrayEntry::new(1, Some("a.jpg")));
        assert_eq!(ok[1], ArrayEntry::new(0, None));
        assert!(ok[2].is_empty_slot());

        assert!(matches!(parse_array(&json!({"a": 1})), Err(Error::MalformedResponse(_))));
        assert!(parse_array(&json!([[1]])).is_err());
        assert!(parse_array(&json!([["x", "a.jpg"]])).is_err());
        assert!(parse_array(&json!([[1, 5]])).is_err());
    }

    #[test]
    fn scenario_three_slots_two_entries() {
        let backend = FakeBackend::with_array(vec![
            ArrayEntry::new(1, Some("cat.jpg")),
            ArrayEntry::new(0, Some("[]")),
        ]);
        let untouched = filled("dog.jpg");
        let mut slots = vec![filled("x.jpg"), Slot::empty(), untouched.clone()];

        let report = synchronize(&backend, "heart", &mut slots, &SyncOptions::default()).unwrap();

        assert_eq!(slots[0], Slot::empty());
        assert_eq!(slots[1].src.as_deref(), Some("http://api.test/uploaded_images/cat.jpg"));
        assert_eq!(slots[1].file_name.as_deref(), Some("cat.jpg"));
        assert_eq!(slots[2], untouched);
        assert_eq!((report.assigned, report.cleared, report.ignored), (1, 1, 0));
    }

    #[test]
    fn indices_past_the_backend_array_are_untouched() {
        for n in 0..5usize {
            for m in 0..=n {
                let entries = (0..m as i64)
                    .map(|i| ArrayEntry::new(i, if i % 2 == 0 { Some("[]") } else { Some("p.jpg") }))
                    .collect();
                let backend = FakeBackend::with_array(entries);
                let mut slots: Vec<Slot> = (0..n).map(|i| filled(&format!("{}.jpg", i))).collect();
                let before = slots.clone();

                synchronize(&backend, "c", &mut slots, &SyncOptions::default()).unwrap();

                assert_eq!(slots.len(), n);
                for i in 0..n {
                    if i >= m {
                        assert_eq!(slots[i], before[i]);
                    } else if i % 2 == 0 {
                        assert!(slots[i].is_empty());
                        assert_eq!(slots[i].file_name, None);
                    } else {
                        assert_eq!(slots[i].file_name.as_deref(), Some("p.jpg"));
                    }
                }
            }
        }
    }

    #[test]
    fn extra_entries_are_ignored_without_resizing() {
        let backend = FakeBackend::with_array(vec![
            ArrayEntry::new(0, Some("a.jpg")),
            ArrayEntry::new(1, Some("b.jpg")),
            ArrayEntry::new(2, Some("c.jpg")),
        ]);
        let mut slots = vec![Slot::empty(); 2];
        let report = synchronize(&backend, "c", &mut slots, &SyncOptions::default()).unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(report.ignored, 1);
        assert_eq!(slots[1].file_name.as_deref(), Some("b.jpg"));
    }

    #[test]
    fn fetch_failure_leaves_slots_unchanged() {
        let backend = FakeBackend { array: Err(Error::Other("down".into())), ..FakeBackend::with_array(vec![]) };
        let mut slots = vec![filled("a.jpg"), Slot::empty()];
        let before = slots.clone();
        let err = synchronize(&backend, "c", &mut slots, &SyncOptions::default()).unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
        assert_eq!(slots, before);
    }

    #[test]
    fn scaling_failures_do_not_abort_the_batch() {
        let mut backend = FakeBackend::with_array(vec![
            ArrayEntry::new(0, Some("ok.png")),
            ArrayEntry::new(1, Some("missing.png")),
            ArrayEntry::new(2, Some("ok2.png")),
        ]);
        backend.images = vec![
            ("http://api.test/uploaded_images/ok.png".into(), png(10, 40)),
            ("http://api.test/uploaded_images/ok2.png".into(), png(40, 10)),
        ];
        let mut slots = vec![Slot::empty(); 3];
        let options = SyncOptions { parallelism: 2, ..Default::default() };

        let report = update_collage_items(&backend, "c", &mut slots, &options).unwrap();

        assert!(slots[0].scaled_src.as_deref().unwrap().starts_with("data:image/jpeg;base64,"));
        assert!(slots[2].scaled_src.is_some());
        assert_eq!(slots[1].scaled_src, None);
        assert_eq!(slots[1].src.as_deref(), Some("http://api.test/uploaded_images/missing.png"));
        assert_eq!(report.scale_failures.len(), 1);
        assert_eq!(report.scale_failures[0].0, 1);
        assert_eq!(backend.fetched.lock().unwrap().len(), 3);
    }

    #[test]
    fn slow_thumbnail_does_not_hold_back_the_others() {
        let names = ["slow.png", "a.png", "b.png", "c.png", "d.png"];
        let mut backend =
            FakeBackend::with_array(names.iter().enumerate().map(|(i, n)| ArrayEntry::new(i as i64, Some(n))).collect());
        backend.images = names
            .iter()
            .map(|n| (format!("http://api.test/uploaded_images/{}", n), png(8, 8)))
            .collect();
        backend.slow = Some(("http://api.test/uploaded_images/slow.png".into(), 4));
        let mut slots = vec![Slot::empty(); 5];
        let options = SyncOptions { parallelism: 2, ..Default::default() };

        let report = update_collage_items(&backend, "c", &mut slots, &options).unwrap();

        assert!(backend.slow_saw_others.load(Ordering::SeqCst));
        assert!(report.is_complete());
        assert!(slots.iter().all(|s| s.scaled_src.is_some()));
    }

    #[test]
    fn display_src_prefers_thumbnail() {
        let mut s = filled("a.jpg");
        assert_eq!(s.display_src(), Some("old/a.jpg"));
        s.scaled_src = Some("data:x".into());
        assert_eq!(s.display_src(), Some("data:x"));
    }

    #[test]
    fn slot_serializes_camel_case() {
        let s = Slot { src: Some("u".into()), file_name: Some("f".into()), scaled_src: None };
        assert_eq!(serde_json::to_value(&s).unwrap(), json!({"src": "u", "fileName": "f"}));
    }
}
