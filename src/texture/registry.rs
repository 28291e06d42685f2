//! File registry with a bounded open-file pool
//!
//! Maps filename to its `TextureFile` for the lifetime of the system. Files
//! are never forgotten (their metadata stays queryable); only their
//! underlying readers are closed when the open-handle budget is exceeded,
//! via a second-chance CLOCK sweep over the insertion-ordered file list.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use glam::Mat4;

use crate::texture::file::{FileId, TextureFile};
use crate::texture::stats::CacheStats;

pub const DEFAULT_MAX_OPEN_FILES: usize = 100;

struct RegistryInner {
    files: HashMap<String, Arc<TextureFile>>,
    /// Insertion-ordered sweep list; grows only, so the cursor stays valid
    sweep_list: Vec<Arc<TextureFile>>,
    sweep: usize,
    search_path: String,
    common_to_world: Mat4,
}

pub struct FileRegistry {
    inner: Mutex<RegistryInner>,
    /// Number of files currently holding an open reader; shared with every
    /// `TextureFile` so `release` can decrement it without a back-pointer
    open_files: Arc<AtomicUsize>,
    max_open_files: AtomicUsize,
    stats: Arc<CacheStats>,
}

impl FileRegistry {
    pub fn new(stats: Arc<CacheStats>) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                files: HashMap::new(),
                sweep_list: Vec::new(),
                sweep: 0,
                search_path: String::new(),
                common_to_world: Mat4::IDENTITY,
            }),
            open_files: Arc::new(AtomicUsize::new(0)),
            max_open_files: AtomicUsize::new(DEFAULT_MAX_OPEN_FILES),
            stats,
        }
    }

    /// Look up or create the file entry for `filename`
    ///
    /// A miss makes room in the open-file pool, constructs the entry, and
    /// attempts the first open. The entry is returned even when broken;
    /// callers check `broken()`.
    pub fn find_or_open(&self, filename: &str) -> Arc<TextureFile> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(file) = inner.files.get(filename) {
            file.mark_used();
            return file.clone();
        }

        self.check_max_files(&mut inner);

        let id = inner.sweep_list.len() as FileId;
        let file = Arc::new(TextureFile::new(
            id,
            filename,
            &inner.search_path,
            inner.common_to_world,
            self.open_files.clone(),
        ));
        if let Err(e) = file.open() {
            log::warn!("failed to open texture \"{}\": {}", filename, e);
        } else {
            self.stats.file_opened();
        }
        inner.files.insert(filename.to_string(), file.clone());
        inner.sweep_list.push(file.clone());
        file
    }

    /// CLOCK sweep: close least-recently-used readers until the pool is
    /// under budget
    ///
    /// `release` gives each used file one grace pass, so a full rotation
    /// clears used bits and a second closes whatever stayed cold.
    fn check_max_files(&self, inner: &mut RegistryInner) {
        let max = self.max_open_files.load(Ordering::Acquire);
        while self.open_files.load(Ordering::Acquire) >= max {
            if inner.sweep_list.is_empty() || self.open_files.load(Ordering::Acquire) == 0 {
                break;
            }
            if inner.sweep >= inner.sweep_list.len() {
                inner.sweep = 0;
            }
            let file = inner.sweep_list[inner.sweep].clone();
            inner.sweep += 1;
            let was_open = file.opened();
            file.release();
            if was_open && !file.opened() {
                self.stats.file_closed();
            }
        }
    }

    pub fn set_max_open_files(&self, max: usize) {
        self.max_open_files.store(max, Ordering::Release);
    }

    pub fn set_search_path(&self, path: &str) {
        self.inner.lock().unwrap().search_path = path.to_string();
    }

    pub fn set_common_to_world(&self, m: Mat4) {
        self.inner.lock().unwrap().common_to_world = m;
    }

    pub fn common_to_world(&self) -> Mat4 {
        self.inner.lock().unwrap().common_to_world
    }

    /// Number of files currently in the open state
    pub fn open_count(&self) -> usize {
        self.open_files.load(Ordering::Acquire)
    }

    /// Number of known files, open or closed
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
