//! Image loading seam.
//!
//! The scene asks for an image once (`request`) and then polls every tick
//! until the loader reports it ready or failed. Loaders never retry on their
//! own; a failed source stays failed until it is requested again. Neither
//! call may block the frame.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use image::RgbaImage;
use log::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub src: String,
    pub width: u32,
    pub height: u32,
    /// Decoded pixels when the loader keeps them; hosts that only need the
    /// footprint leave this empty.
    pub pixels: Option<Arc<RgbaImage>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Pending,
    Ready(ImageData),
    Failed(String),
}

pub trait ImageLoader {
    fn request(&mut self, src: &str);
    fn poll(&mut self, src: &str) -> LoadState;
}

type Decoded = (String, Result<RgbaImage, String>);

/// Loads images from disk relative to a root directory and keeps their
/// decoded pixels. Each request decodes on its own worker thread; results
/// are collected when the scene polls.
pub struct FsImageLoader {
    root: PathBuf,
    cache: HashMap<String, LoadState>,
    tx: Sender<Decoded>,
    rx: Receiver<Decoded>,
}

impl FsImageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (tx, rx) = channel();
        FsImageLoader {
            root: root.into(),
            cache: HashMap::new(),
            tx,
            rx,
        }
    }

    fn collect(&mut self) {
        while let Ok((src, decoded)) = self.rx.try_recv() {
            let state = match decoded {
                Ok(rgba) => {
                    debug!("loaded {src} ({}x{})", rgba.width(), rgba.height());
                    LoadState::Ready(ImageData {
                        src: src.clone(),
                        width: rgba.width(),
                        height: rgba.height(),
                        pixels: Some(Arc::new(rgba)),
                    })
                }
                Err(e) => {
                    warn!("could not load {src}: {e}");
                    LoadState::Failed(e)
                }
            };
            self.cache.insert(src, state);
        }
    }
}

impl ImageLoader for FsImageLoader {
    fn request(&mut self, src: &str) {
        if matches!(self.cache.get(src), Some(LoadState::Ready(_) | LoadState::Pending)) {
            return;
        }
        self.cache.insert(src.to_string(), LoadState::Pending);
        let path = self.root.join(src);
        let tx = self.tx.clone();
        let src = src.to_string();
        thread::spawn(move || {
            let decoded = image::open(&path)
                .map(|img| img.to_rgba8())
                .map_err(|e| format!("{}: {e}", path.display()));
            // The loader may be gone by the time decoding finishes.
            let _ = tx.send((src, decoded));
        });
    }

    fn poll(&mut self, src: &str) -> LoadState {
        self.collect();
        self.cache
            .get(src)
            .cloned()
            .unwrap_or_else(|| LoadState::Failed(format!("{src} was never requested")))
    }
}

/// In-memory loader whose resources resolve when the host says so. Useful for
/// embedded assets and for driving load timing deterministically. Clones
/// share their entries, so a host can keep a handle after giving one to the
/// engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    inner: Rc<RefCell<MemoryEntries>>,
}

#[derive(Debug, Default)]
struct MemoryEntries {
    entries: HashMap<String, LoadState>,
    requested: Vec<String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image that is ready as soon as it is requested.
    pub fn with_image(self, src: &str, width: u32, height: u32) -> Self {
        self.resolve(src, width, height);
        self
    }

    /// Keep `src` pending until `resolve` or `fail` is called.
    pub fn hold(&self, src: &str) {
        self.inner.borrow_mut().entries.insert(src.to_string(), LoadState::Pending);
    }

    pub fn resolve(&self, src: &str, width: u32, height: u32) {
        let data = ImageData {
            src: src.to_string(),
            width,
            height,
            pixels: None,
        };
        self.inner.borrow_mut().entries.insert(src.to_string(), LoadState::Ready(data));
    }

    pub fn fail(&self, src: &str, reason: &str) {
        self.inner
            .borrow_mut()
            .entries
            .insert(src.to_string(), LoadState::Failed(reason.to_string()));
    }

    /// Sources requested so far, in request order.
    pub fn requested(&self) -> Vec<String> {
        self.inner.borrow().requested.clone()
    }
}

impl ImageLoader for MemoryLoader {
    fn request(&mut self, src: &str) {
        self.inner.borrow_mut().requested.push(src.to_string());
    }

    fn poll(&mut self, src: &str) -> LoadState {
        self.inner
            .borrow()
            .entries
            .get(src)
            .cloned()
            .unwrap_or_else(|| LoadState::Failed(format!("no image registered for {src}")))
    }
}
