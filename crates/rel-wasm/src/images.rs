//! Lazy image cache for node pictures and the canvas background.
//!
//! An image is requested the first time a frame asks for it and is drawn
//! once loaded. The load event schedules another frame through the shared
//! [`FrameLoop`], so the picture appears without further input.

use crate::FrameLoop;
use std::collections::{HashMap, HashSet};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::HtmlImageElement;

pub struct ImageCache {
    entries: HashMap<String, HtmlImageElement>,
    /// Sources asked for since the last [`ImageCache::sweep`].
    used: HashSet<String>,
    frames: FrameLoop,
}

impl ImageCache {
    pub fn new(frames: FrameLoop) -> Self {
        Self {
            entries: HashMap::new(),
            used: HashSet::new(),
            frames,
        }
    }

    /// The decoded image for `source`, or `None` while it is still loading
    /// (or failed to load).
    pub fn get(&mut self, source: &str) -> Option<HtmlImageElement> {
        self.used.insert(source.to_string());
        if let Some(img) = self.entries.get(source) {
            return (img.complete() && img.natural_width() > 0).then(|| img.clone());
        }
        match self.load(source) {
            Ok(img) => {
                self.entries.insert(source.to_string(), img);
            }
            Err(e) => log::warn!("could not create image element: {e:?}"),
        }
        None
    }

    /// Drop entries not drawn since the previous sweep.
    pub fn sweep(&mut self) {
        let used = std::mem::take(&mut self.used);
        self.entries.retain(|src, _| used.contains(src));
    }

    fn load(&self, source: &str) -> Result<HtmlImageElement, JsValue> {
        let img = HtmlImageElement::new()?;
        let frames = self.frames.clone();
        let onload = Closure::<dyn FnMut()>::new(move || frames.request());
        img.set_onload(Some(onload.as_ref().unchecked_ref()));
        // The element owns the handler for the rest of the page's life.
        onload.forget();
        img.set_src(source);
        log::debug!("loading image ({} bytes of source)", source.len());
        Ok(img)
    }
}
