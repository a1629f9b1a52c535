//! Background image decoding for image operations.

use crate::renderer::{RenderResult, RendererError};
use base64::{Engine, engine::general_purpose::STANDARD};
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread;
use std::time::{Duration, Instant};

/// Decode state of one image source.
#[derive(Debug, Clone)]
pub enum ImageState {
    Loading,
    Ready(Arc<RgbaImage>),
    /// Undecodable, or a source that isn't fetched.
    Failed,
}

type Decoded = (String, RenderResult<RgbaImage>);

/// Cache of decoded images keyed by their `src`.
///
/// Decodes run one at a time on a single background thread, started on the
/// first request; call [`ImageCache::poll`] from the host loop and repaint when
/// it returns true.
pub struct ImageCache {
    entries: HashMap<String, ImageState>,
    /// Queue of the decode thread, if running.
    jobs: Option<Sender<String>>,
    tx: Sender<Decoded>,
    rx: Receiver<Decoded>,
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCache {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            entries: HashMap::new(),
            jobs: None,
            tx,
            rx,
        }
    }

    /// Current state for `src`, starting a decode on first sight.
    pub fn request(&mut self, src: &str) -> ImageState {
        if let Some(state) = self.entries.get(src) {
            return state.clone();
        }

        let state = if src.starts_with("data:") {
            match self.enqueue(src.to_string()) {
                Ok(()) => ImageState::Loading,
                Err(e) => {
                    log::error!("Cannot decode image {}: {}", preview(src), e);
                    ImageState::Failed
                }
            }
        } else {
            log::warn!("Skipping remote image {}", preview(src));
            ImageState::Failed
        };
        self.entries.insert(src.to_string(), state.clone());
        state
    }

    /// Collect finished decodes. Returns true if anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(decoded) = self.rx.try_recv() {
            self.finish(decoded);
            changed = true;
        }
        changed
    }

    /// Block until no decode is outstanding or `timeout` passes.
    /// Returns true if everything settled.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(decoded) => self.finish(decoded),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
        true
    }

    /// Number of decodes in flight.
    pub fn pending(&self) -> usize {
        self.entries
            .values()
            .filter(|state| matches!(state, ImageState::Loading))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hand `src` to the decode thread, starting it if needed.
    fn enqueue(&mut self, src: String) -> std::io::Result<()> {
        let jobs = match self.jobs.take() {
            Some(jobs) => jobs,
            None => spawn_decoder(self.tx.clone())?,
        };
        let jobs = match jobs.send(src) {
            Ok(()) => jobs,
            Err(returned) => {
                log::warn!("Image decode thread exited, restarting");
                let jobs = spawn_decoder(self.tx.clone())?;
                jobs.send(returned.0)
                    .map_err(|_| std::io::Error::other("decode thread unavailable"))?;
                jobs
            }
        };
        self.jobs = Some(jobs);
        Ok(())
    }

    fn finish(&mut self, (src, result): Decoded) {
        let state = match result {
            Ok(image) => {
                log::debug!("Decoded image {}x{}", image.width(), image.height());
                ImageState::Ready(Arc::new(image))
            }
            Err(e) => {
                log::warn!("Failed to decode image {}: {}", preview(&src), e);
                ImageState::Failed
            }
        };
        self.entries.insert(src, state);
    }
}

/// Start the decode thread. It runs until the job queue is dropped.
fn spawn_decoder(results: Sender<Decoded>) -> std::io::Result<Sender<String>> {
    let (jobs, queue) = channel::<String>();
    thread::Builder::new().name("image-decode".into()).spawn(move || {
        for src in queue {
            let result = decode_data_url(&src);
            if results.send((src, result)).is_err() {
                break;
            }
        }
    })?;
    Ok(jobs)
}

/// Decode a base64 `data:` URL into RGBA pixels.
pub fn decode_data_url(src: &str) -> RenderResult<RgbaImage> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| RendererError::Decode("not a data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| RendererError::Decode("missing data URL payload".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(RendererError::Decode(format!("unsupported encoding: {}", header)));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| RendererError::Decode(e.to_string()))?;
    let decoded = image::load_from_memory(&bytes).map_err(|e| RendererError::Decode(e.to_string()))?;
    Ok(decoded.to_rgba8())
}

/// 2x2 PNG (red, green / blue, white) as a data URL.
#[cfg(test)]
pub(crate) fn tiny_png_data_url() -> String {
    let pixels = [255u8, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255];
    let png = crate::raster::encode_png(&pixels, 2, 2).unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

fn preview(src: &str) -> String {
    src.chars().take(48).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_url() {
        let image = decode_data_url(&tiny_png_data_url()).unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_decode_rejects_non_base64() {
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("data:image/png;base64,!!!").is_err());
        assert!(decode_data_url("https://example.com/a.png").is_err());
    }

    #[test]
    fn test_request_then_poll() {
        let mut cache = ImageCache::new();
        let src = tiny_png_data_url();

        assert!(matches!(cache.request(&src), ImageState::Loading));
        assert_eq!(cache.pending(), 1);
        assert!(cache.wait_idle(Duration::from_secs(5)));
        assert!(matches!(cache.request(&src), ImageState::Ready(_)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_many_images_share_one_decoder() {
        let mut cache = ImageCache::new();
        let good = tiny_png_data_url();
        let sources: Vec<String> = (0..32)
            .map(|i| format!("{}{}", good, " ".repeat(i)))
            .collect();

        for src in &sources {
            assert!(matches!(cache.request(src), ImageState::Loading));
        }
        assert!(cache.jobs.is_some());
        assert_eq!(cache.pending(), 32);
        assert!(cache.wait_idle(Duration::from_secs(10)));
        assert!(sources.iter().all(|src| matches!(cache.request(src), ImageState::Ready(_))));
    }

    #[test]
    fn test_remote_sources_fail_fast() {
        let mut cache = ImageCache::new();
        assert!(matches!(cache.request("https://example.com/a.png"), ImageState::Failed));
        assert_eq!(cache.pending(), 0);
        assert!(!cache.poll());
    }

    #[test]
    fn test_corrupt_data_url_fails_after_decode() {
        let mut cache = ImageCache::new();
        let src = format!("data:image/png;base64,{}", STANDARD.encode(b"not a png"));
        assert!(matches!(cache.request(&src), ImageState::Loading));
        assert!(cache.wait_idle(Duration::from_secs(5)));
        assert!(matches!(cache.request(&src), ImageState::Failed));
    }
}
