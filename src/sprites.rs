//! Sprite download and thumbnail cache.

use futures::future::join_all;
use image::imageops::FilterType;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::api::PokeApi;
use crate::enrich::CancelToken;
use crate::models::{PokemonRecord, Sprite};

pub const THUMB_W: u32 = 48;
pub const THUMB_H: u32 = 48;

/// Compact RGB thumbnail stored in the in-memory cache.
pub struct SpriteThumb {
    pub w: u32,
    pub h: u32,
    /// RGB pixels in row-major order (len = w*h*3)
    pub pixels: Vec<u8>,
}

impl SpriteThumb {
    /// Decode any supported image (PNG, or the first frame of a GIF) and
    /// shrink it to the canonical thumbnail size.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let img = image::load_from_memory(bytes).ok()?;
        let small = image::imageops::resize(&img.to_rgba8(), THUMB_W, THUMB_H, FilterType::Lanczos3);
        let mut pixels = Vec::with_capacity((THUMB_W * THUMB_H * 3) as usize);
        for p in small.pixels() {
            pixels.extend_from_slice(&[p[0], p[1], p[2]]);
        }
        Some(Self {
            w: THUMB_W,
            h: THUMB_H,
            pixels,
        })
    }

    pub fn load(path: &Path) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        Self::decode(&bytes)
    }

    /// Pixel rows sized `w` x `h`. Resizes from the thumbnail when the size
    /// differs, which is much cheaper than decoding the file again.
    pub fn rows(&self, w: u32, h: u32) -> Vec<Vec<(u8, u8, u8)>> {
        if self.w == w && self.h == h {
            return self
                .pixels
                .chunks(3 * w as usize)
                .map(|row| row.chunks(3).map(|p| (p[0], p[1], p[2])).collect())
                .collect();
        }

        let mut buf = image::RgbaImage::new(self.w, self.h);
        for y in 0..self.h {
            for x in 0..self.w {
                let idx = ((y * self.w + x) * 3) as usize;
                buf.put_pixel(
                    x,
                    y,
                    image::Rgba([self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2], 255]),
                );
            }
        }
        let resized = image::imageops::resize(&buf, w.max(1), h.max(1), FilterType::Lanczos3);
        let mut rows = Vec::with_capacity(resized.height() as usize);
        for y in 0..resized.height() {
            let mut row = Vec::with_capacity(resized.width() as usize);
            for x in 0..resized.width() {
                let p = resized.get_pixel(x, y);
                row.push((p[0], p[1], p[2]));
            }
            rows.push(row);
        }
        rows
    }
}

/// Where a record's sprite lives on disk, if it has one.
pub fn sprite_path(dir: &Path, record: &PokemonRecord) -> Option<PathBuf> {
    let ext = match &record.sprite {
        Sprite::Animated(_) => "gif",
        Sprite::Static(_) => "png",
        Sprite::Placeholder => return None,
    };
    Some(dir.join(format!("{}.{}", record.id, ext)))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpriteSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Fetch sprites not yet on disk, `batch_size` at a time.
pub async fn download_sprites<A: PokeApi + ?Sized>(
    api: &A,
    records: &[&PokemonRecord],
    dir: &Path,
    batch_size: usize,
    cancel: &CancelToken,
) -> SpriteSummary {
    let mut summary = SpriteSummary::default();
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), error = %e, "cannot create sprite directory");
        summary.failed = records.len();
        return summary;
    }

    let mut todo = Vec::new();
    for record in records {
        match (record.sprite.url(), sprite_path(dir, record)) {
            (Some(url), Some(path)) if !path.exists() => todo.push((url, path)),
            _ => summary.skipped += 1,
        }
    }

    for batch in todo.chunks(batch_size.max(1)) {
        if cancel.is_cancelled() {
            break;
        }
        let results = join_all(batch.iter().map(|(url, path)| async move {
            let bytes = api.sprite(url).await.map_err(|e| e.to_string())?;
            write_atomic(path, &bytes).map_err(|e| e.to_string())?;
            Ok::<_, String>(())
        }))
        .await;
        for ((url, _), result) in batch.iter().zip(results) {
            match result {
                Ok(()) => summary.downloaded += 1,
                Err(e) => {
                    debug!(url = %url, error = %e, "sprite download failed");
                    summary.failed += 1;
                }
            }
        }
    }
    summary
}

/// Write `bytes` next to `path` and rename into place, so an interrupted
/// download never leaves a truncated sprite under the final name.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// In-memory thumbnail cache keyed by Pokédex id. Shared with a background
/// thread so that the UI never blocks on disk.
#[derive(Clone, Default)]
pub struct SpriteCache {
    inner: Arc<Mutex<HashMap<u32, SpriteThumb>>>,
}

impl SpriteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pixel rows for `id`, loading the thumbnail from `path` on a miss.
    pub fn pixels(&self, id: u32, path: &Path, w: u32, h: u32) -> Option<Vec<Vec<(u8, u8, u8)>>> {
        let mut cache = self.inner.lock().ok()?;
        if !cache.contains_key(&id) {
            let thumb = SpriteThumb::load(path)?;
            cache.insert(id, thumb);
        }
        cache.get(&id).map(|thumb| thumb.rows(w, h))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.inner.lock().map(|c| c.contains_key(&id)).unwrap_or(false)
    }

    /// Decode thumbnails for `items` on a background thread.
    pub fn preload(&self, items: Vec<(u32, PathBuf)>) {
        let cache = self.clone();
        std::thread::spawn(move || {
            for (id, path) in items {
                if cache.contains(id) {
                    continue;
                }
                if let Some(thumb) = SpriteThumb::load(&path) {
                    if let Ok(mut c) = cache.inner.lock() {
                        c.insert(id, thumb);
                    }
                }
            }
        });
    }
}
