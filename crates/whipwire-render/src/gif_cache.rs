use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{RenderError, Result};
use crate::layout::{FrameGrid, Layout};

/// Loads every frame of an animation, already mapped onto the layout.
pub trait FrameSource: Send {
    /// Load and fully decode `source_id`.
    fn load(&self, source_id: u16, layout: Layout) -> Result<Vec<FrameGrid>>;
}

/// A source with nothing in it; every load fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFrameSource;

impl FrameSource for NoFrameSource {
    fn load(&self, _source_id: u16, _layout: Layout) -> Result<Vec<FrameGrid>> {
        Err(RenderError::NoFrameSource)
    }
}

/// Lazily loaded, never evicted animation frames keyed by source id.
///
/// The first reference to a source loads it. A failed or empty load is
/// remembered as an empty entry and never retried.
pub struct GifFrameCache {
    source: Box<dyn FrameSource>,
    layout: Layout,
    entries: HashMap<u16, Vec<FrameGrid>>,
    attempts: HashMap<u16, u32>,
}

impl GifFrameCache {
    pub fn new(source: impl FrameSource + 'static, layout: Layout) -> Self {
        Self {
            source: Box::new(source),
            layout,
            entries: HashMap::new(),
            attempts: HashMap::new(),
        }
    }

    /// A cache whose every lookup misses.
    pub fn disabled(layout: Layout) -> Self {
        Self::new(NoFrameSource, layout)
    }

    /// Frame `frame_index` (wrapped by the frame count) of `source_id`, if
    /// the source loaded.
    pub fn get_frame(&mut self, source_id: u16, frame_index: u32) -> Option<&FrameGrid> {
        if !self.entries.contains_key(&source_id) {
            let frames = self.load(source_id);
            self.entries.insert(source_id, frames);
        }
        let frames = self.entries.get(&source_id)?;
        if frames.is_empty() {
            return None;
        }
        let index = frame_index as usize % frames.len();
        frames.get(index)
    }

    /// Number of frames cached for `source_id` (0 for failed or unseen sources).
    pub fn frame_count(&self, source_id: u16) -> usize {
        self.entries.get(&source_id).map_or(0, Vec::len)
    }

    /// How many times `source_id` was loaded from the source.
    pub fn load_attempts(&self, source_id: u16) -> u32 {
        self.attempts.get(&source_id).copied().unwrap_or(0)
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    fn load(&mut self, source_id: u16) -> Vec<FrameGrid> {
        *self.attempts.entry(source_id).or_insert(0) += 1;

        match self.source.load(source_id, self.layout) {
            Ok(frames) if frames.is_empty() => {
                warn!(
                    source_id,
                    error = %RenderError::NoFrames { source_id },
                    "gif unavailable"
                );
                Vec::new()
            }
            Ok(frames) => {
                debug!(source_id, frames = frames.len(), "gif loaded");
                frames
            }
            Err(err) => {
                warn!(source_id, error = %err, "gif unavailable");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for GifFrameCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GifFrameCache")
            .field("layout", &self.layout)
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use whipwire_command::Rgb;

    use super::*;

    /// Serves `frames` solid-colour frames for source 1; everything else is missing.
    pub(crate) struct SolidFrames {
        pub frames: usize,
        pub loads: Arc<AtomicU32>,
    }

    impl FrameSource for SolidFrames {
        fn load(&self, source_id: u16, layout: Layout) -> Result<Vec<FrameGrid>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if source_id != 1 {
                return Err(RenderError::NoFrameSource);
            }
            Ok((0..self.frames)
                .map(|i| FrameGrid::from_fn(layout, |_, _| Rgb::new(i as u8, 0, 0)))
                .collect())
        }
    }

    fn cache(frames: usize) -> (GifFrameCache, Arc<AtomicU32>) {
        let loads = Arc::new(AtomicU32::new(0));
        let source = SolidFrames {
            frames,
            loads: loads.clone(),
        };
        (GifFrameCache::new(source, Layout::new(2, 4)), loads)
    }

    #[test]
    fn frames_wrap_by_count() {
        let (mut cache, _) = cache(3);
        assert_eq!(cache.get_frame(1, 0).unwrap().row(0)[0], Rgb::new(0, 0, 0));
        assert_eq!(cache.get_frame(1, 4).unwrap().row(0)[0], Rgb::new(1, 0, 0));
        assert_eq!(
            cache.get_frame(1, u32::MAX).unwrap().row(1)[3],
            Rgb::new((u32::MAX % 3) as u8, 0, 0)
        );
        assert_eq!(cache.frame_count(1), 3);
    }

    #[test]
    fn loads_once_per_source() {
        let (mut cache, loads) = cache(2);
        for i in 0..10 {
            assert!(cache.get_frame(1, i).is_some());
        }
        assert_eq!(cache.load_attempts(1), 1);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_source_is_never_retried() {
        let (mut cache, loads) = cache(2);
        for i in 0..5 {
            assert!(cache.get_frame(7, i).is_none());
        }
        assert_eq!(cache.load_attempts(7), 1);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.frame_count(7), 0);
    }

    #[test]
    fn zero_frames_is_a_failed_load() {
        let (mut cache, _) = cache(0);
        assert!(cache.get_frame(1, 0).is_none());
        assert!(cache.get_frame(1, 1).is_none());
        assert_eq!(cache.load_attempts(1), 1);
    }

    #[test]
    fn disabled_cache_misses() {
        let mut cache = GifFrameCache::disabled(Layout::default());
        assert!(cache.get_frame(0, 0).is_none());
        assert_eq!(cache.load_attempts(0), 1);
        assert_eq!(cache.load_attempts(1), 0);
    }
}
