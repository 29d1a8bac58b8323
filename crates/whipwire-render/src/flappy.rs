use std::ffi::OsString;
use std::path::{Path, PathBuf};

use libloading::Library;
use tracing::{info, warn};
use whipwire_command::FlappyFrame;

use crate::error::{RenderError, Result};
use crate::layout::Layout;

/// Base name of the native renderer library, before platform decoration.
pub const DEFAULT_LIBRARY_NAME: &str = "flappy_render";

/// Exported C entry point of the native renderer.
pub const RENDER_SYMBOL: &str = "renderFlappyState";

/// The native renderer's fixed output grid: 24 columns of 110 LEDs.
pub const NATIVE_LAYOUT: Layout = Layout::new(24, 110);

/// Turns game-state scalars into a flat RGB buffer.
///
/// The buffer is `layout().channels × layout().leds × 3` bytes, indexed as
/// `(channel * leds + led) * 3 + {0, 1, 2}`.
pub trait GameRenderer: Send {
    /// Dimensions of the buffer written by [`render`](GameRenderer::render).
    fn layout(&self) -> Layout;

    /// Render `state` into `out`, which is exactly `layout().pixels() * 3` bytes.
    fn render(&mut self, state: &FlappyFrame, out: &mut [u8]);
}

type RenderFn = unsafe extern "C" fn(
    u8,
    u16,
    u16,
    i16,
    u16,
    i16,
    u16,
    i16,
    u16,
    i16,
    *mut u8,
);

/// [`GameRenderer`] backed by a shared library exporting `renderFlappyState`.
pub struct NativeFlappyRenderer {
    render_fn: RenderFn,
    path: PathBuf,
    layout: Layout,
    // Must outlive `render_fn`.
    _library: Library,
}

impl NativeFlappyRenderer {
    /// Platform file name of the default library (`libflappy_render.so` on Linux).
    pub fn default_library() -> OsString {
        libloading::library_filename(DEFAULT_LIBRARY_NAME)
    }

    /// Load the library at `path` and resolve its entry point.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_layout(path, NATIVE_LAYOUT)
    }

    /// Load a library whose output grid is `layout` instead of the default.
    pub fn load_with_layout(path: impl AsRef<Path>, layout: Layout) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // SAFETY: loading runs the library's initialisers. The renderer is a
        // plain C library with no load-time side effects we depend on.
        let library = unsafe { Library::new(&path) }.map_err(|source| {
            RenderError::LibraryLoad {
                path: path.clone(),
                source,
            }
        })?;

        // SAFETY: `RenderFn` matches the C prototype of `renderFlappyState`.
        // The copied function pointer stays valid while `_library` is alive,
        // and both live in the same struct.
        let render_fn = unsafe {
            library
                .get::<RenderFn>(RENDER_SYMBOL.as_bytes())
                .map(|symbol| *symbol)
        }
        .map_err(|source| RenderError::MissingSymbol {
            path: path.clone(),
            symbol: RENDER_SYMBOL,
            source,
        })?;

        info!(?path, "native game renderer loaded");

        Ok(Self {
            render_fn,
            path,
            layout,
            _library: library,
        })
    }

    /// Load the renderer if possible; otherwise log why once and return `None`.
    pub fn detect(path: Option<&Path>) -> Option<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(Self::default_library()));
        match Self::load(&path) {
            Ok(renderer) => Some(renderer),
            Err(err) => {
                warn!(error = %err, "game renderer unavailable; flappy state will be ignored");
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GameRenderer for NativeFlappyRenderer {
    fn layout(&self) -> Layout {
        self.layout
    }

    fn render(&mut self, state: &FlappyFrame, out: &mut [u8]) {
        let expected = self.layout.pixels() * 3;
        if out.len() < expected {
            warn!(len = out.len(), expected, "render buffer too small; skipping");
            return;
        }
        let [p1, p2, p3] = state.pipes;
        // SAFETY: `out` holds at least `layout.pixels() * 3` bytes, the full
        // extent the library writes for its grid.
        unsafe {
            (self.render_fn)(
                state.game_state,
                state.bird_y,
                state.score,
                p1.x,
                p1.gap_y,
                p2.x,
                p2.gap_y,
                p3.x,
                p3.gap_y,
                state.scroll_x,
                out.as_mut_ptr(),
            );
        }
    }
}

impl std::fmt::Debug for NativeFlappyRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFlappyRenderer")
            .field("path", &self.path)
            .field("layout", &self.layout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_library_is_platform_decorated() {
        let name = NativeFlappyRenderer::default_library();
        let name = name.to_string_lossy();
        assert!(name.contains(DEFAULT_LIBRARY_NAME));
        assert_ne!(name, DEFAULT_LIBRARY_NAME);
    }

    #[test]
    fn missing_library_is_an_error() {
        let err = NativeFlappyRenderer::load("/nonexistent/libflappy_render.so").unwrap_err();
        assert!(matches!(err, RenderError::LibraryLoad { .. }));
    }

    #[test]
    fn detect_returns_none_when_unavailable() {
        let path = Path::new("/nonexistent/libflappy_render.so");
        assert!(NativeFlappyRenderer::detect(Some(path)).is_none());
    }

    #[test]
    fn native_layout_matches_renderer_grid() {
        assert_eq!(NATIVE_LAYOUT.pixels() * 3, 24 * 110 * 3);
    }
}
