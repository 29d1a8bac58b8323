//! Renderer-side model of the whip installation.
//!
//! [`RenderState`] owns every channel's pixels and brightness and changes
//! only through [`RenderState::apply`]. Animation frames come from a
//! [`GifFrameCache`] and flappy state is drawn by an optional
//! [`GameRenderer`], usually the native library behind
//! [`NativeFlappyRenderer`].

pub mod error;
pub mod flappy;
pub mod gif_cache;
pub mod gif_source;
pub mod layout;
pub mod state;

pub use error::{RenderError, Result};
pub use flappy::{GameRenderer, NativeFlappyRenderer, DEFAULT_LIBRARY_NAME, NATIVE_LAYOUT};
pub use gif_cache::{FrameSource, GifFrameCache, NoFrameSource};
pub use gif_source::{decode_frames, GifDirectory};
pub use layout::{FrameGrid, Layout, DEFAULT_CHANNELS, DEFAULT_LEDS};
pub use state::{identify_pattern, Channel, RenderState, FULL_BRIGHTNESS};
