use std::path::PathBuf;

/// Errors raised while loading renderer resources.
///
/// None of these reach the draw loop: failed resources are remembered as
/// unavailable and the commands that need them become no-ops.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A GIF file could not be opened.
    #[error("failed to open {path}: {source}")]
    GifOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A GIF file could not be decoded.
    #[error("failed to decode {path}: {source}")]
    GifDecode {
        path: PathBuf,
        source: gif::DecodingError,
    },

    /// The source decoded but held no frames.
    #[error("gif {source_id} has no frames")]
    NoFrames { source_id: u16 },

    /// No frame source is configured.
    #[error("no gif directory configured")]
    NoFrameSource,

    /// The native renderer library could not be loaded.
    #[error("failed to load renderer library {path}: {source}")]
    LibraryLoad {
        path: PathBuf,
        source: libloading::Error,
    },

    /// The renderer library does not export the expected symbol.
    #[error("renderer library {path} has no symbol {symbol}: {source}")]
    MissingSymbol {
        path: PathBuf,
        symbol: &'static str,
        source: libloading::Error,
    },
}

pub type Result<T> = std::result::Result<T, RenderError>;
