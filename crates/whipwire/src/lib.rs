//! Bridge between the whip LED controller's serial output and a renderer
//! process.
//!
//! # Crate Structure
//!
//! - [`frame`]: streaming parser for the controller's `D`/`V` frames
//! - [`command`]: visualizer command decoding and the transport record schema
//! - [`transport`]: best-effort datagram transport (UDP, Unix datagram sockets)
//! - [`render`]: renderer-side channel state, GIF frames, native game renderer

/// Re-export frame types.
pub mod frame {
    pub use whipwire_frame::*;
}

/// Re-export command types.
pub mod command {
    pub use whipwire_command::*;
}

/// Re-export transport types.
pub mod transport {
    pub use whipwire_transport::*;
}

/// Re-export render types.
pub mod render {
    pub use whipwire_render::*;
}
