
//! Decode layered Photoshop documents (classic `8BPS` version 1 files
//! and the big 64-bit version 2 variant) as a stream of structured events.
//! This library uses no foreign code or unsafe Rust.
//!
//! The decoder pulls bytes from a seekable [`io::ByteSource`] and pushes
//! document structure into a caller-supplied [`decode::Delegate`]: the file
//! header, the palette, every tagged image resource, each layer with its
//! channel scanlines, and finally the flattened image.

#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused_extern_crates,
    unused,

    missing_copy_implementations,
    missing_debug_implementations,

    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
)]

#![deny(
    unused_variables,
    unused_assignments,
    dead_code,
    unused_must_use,
    missing_copy_implementations,
    trivial_numeric_casts,
    redundant_semicolons
)]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod io; // public to allow custom byte sources

pub mod math;
pub mod meta;
pub mod layer;
pub mod compression;

pub mod error;
pub mod decode;

#[macro_use]
extern crate smallvec;

/// Export the most important items.
/// _Note: This includes a type called `Result`, possibly overwriting the default `std::Result` type usage._
pub mod prelude {

    pub use crate::decode::{decode, Decoder, Delegate};
    pub use crate::io::{ByteSource, FourCc, Reader, Tracking};

    // document structure
    pub use crate::meta::{ColorMode, ColorModeData, FileHeader, Rgb, Version};
    pub use crate::meta::descriptor::{ClassMeta, Descriptor, Kind, Text, Value};
    pub use crate::meta::resources::{FrameInfo, ImageResource, Slice, Slices};
    pub use crate::layer::{
        BlendMode, Bounds, Channel, ChannelId, FrameVisibility,
        GlobalMaskInfo, LayerRecord, Layers, MaskKind, SectionKind,
    };
    pub use crate::compression::{Compression, ImageBlock};

    // common math
    pub use crate::math::Vec2;

    // error handling
    pub use crate::error::{Error, Result, UnitResult};

    // re-export external stuff
    pub use smallvec::SmallVec;
}
