
//! The top level of the decoder: the delegate event sink
//! and the driver that sequences the five document sections.

use crate::compression::{self, Compression, ImageBlock};
use crate::error::{Error, Result, UnitResult};
use crate::io::{ByteSource, Reader};
use crate::layer::{self, ChannelId, LayerRecord, Layers};
use crate::math::Vec2;
use crate::meta::resources::{self, FrameInfo, ImageResource, Slices};
use crate::meta::{ColorModeData, FileHeader};

use smallvec::SmallVec;


/// Receives the events of one decoding pass, in strict document order:
/// header, color mode data, resources, layers (for each layer one begin,
/// its scanlines, one end), and finally the flattened image.
///
/// Every method has an empty default implementation, so a delegate
/// only implements what it cares about. The decoder owns all event
/// payloads; delegates copy out whatever they want to keep.
pub trait Delegate {

    /// The validated file header.
    fn on_file_header(&mut self, _header: &FileHeader) {}

    /// The color mode data section, holding the palette of indexed images.
    fn on_color_mode_data(&mut self, _data: &ColorModeData) {}

    /// One decoded image resource.
    fn on_resource(&mut self, _resource: &ImageResource) {}

    /// All image resources, after the last one was emitted individually.
    fn on_resources(&mut self, _resources: &[ImageResource]) {}

    /// The slices of the slices resource.
    fn on_slices(&mut self, _slices: &Slices) {}

    /// The animation frame timings, with the index of the active frame.
    fn on_frames(&mut self, _frames: &[FrameInfo], _active_index: u32) {}

    /// One parsed layer info subsection, records and pixel data complete.
    fn on_layers_info(&mut self, _layers: &Layers) {}

    /// The complete layers and mask section.
    fn on_layers_and_mask(&mut self, _layers: &Layers) {}

    /// A layer record, before the pixel data of its channels.
    fn on_begin_layer(&mut self, _layer: &LayerRecord) {}

    /// The same layer record, after the pixel data of its channels.
    fn on_end_layer(&mut self, _layer: &LayerRecord) {}

    /// The shape of the flattened image, before its pixel data.
    fn on_image_data(&mut self, _block: &ImageBlock) {}

    /// One image block begins: the flattened image or one layer channel.
    fn on_begin_image(&mut self, _block: &ImageBlock) {}

    /// One decoded scanline of the block. At depth 16 the bytes are
    /// little-endian sample pairs, at depth 32 big-endian quadruples,
    /// and at depth 1 each byte packs eight pixels.
    fn on_scanline(&mut self, _block: &ImageBlock, _y: usize, _channel: ChannelId, _bytes: &[u8]) {}

    /// The image block is complete.
    fn on_end_image(&mut self, _block: &ImageBlock) {}
}


/// Drives the decoding sequence over a byte source, forwarding events
/// to the delegate. The five section steps are public so that callers
/// can stop after the part they need; [`decode`] runs all of them.
#[derive(Debug)]
pub struct Decoder<'d, S, D> {
    reader: Reader<S>,
    delegate: &'d mut D,
    header: Option<FileHeader>,
}

impl<'d, S: ByteSource, D: Delegate> Decoder<'d, S, D> {

    /// Wrap a byte source positioned at the start of a document.
    pub fn new(source: S, delegate: &'d mut D) -> Self {
        Decoder {
            reader: Reader::new(source),
            delegate,
            header: None,
        }
    }

    /// The header, once [`read_file_header`](Decoder::read_file_header) succeeded.
    pub fn file_header(&self) -> Option<&FileHeader> {
        self.header.as_ref()
    }

    /// Step one: the fixed 26-byte header.
    /// Decides the variant for all following length fields.
    pub fn read_file_header(&mut self) -> UnitResult {
        let header = FileHeader::read(&mut self.reader)?;
        self.reader.set_version(header.version);

        self.delegate.on_file_header(&header);
        self.header = Some(header);
        Ok(())
    }

    /// Step two: the color mode data section.
    pub fn read_color_mode_data(&mut self) -> UnitResult {
        let header = self.expect_header()?;
        let data = ColorModeData::read(&mut self.reader, header.color_mode)?;
        self.ensure_ok()?;

        self.delegate.on_color_mode_data(&data);
        Ok(())
    }

    /// Step three: the image resource list.
    pub fn read_image_resources(&mut self) -> UnitResult {
        resources::read_list(&mut self.reader, self.delegate)?;
        self.ensure_ok()
    }

    /// Step four: the layers and mask section.
    pub fn read_layers_and_mask(&mut self) -> UnitResult {
        let header = self.expect_header()?;
        layer::read_layers_and_mask(&mut self.reader, self.delegate, &header)?;
        self.ensure_ok()
    }

    /// Step five: the flattened image.
    pub fn read_image_data(&mut self) -> UnitResult {
        let header = self.expect_header()?;

        let compression = Compression::from_code(self.reader.read_u16())?;
        let block = ImageBlock {
            compression,
            size: Vec2(header.width(), header.height()),
            depth: header.depth,
            channels: flat_image_channels(header.channel_count)?,
        };

        self.delegate.on_image_data(&block);
        compression::read_image(&mut self.reader, self.delegate, &block)?;
        self.ensure_ok()
    }

    fn expect_header(&self) -> Result<FileHeader> {
        self.header.ok_or_else(|| Error::invalid("file header missing"))
    }

    fn ensure_ok(&self) -> UnitResult {
        if self.reader.ok() { Ok(()) }
        else { Err(Error::end_of_stream()) }
    }
}


/// The channel roles of the flattened image
/// follow from the channel count alone.
fn flat_image_channels(channel_count: u16) -> Result<SmallVec<[ChannelId; 4]>> {
    match channel_count {
        1 => Ok(smallvec![ChannelId::Alpha]),
        2 => Ok(smallvec![ChannelId::TransparencyMask, ChannelId::Red]),
        3 => Ok(smallvec![ChannelId::Red, ChannelId::Green, ChannelId::Blue]),
        4 => Ok(smallvec![ChannelId::Red, ChannelId::Green, ChannelId::Blue, ChannelId::Alpha]),
        _ => Err(Error::invalid("channel count")),
    }
}


/// Decode a complete document, emitting every event on the delegate.
///
/// Failure of any section aborts the remainder; events delivered
/// before the failure stay with the delegate.
pub fn decode<S: ByteSource, D: Delegate>(source: S, delegate: &mut D) -> UnitResult {
    let mut decoder = Decoder::new(source, delegate);

    decoder.read_file_header()?;
    decoder.read_color_mode_data()?;
    decoder.read_image_resources()?;
    decoder.read_layers_and_mask()?;
    decoder.read_image_data()
}
