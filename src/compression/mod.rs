
//! Per-channel pixel data: the compression codes
//! and the scanline emission for one image block.


// private modules make non-breaking changes easier
mod packbits;

use smallvec::SmallVec;

use crate::decode::Delegate;
use crate::error::{Error, Result, UnitResult};
use crate::io::{ByteSource, Reader};
use crate::layer::ChannelId;
use crate::math::Vec2;


/// Specifies how the pixel data of an image block is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {

    /// Plain big-endian samples, row by row.
    Raw,

    /// PackBits run-length coding, row by row,
    /// with a leading table of compressed row lengths.
    Rle,

    /// ZLIB deflate without a predictor.
    /// Recognized but not decoded; the block is skipped.
    ZipNoPrediction,

    /// ZLIB deflate with delta prediction.
    /// Recognized but not decoded; the block is skipped.
    ZipWithPrediction,
}

impl Compression {

    /// Interpret a compression code. The set is closed;
    /// anything above 3 fails.
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            0 => Ok(Compression::Raw),
            1 => Ok(Compression::Rle),
            2 => Ok(Compression::ZipNoPrediction),
            3 => Ok(Compression::ZipWithPrediction),
            _ => Err(Error::invalid("compression code")),
        }
    }
}


/// Shape of one pixel pass: either the flattened image
/// or a single channel of a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlock {

    /// How the pixel data of this block is stored.
    pub compression: Compression,

    /// Pixel size (width, height) of this block.
    pub size: Vec2<usize>,

    /// Bits per sample: 1, 8, 16 or 32.
    pub depth: u16,

    /// The channels stored in this block, in storage order.
    pub channels: SmallVec<[ChannelId; 4]>,
}

impl ImageBlock {

    /// Bytes of one decoded scanline, before any padding to even.
    /// At depth 1, eight pixels pack into each byte.
    pub fn scanline_bytes(&self) -> usize {
        let bits = self.size.width() * self.depth as usize;
        (bits + 7) / 8
    }
}


/// Read the pixel data of one block and emit the begin event, one
/// event per decoded scanline, and the end event. Depths 16 and 32
/// under RLE and the ZIP modes are acknowledged without scanline
/// output; the caller seeks past them using the declared block length.
pub(crate) fn read_image<S, D>(
    reader: &mut Reader<S>,
    delegate: &mut D,
    block: &ImageBlock,
) -> UnitResult
    where S: ByteSource, D: Delegate
{
    delegate.on_begin_image(block);

    // RLE prefixes the pixel data with one compressed byte count
    // per scanline, over all channels of the block
    let mut row_byte_counts = Vec::new();
    if block.compression == Compression::Rle {
        for _ in 0 .. block.size.height() * block.channels.len() {
            if !reader.ok() { break; }
            row_byte_counts.push(reader.read_length16_or_32());
        }
    }

    for (channel_index, &channel) in block.channels.iter().enumerate() {
        match block.compression {
            Compression::Raw => read_raw_channel(reader, delegate, block, channel)?,

            Compression::Rle => {
                if block.depth == 8 {
                    let first_row = channel_index * block.size.height();
                    let last_row = first_row + block.size.height();

                    let rows = row_byte_counts.get(first_row .. last_row)
                        .or_else(|| row_byte_counts.get(first_row ..))
                        .unwrap_or_default();

                    read_rle_channel(reader, delegate, block, channel, rows)?;
                }

                // depths 16 and 32 are acknowledged but emit nothing
            }

            Compression::ZipNoPrediction | Compression::ZipWithPrediction => {
                log::debug!("skipping zip compressed channel {:?}", channel);
            }
        }
    }

    delegate.on_end_image(block);
    Ok(())
}


/// Raw rows, widened per depth: 16-bit samples become little-endian
/// byte pairs, 32-bit samples stay big-endian, depth 1 passes the
/// packed bytes through with the most significant bit first.
fn read_raw_channel<S, D>(
    reader: &mut Reader<S>,
    delegate: &mut D,
    block: &ImageBlock,
    channel: ChannelId,
) -> UnitResult
    where S: ByteSource, D: Delegate
{
    let width = block.size.width();
    let mut row = Vec::with_capacity(block.scanline_bytes());

    for y in 0 .. block.size.height() {
        if !reader.ok() { break; }
        row.clear();

        match block.depth {
            1 => {
                for _ in 0 .. (width + 7) / 8 {
                    row.push(reader.read_u8());
                }
            }

            8 => {
                row.resize(width, 0);
                reader.read_bytes(&mut row);
            }

            16 => {
                for _ in 0 .. width {
                    let sample = reader.read_u16();
                    row.extend_from_slice(&sample.to_le_bytes());
                }
            }

            32 => {
                for _ in 0 .. width {
                    let sample = reader.read_u32();
                    row.extend_from_slice(&sample.to_be_bytes());
                }
            }

            _ => return Err(Error::unsupported("raw channel depth")),
        }

        delegate.on_scanline(block, y, channel, &row);
    }

    Ok(())
}


/// One PackBits-coded row per byte count. Running out of bytes in the
/// middle of a row is the one place where stream exhaustion is fatal,
/// because no outer length is left to resynchronize on.
fn read_rle_channel<S, D>(
    reader: &mut Reader<S>,
    delegate: &mut D,
    block: &ImageBlock,
    channel: ChannelId,
    row_byte_counts: &[u32],
) -> UnitResult
    where S: ByteSource, D: Delegate
{
    let mut scanline = vec![0_u8; block.scanline_bytes() + block.scanline_bytes() % 2];

    for (y, &byte_count) in row_byte_counts.iter().enumerate() {
        let compressed = reader.read_vec(byte_count as usize);
        if !reader.ok() { return Err(Error::end_of_stream()); }

        packbits::decode_into(&compressed, &mut scanline);
        delegate.on_scanline(block, y, channel, &scanline);
    }

    Ok(())
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compression_codes() {
        assert_eq!(Compression::from_code(0).unwrap(), Compression::Raw);
        assert_eq!(Compression::from_code(1).unwrap(), Compression::Rle);
        assert_eq!(Compression::from_code(3).unwrap(), Compression::ZipWithPrediction);
        assert!(Compression::from_code(4).is_err());
    }

    #[test]
    fn scanline_byte_counts() {
        let block = |width, depth| ImageBlock {
            compression: Compression::Raw,
            size: Vec2(width, 1),
            depth,
            channels: smallvec![ChannelId::Alpha],
        };

        assert_eq!(block(10, 8).scanline_bytes(), 10);
        assert_eq!(block(10, 16).scanline_bytes(), 20);
        assert_eq!(block(10, 32).scanline_bytes(), 40);

        // eight pixels per byte, rounded up
        assert_eq!(block(8, 1).scanline_bytes(), 1);
        assert_eq!(block(9, 1).scanline_bytes(), 2);
    }
}
