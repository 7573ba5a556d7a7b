
//! File-level meta data: the magic numbers, the fixed header,
//! and the color mode section with its palette.

pub mod descriptor;
pub mod resources;

use crate::error::{Error, Result, UnitResult};
use crate::io::{ByteSource, Reader};
use crate::math::Vec2;


/// The signatures appearing throughout a document.
pub mod magic {
    use super::*;

    /// The first four bytes of each document.
    pub const FILE: [u8; 4] = *b"8BPS";

    /// Signature of image resource blocks, blend modes, and tag blocks.
    pub const BLOCK: [u8; 4] = *b"8BIM";

    /// Alternative tag block signature written by the big variant.
    pub const BLOCK_BIG: [u8; 4] = *b"8B64";

    /// Consume four bytes and return whether they are the document signature.
    pub fn is_file<S: ByteSource>(reader: &mut Reader<S>) -> bool {
        reader.read_four_cc().0 == self::FILE
    }

    /// Consume four bytes. If they are not the document signature, return an error.
    pub fn validate_file<S: ByteSource>(reader: &mut Reader<S>) -> UnitResult {
        if self::is_file(reader) { Ok(()) }
        else { Err(Error::invalid("file signature missing")) }
    }
}


/// The two on-disk shapes of the container. The big variant widens
/// certain length fields from 32 to 64 bits and allows larger canvases.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Version {

    /// Version 1, the classic 32-bit form.
    Classic,

    /// Version 2, the big 64-bit form.
    Big,
}

impl Version {

    /// Interpret the version field of the file header.
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            1 => Ok(Version::Classic),
            2 => Ok(Version::Big),
            _ => Err(Error::invalid("version number")),
        }
    }

    /// The largest width or height this variant allows.
    pub fn max_dimension(self) -> u32 {
        match self {
            Version::Classic => 30_000,
            Version::Big => 300_000,
        }
    }
}


/// How the flattened pixel data is to be interpreted.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[allow(missing_docs)]
pub enum ColorMode {
    Bitmap,
    Grayscale,
    Indexed,
    Rgb,
    Cmyk,
    Multichannel,
    Duotone,
    Lab,
}

impl ColorMode {

    /// Interpret the color mode field of the file header.
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            0 => Ok(ColorMode::Bitmap),
            1 => Ok(ColorMode::Grayscale),
            2 => Ok(ColorMode::Indexed),
            3 => Ok(ColorMode::Rgb),
            4 => Ok(ColorMode::Cmyk),
            7 => Ok(ColorMode::Multichannel),
            8 => Ok(ColorMode::Duotone),
            9 => Ok(ColorMode::Lab),
            _ => Err(Error::invalid("color mode")),
        }
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            ColorMode::Bitmap => "Bitmap",
            ColorMode::Grayscale => "Grayscale",
            ColorMode::Indexed => "Indexed",
            ColorMode::Rgb => "RGB",
            ColorMode::Cmyk => "CMYK",
            ColorMode::Multichannel => "Multichannel",
            ColorMode::Duotone => "Duotone",
            ColorMode::Lab => "Lab",
        })
    }
}


/// The fixed 26-byte header at the start of every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {

    /// Which of the two on-disk shapes the rest of the file uses.
    pub version: Version,

    /// Number of channels of the flattened image, including alpha.
    pub channel_count: u16,

    /// Canvas size in pixels (width, height).
    pub size: Vec2<u32>,

    /// Bits per channel sample: 1, 8, 16 or 32.
    pub depth: u16,

    /// Color interpretation of the flattened image.
    pub color_mode: ColorMode,
}

impl FileHeader {

    /// Read and validate the header. On success, callers should pass
    /// the version on to the reader so that subsequent length fields
    /// use the right width.
    pub fn read<S: ByteSource>(reader: &mut Reader<S>) -> Result<Self> {
        magic::validate_file(reader)?;

        let version = Version::from_code(reader.read_u16())?;
        reader.skip(6); // reserved bytes

        let channel_count = reader.read_u16();
        let height = reader.read_u32();
        let width = reader.read_u32();
        let depth = reader.read_u16();
        let color_mode = ColorMode::from_code(reader.read_u16())?;

        let header = FileHeader {
            version, channel_count,
            size: Vec2(width, height),
            depth, color_mode,
        };

        header.validate()?;
        Ok(header)
    }

    /// Check the bit depth and the variant-dependent dimension bounds.
    pub fn validate(&self) -> UnitResult {
        if self.depth != 1 && self.depth != 8 && self.depth != 16 && self.depth != 32 {
            return Err(Error::invalid("channel depth"));
        }

        let limit = self.version.max_dimension();
        if self.size.width() > limit || self.size.height() > limit {
            return Err(Error::invalid("canvas dimensions"));
        }

        Ok(())
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> usize { self.size.width() as usize }

    /// Canvas height in pixels.
    pub fn height(&self) -> usize { self.size.height() as usize }
}


/// One entry of the indexed palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}


/// Contents of the color mode data section. The section is non-empty
/// only for the indexed and duotone color modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorModeData {

    /// The section was empty.
    Empty,

    /// The 256-entry palette of an indexed image.
    Palette(Vec<Rgb>),

    /// The opaque bytes of a duotone image, preserved verbatim
    /// so that they survive a round trip through an editor.
    Raw(Vec<u8>),
}

impl ColorModeData {

    /// Read the section. The on-disk palette stores three planes of 256
    /// bytes each, one plane per color component.
    pub fn read<S: ByteSource>(reader: &mut Reader<S>, color_mode: ColorMode) -> Result<Self> {
        let length = reader.read_u32();

        if length == 0 {
            return if color_mode == ColorMode::Indexed || color_mode == ColorMode::Duotone {
                Err(Error::invalid("missing color mode data"))
            }
            else {
                Ok(ColorModeData::Empty)
            };
        }

        if color_mode == ColorMode::Indexed {
            if length != 768 {
                return Err(Error::invalid("palette length"));
            }

            let mut colors = vec![Rgb::default(); 256];
            for color in colors.iter_mut() { color.r = reader.read_u8(); }
            for color in colors.iter_mut() { color.g = reader.read_u8(); }
            for color in colors.iter_mut() { color.b = reader.read_u8(); }

            Ok(ColorModeData::Palette(colors))
        }
        else {
            Ok(ColorModeData::Raw(reader.read_vec(length as usize)))
        }
    }

    /// The palette of an indexed image, if this is one.
    pub fn palette(&self) -> Option<&[Rgb]> {
        match self {
            ColorModeData::Palette(colors) => Some(colors),
            _ => None,
        }
    }

    /// Whether the section was empty.
    pub fn is_empty(&self) -> bool { self == &ColorModeData::Empty }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::io::Tracking;
    use std::io::Cursor;

    fn reader_over(bytes: Vec<u8>) -> Reader<Tracking<Cursor<Vec<u8>>>> {
        Reader::new(Tracking::new(Cursor::new(bytes)))
    }

    fn header_bytes(version: u16, channels: u16, height: u32, width: u32, depth: u16, mode: u16) -> Vec<u8> {
        let mut bytes = b"8BPS".to_vec();
        bytes.extend_from_slice(&version.to_be_bytes());
        bytes.extend_from_slice(&[0; 6]);
        bytes.extend_from_slice(&channels.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&depth.to_be_bytes());
        bytes.extend_from_slice(&mode.to_be_bytes());
        bytes
    }

    #[test]
    fn read_classic_header() {
        let mut reader = reader_over(header_bytes(1, 3, 600, 800, 8, 3));
        let header = FileHeader::read(&mut reader).unwrap();

        assert_eq!(header.version, Version::Classic);
        assert_eq!(header.channel_count, 3);
        assert_eq!(header.size, Vec2(800, 600));
        assert_eq!(header.depth, 8);
        assert_eq!(header.color_mode, ColorMode::Rgb);
        assert_eq!(reader.position(), 26);
    }

    #[test]
    fn reject_bad_headers() {
        let mut wrong_magic = header_bytes(1, 3, 1, 1, 8, 3);
        wrong_magic[0] = b'9';
        assert!(FileHeader::read(&mut reader_over(wrong_magic)).is_err());

        let bad_depth = header_bytes(1, 3, 1, 1, 7, 3);
        assert!(FileHeader::read(&mut reader_over(bad_depth)).is_err());

        let bad_mode = header_bytes(1, 3, 1, 1, 8, 5);
        assert!(FileHeader::read(&mut reader_over(bad_mode)).is_err());

        let bad_version = header_bytes(3, 3, 1, 1, 8, 3);
        assert!(FileHeader::read(&mut reader_over(bad_version)).is_err());

        // too large for classic, fine for big
        let too_wide = header_bytes(1, 3, 1, 40_000, 8, 3);
        assert!(FileHeader::read(&mut reader_over(too_wide)).is_err());

        let big_enough = header_bytes(2, 3, 1, 40_000, 8, 3);
        assert!(FileHeader::read(&mut reader_over(big_enough)).is_ok());
    }

    #[test]
    fn palette_planes_become_triples() {
        let mut bytes = 768_u32.to_be_bytes().to_vec();
        bytes.extend((0 ..= 255).map(|i| i as u8));           // red plane
        bytes.extend((0 ..= 255).map(|i| (255 - i) as u8));   // green plane
        bytes.extend(std::iter::repeat(7).take(256));         // blue plane

        let mut reader = reader_over(bytes);
        let data = ColorModeData::read(&mut reader, ColorMode::Indexed).unwrap();

        let palette = data.palette().unwrap();
        assert_eq!(palette.len(), 256);
        assert_eq!(palette[5], Rgb { r: 5, g: 250, b: 7 });
        assert_eq!(reader.position(), 4 + 768);
    }

    #[test]
    fn color_mode_data_consistency() {
        let empty = 0_u32.to_be_bytes().to_vec();
        assert!(ColorModeData::read(&mut reader_over(empty.clone()), ColorMode::Rgb).unwrap().is_empty());
        assert!(ColorModeData::read(&mut reader_over(empty.clone()), ColorMode::Indexed).is_err());
        assert!(ColorModeData::read(&mut reader_over(empty), ColorMode::Duotone).is_err());

        let mut duotone = 3_u32.to_be_bytes().to_vec();
        duotone.extend_from_slice(&[1, 2, 3]);
        let data = ColorModeData::read(&mut reader_over(duotone), ColorMode::Duotone).unwrap();
        assert_eq!(data, ColorModeData::Raw(vec![1, 2, 3]));

        let wrong_length = 100_u32.to_be_bytes().to_vec();
        assert!(ColorModeData::read(&mut reader_over(wrong_length), ColorMode::Indexed).is_err());
    }
}
