
//! The seekable byte stream the decoder pulls from,
//! and the typed big-endian reader layered on top of it.

pub use std::io::{Read, Seek};

use std::io::SeekFrom;

use crate::meta::Version;


/// A seekable, fallible stream of bytes.
///
/// The source is the sole authority on the stream position; all higher
/// level code computes end offsets as `position + length` and seeks to
/// them instead of counting bytes itself.
///
/// Failure is sticky: after one failed read, [`ok`](ByteSource::ok)
/// stays `false` forever and every subsequent read yields zeroed bytes.
/// This lets the typed readers advance over malformed data without
/// error plumbing, leaving fatality decisions to the section walkers.
pub trait ByteSource {

    /// Whether all reads so far have succeeded.
    fn ok(&self) -> bool;

    /// The current absolute byte position.
    fn position(&mut self) -> u64;

    /// Jump to an absolute byte position.
    /// Never revives a failed stream.
    fn seek(&mut self, position: u64);

    /// The next byte, or zero if the stream has failed.
    fn read_byte(&mut self) -> u8;

    /// Fill the buffer with the next bytes.
    /// On failure the buffer is zeroed and `false` is returned.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> bool;
}


/// Adapts any standard reader to a [`ByteSource`],
/// keeping track of what byte we are at.
/// Used with in-memory cursors in tests and with buffered files in applications.
#[derive(Debug)]
pub struct Tracking<T> {
    inner: T,
    position: u64,
    ok: bool,
}

impl<T: Read + Seek> Tracking<T> {

    /// Wrap a standard reader. The stream is assumed to be at byte zero.
    pub fn new(inner: T) -> Self {
        Tracking { inner, position: 0, ok: true }
    }

    /// Unwrap the inner reader.
    pub fn into_inner(self) -> T { self.inner }
}

impl<T: Read + Seek> ByteSource for Tracking<T> {

    fn ok(&self) -> bool { self.ok }

    fn position(&mut self) -> u64 { self.position }

    fn seek(&mut self, position: u64) {
        match self.inner.seek(SeekFrom::Start(position)) {
            Ok(_) => self.position = position,
            Err(_) => self.ok = false,
        }
    }

    fn read_byte(&mut self) -> u8 {
        let mut byte = [0_u8; 1];
        self.read_bytes(&mut byte);
        byte[0]
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> bool {
        if self.ok {
            match self.inner.read_exact(buffer) {
                Ok(()) => {
                    self.position += buffer.len() as u64;
                    return true;
                }

                Err(_) => self.ok = false,
            }
        }

        for byte in buffer.iter_mut() { *byte = 0; }
        false
    }
}


/// A four-character wire code, kept as its literal bytes.
/// Match on the contained array to dispatch on codes: `&code.0`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FourCc(pub [u8; 4]);

impl std::fmt::Display for FourCc {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &byte in &self.0 {
            let character = if byte.is_ascii_graphic() || byte == b' ' { byte as char } else { '.' };
            write!(formatter, "{}", character)?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for FourCc {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "FourCc(\"{}\")", self)
    }
}


/// Typed big-endian reads over a [`ByteSource`].
///
/// The file variant is a parameter of the reader, not process-wide
/// state, because it decides the width of the variable length fields:
/// 16 or 32 bits for [`read_length16_or_32`](Reader::read_length16_or_32)
/// and 32 or 64 bits for [`read_length32_or_64`](Reader::read_length32_or_64).
///
/// All readers advance the position even over malformed data,
/// so that the caller can still resynchronize by seeking to a
/// previously computed end offset.
#[derive(Debug)]
pub struct Reader<S> {
    source: S,
    version: Version,
}

impl<S: ByteSource> Reader<S> {

    /// Wrap a byte source. The variant starts out
    /// classic until the file header says otherwise.
    pub fn new(source: S) -> Self {
        Reader { source, version: Version::Classic }
    }

    /// The file variant currently decoding.
    pub fn version(&self) -> Version { self.version }

    /// Switch the width of the variable length fields.
    pub fn set_version(&mut self, version: Version) { self.version = version; }

    /// Whether all reads so far have succeeded.
    pub fn ok(&self) -> bool { self.source.ok() }

    /// The current absolute byte position.
    pub fn position(&mut self) -> u64 { self.source.position() }

    /// Jump to an absolute byte position.
    pub fn seek(&mut self, position: u64) { self.source.seek(position); }

    /// Advance the position without interpreting the bytes.
    pub fn skip(&mut self, byte_count: u64) {
        let position = self.position();
        self.seek(position.saturating_add(byte_count));
    }

    /// The next byte, or zero if the stream has failed.
    #[inline]
    pub fn read_u8(&mut self) -> u8 { self.source.read_byte() }

    /// The next two bytes as a big-endian unsigned integer.
    #[inline]
    pub fn read_u16(&mut self) -> u16 {
        let mut bytes = [0_u8; 2];
        self.source.read_bytes(&mut bytes);
        u16::from_be_bytes(bytes)
    }

    /// The next four bytes as a big-endian unsigned integer.
    #[inline]
    pub fn read_u32(&mut self) -> u32 {
        let mut bytes = [0_u8; 4];
        self.source.read_bytes(&mut bytes);
        u32::from_be_bytes(bytes)
    }

    /// The next eight bytes as a big-endian unsigned integer.
    #[inline]
    pub fn read_u64(&mut self) -> u64 {
        let mut bytes = [0_u8; 8];
        self.source.read_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// The next two bytes as a big-endian signed integer.
    #[inline]
    pub fn read_i16(&mut self) -> i16 { self.read_u16() as i16 }

    /// The next four bytes as a big-endian signed integer.
    #[inline]
    pub fn read_i32(&mut self) -> i32 { self.read_u32() as i32 }

    /// The next eight bytes as a big-endian IEEE 754 binary64 value.
    #[inline]
    pub fn read_f64(&mut self) -> f64 { f64::from_bits(self.read_u64()) }

    /// The next four bytes as a literal character code.
    #[inline]
    pub fn read_four_cc(&mut self) -> FourCc {
        let mut bytes = [0_u8; 4];
        self.source.read_bytes(&mut bytes);
        FourCc(bytes)
    }

    /// A length field that is 16 bits wide in the classic
    /// variant and 32 bits wide in the big variant.
    pub fn read_length16_or_32(&mut self) -> u32 {
        match self.version {
            Version::Classic => u32::from(self.read_u16()),
            Version::Big => self.read_u32(),
        }
    }

    /// A length field that is 32 bits wide in the classic
    /// variant and 64 bits wide in the big variant.
    pub fn read_length32_or_64(&mut self) -> u64 {
        match self.version {
            Version::Classic => u64::from(self.read_u32()),
            Version::Big => self.read_u64(),
        }
    }

    /// Fill the buffer with the next bytes.
    /// On failure the buffer is zeroed and `false` is returned.
    pub fn read_bytes(&mut self, buffer: &mut [u8]) -> bool {
        self.source.read_bytes(buffer)
    }

    /// Read the requested number of bytes into a vector,
    /// growing it in bounded chunks so that a corrupt length
    /// cannot allocate gigabytes before the stream runs dry.
    /// The result is shorter than requested if the stream failed.
    pub fn read_vec(&mut self, byte_count: usize) -> Vec<u8> {
        const CHUNK: usize = 1 << 16;

        let mut data = Vec::new();
        while data.len() < byte_count && self.ok() {
            let chunk_start = data.len();
            let chunk_end = (chunk_start + CHUNK).min(byte_count);

            data.resize(chunk_end, 0);
            if !self.source.read_bytes(&mut data[chunk_start .. chunk_end]) {
                data.truncate(chunk_start);
            }
        }

        data
    }

    /// A length-prefixed byte string. Zero padding bytes follow the
    /// content so that the total on-disk byte count, including the
    /// length byte, is a multiple of the alignment.
    pub fn read_pascal_string(&mut self, alignment: u64) -> String {
        let alignment = alignment.max(1);
        let length = self.read_u8() as usize;
        let mut taken = 1 + length as u64;

        let mut bytes = vec![0_u8; length];
        self.read_bytes(&mut bytes);

        while taken % alignment != 0 {
            self.read_u8();
            taken += 1;
        }

        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// A wide-character string: a 32-bit code unit count followed by
    /// that many big-endian UCS-2 code units. One trailing NUL code
    /// unit, if present, is dropped.
    pub fn read_unicode_string(&mut self) -> String {
        let length = self.read_u32() as usize;

        let mut units = Vec::with_capacity(length.min(1 << 12));
        for _ in 0 .. length {
            if !self.ok() { break; }
            units.push(self.read_u16());
        }

        if units.last() == Some(&0) { units.pop(); }
        String::from_utf16_lossy(&units)
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn reader_over(bytes: Vec<u8>) -> Reader<Tracking<Cursor<Vec<u8>>>> {
        Reader::new(Tracking::new(Cursor::new(bytes)))
    }

    #[test]
    fn big_endian_reads() {
        let mut reader = reader_over(vec![
            0x12,
            0x12, 0x34,
            0x12, 0x34, 0x56, 0x78,
            0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0,
        ]);

        assert_eq!(reader.read_u8(), 0x12);
        assert_eq!(reader.read_u16(), 0x1234);
        assert_eq!(reader.read_u32(), 0x1234_5678);
        assert_eq!(reader.read_u64(), 0x1234_5678_9abc_def0);
        assert_eq!(reader.position(), 15);
    }

    #[test]
    fn failure_is_sticky_and_zeroing() {
        let mut reader = reader_over(vec![0xff, 0xff]);

        assert_eq!(reader.read_u16(), 0xffff);
        assert!(reader.ok());

        assert_eq!(reader.read_u32(), 0);
        assert!(!reader.ok());

        // a later seek into valid territory must not revive the stream
        reader.seek(0);
        assert!(!reader.ok());
        assert_eq!(reader.read_u8(), 0);
    }

    #[test]
    fn length_widths_follow_the_variant() {
        let bytes = vec![0x00, 0x03, 0x00, 0x00, 0x00, 0x03];

        let mut classic = reader_over(bytes.clone());
        assert_eq!(classic.read_length16_or_32(), 3);
        assert_eq!(classic.position(), 2);

        let mut big = reader_over(bytes);
        big.set_version(Version::Big);
        assert_eq!(big.read_length16_or_32(), 3);
        assert_eq!(big.position(), 4);
    }

    #[test]
    fn pascal_string_padding() {
        // length byte + three content bytes, padded
        // to a multiple of four with no padding needed
        let mut reader = reader_over(b"\x03abcrest".to_vec());
        assert_eq!(reader.read_pascal_string(4), "abc");
        assert_eq!(reader.position(), 4);

        // one content byte requires two bytes of padding
        let mut reader = reader_over(b"\x01a\0\0rest".to_vec());
        assert_eq!(reader.read_pascal_string(4), "a");
        assert_eq!(reader.position(), 4);

        // the empty string aligned to two advances two bytes in total
        let mut reader = reader_over(b"\0\0rest".to_vec());
        assert_eq!(reader.read_pascal_string(2), "");
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn unicode_string_drops_one_trailing_nul() {
        let mut reader = reader_over(vec![
            0, 0, 0, 3,
            0, b'h', 0, b'i', 0, 0,
        ]);

        assert_eq!(reader.read_unicode_string(), "hi");
        assert_eq!(reader.position(), 10);
    }

    #[test]
    fn four_cc_displays_its_bytes() {
        let mut reader = reader_over(b"8BIMrest".to_vec());
        let code = reader.read_four_cc();

        assert_eq!(code.0, *b"8BIM");
        assert_eq!(code.to_string(), "8BIM");
    }

    #[test]
    fn seeking_is_absolute() {
        let mut reader = reader_over((0 .. 16).collect());

        reader.seek(8);
        assert_eq!(reader.read_u8(), 8);

        reader.seek(2);
        assert_eq!(reader.read_u8(), 2);
        assert_eq!(reader.position(), 3);
    }
}
