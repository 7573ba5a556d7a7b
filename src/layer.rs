
//! The layers and mask section: layer records with their tag blocks,
//! per-channel pixel data, and the global mask info.

use bit_field::BitField;
use smallvec::SmallVec;

use crate::compression::{self, Compression, ImageBlock};
use crate::decode::Delegate;
use crate::error::{Error, Result, UnitResult};
use crate::io::{ByteSource, FourCc, Reader};
use crate::math::Vec2;
use crate::meta::descriptor::{Descriptor, Value};
use crate::meta::{magic, FileHeader, Version};


/// Role of one channel within a layer or the flattened image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {

    /// Color component 0.
    Red,

    /// Color component 1.
    Green,

    /// Color component 2.
    Blue,

    /// Color component 3, or the single channel of one-channel images.
    Alpha,

    /// The transparency mask (id -1).
    TransparencyMask,

    /// A user-supplied layer mask (id -2).
    UserSuppliedMask,

    /// A real user-supplied layer mask (id -3).
    RealUserSuppliedMask,

    /// A channel outside the documented set, for example
    /// a spot color plate.
    Other(i16),
}

impl ChannelId {

    /// Interpret a signed channel id from a layer record.
    pub fn from_code(code: i16) -> Self {
        match code {
            0 => ChannelId::Red,
            1 => ChannelId::Green,
            2 => ChannelId::Blue,
            3 => ChannelId::Alpha,
            -1 => ChannelId::TransparencyMask,
            -2 => ChannelId::UserSuppliedMask,
            -3 => ChannelId::RealUserSuppliedMask,
            other => ChannelId::Other(other),
        }
    }
}


/// Meta data of one channel of a layer:
/// its role and the byte count of its data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {

    /// The role of this channel.
    pub id: ChannelId,

    /// Length of the channel data block, including its compression code.
    pub byte_count: u64,
}


/// Signed pixel bounds in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub struct Bounds {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
}

impl Bounds {

    /// Horizontal pixel count, zero for degenerate bounds.
    pub fn width(&self) -> usize {
        (i64::from(self.right) - i64::from(self.left)).max(0) as usize
    }

    /// Vertical pixel count, zero for degenerate bounds.
    pub fn height(&self) -> usize {
        (i64::from(self.bottom) - i64::from(self.top)).max(0) as usize
    }

    fn read<S: ByteSource>(reader: &mut Reader<S>) -> Self {
        Bounds {
            top: reader.read_i32(),
            left: reader.read_i32(),
            bottom: reader.read_i32(),
            right: reader.read_i32(),
        }
    }
}


/// Grouping role of a layer, from its section divider tag block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {

    /// Any other type of layer.
    Other,

    /// An expanded group.
    OpenFolder,

    /// A collapsed group.
    CloseFolder,

    /// The hidden divider that closes a group.
    BoundingSection,
}

impl SectionKind {
    fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(SectionKind::Other),
            1 => Ok(SectionKind::OpenFolder),
            2 => Ok(SectionKind::CloseFolder),
            3 => Ok(SectionKind::BoundingSection),
            _ => Err(Error::invalid("section divider kind")),
        }
    }
}


/// The named blend modes a layer can use.
/// The wire stores a four-character code; codes outside this set stay
/// available as the raw code on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BlendMode {
    PassThrough,
    Normal,
    Dissolve,
    Darken,
    Multiply,
    ColorBurn,
    LinearBurn,
    DarkerColor,
    Lighten,
    Screen,
    ColorDodge,
    LinearDodge,
    LighterColor,
    Overlay,
    SoftLight,
    HardLight,
    VividLight,
    LinearLight,
    PinLight,
    HardMix,
    Difference,
    Exclusion,
    Subtract,
    Divide,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {

    /// Look up the named mode of a wire code.
    pub fn from_code(code: FourCc) -> Option<Self> {
        match &code.0 {
            b"pass" => Some(BlendMode::PassThrough),
            b"norm" => Some(BlendMode::Normal),
            b"diss" => Some(BlendMode::Dissolve),
            b"dark" => Some(BlendMode::Darken),
            b"mul " => Some(BlendMode::Multiply),
            b"idiv" => Some(BlendMode::ColorBurn),
            b"lbrn" => Some(BlendMode::LinearBurn),
            b"dkCl" => Some(BlendMode::DarkerColor),
            b"lite" => Some(BlendMode::Lighten),
            b"scrn" => Some(BlendMode::Screen),
            b"div " => Some(BlendMode::ColorDodge),
            b"lddg" => Some(BlendMode::LinearDodge),
            b"lgCl" => Some(BlendMode::LighterColor),
            b"over" => Some(BlendMode::Overlay),
            b"sLit" => Some(BlendMode::SoftLight),
            b"hLit" => Some(BlendMode::HardLight),
            b"vLit" => Some(BlendMode::VividLight),
            b"lLit" => Some(BlendMode::LinearLight),
            b"pLit" => Some(BlendMode::PinLight),
            b"hMix" => Some(BlendMode::HardMix),
            b"diff" => Some(BlendMode::Difference),
            b"smud" => Some(BlendMode::Exclusion),
            b"fsub" => Some(BlendMode::Subtract),
            b"fdiv" => Some(BlendMode::Divide),
            b"hue " => Some(BlendMode::Hue),
            b"sat " => Some(BlendMode::Saturation),
            b"colr" => Some(BlendMode::Color),
            b"lum " => Some(BlendMode::Luminosity),
            _ => None,
        }
    }
}


/// Visibility of a layer in one animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameVisibility {

    /// The frame id.
    pub frame_id: u32,

    /// Whether the layer is shown in that frame.
    pub visible: bool,
}


/// One layer of the document.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRecord {

    /// Pixel bounds of the layer on the canvas.
    pub bounds: Bounds,

    /// The channels of this layer, in record order.
    pub channels: SmallVec<[Channel; 5]>,

    /// The blend mode wire code. See [`LayerRecord::blend_mode`].
    pub blend_code: FourCc,

    /// Opacity, 0 transparent to 255 opaque.
    pub opacity: u8,

    /// Clipping: 0 base, 1 non-base.
    pub clipping: u8,

    /// The raw flag byte. See [`LayerRecord::is_visible`]
    /// and [`LayerRecord::is_transparency_protected`].
    pub flags: u8,

    /// The layer name. The unicode name from the `luni`
    /// tag block takes precedence over the Pascal name.
    pub name: String,

    /// The layer id from the `lyid` tag block.
    pub layer_id: u32,

    /// Grouping role from the `lsct` tag block.
    pub section: SectionKind,

    /// Per-frame visibility from the timeline metadata,
    /// in tag block order.
    pub in_frames: Vec<FrameVisibility>,
}

impl Default for LayerRecord {
    fn default() -> Self {
        LayerRecord {
            bounds: Bounds::default(),
            channels: SmallVec::new(),
            blend_code: FourCc(*b"norm"),
            opacity: 255,
            clipping: 0,
            flags: 0,
            name: String::new(),
            layer_id: 0,
            section: SectionKind::Other,
            in_frames: Vec::new(),
        }
    }
}

impl LayerRecord {

    /// Whether the layer is shown. Note the inversion:
    /// bit 1 of the flag byte marks a *hidden* layer.
    pub fn is_visible(&self) -> bool {
        !self.flags.get_bit(1)
    }

    /// Whether the transparency of the layer is locked.
    pub fn is_transparency_protected(&self) -> bool {
        self.flags.get_bit(0)
    }

    /// The named blend mode, if the wire code is a known one.
    pub fn blend_mode(&self) -> Option<BlendMode> {
        BlendMode::from_code(self.blend_code)
    }

    /// Horizontal pixel count.
    pub fn width(&self) -> usize { self.bounds.width() }

    /// Vertical pixel count.
    pub fn height(&self) -> usize { self.bounds.height() }
}


/// Kind of the global mask overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskKind {

    /// Color selected, that is, inverted (0).
    Inverted,

    /// Color protected (1).
    ColorProtected,

    /// Use the stored value per pixel (128).
    ExactPixelValue,
}

impl MaskKind {
    fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(MaskKind::Inverted),
            1 => Ok(MaskKind::ColorProtected),
            128 => Ok(MaskKind::ExactPixelValue),
            _ => Err(Error::invalid("global mask kind")),
        }
    }
}


/// The global mask info block at the end of the layer data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalMaskInfo {

    /// Overlay color, four components of 16 bits.
    pub overlay_color: [u16; 4],

    /// Opacity, 0 transparent to 100 opaque.
    pub opacity: u16,

    /// How the mask colors apply.
    pub kind: MaskKind,
}


/// Everything decoded from the layers and mask section.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Layers {

    /// The layer records, bottom-most first, including the
    /// records of nested `Lr16`/`Lr32`/`Layr` sections.
    pub list: Vec<LayerRecord>,

    /// The global mask info, if the section carried one.
    pub mask_info: Option<GlobalMaskInfo>,

    /// Whether the first alpha channel of the flattened image holds
    /// the transparency of the merged result. Signalled by a negative
    /// layer count on the wire.
    pub has_merged_alpha: bool,
}


/// Tag block keys whose length field is 64 bits wide in the big variant.
const BIG_LENGTH_KEYS: [[u8; 4]; 13] = [
    *b"LMsk", *b"Lr16", *b"Lr32", *b"Layr", *b"Mt16", *b"Mt32", *b"Mtrn",
    *b"Alph", *b"FMsk", *b"lnk2", *b"FEid", *b"FXid", *b"PxSD",
];


/// Read the whole layers and mask section: the layer info subsection,
/// the global mask info, and any trailing tag blocks. Leaves the
/// stream at the declared end of the section.
pub(crate) fn read_layers_and_mask<S, D>(
    reader: &mut Reader<S>,
    delegate: &mut D,
    header: &FileHeader,
) -> Result<Layers>
    where S: ByteSource, D: Delegate
{
    let length = reader.read_length32_or_64();
    let begin = reader.position();
    let end = begin.saturating_add(length);

    let mut layers = Layers::default();

    if length > 0 {
        let info_length = reader.read_length32_or_64();
        read_info_section(reader, delegate, header, info_length, &mut layers)?;

        if reader.position().saturating_add(4) <= end {
            read_global_mask_info(reader, &mut layers)?;
        }

        // whatever follows the global mask info is a plain
        // sequence of tag blocks, attached to no layer
        let mut orphan = LayerRecord::default();
        while end.saturating_sub(reader.position()) > 4 {
            if read_tag_block(reader, delegate, header, &mut orphan)? == 0 { break; }
        }
    }

    delegate.on_layers_and_mask(&layers);
    reader.seek(end);
    Ok(layers)
}


/// Read one layer info subsection: the signed layer count, the layer
/// records, then the channel data of every layer in record order.
/// Recursively entered again for `Lr16`/`Lr32`/`Layr` tag blocks.
fn read_info_section<S, D>(
    reader: &mut Reader<S>,
    delegate: &mut D,
    header: &FileHeader,
    length: u64,
    layers: &mut Layers,
) -> UnitResult
    where S: ByteSource, D: Delegate
{
    if length == 0 { return Ok(()); }

    let begin = reader.position();
    let end = begin.saturating_add(length);

    let raw_count = i32::from(reader.read_i16());
    if raw_count < 0 {
        // the first alpha channel of the flattened image
        // is the transparency mask of the merged result
        layers.has_merged_alpha = true;
    }

    let count = raw_count.abs() as usize;
    let first = layers.list.len();

    for _ in 0 .. count {
        if !reader.ok() { return Err(Error::end_of_stream()); }
        let record = read_record(reader, delegate, header)?;
        layers.list.push(record);
    }

    for index in first .. layers.list.len() {
        delegate.on_begin_layer(&layers.list[index]);

        for channel_index in 0 .. layers.list[index].channels.len() {
            let channel = layers.list[index].channels[channel_index];
            let block_begin = reader.position();
            let block_end = block_begin.saturating_add(channel.byte_count);

            let compression = Compression::from_code(reader.read_u16())?;
            let block = ImageBlock {
                compression,
                size: Vec2(layers.list[index].width(), layers.list[index].height()),
                depth: header.depth,
                channels: smallvec![channel.id],
            };

            compression::read_image(reader, delegate, &block)?;
            reader.seek(block_end);
        }

        delegate.on_end_layer(&layers.list[index]);
    }

    delegate.on_layers_info(layers);
    reader.seek(end);
    Ok(())
}


/// Read one layer record: bounds, channel table, blend data, then the
/// extras block with mask data, blending ranges, the Pascal name, and
/// the trailing tag blocks.
fn read_record<S, D>(
    reader: &mut Reader<S>,
    delegate: &mut D,
    header: &FileHeader,
) -> Result<LayerRecord>
    where S: ByteSource, D: Delegate
{
    let bounds = Bounds::read(reader);

    let channel_count = reader.read_u16();
    let mut channels = SmallVec::with_capacity(channel_count as usize);
    for _ in 0 .. channel_count {
        let id = ChannelId::from_code(reader.read_i16());
        let byte_count = reader.read_length32_or_64();
        channels.push(Channel { id, byte_count });
    }

    if reader.read_four_cc().0 != magic::BLOCK {
        return Err(Error::invalid("blend mode signature"));
    }

    let blend_code = reader.read_four_cc();
    let opacity = reader.read_u8();
    let clipping = reader.read_u8();
    let flags = reader.read_u8();
    reader.read_u8(); // filler

    let extras_length = u64::from(reader.read_u32());
    let extras_end = reader.position().saturating_add(extras_length);

    let mask_length = u64::from(reader.read_u32());
    reader.skip(mask_length);

    let ranges_length = u64::from(reader.read_u32());
    reader.skip(ranges_length);

    let name = reader.read_pascal_string(4);

    let mut record = LayerRecord {
        bounds, channels, blend_code, opacity, clipping, flags, name,
        .. Default::default()
    };

    while reader.position() < extras_end {
        if read_tag_block(reader, delegate, header, &mut record)? == 0 { break; }
    }

    reader.seek(extras_end);
    Ok(record)
}


/// Read one tag block. Returns the bytes consumed, or zero when the
/// signature does not match, which means the caller has overshot the
/// last block. Odd payload lengths are padded to even on the way out.
fn read_tag_block<S, D>(
    reader: &mut Reader<S>,
    delegate: &mut D,
    header: &FileHeader,
    record: &mut LayerRecord,
) -> Result<u64>
    where S: ByteSource, D: Delegate
{
    let block_begin = reader.position();

    let signature = reader.read_four_cc();
    if signature.0 != magic::BLOCK && signature.0 != magic::BLOCK_BIG {
        return Ok(0);
    }

    let key = reader.read_four_cc();

    let length = if header.version == Version::Big && BIG_LENGTH_KEYS.contains(&key.0) {
        reader.read_u64()
    } else {
        u64::from(reader.read_u32())
    };

    let payload_begin = reader.position();

    match &key.0 {
        b"lsct" => read_section_divider(reader, record, length)?,

        b"cinf" => {
            if reader.read_u32() != 16 {
                return Err(Error::invalid("compositor info descriptor version"));
            }

            let descriptor = Descriptor::read(reader)?;
            log::trace!("compositor info with {} entries", descriptor.len());
        }

        b"luni" => {
            let name = reader.read_unicode_string();
            if !name.is_empty() { record.name = name; }
        }

        b"lyid" => record.layer_id = reader.read_u32(),

        b"SoLE" => {
            let kind = reader.read_four_cc();
            let version = reader.read_u32();

            if kind.0 == *b"SoLd" && (version == 4 || version == 5) {
                let descriptor = Descriptor::read(reader)?;
                log::trace!("linked layer \"{}\" with {} entries", descriptor.name, descriptor.len());
            }
        }

        b"Lr16" | b"Lr32" | b"Layr" => {
            read_info_section(reader, delegate, header, length, &mut Layers::default())?;
        }

        b"anFX" => {
            if reader.read_u32() == 16 {
                let descriptor = Descriptor::read(reader)?;
                log::trace!("layer effects with {} entries", descriptor.len());
            }
        }

        b"shmd" => read_metadata_blocks(reader, record)?,

        _ => log::trace!("skipping tag block {}", key),
    }

    let padded = length.saturating_add(length % 2);
    reader.seek(payload_begin.saturating_add(padded));
    Ok(reader.position().saturating_sub(block_begin))
}


/// The section divider tag block assigns the layer its grouping role.
fn read_section_divider<S: ByteSource>(
    reader: &mut Reader<S>,
    record: &mut LayerRecord,
    length: u64,
) -> UnitResult {
    record.section = SectionKind::from_code(reader.read_u32())?;
    if length < 12 { return Ok(()); }

    if reader.read_four_cc().0 != magic::BLOCK {
        return Err(Error::invalid("section divider signature"));
    }

    let blend_code = reader.read_four_cc();
    log::trace!("section divider blends as {}", blend_code);
    if length < 16 { return Ok(()); }

    // 0 = normal, 1 = scene group, affects the animation timeline
    let sub_kind = reader.read_u32();
    if sub_kind > 1 {
        return Err(Error::invalid("section divider sub kind"));
    }

    Ok(())
}


/// The `shmd` tag block is a list of inner metadata entries,
/// each with its own signature, key and length.
fn read_metadata_blocks<S: ByteSource>(
    reader: &mut Reader<S>,
    record: &mut LayerRecord,
) -> UnitResult {
    let count = reader.read_u32();

    for _ in 0 .. count {
        if !reader.ok() { return Err(Error::end_of_stream()); }

        if reader.read_four_cc().0 != magic::BLOCK {
            return Err(Error::invalid("metadata entry signature"));
        }

        let key = reader.read_four_cc();
        reader.skip(4); // undocumented copy of the key, or padding

        let length = u64::from(reader.read_u32());
        let payload_begin = reader.position();

        match &key.0 {
            b"mlst" => read_frame_visibility(reader, record)?,
            b"cust" => read_custom_metadata(reader)?,
            b"tmln" => read_timeline_metadata(reader)?,
            _ => log::trace!("skipping metadata entry {}", key),
        }

        reader.seek(payload_begin.saturating_add(length));
    }

    Ok(())
}


/// The `mlst` metadata entry lists in which animation frames the
/// enclosing layer is visible. The visibility flag of a state carries
/// over to the following states until one overrides it.
fn read_frame_visibility<S: ByteSource>(
    reader: &mut Reader<S>,
    record: &mut LayerRecord,
) -> UnitResult {
    reader.skip(4); // descriptor version, accepted as-is

    let descriptor = Descriptor::read(reader)?;

    let layer_id = match descriptor.get_f64("LaID") {
        Some(id) => id as u32,
        None => return Ok(()),
    };

    // entries listed for a different layer id do not apply
    if layer_id != record.layer_id { return Ok(()); }

    let states = match descriptor.get_list("LaSt") {
        Some(states) => states,
        None => return Ok(()),
    };

    let mut visible = true;
    for state in states {
        let state = match state {
            Value::Descriptor(descriptor) => descriptor,
            _ => continue,
        };

        if let Some(enabled) = state.get_bool("enab") {
            visible = enabled;
        }

        if let Some(frames) = state.get_list("FrLs") {
            for frame in frames {
                if let Some(frame_id) = frame.as_number() {
                    record.in_frames.push(FrameVisibility {
                        frame_id: frame_id as u32,
                        visible,
                    });
                }
            }
        }
    }

    Ok(())
}


/// The `cust` metadata entry carries the layer time.
/// Decoded to keep the stream in lockstep, but only traced.
fn read_custom_metadata<S: ByteSource>(reader: &mut Reader<S>) -> UnitResult {
    if reader.read_u32() != 16 { return Ok(()); }

    let descriptor = Descriptor::read(reader)?;
    let layer_time = descriptor.get_f64("layerTime").unwrap_or(0.0);
    log::trace!("layer time {}", layer_time);

    Ok(())
}


/// The `tmln` metadata entry carries the timeline scope of the layer.
/// Decoded to keep the stream in lockstep, but only traced.
fn read_timeline_metadata<S: ByteSource>(reader: &mut Reader<S>) -> UnitResult {
    if reader.read_u32() != 16 { return Ok(()); }

    let descriptor = Descriptor::read(reader)?;

    if let Some(scope) = descriptor.get_descriptor("timeScope") {
        for (key, value) in scope.entries() {
            if let Value::Descriptor(range) = value {
                let numerator = range.get_f64("numerator").unwrap_or(0.0);
                let denominator = range.get_f64("denominator").unwrap_or(0.0);
                log::trace!("time scope {}: {} / {}", key.name, numerator, denominator);
            }
        }
    }

    Ok(())
}


/// The global mask info block: overlay color, opacity and kind.
/// Trailing bytes of the block are consumed without interpretation.
fn read_global_mask_info<S: ByteSource>(
    reader: &mut Reader<S>,
    layers: &mut Layers,
) -> UnitResult {
    let length = u64::from(reader.read_u32());
    let payload_begin = reader.position();
    if length == 0 { return Ok(()); }

    reader.read_u16(); // overlay color space

    let mut overlay_color = [0_u16; 4];
    for component in overlay_color.iter_mut() {
        *component = reader.read_u16();
    }

    let opacity = reader.read_u16();
    if opacity > 100 {
        return Err(Error::invalid("global mask opacity"));
    }

    let kind = MaskKind::from_code(reader.read_u8())?;

    layers.mask_info = Some(GlobalMaskInfo { overlay_color, opacity, kind });
    reader.seek(payload_begin.saturating_add(length));
    Ok(())
}
