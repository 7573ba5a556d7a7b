
//! The image resource section: a list of tagged blocks between the
//! color mode data and the layers. Most payloads pass through as raw
//! bytes; a handful of well-known resources decode into structure.

use crate::decode::Delegate;
use crate::error::{Error, Result};
use crate::io::{ByteSource, Reader};
use crate::layer::Bounds;
use crate::meta::descriptor::{Descriptor, Value};
use crate::meta::magic;


/// The slices resource.
const ID_SLICES: u16 = 1050;

/// The plug-in resource that carries the animation frame timings.
const ID_ANIMATION_FRAMES: u16 = 4003;


/// One tagged image resource: an id, a Pascal-string name, and either
/// a decoded descriptor or the raw payload bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageResource {

    /// The resource id.
    pub id: u16,

    /// The name, usually empty.
    pub name: String,

    /// The raw payload. Empty when the payload was decoded
    /// into `descriptor` or emitted through a dedicated event.
    pub data: Vec<u8>,

    /// The decoded payload of the resource ids known to carry
    /// a version-16 descriptor.
    pub descriptor: Option<Descriptor>,
}

impl ImageResource {

    /// Whether this resource id is known to carry a descriptor payload.
    pub fn has_descriptor(id: u16) -> bool {
        matches!(id, 1065 | 1074 | 1075 | 1076 | 1078 | 1080 | 1082 | 1083 | 1088 | 3000)
    }

    /// A short human-readable description of a resource id.
    pub fn describe(id: u16) -> &'static str {
        match id {
            1000 | 1003 | 0x03EF | 0x03EA | 0x03FC | 0x03FF | 0x0403 => "(Obsolete)",
            0x03E9 => "Macintosh print manager print info record",
            0x03ED => "ResolutionInfo structure",
            0x03EE => "Names of the alpha channels as a series of Pascal strings",
            0x03F0 => "The caption as a Pascal string",
            0x03F1 => "Border information",
            0x03F2 => "Background color",
            0x03F3 => "Print flags",
            0x03F4 => "Grayscale and multichannel halftoning information",
            0x03F5 => "Color halftoning information",
            0x03F6 => "Duotone halftoning information",
            0x03F7 => "Grayscale and multichannel transfer function",
            0x03F8 => "Color transfer functions",
            0x03F9 => "Duotone transfer functions",
            0x03FA => "Duotone image information",
            0x03FB => "Effective black and white values for the dot range",
            0x03FD => "EPS options",
            0x03FE => "Quick Mask information",
            0x0400 => "Layer state information",
            0x0401 => "Working path (not saved)",
            0x0402 => "Layers group information",
            0x0404 => "IPTC-NAA record",
            0x0405 => "Image mode for raw format files",
            0x0406 => "JPEG quality",
            0x0408 => "Grid and guides information",
            0x0409 => "Thumbnail resource (Photoshop 4.0)",
            0x040A => "Copyright flag",
            0x040B => "URL",
            0x040C => "Thumbnail resource",
            0x040D => "Global Angle",
            0x040E => "Color samplers resource",
            0x040F => "ICC Profile",
            0x0410 => "Watermark",
            0x0411 => "ICC Untagged Profile",
            0x0412 => "Effects visible",
            0x0413 => "Spot Halftone",
            0x0414 => "Document-specific IDs seed number",
            0x0415 => "Unicode Alpha Names",
            0x0416 => "Indexed Color Table Count",
            0x0417 => "Transparency Index",
            0x0419 => "Global Altitude",
            0x041A => "Slices",
            0x041B => "Workflow URL",
            0x041C => "Jump To XPEP",
            0x041D => "Alpha Identifiers",
            0x041E => "URL List",
            0x0421 => "Version Info",
            0x0422 => "EXIF data 1",
            0x0423 => "EXIF data 3",
            0x0424 => "XMP metadata",
            0x0425 => "Caption digest",
            0x0426 => "Print scale",
            0x0428 => "Pixel Aspect Ratio",
            0x0429 => "Layer Comps",
            0x042A => "Alternate Duotone Colors",
            0x042B => "Alternate Spot Colors",
            0x042D => "Layer Selection ID(s)",
            0x042E => "HDR Toning information",
            0x042F => "Print info",
            0x0430 => "Layer Group(s)",
            0x0431 => "Color samplers resource",
            0x0432 => "Measurement Scale",
            0x0433 => "Timeline Information",
            0x0434 => "Sheet Disclosure",
            0x0435 => "DisplayInfo structure to support floating point colors",
            0x0436 => "Onion Skins",
            0x0438 => "Count Information",
            0x043A => "Print Information",
            0x043B => "Print Style",
            0x043C => "Macintosh NSPrintInfo",
            0x043D => "Windows DEVMODE",
            0x043E => "Auto Save File Path",
            0x043F => "Auto Save Format",
            0x0440 => "Path Selection State",
            2999 => "Name of clipping path",
            3000 => "Origin Path Info",
            7000 => "Image Ready variables",
            7001 => "Image Ready data sets",
            7002 => "Image Ready default selected state",
            7003 => "Image Ready 7 rollover expanded state",
            7004 => "Image Ready rollover expanded state",
            7005 => "Image Ready save layer settings",
            7006 => "Image Ready version",
            8000 => "Lightroom workflow",
            10000 => "Print flags information",
            2000 ..= 2997 => "Path Information",
            4000 ..= 4999 => "Plug-In resource",
            _ => "",
        }
    }
}


/// Timing of one animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameInfo {

    /// The frame id.
    pub id: u32,

    /// How long the frame is shown, in milliseconds.
    pub duration: u32,

    /// The frame "ga" value.
    pub ga: f64,
}


/// One slice of the slices resource. Both on-disk encodings,
/// the positional version 6 one and the descriptor-based
/// version 7/8 one, normalize to this shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Slice {

    /// The slice id.
    pub id: u32,

    /// The id of the group this slice belongs to.
    pub group_id: u32,

    /// How the slice came to be.
    pub origin: u32,

    /// The id of the associated layer. Present exactly when `origin` is 1.
    pub associated_layer_id: Option<u32>,

    /// The slice name.
    pub name: String,

    /// The slice type code.
    pub kind: u32,

    /// Pixel bounds of the slice.
    pub bounds: Bounds,

    /// Hyperlink of the slice.
    pub url: String,

    /// Link target frame.
    pub target: String,

    /// Status bar message.
    pub message: String,

    /// Alternative tag text.
    pub alt_tag: String,

    /// Whether `cell_text` is HTML markup.
    pub cell_text_is_html: bool,

    /// Text shown inside the slice cell.
    pub cell_text: String,

    /// Horizontal alignment code.
    pub horizontal_alignment: u32,

    /// Vertical alignment code.
    pub vertical_alignment: u32,

    /// Background color as red, green, blue, alpha.
    pub color: [u8; 4],
}


/// The decoded slices resource: a named group of slices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Slices {

    /// Bounding rectangle over all slices.
    pub bounds: Bounds,

    /// The group name.
    pub name: String,

    /// The slices, in wire order.
    pub slices: Vec<Slice>,

    /// The trailing descriptor, if the encoding carried one.
    pub descriptor: Option<Descriptor>,
}


/// Walk the image resource section and emit one event per resource.
/// The budget is decremented by the bytes actually consumed, so that
/// blocks with surprising contents cannot desynchronize the walk.
pub(crate) fn read_list<S, D>(reader: &mut Reader<S>, delegate: &mut D) -> Result<Vec<ImageResource>>
    where S: ByteSource, D: Delegate
{
    let length = u64::from(reader.read_u32());
    let begin = reader.position();
    let end = begin.saturating_add(length);

    let mut resources = Vec::new();
    let mut remaining = length;

    while remaining > 0 {
        let block_begin = reader.position();
        if reader.read_four_cc().0 != magic::BLOCK { break; }

        let id = reader.read_u16();
        let name = reader.read_pascal_string(2);
        let payload_length = u64::from(reader.read_u32());
        let payload_begin = reader.position();

        let mut resource = ImageResource { id, name, .. Default::default() };

        if payload_length > 0 {
            if ImageResource::has_descriptor(id) {
                if reader.read_u32() == 16 {
                    resource.descriptor = Some(Descriptor::read(reader)?);
                }
                else {
                    // unknown descriptor version: keep the payload raw
                    reader.seek(payload_begin);
                    resource.data = reader.read_vec(payload_length as usize);
                }
            }
            else if id == ID_ANIMATION_FRAMES {
                // three undocumented words precede the tagged block
                reader.skip(12);

                if reader.read_four_cc().0 == magic::BLOCK && reader.read_four_cc().0 == *b"AnDs" {
                    resource.descriptor = read_animation_frames(reader, delegate)?;
                }
                else {
                    reader.seek(payload_begin);
                    resource.data = reader.read_vec(payload_length as usize);
                }
            }
            else if id == ID_SLICES {
                let slices = read_slices(reader, payload_begin.saturating_add(payload_length))?;
                delegate.on_slices(&slices);
            }
            else {
                log::trace!("resource {}: {}", id, ImageResource::describe(id));
                resource.data = reader.read_vec(payload_length as usize);
            }
        }

        reader.seek(payload_begin.saturating_add(payload_length));
        if payload_length % 2 == 1 { reader.read_u8(); } // pad to even

        delegate.on_resource(&resource);
        resources.push(resource);

        let consumed = reader.position().saturating_sub(block_begin);
        if consumed == 0 || !reader.ok() { break; }
        remaining = remaining.saturating_sub(consumed);
    }

    reader.seek(end);
    delegate.on_resources(&resources);
    Ok(resources)
}


/// Decode the animation timing kept in the `AnDs` block of resource 4003:
/// the active frame index from the frame state list, then id, duration
/// and ga per frame. Emits the frames event on success.
fn read_animation_frames<S, D>(reader: &mut Reader<S>, delegate: &mut D) -> Result<Option<Descriptor>>
    where S: ByteSource, D: Delegate
{
    reader.skip(4); // data length

    if reader.read_u32() != 16 { return Ok(None); }
    let descriptor = Descriptor::read(reader)?;

    let mut active_index = 0_u32;
    if let Some(states) = descriptor.get_list("FSts") {
        if let [Value::Descriptor(state)] = states {
            if let Some(index) = state.get_f64("AFrm") {
                active_index = index as u32;
            }
        }
    }

    let frame_list = match descriptor.get_list("FrIn") {
        Some(frames) => frames,
        None => return Ok(None),
    };

    let mut frames = Vec::with_capacity(frame_list.len());
    for value in frame_list {
        if let Value::Descriptor(frame) = value {
            frames.push(FrameInfo {
                id: frame.get_f64("FrID").unwrap_or(0.0) as u32,
                duration: frame.get_f64("FrDl").unwrap_or(0.0) as u32,
                ga: frame.get_f64("FrGA").unwrap_or(0.0),
            });
        }
    }

    delegate.on_frames(&frames, active_index);
    Ok(Some(descriptor))
}


/// Decode resource 1050. Version 6 is positional;
/// versions 7 and 8 wrap everything in a descriptor.
fn read_slices<S: ByteSource>(reader: &mut Reader<S>, end: u64) -> Result<Slices> {
    match reader.read_u32() {
        6 => read_slices_v6(reader, end),
        7 | 8 => read_slices_v7(reader),
        _ => Err(Error::unsupported("slices version")),
    }
}

fn read_slices_v6<S: ByteSource>(reader: &mut Reader<S>, end: u64) -> Result<Slices> {
    let bounds = Bounds {
        top: reader.read_i32(),
        left: reader.read_i32(),
        bottom: reader.read_i32(),
        right: reader.read_i32(),
    };

    let name = reader.read_unicode_string();
    let count = reader.read_u32();

    let mut slices = Vec::new();
    for _ in 0 .. count {
        if !reader.ok() { return Err(Error::end_of_stream()); }

        let id = reader.read_u32();
        let group_id = reader.read_u32();
        let origin = reader.read_u32();
        let associated_layer_id = if origin == 1 { Some(reader.read_u32()) } else { None };
        let name = reader.read_unicode_string();
        let kind = reader.read_u32();

        // unlike every other bounds field, version 6
        // stores slice bounds as left, top, right, bottom
        let left = reader.read_i32();
        let top = reader.read_i32();
        let right = reader.read_i32();
        let bottom = reader.read_i32();

        let url = reader.read_unicode_string();
        let target = reader.read_unicode_string();
        let message = reader.read_unicode_string();
        let alt_tag = reader.read_unicode_string();
        let cell_text_is_html = reader.read_u8() != 0;
        let cell_text = reader.read_unicode_string();
        let horizontal_alignment = reader.read_u32();
        let vertical_alignment = reader.read_u32();

        let alpha = reader.read_u8();
        let red = reader.read_u8();
        let green = reader.read_u8();
        let blue = reader.read_u8();

        slices.push(Slice {
            id, group_id, origin, associated_layer_id, name, kind,
            bounds: Bounds { top, left, bottom, right },
            url, target, message, alt_tag,
            cell_text_is_html, cell_text,
            horizontal_alignment, vertical_alignment,
            color: [red, green, blue, alpha],
        });
    }

    // some writers append a descriptor after the positional data
    let mut descriptor = None;
    if reader.position().saturating_add(4) <= end && reader.read_u32() == 16 {
        descriptor = Some(Descriptor::read(reader)?);
    }

    Ok(Slices { bounds, name, slices, descriptor })
}

fn read_slices_v7<S: ByteSource>(reader: &mut Reader<S>) -> Result<Slices> {
    if reader.read_u32() != 16 {
        return Err(Error::invalid("slices descriptor version"));
    }

    let descriptor = Descriptor::read(reader)?;

    let name = descriptor.get_string("baseName").unwrap_or_default().to_owned();
    let bounds = descriptor.get_descriptor("bounds").map(bounds_of).unwrap_or_default();

    let mut slices = Vec::new();
    if let Some(values) = descriptor.get_list("slices") {
        for value in values {
            if let Value::Descriptor(slice) = value {
                slices.push(slice_of(slice));
            }
        }
    }

    Ok(Slices { bounds, name, slices, descriptor: Some(descriptor) })
}

fn bounds_of(descriptor: &Descriptor) -> Bounds {
    Bounds {
        top: descriptor.get_f64("Top ").unwrap_or(0.0) as i32,
        left: descriptor.get_f64("Left").unwrap_or(0.0) as i32,
        bottom: descriptor.get_f64("Btom").unwrap_or(0.0) as i32,
        right: descriptor.get_f64("Rght").unwrap_or(0.0) as i32,
    }
}

fn slice_of(descriptor: &Descriptor) -> Slice {
    let origin = descriptor.get_f64("origin").unwrap_or(0.0) as u32;

    let associated_layer_id = if origin == 1 {
        descriptor.get_f64("layerID").map(|id| id as u32)
    } else {
        None
    };

    let color = descriptor.get_descriptor("bgColor").map(|color| [
        color.get_f64("Rd  ").unwrap_or(0.0) as u8,
        color.get_f64("Grn ").unwrap_or(0.0) as u8,
        color.get_f64("Bl  ").unwrap_or(0.0) as u8,
        color.get_f64("alpha").unwrap_or(0.0) as u8,
    ]).unwrap_or_default();

    Slice {
        id: descriptor.get_f64("sliceID").unwrap_or(0.0) as u32,
        group_id: descriptor.get_f64("groupID").unwrap_or(0.0) as u32,
        origin,
        associated_layer_id,
        name: descriptor.get_string("Nm  ").unwrap_or_default().to_owned(),
        kind: descriptor.get_f64("Type").unwrap_or(0.0) as u32,
        bounds: descriptor.get_descriptor("bounds").map(bounds_of).unwrap_or_default(),
        url: descriptor.get_string("url").unwrap_or_default().to_owned(),
        target: descriptor.get_string("null").unwrap_or_default().to_owned(),
        message: descriptor.get_string("Msge").unwrap_or_default().to_owned(),
        alt_tag: descriptor.get_string("altTag").unwrap_or_default().to_owned(),
        cell_text_is_html: descriptor.get_bool("cellTextIsHTML").unwrap_or(false),
        cell_text: descriptor.get_string("cellText").unwrap_or_default().to_owned(),
        horizontal_alignment: descriptor.get_f64("horzAlign").unwrap_or(0.0) as u32,
        vertical_alignment: descriptor.get_f64("vertAlign").unwrap_or(0.0) as u32,
        color,
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn descriptor_bearing_ids() {
        assert!(ImageResource::has_descriptor(1088)); // path selection state
        assert!(ImageResource::has_descriptor(1078)); // onion skins
        assert!(!ImageResource::has_descriptor(ID_SLICES));
        assert!(!ImageResource::has_descriptor(0x040F));
    }

    #[test]
    fn resource_descriptions() {
        assert_eq!(ImageResource::describe(0x041A), "Slices");
        assert_eq!(ImageResource::describe(2500), "Path Information");
        assert_eq!(ImageResource::describe(4003), "Plug-In resource");
        assert_eq!(ImageResource::describe(999), "");
    }
}
