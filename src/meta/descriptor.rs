
//! The self-describing, tagged, recursive value grammar embedded in
//! image resources and layer tag blocks.
//!
//! Values form a tree: descriptors map keys to values, lists hold
//! ordered values, references hold ordered reference items, and the
//! leaves are numbers, strings, enums, classes and opaque blobs.
//! Every node is exclusively owned by its parent; there are no cycles.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::io::{ByteSource, Reader};


/// The raw bytes that make up a short name in the grammar.
/// Each `u8` is a single char.
// will mostly be four-character codes like "FrID" or "enab"
pub type TextBytes = SmallVec<[u8; 24]>;


/// A byte string with each byte being a char.
/// This is not UTF and must be compared byte-wise; four-character
/// codes survive as their literal four bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Default)] // hash implemented manually
pub struct Text {
    bytes: TextBytes,
}

impl Text {

    /// Create a `Text` from a slice of bytes.
    pub fn from_slice(text: &[u8]) -> Self {
        Text { bytes: SmallVec::from_slice(text) }
    }

    /// Create a `Text` from the specified bytes object.
    pub fn from_bytes(bytes: TextBytes) -> Self {
        Text { bytes }
    }

    /// The bytes this text is made of.
    pub fn as_slice(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// Iterate over the individual chars in this text, similar to `String::chars()`.
    /// Does not do any heap allocation but borrows from this instance instead.
    pub fn chars(&self) -> impl '_ + Iterator<Item = char> {
        self.bytes.iter().map(|&byte| byte as char)
    }

    /// Compare this text with a plain `&str`.
    pub fn eq(&self, string: &str) -> bool {
        string.chars().eq(self.chars())
    }
}

impl PartialEq<str> for Text {
    fn eq(&self, other: &str) -> bool {
        self.eq(other)
    }
}

impl PartialEq<Text> for str {
    fn eq(&self, other: &Text) -> bool {
        other.eq(self)
    }
}

impl Borrow<[u8]> for Text {
    fn borrow(&self) -> &[u8] {
        self.as_slice()
    }
}

// forwarding implementation. guarantees `text.borrow().hash() == text.hash()` (required for Borrow)
impl Hash for Text {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state)
    }
}

impl<'s> From<&'s str> for Text {
    fn from(string: &'s str) -> Self {
        Text::from_slice(string.as_bytes())
    }
}

impl std::fmt::Debug for Text {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "psd::Text(\"{}\")", self)
    }
}

// automatically implements to_string for us
impl std::fmt::Display for Text {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use std::fmt::Write;
        for character in self.chars() {
            formatter.write_char(character)?;
        }

        Ok(())
    }
}


/// A small header used throughout the grammar: either an explicit
/// length-prefixed name, or, when the length prefix is zero, a
/// four-character code kept as its literal four bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassMeta {

    /// The name or four-character code.
    pub name: Text,
}

impl ClassMeta {

    /// Read the length prefix and then the name or code.
    pub fn read<S: ByteSource>(reader: &mut Reader<S>) -> Result<Self> {
        let length = reader.read_u32();

        let name = if length == 0 {
            Text::from_slice(&reader.read_four_cc().0)
        }
        else {
            Text::from_bytes(SmallVec::from_vec(reader.read_vec(length as usize)))
        };

        Ok(ClassMeta { name })
    }
}


/// Unit of a unit float value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Unit {
    Angle,
    Density,
    Distance,
    None,
    Percent,
    Pixel,
}

impl Unit {
    fn from_code(code: [u8; 4]) -> Result<Self> {
        match &code {
            b"#Ang" => Ok(Unit::Angle),
            b"#Rsl" => Ok(Unit::Density),
            b"#Rlt" => Ok(Unit::Distance),
            b"#Nne" => Ok(Unit::None),
            b"#Prc" => Ok(Unit::Percent),
            b"#Pxl" => Ok(Unit::Pixel),
            _ => Err(Error::invalid("unit float unit")),
        }
    }
}


/// A class name paired with its meta, used by class values and references.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassType {

    /// The wide-character class name.
    pub name: String,

    /// The class id.
    pub meta: ClassMeta,
}

impl ClassType {
    fn read<S: ByteSource>(reader: &mut Reader<S>) -> Result<Self> {
        let name = reader.read_unicode_string();
        let meta = ClassMeta::read(reader)?;
        Ok(ClassType { name, meta })
    }
}


/// One item of a reference value.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {

    /// A property of a class.
    Property {

        /// The wide-character property name.
        name: String,

        /// The class the property belongs to.
        class: ClassMeta,

        /// The key of the property.
        key: ClassMeta,
    },

    /// A plain class reference.
    Class(ClassType),

    /// An enumerated reference.
    Enumerated {

        /// The wide-character name.
        name: String,

        /// The class the enum belongs to.
        class: ClassMeta,

        /// The enum type.
        type_id: ClassMeta,

        /// The enum value.
        value: ClassMeta,
    },

    /// An offset into a class.
    Offset {

        /// The wide-character name.
        name: String,

        /// The class the offset points into.
        class: ClassMeta,

        /// The offset value.
        value: u32,
    },
}

impl Reference {
    fn read<S: ByteSource>(reader: &mut Reader<S>) -> Result<Self> {
        let tag = reader.read_four_cc();

        match &tag.0 {
            b"prop" => Ok(Reference::Property {
                name: reader.read_unicode_string(),
                class: ClassMeta::read(reader)?,
                key: ClassMeta::read(reader)?,
            }),

            b"Clss" => Ok(Reference::Class(ClassType::read(reader)?)),

            b"Enmr" => Ok(Reference::Enumerated {
                name: reader.read_unicode_string(),
                class: ClassMeta::read(reader)?,
                type_id: ClassMeta::read(reader)?,
                value: ClassMeta::read(reader)?,
            }),

            b"rele" => Ok(Reference::Offset {
                name: reader.read_unicode_string(),
                class: ClassMeta::read(reader)?,
                value: reader.read_u32(),
            }),

            // these items carry no documented payload,
            // so decoding past them is impossible
            b"Idnt" | b"indx" | b"name" => Err(Error::invalid("reference item payload")),

            _ => Err(Error::invalid("reference item tag")),
        }
    }
}


/// Discriminant of a [`Value`], used for tag-typed lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Kind {
    Reference,
    Descriptor,
    List,
    Double,
    UnitFloat,
    String,
    Enumerated,
    Long,
    LargeInteger,
    Boolean,
    Class,
    Alias,
}


/// One value of the grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {

    /// An ordered list of reference items.
    Reference(Vec<Reference>),

    /// A nested keyed record. Also covers the global object wire tag.
    Descriptor(Descriptor),

    /// An ordered list of values.
    List(Vec<Value>),

    /// An IEEE 754 binary64 number.
    Double(f64),

    /// A binary64 number with a unit.
    UnitFloat {

        /// The unit of the value.
        unit: Unit,

        /// The value itself.
        value: f64,
    },

    /// A wide-character string.
    String(String),

    /// An enum value, as a type id and a value within that type.
    Enumerated {

        /// The enum type.
        type_id: ClassMeta,

        /// The value within the type.
        value: ClassMeta,
    },

    /// A 32-bit unsigned integer.
    Long(u32),

    /// A 64-bit unsigned integer.
    LargeInteger(u64),

    /// A single-byte truth value.
    Boolean(bool),

    /// A class. Also covers the global class wire tag.
    Class(ClassType),

    /// An opaque length-prefixed blob.
    Alias(Vec<u8>),
}

impl Value {

    /// The discriminant of this value.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Reference(_) => Kind::Reference,
            Value::Descriptor(_) => Kind::Descriptor,
            Value::List(_) => Kind::List,
            Value::Double(_) => Kind::Double,
            Value::UnitFloat { .. } => Kind::UnitFloat,
            Value::String(_) => Kind::String,
            Value::Enumerated { .. } => Kind::Enumerated,
            Value::Long(_) => Kind::Long,
            Value::LargeInteger(_) => Kind::LargeInteger,
            Value::Boolean(_) => Kind::Boolean,
            Value::Class(_) => Kind::Class,
            Value::Alias(_) => Kind::Alias,
        }
    }

    /// Numeric projection shared by `Long`, `LargeInteger` and `Double`.
    /// Used where a field of unknown numeric kind is expected.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Long(value) => Some(f64::from(*value)),
            Value::LargeInteger(value) => Some(*value as f64),
            Value::Double(value) => Some(*value),
            _ => None,
        }
    }

    /// Read one tagged value. The tag decides how the payload is framed;
    /// an unknown tag makes the rest of the block undecodable and fails.
    pub fn read<S: ByteSource>(reader: &mut Reader<S>) -> Result<Self> {
        let tag = reader.read_four_cc();

        match &tag.0 {
            b"Objc" | b"GlbO" => Ok(Value::Descriptor(Descriptor::read(reader)?)),

            b"obj " => {
                let count = reader.read_u32();
                let mut items = Vec::new();

                for _ in 0 .. count {
                    if !reader.ok() { return Err(Error::end_of_stream()); }
                    items.push(Reference::read(reader)?);
                }

                Ok(Value::Reference(items))
            }

            b"VlLs" => {
                let count = reader.read_u32();
                let mut values = Vec::new();

                for _ in 0 .. count {
                    if !reader.ok() { return Err(Error::end_of_stream()); }
                    values.push(Value::read(reader)?);
                }

                Ok(Value::List(values))
            }

            b"doub" => Ok(Value::Double(reader.read_f64())),

            b"UntF" => {
                let unit = Unit::from_code(reader.read_four_cc().0)?;
                Ok(Value::UnitFloat { unit, value: reader.read_f64() })
            }

            b"TEXT" => Ok(Value::String(reader.read_unicode_string())),

            b"enum" => Ok(Value::Enumerated {
                type_id: ClassMeta::read(reader)?,
                value: ClassMeta::read(reader)?,
            }),

            b"long" => Ok(Value::Long(reader.read_u32())),
            b"comp" => Ok(Value::LargeInteger(reader.read_u64())),
            b"bool" => Ok(Value::Boolean(reader.read_u8() != 0)),

            b"type" | b"GlbC" => Ok(Value::Class(ClassType::read(reader)?)),

            b"alis" => {
                let length = reader.read_u32();
                Ok(Value::Alias(reader.read_vec(length as usize)))
            }

            b"tdta" => Err(Error::unsupported("raw data descriptor value")),

            _ => Err(Error::invalid("descriptor value tag")),
        }
    }
}


/// A keyed record of the grammar: a wide-character name, a class meta,
/// and an ordered mapping from key to value.
///
/// Iterating [`entries`](Descriptor::entries) yields the mapping in wire
/// order, duplicates included. Keyed lookup is logarithmic and, when the
/// same key appears twice, returns the later value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Descriptor {

    /// The wide-character name of this record.
    pub name: String,

    /// The class of this record.
    pub class: ClassMeta,

    entries: Vec<(ClassMeta, Value)>,
    index: BTreeMap<Text, usize>,
}

impl Descriptor {

    /// Read a descriptor body: name, class meta, entry count, entries.
    /// The version prefix, where the format writes one, belongs to the
    /// caller, because only some embeddings carry it.
    pub fn read<S: ByteSource>(reader: &mut Reader<S>) -> Result<Self> {
        let name = reader.read_unicode_string();
        let class = ClassMeta::read(reader)?;
        let count = reader.read_u32();

        let mut descriptor = Descriptor { name, class, .. Default::default() };

        for _ in 0 .. count {
            if !reader.ok() { return Err(Error::end_of_stream()); }

            let key = ClassMeta::read(reader)?;
            let value = Value::read(reader)?;
            descriptor.insert(key, value);
        }

        Ok(descriptor)
    }

    fn insert(&mut self, key: ClassMeta, value: Value) {
        self.index.insert(key.name.clone(), self.entries.len());
        self.entries.push((key, value));
    }

    /// Number of entries, duplicates included.
    pub fn len(&self) -> usize { self.entries.len() }

    /// Whether the mapping has no entries.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// The entries in wire order.
    pub fn entries(&self) -> &[(ClassMeta, Value)] { &self.entries }

    /// The value stored under the key, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let index = *self.index.get(key.as_bytes())?;
        Some(&self.entries[index].1)
    }

    /// The value stored under the key, if any, and only
    /// if its discriminant matches the requested one.
    pub fn get_kind(&self, key: &str, kind: Kind) -> Option<&Value> {
        self.get(key).filter(|value| value.kind() == kind)
    }

    /// The numeric projection of the value stored under the key.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_number()
    }

    /// The truth value stored under the key, if it is a boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// The list stored under the key, if it is a list.
    pub fn get_list(&self, key: &str) -> Option<&[Value]> {
        match self.get(key)? {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    /// The nested descriptor stored under the key, if it is a descriptor.
    pub fn get_descriptor(&self, key: &str) -> Option<&Descriptor> {
        match self.get(key)? {
            Value::Descriptor(descriptor) => Some(descriptor),
            _ => None,
        }
    }

    /// The string stored under the key, if it is a string.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            Value::String(string) => Some(string),
            _ => None,
        }
    }
}
