//! AMF3 decoder

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use bytestring::ByteString;
use num_traits::FromPrimitive;

use crate::externalizable::{Externalizable, ExternalizableFactory};
use crate::tables::{ReferenceTables, TableKind};
use crate::value::{Amf3Array, Amf3Dictionary, Amf3GenericVector, Amf3Object, Amf3Trait, Amf3Vector};
use crate::{Amf3Error, Amf3Marker, Amf3Value, ByteReader};

/// Upper bound on elements reserved ahead of time for a count read from the input.
const MAX_PREALLOCATION: usize = 1024;

/// Deepest nesting of values accepted before decoding fails.
const MAX_DEPTH: usize = 256;

fn preallocation(count: u32) -> usize {
    (count as usize).min(MAX_PREALLOCATION)
}

/// AMF3 decoder.
///
/// Decodes AMF3 values from a byte source. The reference tables live as long as
/// the decoder, so values decoded one after another may reference each other.
///
/// Values nested deeper than 256 levels are rejected with
/// [`Amf3Error::UnexpectedFormat`].
///
/// After any error the decoder is in an unspecified state and should be dropped.
pub struct Amf3Decoder<'a> {
    reader: ByteReader<'a>,
    tables: ReferenceTables,
    factories: Vec<Box<dyn ExternalizableFactory + 'a>>,
    depth: usize,
}

impl std::fmt::Debug for Amf3Decoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Amf3Decoder")
            .field("reader", &self.reader)
            .field("tables", &self.tables)
            .field("factories", &self.factories.len())
            .finish()
    }
}

impl<'a> Amf3Decoder<'a> {
    /// Create a new decoder from a byte source.
    pub fn new(reader: impl io::Read + 'a) -> Self {
        Self {
            reader: ByteReader::new(reader),
            tables: ReferenceTables::default(),
            factories: Vec::new(),
            depth: 0,
        }
    }

    /// Register an [`ExternalizableFactory`] and return the decoder.
    ///
    /// Factories are consulted in the order they were registered.
    pub fn with_externalizable_factory(mut self, factory: impl ExternalizableFactory + 'a) -> Self {
        self.add_externalizable_factory(factory);
        self
    }

    /// Register an [`ExternalizableFactory`].
    ///
    /// Factories are consulted in the order they were registered.
    pub fn add_externalizable_factory(&mut self, factory: impl ExternalizableFactory + 'a) {
        self.factories.push(Box::new(factory));
    }

    /// The registered factories, in the order they are consulted.
    pub fn externalizable_factories(&self) -> &[Box<dyn ExternalizableFactory + 'a>] {
        &self.factories
    }

    /// Unregister the factory at `index` of [`externalizable_factories`](Self::externalizable_factories).
    ///
    /// Returns `None` if there is no factory at `index`.
    pub fn remove_externalizable_factory(&mut self, index: usize) -> Option<Box<dyn ExternalizableFactory + 'a>> {
        (index < self.factories.len()).then(|| self.factories.remove(index))
    }

    /// The underlying byte reader.
    pub fn reader(&mut self) -> &mut ByteReader<'a> {
        &mut self.reader
    }

    /// The number of entries read into the given reference table so far.
    pub fn reference_count(&self, table: TableKind) -> usize {
        self.tables.len(table)
    }

    /// Check if there are remaining bytes to read.
    pub fn has_remaining(&mut self) -> Result<bool, Amf3Error> {
        Ok(!self.reader.peek_eof()?)
    }

    /// Decode all values from the input until the end.
    pub fn decode_all(&mut self) -> Result<Vec<Amf3Value>, Amf3Error> {
        let mut values = Vec::new();

        while self.has_remaining()? {
            values.push(self.decode_value()?);
        }

        Ok(values)
    }

    /// Decode a [`Amf3Value`] from the input.
    pub fn decode_value(&mut self) -> Result<Amf3Value, Amf3Error> {
        if self.depth >= MAX_DEPTH {
            return Err(Amf3Error::unexpected_format("nesting too deep"));
        }

        self.depth += 1;
        let result = self.decode_marked();
        self.depth -= 1;

        result
    }

    fn decode_marked(&mut self) -> Result<Amf3Value, Amf3Error> {
        let marker = self.reader.read_u8()?;
        let marker = Amf3Marker::from_u8(marker).ok_or(Amf3Error::UnknownMarker(marker))?;

        match marker {
            Amf3Marker::Undefined => Ok(Amf3Value::Undefined),
            Amf3Marker::Null => Ok(Amf3Value::Null),
            Amf3Marker::False => Ok(Amf3Value::Boolean(false)),
            Amf3Marker::True => Ok(Amf3Value::Boolean(true)),
            Amf3Marker::Integer => self.reader.read_s29().map(Amf3Value::Integer),
            Amf3Marker::Double => self.reader.read_f64_be().map(Amf3Value::Double),
            Amf3Marker::String => self.decode_string().map(Amf3Value::String),
            Amf3Marker::XmlDocument => self.decode_xml(true),
            Amf3Marker::Date => self.decode_date(),
            Amf3Marker::Array => self.decode_array(),
            Amf3Marker::Object => self.decode_object(),
            Amf3Marker::Xml => self.decode_xml(false),
            Amf3Marker::ByteArray => self.decode_byte_array(),
            Amf3Marker::VectorInt => self.decode_typed_vector(ByteReader::read_i32_be, Amf3Value::VectorInt),
            Amf3Marker::VectorUInt => self.decode_typed_vector(ByteReader::read_u32_be, Amf3Value::VectorUInt),
            Amf3Marker::VectorDouble => self.decode_typed_vector(ByteReader::read_f64_be, Amf3Value::VectorDouble),
            Amf3Marker::VectorGeneric => self.decode_generic_vector(),
            Amf3Marker::Dictionary => self.decode_dictionary(),
        }
    }

    /// Decode a string without a marker.
    ///
    /// This is how object keys, trait names and SOL entry names are encoded.
    /// The empty string is never added to the string table.
    pub fn decode_string(&mut self) -> Result<ByteString, Amf3Error> {
        let header = self.reader.read_header()?;

        if header.is_reference() {
            return self.tables.string(header.payload());
        }

        if header.payload() == 0 {
            return Ok(ByteString::new());
        }

        let string = self.read_utf8(header.payload())?;
        self.tables.push_string(string.clone());
        Ok(string)
    }

    fn read_utf8(&mut self, len: u32) -> Result<ByteString, Amf3Error> {
        let bytes = self.reader.read_exact(len as usize)?;
        Ok(ByteString::try_from(bytes)?)
    }

    fn decode_xml(&mut self, document: bool) -> Result<Amf3Value, Amf3Error> {
        let header = self.reader.read_header()?;

        if header.is_reference() {
            return self.tables.object(header.payload());
        }

        let xml = self.read_utf8(header.payload())?;
        let value = if document {
            Amf3Value::XmlDocument(xml)
        } else {
            Amf3Value::Xml(xml)
        };

        self.tables.push_object(value.clone());
        Ok(value)
    }

    fn decode_date(&mut self) -> Result<Amf3Value, Amf3Error> {
        let header = self.reader.read_header()?;

        if header.is_reference() {
            return self.tables.object(header.payload());
        }

        let value = Amf3Value::Date(self.reader.read_f64_be()?);
        self.tables.push_object(value.clone());
        Ok(value)
    }

    fn decode_byte_array(&mut self) -> Result<Amf3Value, Amf3Error> {
        let header = self.reader.read_header()?;

        if header.is_reference() {
            return self.tables.object(header.payload());
        }

        let value = Amf3Value::ByteArray(self.reader.read_exact(header.payload() as usize)?);
        self.tables.push_object(value.clone());
        Ok(value)
    }

    /// Decode `(key, value)` pairs until the empty key.
    fn decode_properties(&mut self, mut insert: impl FnMut(ByteString, Amf3Value)) -> Result<(), Amf3Error> {
        loop {
            let key = self.decode_string()?;

            if key.is_empty() {
                return Ok(());
            }

            let value = self.decode_value()?;
            insert(key, value);
        }
    }

    fn decode_array(&mut self) -> Result<Amf3Value, Amf3Error> {
        let header = self.reader.read_header()?;

        if header.is_reference() {
            return self.tables.object(header.payload());
        }

        let count = header.payload();
        let array = Rc::new(RefCell::new(Amf3Array::new()));
        self.tables.push_object(Amf3Value::Array(array.clone()));

        self.decode_properties(|key, value| {
            array.borrow_mut().associative.insert(key, value);
        })?;

        array.borrow_mut().dense.reserve(preallocation(count));
        for _ in 0..count {
            let value = self.decode_value()?;
            array.borrow_mut().dense.push(value);
        }

        Ok(Amf3Value::Array(array))
    }

    fn decode_object(&mut self) -> Result<Amf3Value, Amf3Error> {
        let mut header = self.reader.read_header()?;

        if header.is_reference() {
            return self.tables.object(header.payload());
        }

        let class = if header.next_flag() {
            let externalizable = header.next_flag();
            let dynamic = header.next_flag();
            let count = header.payload();

            let name = self.decode_string()?;
            let mut sealed = Vec::with_capacity(preallocation(count));
            for _ in 0..count {
                sealed.push(self.decode_string()?);
            }

            let class = Rc::new(Amf3Trait {
                name,
                dynamic,
                externalizable,
                sealed,
            });
            self.tables.push_trait(class.clone());
            class
        } else {
            self.tables.trait_(header.payload())?
        };

        let object = Rc::new(RefCell::new(Amf3Object::new(class.clone())));
        self.tables.push_object(Amf3Value::Object(object.clone()));

        for key in &class.sealed {
            let value = self.decode_value()?;
            object.borrow_mut().sealed.insert(key.clone(), value);
        }

        if class.dynamic {
            self.decode_properties(|key, value| {
                object.borrow_mut().dynamic.insert(key, value);
            })?;
        }

        if class.externalizable {
            let external = self.decode_externalizable(&class.name)?;
            object.borrow_mut().external = Some(external);
        }

        Ok(Amf3Value::Object(object))
    }

    fn decode_externalizable(&mut self, trait_name: &str) -> Result<Box<dyn Externalizable>, Amf3Error> {
        let mut external = self
            .factories
            .iter()
            .find_map(|factory| factory.create(trait_name))
            .ok_or_else(|| Amf3Error::UnsupportedExternalizable(trait_name.to_owned()))?;

        tracing::trace!(trait_name, position = self.reader.position(), "reading externalizable payload");

        external
            .read_external(&mut self.reader)
            .map_err(|err| Amf3Error::ExternalizableReadFailed {
                trait_name: trait_name.to_owned(),
                source: Box::new(err),
            })?;

        Ok(external)
    }

    fn decode_typed_vector<T>(
        &mut self,
        read: impl Fn(&mut ByteReader<'a>) -> Result<T, Amf3Error>,
        wrap: impl FnOnce(Rc<Amf3Vector<T>>) -> Amf3Value,
    ) -> Result<Amf3Value, Amf3Error> {
        let header = self.reader.read_header()?;

        if header.is_reference() {
            return self.tables.object(header.payload());
        }

        let count = header.payload();
        let fixed_length = self.reader.read_bool()?;

        let mut items = Vec::with_capacity(preallocation(count));
        for _ in 0..count {
            items.push(read(&mut self.reader)?);
        }

        // Typed vectors hold no nested values, so nothing can be tabled between
        // the header and this point.
        let value = wrap(Rc::new(Amf3Vector {
            fixed_length,
            capacity: count,
            items,
        }));
        self.tables.push_object(value.clone());
        Ok(value)
    }

    fn decode_generic_vector(&mut self) -> Result<Amf3Value, Amf3Error> {
        let header = self.reader.read_header()?;

        if header.is_reference() {
            return self.tables.object(header.payload());
        }

        let count = header.payload();
        let fixed_length = self.reader.read_bool()?;
        let element_type = self.decode_string()?;

        let vector = Rc::new(RefCell::new(Amf3GenericVector {
            element_type,
            fixed_length,
            capacity: count,
            items: Vec::with_capacity(preallocation(count)),
        }));
        self.tables.push_object(Amf3Value::VectorGeneric(vector.clone()));

        for _ in 0..count {
            let value = self.decode_value()?;
            vector.borrow_mut().items.push(value);
        }

        Ok(Amf3Value::VectorGeneric(vector))
    }

    fn decode_dictionary(&mut self) -> Result<Amf3Value, Amf3Error> {
        let header = self.reader.read_header()?;

        if header.is_reference() {
            return self.tables.object(header.payload());
        }

        let count = header.payload();
        let weak_keys = self.reader.read_bool()?;

        let dictionary = Rc::new(RefCell::new(Amf3Dictionary {
            weak_keys,
            entries: Vec::with_capacity(preallocation(count)),
        }));
        self.tables.push_object(Amf3Value::Dictionary(dictionary.clone()));

        for _ in 0..count {
            let key = self.decode_value()?;
            let value = self.decode_value()?;
            dictionary.borrow_mut().entries.push((key, value));
        }

        Ok(Amf3Value::Dictionary(dictionary))
    }
}
