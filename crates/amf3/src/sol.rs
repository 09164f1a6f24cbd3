//! Local Shared Object (`.sol`) files.
//!
//! A SOL file is a small envelope around a name and a sequence of named AMF3
//! values:
//!
//! | Size | Field |
//! | --- | --- |
//! | 2 | `00 BF` |
//! | 4 | size of the rest of the file, big-endian |
//! | 4 | `TCSO` |
//! | 6 | reserved |
//! | 2 | name length, big-endian |
//! | n | name |
//! | 4 | AMF version, big-endian, `3` for AMF3 |
//!
//! Each entry that follows is a string key, a value and a single trailer byte.
//!
//! ```rust,no_run
//! # fn test() -> Result<(), Box<dyn std::error::Error>> {
//! use scuffle_amf3::SolFile;
//!
//! let file = SolFile::open("settings.sol")?;
//! println!("{}: {:?}", file.name(), file.get("volume"));
//! # Ok(())
//! # }
//! ```

use std::io;
use std::iter::FusedIterator;
use std::path::Path;

use bytestring::ByteString;

use crate::externalizable::ExternalizableFactory;
use crate::value::Amf3Properties;
use crate::{Amf3Decoder, Amf3Error, Amf3Value, ByteReader};

const ENDIANNESS: [u8; 2] = [0x00, 0xbf];
const FILE_TAG: &[u8; 4] = b"TCSO";
const RESERVED_LEN: usize = 6;
const MIN_VERSION: i32 = 3;

/// The envelope of a SOL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolHeader {
    /// The size the file claims for everything after this field.
    ///
    /// It is not verified, some writers get it wrong.
    pub declared_size: u32,
    /// The name of the shared object.
    pub name: ByteString,
    /// The AMF version of the body.
    pub version: i32,
}

impl SolHeader {
    /// Read the envelope from the start of a SOL file.
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self, Amf3Error> {
        let endianness = [reader.read_u8()?, reader.read_u8()?];
        if endianness != ENDIANNESS {
            return Err(Amf3Error::unexpected_format("unknown endianness"));
        }

        let declared_size = reader.read_u32_be()?;

        if &reader.read_exact(FILE_TAG.len())?[..] != FILE_TAG {
            return Err(Amf3Error::unexpected_format("wrong file tag"));
        }

        reader.skip(RESERVED_LEN)?;

        let name_len = reader.read_u16_be()?;
        let name = ByteString::try_from(reader.read_exact(name_len as usize)?)?;

        let version = reader.read_i32_be()?;
        if version < MIN_VERSION {
            return Err(Amf3Error::unexpected_format(format!("unsupported version: {version}")));
        }

        Ok(Self {
            declared_size,
            name,
            version,
        })
    }
}

/// A named value of a SOL file.
#[derive(Debug, Clone, PartialEq)]
pub struct SolEntry {
    /// The name of the value.
    pub key: ByteString,
    /// The value.
    pub value: Amf3Value,
}

/// The progress of a [`SolReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolState {
    /// Nothing has been read yet.
    NotStarted,
    /// The envelope has been read, no entry yet.
    HeaderRead,
    /// The given number of entries has been read.
    Entries(usize),
    /// The reader was closed, either explicitly or after an error.
    Closed,
}

/// Reads the entries of a SOL file one by one.
///
/// The envelope is read lazily by the first call that needs it. All entries
/// share one [`Amf3Decoder`], so values may reference values of earlier
/// entries.
///
/// Any error closes the reader. Iterating yields the error once and then ends.
#[derive(Debug)]
pub struct SolReader<'a> {
    decoder: Amf3Decoder<'a>,
    header: Option<SolHeader>,
    state: SolState,
}

impl<'a> SolReader<'a> {
    /// Create a new reader from the bytes of a SOL file.
    pub fn new(reader: impl io::Read + 'a) -> Self {
        Self {
            decoder: Amf3Decoder::new(reader),
            header: None,
            state: SolState::NotStarted,
        }
    }

    /// Register an [`ExternalizableFactory`] and return the reader.
    pub fn with_externalizable_factory(mut self, factory: impl ExternalizableFactory + 'a) -> Self {
        self.decoder.add_externalizable_factory(factory);
        self
    }

    /// Register an [`ExternalizableFactory`].
    pub fn add_externalizable_factory(&mut self, factory: impl ExternalizableFactory + 'a) {
        self.decoder.add_externalizable_factory(factory);
    }

    /// The registered factories, in the order they are consulted.
    pub fn externalizable_factories(&self) -> &[Box<dyn ExternalizableFactory + 'a>] {
        self.decoder.externalizable_factories()
    }

    /// Unregister the factory at `index` of [`externalizable_factories`](Self::externalizable_factories).
    pub fn remove_externalizable_factory(&mut self, index: usize) -> Option<Box<dyn ExternalizableFactory + 'a>> {
        self.decoder.remove_externalizable_factory(index)
    }

    /// The progress of the reader.
    pub fn state(&self) -> SolState {
        self.state
    }

    /// The envelope of the file.
    pub fn header(&mut self) -> Result<&SolHeader, Amf3Error> {
        self.read_header()?;
        self.header.as_ref().ok_or(Amf3Error::Closed)
    }

    /// The name of the shared object.
    pub fn name(&mut self) -> Result<&str, Amf3Error> {
        Ok(&self.header()?.name)
    }

    /// Whether another entry follows.
    ///
    /// This only checks for the end of the input, a truncated entry is
    /// reported by [`next_entry`](Self::next_entry).
    pub fn has_next(&mut self) -> Result<bool, Amf3Error> {
        self.read_header()?;
        self.close_on_error(|reader| reader.decoder.has_remaining())
    }

    /// Read the next entry, or `None` at the end of the file.
    pub fn next_entry(&mut self) -> Result<Option<SolEntry>, Amf3Error> {
        self.read_header()?;
        self.close_on_error(Self::read_entry)
    }

    /// Read and discard the next entry.
    ///
    /// Returns whether there was an entry to skip. Values of the skipped entry
    /// can still be referenced by later entries.
    pub fn skip_next(&mut self) -> Result<bool, Amf3Error> {
        Ok(self.next_entry()?.is_some())
    }

    /// Release the underlying byte source.
    pub fn close(&mut self) {
        self.decoder.reader().close();
        self.state = SolState::Closed;
    }

    /// Read the remaining entries into a [`SolFile`].
    pub fn into_file(mut self) -> Result<SolFile, Amf3Error> {
        let header = self.header()?.clone();
        let mut entries = Amf3Properties::new();

        while let Some(entry) = self.next_entry()? {
            entries.insert(entry.key, entry.value);
        }

        Ok(SolFile { header, entries })
    }

    fn close_on_error<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, Amf3Error>) -> Result<T, Amf3Error> {
        let result = f(self);

        if result.is_err() {
            self.close();
        }

        result
    }

    fn read_header(&mut self) -> Result<(), Amf3Error> {
        match self.state {
            SolState::Closed => Err(Amf3Error::Closed),
            SolState::NotStarted => self.close_on_error(|reader| {
                let header = SolHeader::read(reader.decoder.reader())?;
                tracing::debug!(
                    name = %header.name,
                    version = header.version,
                    declared_size = header.declared_size,
                    "read sol header"
                );

                reader.header = Some(header);
                reader.state = SolState::HeaderRead;
                Ok(())
            }),
            SolState::HeaderRead | SolState::Entries(_) => Ok(()),
        }
    }

    fn read_entry(&mut self) -> Result<Option<SolEntry>, Amf3Error> {
        if !self.decoder.has_remaining()? {
            return Ok(None);
        }

        let key = self.decoder.decode_string()?;
        tracing::trace!(key = %key, "reading sol entry");

        let value = self.decoder.decode_value()?;

        // The last entry of some files lacks its trailer.
        if self.decoder.has_remaining()? {
            let trailer = self.decoder.reader().read_u8()?;
            if trailer != 0 {
                tracing::warn!(key = %key, trailer, "non-zero trailer after sol entry");
            }
        }

        self.state = match self.state {
            SolState::Entries(n) => SolState::Entries(n + 1),
            _ => SolState::Entries(1),
        };

        Ok(Some(SolEntry { key, value }))
    }
}

impl Iterator for SolReader<'_> {
    type Item = Result<SolEntry, Amf3Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == SolState::Closed {
            return None;
        }

        self.next_entry().transpose()
    }
}

impl FusedIterator for SolReader<'_> {}

/// A fully read SOL file.
#[derive(Debug, Clone, PartialEq)]
pub struct SolFile {
    /// The envelope.
    pub header: SolHeader,
    /// The entries by key, in file order.
    ///
    /// A key that appears more than once keeps its first position and its last value.
    pub entries: Amf3Properties,
}

impl SolFile {
    /// Read a SOL file without any [`ExternalizableFactory`].
    ///
    /// Use [`SolReader::into_file`] to register factories first.
    pub fn read(reader: impl io::Read) -> Result<Self, Amf3Error> {
        SolReader::new(reader).into_file()
    }

    /// Open and read the SOL file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Amf3Error> {
        let file = std::fs::File::open(path)?;
        Self::read(file)
    }

    /// The name of the shared object.
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Look up an entry by key.
    pub fn get(&self, key: &str) -> Option<&Amf3Value> {
        self.entries.get(key)
    }
}
