//! Reference tables of an AMF3 stream.

use std::fmt;
use std::rc::Rc;

use bytestring::ByteString;

use crate::{Amf3Error, Amf3Trait, Amf3Value};

/// The reference tables of an AMF3 stream.
///
/// Defined by:
/// - AMF 3 spec, 2.2 Reference Tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Strings read by value.
    Strings,
    /// Complex values read by value.
    Objects,
    /// Object traits read by value.
    Traits,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strings => f.write_str("string"),
            Self::Objects => f.write_str("object"),
            Self::Traits => f.write_str("trait"),
        }
    }
}

/// Append-only tables that references in the stream index into.
///
/// Entries are never replaced, so an index stays valid for the whole decode.
#[derive(Debug, Default)]
pub(crate) struct ReferenceTables {
    strings: Vec<ByteString>,
    objects: Vec<Amf3Value>,
    traits: Vec<Rc<Amf3Trait>>,
}

fn lookup<T: Clone>(table: &[T], kind: TableKind, index: u32) -> Result<T, Amf3Error> {
    table
        .get(index as usize)
        .cloned()
        .ok_or(Amf3Error::InvalidReference { table: kind, index })
}

impl ReferenceTables {
    pub(crate) fn push_string(&mut self, value: ByteString) {
        debug_assert!(!value.is_empty(), "empty strings are never sent by reference");
        self.strings.push(value);
    }

    pub(crate) fn string(&self, index: u32) -> Result<ByteString, Amf3Error> {
        lookup(&self.strings, TableKind::Strings, index)
    }

    pub(crate) fn push_object(&mut self, value: Amf3Value) {
        self.objects.push(value);
    }

    pub(crate) fn object(&self, index: u32) -> Result<Amf3Value, Amf3Error> {
        lookup(&self.objects, TableKind::Objects, index)
    }

    pub(crate) fn push_trait(&mut self, value: Rc<Amf3Trait>) {
        self.traits.push(value);
    }

    pub(crate) fn trait_(&self, index: u32) -> Result<Rc<Amf3Trait>, Amf3Error> {
        lookup(&self.traits, TableKind::Traits, index)
    }

    pub(crate) fn len(&self, kind: TableKind) -> usize {
        match kind {
            TableKind::Strings => self.strings.len(),
            TableKind::Objects => self.objects.len(),
            TableKind::Traits => self.traits.len(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::rc::Rc;

    use super::{ReferenceTables, TableKind};
    use crate::{Amf3Error, Amf3Trait, Amf3Value};

    #[test]
    fn lookups() {
        let mut tables = ReferenceTables::default();
        tables.push_string("a".into());
        tables.push_object(Amf3Value::Date(1.0));
        tables.push_trait(Rc::new(Amf3Trait::anonymous()));

        assert_eq!(tables.string(0).unwrap(), "a");
        assert_eq!(tables.object(0).unwrap(), Amf3Value::Date(1.0));
        assert!(tables.trait_(0).unwrap().dynamic);
        assert_eq!(tables.len(TableKind::Strings), 1);
    }

    #[test]
    fn out_of_range() {
        let mut tables = ReferenceTables::default();
        tables.push_string("a".into());

        assert!(matches!(
            tables.string(1),
            Err(Amf3Error::InvalidReference {
                table: TableKind::Strings,
                index: 1
            })
        ));
        assert!(matches!(
            tables.object(0),
            Err(Amf3Error::InvalidReference {
                table: TableKind::Objects,
                index: 0
            })
        ));
        assert!(matches!(
            tables.trait_(5),
            Err(Amf3Error::InvalidReference {
                table: TableKind::Traits,
                index: 5
            })
        ));
    }
}
