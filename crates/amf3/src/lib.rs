//! A pure-rust implementation of an AMF3 decoder and Local Shared Object (SOL) reader.
//!
//! This crate decodes AMF3 data into a tree of [`Amf3Value`]s. Values that the
//! encoder transmits by reference are shared in the decoded tree, so object
//! graphs (including cyclic ones) keep their identity.
//!
//! Local Shared Objects (`.sol` files) wrap a name and a sequence of named AMF3
//! values, see [`SolReader`] and [`SolFile`].
//!
//! # Limitations
//!
//! - Only decoding is supported.
//! - Externalizable objects need a registered [`ExternalizableFactory`] that
//!   knows their payload format.
//! - Decoded values use [`std::rc::Rc`], so they can not be sent across threads.
//!
//! # Examples
//!
//! ```rust
//! # fn test() -> Result<(), Box<dyn std::error::Error>> {
//! use scuffle_amf3::{Amf3Decoder, Amf3Value};
//! # let bytes: &[u8] = &[0x06, 0x0b, b'H', b'e', b'l', b'l', b'o', 0x06, 0x00];
//!
//! // Create a new decoder
//! let mut decoder = Amf3Decoder::new(bytes);
//!
//! // The second string is a reference to the first one
//! let values = decoder.decode_all()?;
//! assert_eq!(values, [Amf3Value::from("Hello"), Amf3Value::from("Hello")]);
//! # Ok(())
//! # }
//! # test().expect("test failed");
//! ```
//!
//! ## Specifications
//!
//! | Name | Version | Comments |
//! | --- | --- | --- |
//! | Action Message Format -- AMF 3 | January 2013 | Refered to as 'AMF 3 spec' in this documentation |
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or [Apache-2.0](./LICENSE.Apache-2.0) license.
//! You can choose between one of them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![cfg_attr(feature = "docs", doc = "## Feature flags")]
#![cfg_attr(feature = "docs", doc = document_features::document_features!())]
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

pub mod decoder;
pub mod error;
pub mod externalizable;
pub mod io;
pub mod sol;
mod tables;
pub mod u29;
pub mod value;

pub use decoder::Amf3Decoder;
pub use error::{Amf3Error, Result};
pub use externalizable::{Externalizable, ExternalizableFactory};
pub use io::ByteReader;
pub use sol::{SolEntry, SolFile, SolHeader, SolReader, SolState};
pub use tables::TableKind;
pub use value::{
    Amf3Array, Amf3Dictionary, Amf3GenericVector, Amf3Object, Amf3Properties, Amf3Trait, Amf3Value, Amf3Vector,
};

/// AMF3 marker types.
///
/// Defined by:
/// - AMF 3 spec, 3.1.
#[derive(Debug, PartialEq, Eq, Clone, Copy, num_derive::FromPrimitive)]
#[repr(u8)]
pub enum Amf3Marker {
    /// undefined-marker
    Undefined = 0x00,
    /// null-marker
    Null = 0x01,
    /// false-marker
    False = 0x02,
    /// true-marker
    True = 0x03,
    /// integer-marker
    Integer = 0x04,
    /// double-marker
    Double = 0x05,
    /// string-marker
    String = 0x06,
    /// xml-doc-marker
    XmlDocument = 0x07,
    /// date-marker
    Date = 0x08,
    /// array-marker
    Array = 0x09,
    /// object-marker
    Object = 0x0a,
    /// xml-marker
    Xml = 0x0b,
    /// byte-array-marker
    ByteArray = 0x0c,
    /// vector-int-marker
    VectorInt = 0x0d,
    /// vector-uint-marker
    VectorUInt = 0x0e,
    /// vector-double-marker
    VectorDouble = 0x0f,
    /// vector-object-marker
    VectorGeneric = 0x10,
    /// dictionary-marker
    Dictionary = 0x11,
}

/// Decode a single [`Amf3Value`] from a reader.
pub fn from_reader(reader: impl std::io::Read) -> Result<Amf3Value> {
    Amf3Decoder::new(reader).decode_value()
}

/// Decode a single [`Amf3Value`] from a byte slice.
pub fn from_slice(bytes: &[u8]) -> Result<Amf3Value> {
    from_reader(bytes)
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use num_traits::FromPrimitive;

    use super::{Amf3Error, Amf3Marker, Amf3Value, from_reader, from_slice};

    #[test]
    fn markers() {
        assert_eq!(Amf3Marker::from_u8(0x00), Some(Amf3Marker::Undefined));
        assert_eq!(Amf3Marker::from_u8(0x0a), Some(Amf3Marker::Object));
        assert_eq!(Amf3Marker::from_u8(0x11), Some(Amf3Marker::Dictionary));
        assert_eq!(Amf3Marker::from_u8(0x12), None);
    }

    #[test]
    fn single_values() {
        assert_eq!(from_slice(&[0x04, 0x00]).unwrap(), Amf3Value::Integer(0));
        assert_eq!(from_slice(&[0x04, 0x7f]).unwrap(), Amf3Value::Integer(127));
        assert_eq!(from_slice(&[0x04, 0x81, 0x00]).unwrap(), Amf3Value::Integer(128));
        assert_eq!(
            from_slice(&[0x05, 0x40, 0x09, 0x21, 0xfb, 0x54, 0x44, 0x2d, 0x18]).unwrap(),
            Amf3Value::Double(std::f64::consts::PI)
        );
        assert_eq!(
            from_reader(&[0x06, 0x0b, b'H', b'e', b'l', b'l', b'o'][..]).unwrap(),
            Amf3Value::from("Hello")
        );

        let array = from_slice(&[0x09, 0x01, 0x01]).unwrap();
        assert!(array.as_array().unwrap().borrow().is_empty());
    }

    #[test]
    fn errors() {
        assert!(matches!(from_slice(&[]), Err(Amf3Error::UnexpectedEof)));
        assert!(matches!(from_slice(&[0x04, 0x81]), Err(Amf3Error::MalformedInteger)));
        assert!(matches!(from_slice(&[0xff]), Err(Amf3Error::UnknownMarker(0xff))));
    }
}
