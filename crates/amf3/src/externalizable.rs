//! Custom payloads of externalizable objects.
//!
//! An object whose trait is marked externalizable is followed by a payload in a
//! format only the class itself knows. The decoder asks every registered
//! [`ExternalizableFactory`], in registration order, for a handler for the
//! trait name. The first handler returned reads the payload from the
//! [`ByteReader`] and is stored in [`Amf3Object::external`](crate::Amf3Object::external).
//!
//! ```rust
//! # fn test() -> Result<(), Box<dyn std::error::Error>> {
//! use std::any::Any;
//!
//! use scuffle_amf3::{Amf3Decoder, Amf3Error, ByteReader, Externalizable};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Counter(i32);
//!
//! impl Externalizable for Counter {
//!     fn read_external(&mut self, reader: &mut ByteReader<'_>) -> Result<(), Amf3Error> {
//!         self.0 = reader.read_i32_be()?;
//!         Ok(())
//!     }
//!
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//!
//!     fn external_eq(&self, other: &dyn Externalizable) -> bool {
//!         scuffle_amf3::externalizable::downcast_eq(self, other)
//!     }
//! }
//!
//! # let bytes: &[u8] = &[0x0a, 0x07, 0x0f, b'C', b'o', b'u', b'n', b't', b'e', b'r', 0x00, 0x00, 0x00, 0x2a];
//! let mut decoder = Amf3Decoder::new(bytes).with_externalizable_factory(|name: &str| {
//!     (name == "Counter").then(|| Box::new(Counter::default()) as Box<dyn Externalizable>)
//! });
//!
//! let value = decoder.decode_value()?;
//! let object = value.as_object().unwrap().borrow();
//! let counter = object.external.as_ref().unwrap().as_any().downcast_ref::<Counter>();
//! assert_eq!(counter, Some(&Counter(42)));
//! # Ok(())
//! # }
//! # test().expect("test failed");
//! ```

use std::any::Any;
use std::fmt;

use crate::{Amf3Error, ByteReader};

/// The custom payload of an externalizable object.
pub trait Externalizable: Any + fmt::Debug {
    /// Read the payload.
    ///
    /// The reader is positioned right after the sealed and dynamic properties
    /// of the object. The handler must consume exactly its own payload.
    fn read_external(&mut self, reader: &mut ByteReader<'_>) -> Result<(), Amf3Error>;

    /// Access the payload as [`Any`] to downcast it to its concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Compare two payloads, used by the equality of [`Amf3Object`](crate::Amf3Object).
    fn external_eq(&self, other: &dyn Externalizable) -> bool;
}

/// Compare `this` with `other` if `other` has the same concrete type.
///
/// A ready made body for [`Externalizable::external_eq`].
pub fn downcast_eq<T: PartialEq + 'static>(this: &T, other: &dyn Externalizable) -> bool {
    other.as_any().downcast_ref::<T>() == Some(this)
}

/// Creates [`Externalizable`] handlers by trait name.
pub trait ExternalizableFactory {
    /// Create a handler for `trait_name`, or `None` if this factory does not know the class.
    fn create(&self, trait_name: &str) -> Option<Box<dyn Externalizable>>;
}

impl<F> ExternalizableFactory for F
where
    F: Fn(&str) -> Option<Box<dyn Externalizable>>,
{
    fn create(&self, trait_name: &str) -> Option<Box<dyn Externalizable>> {
        self(trait_name)
    }
}
