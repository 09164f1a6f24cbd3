//! AMF3 value types.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::thread::LocalKey;

use bytes::Bytes;
use bytestring::ByteString;
use indexmap::IndexMap;

use crate::Amf3Marker;
use crate::externalizable::Externalizable;

/// String keyed properties, in the order they were decoded.
pub type Amf3Properties = IndexMap<ByteString, Amf3Value>;

/// Represents any AMF3 value.
///
/// Complex values are reference counted. When the same complex value appears
/// more than once in the input, every position in the decoded tree holds a
/// handle to the same allocation. Strings and byte arrays share their
/// underlying buffer on clone.
///
/// Values that reference themselves form [`Rc`] cycles and are only freed
/// once the cycle is broken by the caller.
#[derive(Clone)]
pub enum Amf3Value {
    /// AMF3 Undefined.
    Undefined,
    /// AMF3 Null.
    Null,
    /// AMF3 True and False.
    Boolean(bool),
    /// AMF3 Integer, a 29-bit signed integer.
    Integer(i32),
    /// AMF3 Double.
    Double(f64),
    /// AMF3 String.
    String(ByteString),
    /// AMF3 legacy XML document.
    XmlDocument(ByteString),
    /// AMF3 Date, in milliseconds since the unix epoch.
    Date(f64),
    /// AMF3 Array.
    Array(Rc<RefCell<Amf3Array>>),
    /// AMF3 Object.
    Object(Rc<RefCell<Amf3Object>>),
    /// AMF3 XML.
    Xml(ByteString),
    /// AMF3 ByteArray.
    ByteArray(Bytes),
    /// AMF3 Vector of signed integers.
    VectorInt(Rc<Amf3Vector<i32>>),
    /// AMF3 Vector of unsigned integers.
    VectorUInt(Rc<Amf3Vector<u32>>),
    /// AMF3 Vector of doubles.
    VectorDouble(Rc<Amf3Vector<f64>>),
    /// AMF3 Vector of arbitrary values.
    VectorGeneric(Rc<RefCell<Amf3GenericVector>>),
    /// AMF3 Dictionary.
    Dictionary(Rc<RefCell<Amf3Dictionary>>),
}

impl Amf3Value {
    /// The marker this value is encoded with.
    pub fn marker(&self) -> Amf3Marker {
        match self {
            Self::Undefined => Amf3Marker::Undefined,
            Self::Null => Amf3Marker::Null,
            Self::Boolean(false) => Amf3Marker::False,
            Self::Boolean(true) => Amf3Marker::True,
            Self::Integer(_) => Amf3Marker::Integer,
            Self::Double(_) => Amf3Marker::Double,
            Self::String(_) => Amf3Marker::String,
            Self::XmlDocument(_) => Amf3Marker::XmlDocument,
            Self::Date(_) => Amf3Marker::Date,
            Self::Array(_) => Amf3Marker::Array,
            Self::Object(_) => Amf3Marker::Object,
            Self::Xml(_) => Amf3Marker::Xml,
            Self::ByteArray(_) => Amf3Marker::ByteArray,
            Self::VectorInt(_) => Amf3Marker::VectorInt,
            Self::VectorUInt(_) => Amf3Marker::VectorUInt,
            Self::VectorDouble(_) => Amf3Marker::VectorDouble,
            Self::VectorGeneric(_) => Amf3Marker::VectorGeneric,
            Self::Dictionary(_) => Amf3Marker::Dictionary,
        }
    }

    /// Check whether both values are handles to the same decoded value.
    ///
    /// Primitives never share identity and always return `false`.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        fn bytes_eq(a: &[u8], b: &[u8]) -> bool {
            !a.is_empty() && std::ptr::eq(a, b)
        }

        match (self, other) {
            (Self::String(a), Self::String(b))
            | (Self::XmlDocument(a), Self::XmlDocument(b))
            | (Self::Xml(a), Self::Xml(b)) => bytes_eq(a.as_bytes(), b.as_bytes()),
            (Self::ByteArray(a), Self::ByteArray(b)) => bytes_eq(a, b),
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::VectorInt(a), Self::VectorInt(b)) => Rc::ptr_eq(a, b),
            (Self::VectorUInt(a), Self::VectorUInt(b)) => Rc::ptr_eq(a, b),
            (Self::VectorDouble(a), Self::VectorDouble(b)) => Rc::ptr_eq(a, b),
            (Self::VectorGeneric(a), Self::VectorGeneric(b)) => Rc::ptr_eq(a, b),
            (Self::Dictionary(a), Self::Dictionary(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Returns the string if this is a [`Amf3Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(&**s),
            _ => None,
        }
    }

    /// Returns the boolean if this is a [`Amf3Value::Boolean`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is a [`Amf3Value::Integer`].
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the number if this is a [`Amf3Value::Double`] or an [`Amf3Value::Integer`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the array handle if this is a [`Amf3Value::Array`].
    pub fn as_array(&self) -> Option<&Rc<RefCell<Amf3Array>>> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the object handle if this is a [`Amf3Value::Object`].
    pub fn as_object(&self) -> Option<&Rc<RefCell<Amf3Object>>> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns the dictionary handle if this is a [`Amf3Value::Dictionary`].
    pub fn as_dictionary(&self) -> Option<&Rc<RefCell<Amf3Dictionary>>> {
        match self {
            Self::Dictionary(d) => Some(d),
            _ => None,
        }
    }
}

impl From<bool> for Amf3Value {
    fn from(value: bool) -> Self {
        Amf3Value::Boolean(value)
    }
}

impl From<i32> for Amf3Value {
    fn from(value: i32) -> Self {
        Amf3Value::Integer(value)
    }
}

impl From<f64> for Amf3Value {
    fn from(value: f64) -> Self {
        Amf3Value::Double(value)
    }
}

impl From<ByteString> for Amf3Value {
    fn from(value: ByteString) -> Self {
        Amf3Value::String(value)
    }
}

impl From<&str> for Amf3Value {
    fn from(value: &str) -> Self {
        Amf3Value::String(ByteString::from(value))
    }
}

impl From<Bytes> for Amf3Value {
    fn from(value: Bytes) -> Self {
        Amf3Value::ByteArray(value)
    }
}

impl From<Amf3Array> for Amf3Value {
    fn from(value: Amf3Array) -> Self {
        Amf3Value::Array(Rc::new(RefCell::new(value)))
    }
}

impl From<Amf3Object> for Amf3Value {
    fn from(value: Amf3Object) -> Self {
        Amf3Value::Object(Rc::new(RefCell::new(value)))
    }
}

impl From<Amf3Dictionary> for Amf3Value {
    fn from(value: Amf3Dictionary) -> Self {
        Amf3Value::Dictionary(Rc::new(RefCell::new(value)))
    }
}

impl From<Amf3GenericVector> for Amf3Value {
    fn from(value: Amf3GenericVector) -> Self {
        Amf3Value::VectorGeneric(Rc::new(RefCell::new(value)))
    }
}

impl PartialEq for Amf3Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Double(a), Self::Double(b)) | (Self::Date(a), Self::Date(b)) => a == b,
            (Self::String(a), Self::String(b))
            | (Self::XmlDocument(a), Self::XmlDocument(b))
            | (Self::Xml(a), Self::Xml(b)) => a == b,
            (Self::ByteArray(a), Self::ByteArray(b)) => a == b,
            (Self::VectorInt(a), Self::VectorInt(b)) => a == b,
            (Self::VectorUInt(a), Self::VectorUInt(b)) => a == b,
            (Self::VectorDouble(a), Self::VectorDouble(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => shared_eq(a, b),
            (Self::Object(a), Self::Object(b)) => shared_eq(a, b),
            (Self::VectorGeneric(a), Self::VectorGeneric(b)) => shared_eq(a, b),
            (Self::Dictionary(a), Self::Dictionary(b)) => shared_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Amf3Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Boolean(v) => f.debug_tuple("Boolean").field(v).finish(),
            Self::Integer(v) => f.debug_tuple("Integer").field(v).finish(),
            Self::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Self::String(v) => f.debug_tuple("String").field(v).finish(),
            Self::XmlDocument(v) => f.debug_tuple("XmlDocument").field(v).finish(),
            Self::Date(v) => f.debug_tuple("Date").field(v).finish(),
            Self::Array(v) => shared_fmt(f, "Array", v),
            Self::Object(v) => shared_fmt(f, "Object", v),
            Self::Xml(v) => f.debug_tuple("Xml").field(v).finish(),
            Self::ByteArray(v) => f.debug_tuple("ByteArray").field(v).finish(),
            Self::VectorInt(v) => f.debug_tuple("VectorInt").field(v).finish(),
            Self::VectorUInt(v) => f.debug_tuple("VectorUInt").field(v).finish(),
            Self::VectorDouble(v) => f.debug_tuple("VectorDouble").field(v).finish(),
            Self::VectorGeneric(v) => shared_fmt(f, "VectorGeneric", v),
            Self::Dictionary(v) => shared_fmt(f, "Dictionary", v),
        }
    }
}

thread_local! {
    static EQ_VISITING: RefCell<Vec<(usize, usize)>> = const { RefCell::new(Vec::new()) };
    static FMT_VISITING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks a container as being visited for as long as the guard lives.
///
/// Comparing or formatting a cyclic graph reaches the same container again
/// while it is still on the stack, which would otherwise recurse forever.
struct Visit<K: Copy + PartialEq + 'static> {
    stack: &'static LocalKey<RefCell<Vec<K>>>,
}

impl<K: Copy + PartialEq + 'static> Visit<K> {
    fn enter(stack: &'static LocalKey<RefCell<Vec<K>>>, key: K) -> Option<Self> {
        stack.with_borrow_mut(|visiting| {
            if visiting.contains(&key) {
                None
            } else {
                visiting.push(key);
                Some(Self { stack })
            }
        })
    }
}

impl<K: Copy + PartialEq + 'static> Drop for Visit<K> {
    fn drop(&mut self) {
        self.stack.with_borrow_mut(|visiting| {
            visiting.pop();
        });
    }
}

fn address<T>(value: &Rc<RefCell<T>>) -> usize {
    Rc::as_ptr(value) as *const () as usize
}

fn shared_eq<T: PartialEq>(a: &Rc<RefCell<T>>, b: &Rc<RefCell<T>>) -> bool {
    if Rc::ptr_eq(a, b) {
        return true;
    }

    // A pair that is already being compared further up the stack is assumed
    // equal, the rest of the comparison decides.
    let Some(_visit) = Visit::enter(&EQ_VISITING, (address(a), address(b))) else {
        return true;
    };

    *a.borrow() == *b.borrow()
}

fn shared_fmt<T: fmt::Debug>(f: &mut fmt::Formatter<'_>, name: &str, value: &Rc<RefCell<T>>) -> fmt::Result {
    let Some(_visit) = Visit::enter(&FMT_VISITING, address(value)) else {
        return write!(f, "{name}(<cycle>)");
    };

    match value.try_borrow() {
        Ok(inner) => f.debug_tuple(name).field(&*inner).finish(),
        Err(_) => write!(f, "{name}(<borrowed>)"),
    }
}

/// AMF3 Array.
///
/// An array has a dense part, indexed from zero, and an associative part keyed
/// by strings.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Amf3Array {
    /// The dense part of the array.
    pub dense: Vec<Amf3Value>,
    /// The associative part of the array.
    pub associative: Amf3Properties,
}

impl Amf3Array {
    /// Create an empty array.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of dense and associative elements.
    pub fn len(&self) -> usize {
        self.dense.len() + self.associative.len()
    }

    /// Whether the array has no elements at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<Amf3Value>> for Amf3Array {
    fn from(dense: Vec<Amf3Value>) -> Self {
        Self {
            dense,
            associative: Amf3Properties::new(),
        }
    }
}

/// The class description of an [`Amf3Object`].
///
/// Objects that share a class in the input share the same [`Rc<Amf3Trait>`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Amf3Trait {
    /// The class name, empty for anonymous objects.
    pub name: ByteString,
    /// Whether objects of this class carry dynamic properties.
    pub dynamic: bool,
    /// Whether objects of this class carry a custom payload.
    pub externalizable: bool,
    /// The names of the sealed properties, in encoding order.
    pub sealed: Vec<ByteString>,
}

impl Amf3Trait {
    /// Create a trait for an anonymous dynamic object, the most common kind.
    pub fn anonymous() -> Self {
        Self {
            dynamic: true,
            ..Self::default()
        }
    }
}

/// AMF3 Object.
#[derive(Debug)]
pub struct Amf3Object {
    /// The class of this object.
    pub class: Rc<Amf3Trait>,
    /// The sealed properties, in the order of [`Amf3Trait::sealed`].
    pub sealed: Amf3Properties,
    /// The dynamic properties.
    pub dynamic: Amf3Properties,
    /// The custom payload of externalizable objects.
    pub external: Option<Box<dyn Externalizable>>,
}

impl Amf3Object {
    /// Create an empty object of the given class.
    pub fn new(class: Rc<Amf3Trait>) -> Self {
        Self {
            class,
            sealed: Amf3Properties::new(),
            dynamic: Amf3Properties::new(),
            external: None,
        }
    }

    /// The class name of this object.
    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// Look up a property, sealed properties first.
    pub fn get(&self, key: &str) -> Option<&Amf3Value> {
        self.sealed.get(key).or_else(|| self.dynamic.get(key))
    }
}

impl PartialEq for Amf3Object {
    fn eq(&self, other: &Self) -> bool {
        let external_eq = match (&self.external, &other.external) {
            (None, None) => true,
            (Some(a), Some(b)) => a.external_eq(b.as_ref()),
            _ => false,
        };

        self.class.dynamic == other.class.dynamic
            && self.class.externalizable == other.class.externalizable
            && self.class.name == other.class.name
            && self.sealed == other.sealed
            && self.dynamic == other.dynamic
            && external_eq
    }
}

/// AMF3 Vector of a primitive element type.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Amf3Vector<T> {
    /// Whether the vector has a fixed length.
    pub fixed_length: bool,
    /// The capacity the vector was created with.
    pub capacity: u32,
    /// The elements.
    pub items: Vec<T>,
}

/// AMF3 Vector of arbitrary values.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Amf3GenericVector {
    /// The class name of the elements, `*` for untyped vectors.
    pub element_type: ByteString,
    /// Whether the vector has a fixed length.
    pub fixed_length: bool,
    /// The capacity the vector was created with.
    pub capacity: u32,
    /// The elements.
    pub items: Vec<Amf3Value>,
}

/// AMF3 Dictionary.
///
/// Keys can be any value. Every decoded entry is retained in order, regardless
/// of [`weak_keys`](Self::weak_keys).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Amf3Dictionary {
    /// Whether the dictionary was created with weakly referenced keys.
    pub weak_keys: bool,
    /// The entries, in decoding order.
    pub entries: Vec<(Amf3Value, Amf3Value)>,
}

impl Amf3Dictionary {
    /// Look up the first entry whose key equals `key`.
    pub fn get(&self, key: &Amf3Value) -> Option<&Amf3Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::rc::Rc;

    use super::{Amf3Array, Amf3Dictionary, Amf3Object, Amf3Trait, Amf3Value};
    use crate::Amf3Marker;

    fn cyclic_object(name: &str) -> Amf3Value {
        let value = Amf3Value::from(Amf3Object::new(Rc::new(Amf3Trait::anonymous())));
        let object = value.as_object().unwrap();
        object.borrow_mut().dynamic.insert("name".into(), name.into());
        object.borrow_mut().dynamic.insert("self".into(), value.clone());
        value
    }

    #[test]
    fn markers() {
        assert_eq!(Amf3Value::Boolean(true).marker(), Amf3Marker::True);
        assert_eq!(Amf3Value::Boolean(false).marker(), Amf3Marker::False);
        assert_eq!(Amf3Value::from(Amf3Array::new()).marker(), Amf3Marker::Array);
        assert_eq!(Amf3Value::Date(0.0).marker(), Amf3Marker::Date);
    }

    #[test]
    fn primitive_equality() {
        assert_eq!(Amf3Value::from(1), Amf3Value::Integer(1));
        assert_ne!(Amf3Value::Integer(1), Amf3Value::Double(1.0));
        assert_ne!(Amf3Value::Xml("<a/>".into()), Amf3Value::XmlDocument("<a/>".into()));
        assert_ne!(Amf3Value::Null, Amf3Value::Undefined);
        assert_eq!(Amf3Value::Integer(7).as_f64(), Some(7.0));
    }

    #[test]
    fn object_equality() {
        let class = Rc::new(Amf3Trait {
            name: "Point".into(),
            sealed: vec!["x".into()],
            ..Amf3Trait::default()
        });

        let mut a = Amf3Object::new(class.clone());
        a.sealed.insert("x".into(), 1.into());
        let mut b = Amf3Object::new(Rc::new(Amf3Trait::clone(&class)));
        b.sealed.insert("x".into(), 1.into());
        assert_eq!(a, b);

        let mut c = Amf3Object::new(Rc::new(Amf3Trait {
            name: "Other".into(),
            ..Amf3Trait::clone(&class)
        }));
        c.sealed.insert("x".into(), 1.into());
        assert_ne!(a, c);

        b.dynamic.insert("y".into(), 2.into());
        assert_ne!(a, b);
    }

    #[test]
    fn cyclic_equality_terminates() {
        let a = cyclic_object("a");
        let b = cyclic_object("a");
        let c = cyclic_object("c");

        assert_eq!(a, a.clone());
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn cyclic_debug_terminates() {
        let debug = format!("{:?}", cyclic_object("a"));
        assert!(debug.contains("Object(<cycle>)"), "{debug}");
    }

    #[test]
    fn dictionary_lookup() {
        let dictionary = Amf3Dictionary {
            weak_keys: false,
            entries: vec![(1.into(), "one".into()), ("two".into(), 2.into())],
        };

        assert_eq!(dictionary.get(&"two".into()), Some(&Amf3Value::Integer(2)));
        assert_eq!(dictionary.get(&Amf3Value::Null), None);
    }
}
