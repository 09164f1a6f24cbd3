//! AMF3 error type.

use std::borrow::Cow;
use std::io;
use std::str::Utf8Error;

use crate::tables::TableKind;

/// Result type.
pub type Result<T> = std::result::Result<T, Amf3Error>;

/// AMF3 error.
#[derive(thiserror::Error, Debug)]
pub enum Amf3Error {
    /// IO error.
    #[error("io error: {0}")]
    Io(io::Error),
    /// The input ended in the middle of a value.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// The input is not in the expected format.
    #[error("unexpected format: {0}")]
    UnexpectedFormat(Cow<'static, str>),
    /// Unknown marker.
    #[error("unknown marker: 0x{0:02x}")]
    UnknownMarker(u8),
    /// The input ended in the middle of a variable length integer.
    #[error("malformed U29 integer")]
    MalformedInteger,
    /// A reference points past the end of its table.
    #[error("invalid {table} reference: index {index} has not been read yet")]
    InvalidReference {
        /// The table the reference was resolved against.
        table: TableKind,
        /// The index that was requested.
        index: u32,
    },
    /// String parse error.
    #[error("string parse error: {0}")]
    StringParseError(#[from] Utf8Error),
    /// No registered factory accepted the trait.
    #[error("no externalizable factory accepts trait {0:?}")]
    UnsupportedExternalizable(String),
    /// The externalizable handler failed to read its payload.
    #[error("externalizable {trait_name:?} failed to read its payload: {source}")]
    ExternalizableReadFailed {
        /// The trait name of the object being decoded.
        trait_name: String,
        /// The error reported by the handler.
        source: Box<Amf3Error>,
    },
    /// The reader has been closed.
    #[error("reader is closed")]
    Closed,
}

impl Amf3Error {
    pub(crate) fn unexpected_format(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::UnexpectedFormat(reason.into())
    }
}

impl From<io::Error> for Amf3Error {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::UnexpectedEof
        } else {
            Self::Io(err)
        }
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::io;

    use super::Amf3Error;
    use crate::tables::TableKind;

    #[test]
    fn io_eof_is_unexpected_eof() {
        let err: Amf3Error = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, Amf3Error::UnexpectedEof));

        let err: Amf3Error = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(err, Amf3Error::Io(_)));
    }

    #[test]
    fn display() {
        insta::assert_snapshot!(Amf3Error::UnknownMarker(0x12).to_string(), @"unknown marker: 0x12");
        insta::assert_snapshot!(
            Amf3Error::InvalidReference { table: TableKind::Traits, index: 3 }.to_string(),
            @"invalid trait reference: index 3 has not been read yet"
        );
        insta::assert_snapshot!(
            Amf3Error::UnsupportedExternalizable("flex.messaging.io.ArrayCollection".to_owned()).to_string(),
            @r#"no externalizable factory accepts trait "flex.messaging.io.ArrayCollection""#
        );
        insta::assert_snapshot!(
            Amf3Error::unexpected_format("wrong file tag").to_string(),
            @"unexpected format: wrong file tag"
        );
    }
}
