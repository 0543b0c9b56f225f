use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Validate, Write,
};

use crate::errors::{Error, Result};

/// Canonical compressed encoding of `value`.
pub fn to_bytes<T: CanonicalSerialize>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(value.compressed_size());
    value.serialize_compressed(&mut bytes)?;
    Ok(bytes)
}

/// Decodes `bytes`, rejecting trailing data so that every value has exactly one encoding.
pub fn from_bytes<T: CanonicalDeserialize>(mut bytes: &[u8]) -> Result<T> {
    let value = T::deserialize_compressed(&mut bytes)?;
    if !bytes.is_empty() {
        return Err(Error::Format(format!("{} trailing bytes", bytes.len())));
    }
    Ok(value)
}

pub(crate) fn serialize_str<W: Write>(
    s: &str,
    writer: W,
    compress: Compress,
) -> std::result::Result<(), SerializationError> {
    s.as_bytes().to_vec().serialize_with_mode(writer, compress)
}

pub(crate) fn str_size(s: &str, compress: Compress) -> usize {
    s.as_bytes().to_vec().serialized_size(compress)
}

pub(crate) fn deserialize_string<R: Read>(
    reader: R,
    compress: Compress,
    validate: Validate,
) -> std::result::Result<String, SerializationError> {
    let bytes = Vec::<u8>::deserialize_with_mode(reader, compress, validate)?;
    String::from_utf8(bytes).map_err(|_| SerializationError::InvalidData)
}
