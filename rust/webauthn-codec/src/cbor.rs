use ciborium::Value;
use std::io::Cursor;

/// Decode one CBOR item from the front of `bytes`, returning it together
/// with the number of bytes it occupied.
pub(crate) fn decode_prefix(bytes: &[u8]) -> Result<(Value, usize), String> {
    let mut cursor = Cursor::new(bytes);
    let value: Value = ciborium::from_reader(&mut cursor).map_err(|error| error.to_string())?;
    Ok((value, cursor.position() as usize))
}

/// Decode `bytes` as exactly one CBOR item.
pub(crate) fn decode_exact(bytes: &[u8]) -> Result<Value, String> {
    let (value, consumed) = decode_prefix(bytes)?;
    if consumed != bytes.len() {
        return Err(format!("{} trailing bytes", bytes.len() - consumed));
    }
    Ok(value)
}

pub(crate) fn encode(value: &Value) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).map_err(|error| error.to_string())?;
    Ok(out)
}

/// Integer value of a map label, if it is one.
pub(crate) fn integer(value: &Value) -> Option<i128> {
    match value {
        Value::Integer(integer) => Some(i128::from(*integer)),
        _ => None,
    }
}

/// First entry with integer label `label`.
pub(crate) fn lookup(map: &[(Value, Value)], label: i128) -> Option<&Value> {
    map.iter()
        .find(|(key, _)| integer(key) == Some(label))
        .map(|(_, value)| value)
}

/// First entry with text label `label`.
pub(crate) fn lookup_text<'a>(map: &'a [(Value, Value)], label: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(key, _)| matches!(key, Value::Text(text) if text == label))
        .map(|(_, value)| value)
}
