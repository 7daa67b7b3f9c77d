use crate::error::ValidateError;

/// Reject line breaks and NUL in text that is sent as a raw atom, such as search criteria.
pub(crate) fn validate_raw(value: &str) -> Result<(), ValidateError> {
    match value.chars().find(|c| matches!(c, '\r' | '\n' | '\0')) {
        Some(c) => Err(ValidateError(c)),
        None => Ok(()),
    }
}

/// ASCII case-insensitive prefix test on a raw response line.
pub(crate) fn starts_with_ci(line: &[u8], prefix: &str) -> bool {
    line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Strip `prefix` (ASCII case-insensitive) from a raw response line.
pub(crate) fn strip_prefix_ci<'a>(line: &'a [u8], prefix: &str) -> Option<&'a [u8]> {
    if starts_with_ci(line, prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}
