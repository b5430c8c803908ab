//! Validation of configuration values that end up on the air or in the mesh stack.

/// Validation errors with helpful messages
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: port must be non-zero")]
    ZeroPort { field: &'static str },

    #[error("reporting.interval_ms must be at least {min} (got {got})")]
    IntervalTooShort { min: u64, got: u64 },

    #[error("network.channel must be within 11..=26 (got {0})")]
    ChannelOutOfRange(u8),

    #[error("network.name must be 1..={max} bytes")]
    NetworkNameLength { max: usize },

    #[error("{field}: expected {expected} hex digits")]
    HexLength { field: &'static str, expected: usize },

    #[error("{field}: invalid hex digit '{ch}'")]
    HexDigit { field: &'static str, ch: char },

    #[error("{field}: prefix length {got} exceeds 128")]
    PrefixLength { field: &'static str, got: u8 },
}

/// Shortest periodic reporting interval accepted.
pub const MIN_INTERVAL_MS: u64 = 100;
/// Thread network names are at most 16 bytes.
pub const MAX_NETWORK_NAME: usize = 16;

pub fn validate_port(field: &'static str, port: u16) -> Result<u16, ValidationError> {
    if port == 0 {
        return Err(ValidationError::ZeroPort { field });
    }
    Ok(port)
}

pub fn validate_interval_ms(ms: u64) -> Result<u64, ValidationError> {
    if ms < MIN_INTERVAL_MS {
        return Err(ValidationError::IntervalTooShort {
            min: MIN_INTERVAL_MS,
            got: ms,
        });
    }
    Ok(ms)
}

pub fn validate_channel(channel: u8) -> Result<u8, ValidationError> {
    if !(11..=26).contains(&channel) {
        return Err(ValidationError::ChannelOutOfRange(channel));
    }
    Ok(channel)
}

pub fn validate_network_name(name: &str) -> Result<&str, ValidationError> {
    if name.is_empty() || name.len() > MAX_NETWORK_NAME {
        return Err(ValidationError::NetworkNameLength {
            max: MAX_NETWORK_NAME,
        });
    }
    Ok(name)
}

pub fn validate_prefix_length(field: &'static str, len: u8) -> Result<u8, ValidationError> {
    if len > 128 {
        return Err(ValidationError::PrefixLength { field, got: len });
    }
    Ok(len)
}

/// Parse exactly `N` bytes of hex. `:` and `-` separators are skipped, so
/// `"00:12:4b:00:01:02:ab:cd"` and `"00124b000102abcd"` are equivalent.
pub fn parse_hex_bytes<const N: usize>(
    field: &'static str,
    s: &str,
) -> Result<[u8; N], ValidationError> {
    let mut digits = Vec::with_capacity(N * 2);
    for ch in s.trim().chars() {
        if ch == ':' || ch == '-' {
            continue;
        }
        let v = ch
            .to_digit(16)
            .ok_or(ValidationError::HexDigit { field, ch })?;
        digits.push(v as u8);
    }
    if digits.len() != N * 2 {
        return Err(ValidationError::HexLength {
            field,
            expected: N * 2,
        });
    }
    let mut out = [0u8; N];
    for (i, pair) in digits.chunks_exact(2).enumerate() {
        out[i] = (pair[0] << 4) | pair[1];
    }
    Ok(out)
}
