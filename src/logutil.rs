//! Logging helpers for datagram payloads so that logs stay single-line.
//! Escapes control characters and non-UTF-8 bytes that would otherwise break log readability.

use std::fmt::Write;

/// Cap on escaped output; mesh payloads are small, anything longer is noise.
const MAX_PREVIEW: usize = 64;

/// Escape a datagram payload for single-line logging:
/// - `\n` => `\\n`, `\r` => `\\r`, `\t` => `\\t`
/// - backslash => `\\\\`
/// - other control characters and invalid UTF-8 bytes => `\xNN`
///
/// Output is truncated with an ellipsis after `MAX_PREVIEW` characters.
pub fn escape_payload(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().min(MAX_PREVIEW) + 8);
    let mut count = 0usize;
    for chunk in bytes.utf8_chunks() {
        for ch in chunk.valid().chars() {
            if count >= MAX_PREVIEW {
                out.push('…');
                return out;
            }
            match ch {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => {
                    let _ = write!(&mut out, "\\x{:02X}", c as u32);
                }
                c => out.push(c),
            }
            count += 1;
        }
        for b in chunk.invalid() {
            if count >= MAX_PREVIEW {
                out.push('…');
                return out;
            }
            let _ = write!(&mut out, "\\x{:02X}", b);
            count += 1;
        }
    }
    out
}
