/// Deterministic 32-bit polynomial hash of `text`, rendered as lower-case hex.
///
/// Each character folds in as `h = h * 31 + codepoint` with signed 32-bit
/// wraparound; the absolute value of the result is rendered. Empty input hashes to
/// `"0"`. Collisions are expected, so the hash only ever acts as a pre-filter.
pub fn hash_text(text: &str) -> String {
    let hash = text.chars().fold(0i32, |hash, c| {
        hash.wrapping_mul(31).wrapping_add(c as i32)
    });
    format!("{:x}", hash.unsigned_abs())
}
