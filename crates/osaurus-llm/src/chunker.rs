//! Splits complete tool-call arguments into windows for incremental delivery

/// Split `arguments` into consecutive slices of at most `window` bytes
///
/// Slice ends are moved back to the previous character boundary so no
/// multi-byte code point is ever split. When a single character is wider than
/// the window it is emitted alone. A window of zero is treated as one.
/// Concatenating the result always reproduces `arguments` exactly.
pub fn chunk_arguments(arguments: &str, window: usize) -> Vec<&str> {
    let window = window.max(1);
    let mut chunks = Vec::with_capacity(arguments.len().div_ceil(window));
    let mut start = 0;

    while start < arguments.len() {
        let mut end = (start + window).min(arguments.len());

        while !arguments.is_char_boundary(end) {
            end -= 1;
        }

        if end == start {
            end = start + 1;
            while !arguments.is_char_boundary(end) {
                end += 1;
            }
        }

        chunks.push(&arguments[start..end]);
        start = end;
    }

    chunks
}
