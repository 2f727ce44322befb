//! Bounded, lossy line reading shared by the log and deploy readers.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Longest line forwarded as one unit. Longer lines are split.
pub(crate) const MAX_LINE_LEN: usize = 64 * 1024;

/// Append bytes up to and including the next `\n` to `buf`, or at most
/// `limit` bytes. Returns the number of bytes appended; `0` means EOF.
///
/// Like `read_until`, but a writer that never sends a newline cannot grow
/// `buf` without bound.
pub(crate) async fn read_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let limit = limit.max(1);
    let mut read = 0;
    while read < limit {
        let (used, found) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            let window = &available[..available.len().min(limit - read)];
            match window.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    buf.extend_from_slice(&window[..=pos]);
                    (pos + 1, true)
                }
                None => {
                    buf.extend_from_slice(window);
                    (window.len(), false)
                }
            }
        };
        reader.consume(used);
        read += used;
        if found {
            break;
        }
    }
    Ok(read)
}

/// Lossy UTF-8 with the line terminator (`\n` or `\r\n`) removed.
pub(crate) fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
