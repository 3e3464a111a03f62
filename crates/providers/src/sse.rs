//! Line splitting for SSE and line-delimited JSON bodies.

/// Buffers raw bytes and yields complete lines.
///
/// Bytes are decoded only once a whole line is present, so a multi-byte
/// character split across network chunks survives intact.
#[derive(Default)]
pub(crate) struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// The next complete line, without its terminator.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=end).collect();
        let line = String::from_utf8_lossy(&line[..end]);
        Some(line.trim_end_matches('\r').to_string())
    }

    /// Whatever remains once the body has ended.
    pub(crate) fn remainder(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = String::from_utf8_lossy(&rest);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseLine<'a> {
    /// Blank line, comment, or a non-data field
    Skip,
    /// Payload of a `data:` line
    Data(&'a str),
    /// The `[DONE]` sentinel
    Done,
    /// A line with no SSE framing at all
    Raw(&'a str),
}

pub(crate) fn classify(line: &str) -> SseLine<'_> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Skip;
    }
    if let Some(data) = line.strip_prefix("data:") {
        let data = data.trim();
        return if data == "[DONE]" { SseLine::Done } else { SseLine::Data(data) };
    }
    if line == "[DONE]" {
        return SseLine::Done;
    }
    if ["event:", "id:", "retry:"].iter().any(|p| line.starts_with(p)) {
        return SseLine::Skip;
    }
    SseLine::Raw(line)
}
