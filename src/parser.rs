// Slice-based STOMP frame parser for text transports.
use crate::frame::{Frame, Headers};

/// Outcome of a successful parse: the frame and how many bytes it used.
pub type Parsed = Option<(Frame, usize)>;

/// Whether header escaping applies to frames with this command.
///
/// STOMP 1.2 exempts CONNECT and CONNECTED so that 1.0 peers can still
/// negotiate.
pub fn escapes_headers(command: &str) -> bool {
    command != "CONNECT" && command != "CONNECTED"
}

/// Undo STOMP 1.2 header escaping (`\\`, `\r`, `\n`, `\c`).
///
/// Any other escape sequence, or a trailing lone backslash, is an error.
pub fn unescape_header_value(input: &str) -> Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            Some(other) => return Err(format!("undefined escape sequence '\\{}'", other)),
            None => return Err("trailing backslash in header".to_string()),
        }
    }
    Ok(out)
}

fn utf8(bytes: &[u8], what: &str) -> Result<String, String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| format!("invalid utf8 in {}: {}", what, e))
}

fn content_length(headers: &Headers) -> Result<Option<usize>, String> {
    for (k, v) in headers {
        if k.eq_ignore_ascii_case("content-length") {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                return Err("empty content-length".to_string());
            }
            return trimmed
                .parse::<usize>()
                .map(Some)
                .map_err(|e| format!("invalid content-length '{}': {}", trimmed, e));
        }
    }
    Ok(None)
}

fn strip_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

/// Parse a single STOMP frame from the front of `input`.
///
/// Leading EOLs are not skipped: the codec reports those as heartbeats
/// before calling in here. Returns `Ok(None)` when more bytes are needed.
pub fn parse_frame(input: &[u8]) -> Result<Parsed, String> {
    let len = input.len();

    let Some(cmd_end) = input.iter().position(|&b| b == b'\n') else {
        return Ok(None);
    };
    let command = utf8(strip_cr(&input[..cmd_end]), "command")?;
    let escaped = escapes_headers(&command);
    let mut pos = cmd_end + 1;

    let mut headers: Headers = Vec::new();
    loop {
        if pos >= len {
            return Ok(None);
        }
        let Some(line_len) = input[pos..].iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let line = strip_cr(&input[pos..pos + line_len]);
        pos += line_len + 1;
        if line.is_empty() {
            break;
        }
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            return Err(format!(
                "malformed header line: {:?}",
                String::from_utf8_lossy(line)
            ));
        };
        let mut key = utf8(&line[..colon], "header key")?;
        let mut value = utf8(&line[colon + 1..], "header value")?;
        if escaped {
            key = unescape_header_value(&key)?;
            value = unescape_header_value(&value)?;
        }
        headers.push((key, value));
    }

    let body_end = match content_length(&headers)? {
        Some(n) => {
            let Some(end) = pos.checked_add(n).and_then(|e| e.checked_add(1)) else {
                return Err("content-length too large".to_string());
            };
            if end > len {
                return Ok(None);
            }
            if input[pos + n] != 0 {
                return Err("missing NUL terminator after content-length body".to_string());
            }
            pos + n
        }
        None => match input[pos..].iter().position(|&b| b == 0) {
            Some(nul) => pos + nul,
            None => return Ok(None),
        },
    };
    let body = utf8(&input[pos..body_end], "body")?;
    let mut consumed = body_end + 1;
    // trailing EOLs after the NUL belong to this frame
    while consumed < len && input[consumed] == b'\n' {
        consumed += 1;
    }

    let frame = Frame {
        command,
        headers,
        body,
    };
    Ok(Some((frame, consumed)))
}
