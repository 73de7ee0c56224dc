use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::PollError;

/// Builds the one request this client ever sends: a GET with a fixed
/// header set. `Connection: close` makes the peer delimit the
/// response by closing the stream, which keeps the read path free of
/// keep-alive bookkeeping.
pub fn build_request(host: &str, target: &str) -> String {
    format!("GET {target} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n")
}

/// Writes `request` and reads the peer's answer until end of stream.
///
/// CONTRACT:
/// - Works over any byte stream, plain TCP or TLS.
/// - Some venues tear the connection down without a TLS close_notify.
///   An `UnexpectedEof` after at least one byte arrived is treated as
///   end of body, not as a failure; real truncation is caught later
///   against Content-Length.
pub async fn exchange<S>(mut stream: S, request: &[u8]) -> io::Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(request).await?;
    stream.flush().await?;

    let mut raw = Vec::with_capacity(8 * 1024);
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => raw.extend_from_slice(&chunk[..n]),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof && !raw.is_empty() => break,
            Err(err) => return Err(err),
        }
    }
    Ok(raw)
}

/// A parsed HTTP/1.1 response. Only what the poll cycle needs:
/// status for the 200 gate, headers for body framing, raw body bytes
/// for the JSON layer.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Case-insensitive header lookup, first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .is_some_and(|value| value.to_ascii_lowercase().contains("chunked"))
    }

    fn content_length(&self) -> Result<Option<usize>, PollError> {
        match self.header("content-length") {
            None => Ok(None),
            Some(value) => value
                .parse::<usize>()
                .map(Some)
                .map_err(|_| PollError::Protocol(format!("invalid Content-Length '{value}'"))),
        }
    }
}

/// Parses the raw bytes of one response.
///
/// Body framing, in order of precedence: chunked transfer coding,
/// then Content-Length, then everything up to end of stream. The
/// last case is how several exchanges answer `Connection: close`
/// requests.
pub fn parse_response(raw: &[u8]) -> Result<HttpResponse, PollError> {
    let head_end = find_header_end(raw)
        .ok_or_else(|| PollError::Protocol("response has no header terminator".into()))?;
    let head = std::str::from_utf8(&raw[..head_end])
        .map_err(|_| PollError::Protocol("response head is not valid UTF-8".into()))?;
    let rest = &raw[head_end + 4..];

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let (status, reason) = parse_status_line(status_line)?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(PollError::Protocol(format!("malformed header line '{line}'")));
        };
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let mut response = HttpResponse {
        status,
        reason,
        headers,
        body: Vec::new(),
    };

    response.body = if response.is_chunked() {
        decode_chunked(rest)?
    } else if let Some(length) = response.content_length()? {
        if rest.len() < length {
            return Err(PollError::Protocol(format!(
                "body truncated: got {} bytes, Content-Length says {length}",
                rest.len()
            )));
        }
        rest[..length].to_vec()
    } else {
        rest.to_vec()
    };

    Ok(response)
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|window| window == b"\r\n\r\n")
}

fn parse_status_line(line: &str) -> Result<(u16, String), PollError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(PollError::Protocol(format!("not an HTTP status line: '{line}'")));
    }
    let code = parts
        .next()
        .ok_or_else(|| PollError::Protocol(format!("status line has no code: '{line}'")))?;
    let status = code
        .parse::<u16>()
        .map_err(|_| PollError::Protocol(format!("invalid status code '{code}'")))?;
    let reason = parts.next().unwrap_or_default().to_string();
    Ok((status, reason))
}

fn decode_chunked(mut rest: &[u8]) -> Result<Vec<u8>, PollError> {
    let mut body = Vec::new();
    loop {
        let line_end = rest
            .windows(2)
            .position(|window| window == b"\r\n")
            .ok_or_else(|| PollError::Protocol("chunked body missing a size line".into()))?;
        let size_line = std::str::from_utf8(&rest[..line_end])
            .map_err(|_| PollError::Protocol("chunk size line is not valid UTF-8".into()))?;
        // chunk extensions after ';' are allowed and ignored
        let digits = size_line.split(';').next().unwrap_or(size_line).trim();
        let size = usize::from_str_radix(digits, 16)
            .map_err(|_| PollError::Protocol(format!("invalid chunk size '{digits}'")))?;
        rest = &rest[line_end + 2..];

        if size == 0 {
            return Ok(body);
        }
        if rest.len() < size {
            return Err(PollError::Protocol("chunked body truncated".into()));
        }
        body.extend_from_slice(&rest[..size]);
        rest = &rest[size..];

        if rest.starts_with(b"\r\n") {
            rest = &rest[2..];
        } else {
            return Err(PollError::Protocol("chunk data missing trailing CRLF".into()));
        }
    }
}
