//! The DMX header line.
//!
//! `<!-- dmx encoding {enc} {enc_version} format {format} {format_version} -->`
//!
//! Text encodings end the line with a newline; the binary encoding follows
//! it with a NUL byte.

use std::fmt;

use crate::error::DecodeError;

/// Upper bound on how far the parser scans for the end of the header.
const MAX_HEADER_LEN: usize = 256;

/// Parsed header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub encoding: String,
    pub encoding_version: i32,
    pub format: String,
    pub format_version: i32,
}

impl Header {
    pub fn new(encoding: impl Into<String>, encoding_version: i32, format: impl Into<String>, format_version: i32) -> Self {
        Self {
            encoding: encoding.into(),
            encoding_version,
            format: format.into(),
            format_version,
        }
    }

    /// Parses the header at the start of `data`. Returns the header and the
    /// offset of the first body byte (past the line terminator, and past a
    /// NUL if one follows).
    pub fn parse(data: &[u8]) -> Result<(Header, usize), DecodeError> {
        let window = &data[..data.len().min(MAX_HEADER_LEN)];
        let end = window
            .iter()
            .position(|&b| b == b'\n' || b == 0)
            .ok_or_else(|| invalid(window))?;
        let line = std::str::from_utf8(&window[..end]).map_err(|_| invalid(&window[..end]))?;
        let header = Self::parse_line(line)?;

        let mut body = end + 1;
        if data[end] == b'\n' && data.get(body) == Some(&0) {
            body += 1;
        }
        Ok((header, body))
    }

    fn parse_line(line: &str) -> Result<Header, DecodeError> {
        let fail = || DecodeError::InvalidHeader {
            found: line.to_string(),
        };
        let inner = line
            .trim()
            .strip_prefix("<!--")
            .and_then(|s| s.strip_suffix("-->"))
            .ok_or_else(fail)?;
        let words: Vec<&str> = inner.split_whitespace().collect();
        match words.as_slice() {
            ["dmx", "encoding", encoding, encoding_version, "format", format, format_version] => {
                Ok(Header {
                    encoding: encoding.to_string(),
                    encoding_version: encoding_version.parse().map_err(|_| fail())?,
                    format: format.to_string(),
                    format_version: format_version.parse().map_err(|_| fail())?,
                })
            }
            _ => Err(fail()),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<!-- dmx encoding {} {} format {} {} -->",
            self.encoding, self.encoding_version, self.format, self.format_version
        )
    }
}

fn invalid(bytes: &[u8]) -> DecodeError {
    DecodeError::InvalidHeader {
        found: String::from_utf8_lossy(&bytes[..bytes.len().min(64)]).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_header() {
        let mut data = b"<!-- dmx encoding binary 5 format model 18 -->\n".to_vec();
        data.push(0);
        data.extend_from_slice(b"body");
        let (header, body) = Header::parse(&data).unwrap();
        assert_eq!(header, Header::new("binary", 5, "model", 18));
        assert_eq!(&data[body..], b"body");
    }

    #[test]
    fn test_text_header_roundtrip() {
        let header = Header::new("keyvalues2", 1, "dmx", 1);
        let text = format!("{header}\n\"DmElement\"");
        let (parsed, body) = Header::parse(text.as_bytes()).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(&text[body..], "\"DmElement\"");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            Header::parse(b"not a dmx file\n"),
            Err(DecodeError::InvalidHeader { .. })
        ));
        assert!(Header::parse(b"<!-- dmx encoding binary x format dmx 1 -->\n").is_err());
        assert!(Header::parse(b"").is_err());
    }
}
