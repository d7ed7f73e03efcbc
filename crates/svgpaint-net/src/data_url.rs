//! `data:` URL decoding.

use base64::Engine;

use crate::NetError;

/// A decoded `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// Media type, e.g. `image/svg+xml`. `None` when omitted.
    pub media_type: Option<String>,
    /// The optional `name=value` parameter following the media type.
    pub parameter: Option<(String, String)>,
    pub base64: bool,
    pub data: Vec<u8>,
}

impl DataUrl {
    /// Parse and decode a data URL.
    ///
    /// Grammar: `data:[<type>/<subtype>[;<name>=<value>]][;base64],<data>`. The payload is
    /// base64-decoded when flagged, percent-decoded otherwise.
    pub fn parse(input: &str) -> Result<Self, NetError> {
        let invalid = || NetError::InvalidDataUrl(truncate(input));

        let rest = input.trim_start().strip_prefix("data:").ok_or_else(invalid)?;
        let (header, payload) = rest.split_once(',').ok_or_else(invalid)?;

        let mut parts = header.split(';').peekable();
        let mut media_type = None;
        let mut parameter = None;
        let mut base64 = false;

        if let Some(first) = parts.peek().copied() {
            if is_media_type(first) {
                media_type = Some(first.to_string());
                parts.next();
                if let Some(candidate) = parts.peek().copied() {
                    if let Some((name, value)) = split_parameter(candidate) {
                        parameter = Some((name.to_string(), value.to_string()));
                        parts.next();
                    }
                }
            } else if first.is_empty() {
                parts.next();
            }
        }

        match (parts.next(), parts.next()) {
            (None, None) => {}
            (Some("base64"), None) => base64 = true,
            _ => return Err(invalid()),
        }

        let data = if base64 {
            let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact.as_bytes())
                .map_err(|e| NetError::InvalidDataUrl(e.to_string()))?
        } else {
            urlencoding::decode_binary(payload.as_bytes()).into_owned()
        };

        Ok(Self {
            media_type,
            parameter,
            base64,
            data,
        })
    }

    /// Decode the payload as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

fn is_media_type(s: &str) -> bool {
    let invalid = |c: char| c == ',' || c == ';' || c == '/';
    match s.split_once('/') {
        Some((ty, subtype)) => {
            !ty.is_empty() && !subtype.is_empty() && !ty.contains(invalid) && !subtype.contains(invalid)
        }
        None => false,
    }
}

fn split_parameter(s: &str) -> Option<(&str, &str)> {
    let (name, value) = s.split_once('=')?;
    let valid = |part: &str| !part.is_empty() && !part.contains(|c: char| c == ',' || c == ';' || c == '=');
    (valid(name) && valid(value)).then_some((name, value))
}

fn truncate(input: &str) -> String {
    input.chars().take(64).collect()
}
