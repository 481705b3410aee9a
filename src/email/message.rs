/// MIME view of a fetched email, built on top of mail-parser
use log::debug;
use mail_parser::{ContentType, MessageParser, MimeHeaders, PartType};

use super::error::ExtractError;

/// Literal used when a part carries no Content-Disposition header
pub const NO_DISPOSITION: &str = "None";

/// One MIME body segment, flattened out of the message tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePart {
    /// Lowercase `type/subtype`, `text/plain` when the header is missing or invalid
    pub content_type: String,
    /// Disposition header rebuilt as `kind; key="value"`, or `"None"`
    pub content_disposition: String,
    pub filename: Option<String>,
    /// Transfer-decoded body
    pub payload: Vec<u8>,
}

impl MessagePart {
    pub fn new(
        content_type: &str,
        content_disposition: Option<&str>,
        filename: Option<&str>,
        payload: Vec<u8>,
    ) -> Self {
        MessagePart {
            content_type: content_type.to_string(),
            content_disposition: content_disposition.unwrap_or(NO_DISPOSITION).to_string(),
            filename: filename.map(str::to_string),
            payload,
        }
    }

    fn from_parsed(part: &mail_parser::MessagePart) -> Self {
        MessagePart {
            content_type: mime_type(part.content_type()),
            content_disposition: part
                .content_disposition()
                .map(render_disposition)
                .unwrap_or_else(|| NO_DISPOSITION.to_string()),
            filename: part.attachment_name().map(str::to_string),
            payload: part.contents().to_vec(),
        }
    }
}

/// A fetched email: its raw subject header and its parts in serialization order
#[derive(Debug, Clone, Default)]
pub struct EmailMessage {
    /// Subject header value as found on the wire, still RFC 2047 encoded
    pub raw_subject: Option<String>,
    pub parts: Vec<MessagePart>,
}

impl EmailMessage {
    pub fn new(raw_subject: Option<&str>, parts: Vec<MessagePart>) -> Self {
        EmailMessage {
            raw_subject: raw_subject.map(str::to_string),
            parts,
        }
    }

    pub fn parse(raw: &[u8]) -> Result<Self, ExtractError> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| ExtractError::DecodeFailure("not a MIME message".to_string()))?;

        let mut parts = Vec::with_capacity(parsed.parts.len());
        walk(&parsed, &mut parts);
        debug!("Parsed email: {} bytes, {} part(s)", raw.len(), parts.len());

        Ok(EmailMessage {
            raw_subject: parsed.header_raw("Subject").map(unfold),
            parts,
        })
    }

    /// First `text/html` part, in serialization order
    pub fn html_part(&self) -> Option<&MessagePart> {
        self.parts.iter().find(|part| part.content_type == "text/html")
    }
}

// Depth-first, including multipart containers and embedded messages
fn walk(message: &mail_parser::Message, out: &mut Vec<MessagePart>) {
    for part in &message.parts {
        out.push(MessagePart::from_parsed(part));
        if let PartType::Message(inner) = &part.body {
            walk(inner, out);
        }
    }
}

fn mime_type(content_type: Option<&ContentType>) -> String {
    match content_type.map(|ct| (ct.ctype(), ct.subtype())) {
        Some((ctype, Some(subtype))) => format!("{}/{}", ctype, subtype).to_lowercase(),
        _ => "text/plain".to_string(),
    }
}

fn render_disposition(disposition: &ContentType) -> String {
    let mut rendered = disposition.ctype().to_string();
    if let Some(attributes) = &disposition.attributes {
        for (key, value) in attributes {
            rendered.push_str(&format!("; {}=\"{}\"", key, value));
        }
    }
    rendered
}

// Folded header lines are joined, the value stays RFC 2047 encoded
fn unfold(value: &str) -> String {
    value.replace("\r\n", "").replace('\n', "").trim().to_string()
}
