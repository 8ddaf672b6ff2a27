//! MTOM/XOP attachments
//!
//! An `xop:Include` element whose `href` names a known content id is built
//! as a BinaryReference leaf instead of an element. The binary parts
//! themselves are looked up through an [`AttachmentResolver`].

use std::collections::HashMap;

/// Scheme prefix of XOP `href` values
pub const CID_SCHEME: &str = "cid:";

/// Lookup of binary parts by content id
pub trait AttachmentResolver {
    /// Media type of the part, or `None` when the id is unknown
    fn content_type(&self, content_id: &str) -> Option<&str>;

    /// Raw bytes of the part
    fn data(&self, content_id: &str) -> Option<&[u8]>;

    fn contains(&self, content_id: &str) -> bool {
        self.content_type(content_id).is_some()
    }
}

#[derive(Debug, Clone)]
struct Attachment {
    content_type: String,
    data: Vec<u8>,
}

/// In-memory attachment store
#[derive(Debug, Clone, Default)]
pub struct AttachmentMap {
    parts: HashMap<String, Attachment>,
}

impl AttachmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a part
    pub fn insert(&mut self, content_id: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) {
        self.parts.insert(
            content_id.into(),
            Attachment {
                content_type: content_type.into(),
                data,
            },
        );
    }

    pub fn remove(&mut self, content_id: &str) -> Option<Vec<u8>> {
        self.parts.remove(content_id).map(|a| a.data)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl AttachmentResolver for AttachmentMap {
    fn content_type(&self, content_id: &str) -> Option<&str> {
        self.parts.get(content_id).map(|a| a.content_type.as_str())
    }

    fn data(&self, content_id: &str) -> Option<&[u8]> {
        self.parts.get(content_id).map(|a| a.data.as_slice())
    }
}

/// Content id named by an `href` attribute value (`cid:` scheme, with
/// `%xx` escapes decoded). `None` for any other scheme.
pub fn content_id_from_href(href: &str) -> Option<String> {
    let raw = href.trim().strip_prefix(CID_SCHEME)?;
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).ok()
}

/// `href` value naming `content_id`; the inverse of [`content_id_from_href`].
/// Bytes outside the URL-safe set (including `%`, spaces and non-ASCII) are
/// written as `%XX`.
pub fn href_for_content_id(content_id: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(CID_SCHEME.len() + content_id.len());
    out.push_str(CID_SCHEME);
    for &b in content_id.as_bytes() {
        if b.is_ascii_alphanumeric() || b"-._~@!$&'()*+,;=:/".contains(&b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0f) as usize] as char);
        }
    }
    out
}
