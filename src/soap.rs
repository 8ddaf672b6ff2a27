//! SOAP envelope policy
//!
//! SOAP is plain XML with a fixed skeleton: `Envelope`, an optional
//! `Header` first, then exactly one `Body`. The factory builds that skeleton
//! with the generic node factory; the lookups walk the lazy tree and stop
//! as soon as the wanted child has been read.

use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::error::{OmError, Result};
use crate::reader::XmlCursor;

pub const SOAP11_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP12_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// Prefix used for envelope elements created by the factory
pub const ENVELOPE_PREFIX: &str = "soapenv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

impl SoapVersion {
    pub fn envelope_namespace(self) -> &'static str {
        match self {
            SoapVersion::Soap11 => SOAP11_ENVELOPE_NS,
            SoapVersion::Soap12 => SOAP12_ENVELOPE_NS,
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "text/xml",
            SoapVersion::Soap12 => "application/soap+xml",
        }
    }

    pub fn from_namespace(uri: &str) -> Option<Self> {
        match uri {
            SOAP11_ENVELOPE_NS => Some(SoapVersion::Soap11),
            SOAP12_ENVELOPE_NS => Some(SoapVersion::Soap12),
            _ => None,
        }
    }

    /// Version of a document whose root is a SOAP `Envelope`. Reads only as
    /// far as the root start tag.
    pub fn detect<C: XmlCursor>(doc: &mut Document<C>) -> Result<Option<Self>> {
        let Some(root) = doc.document_element()? else {
            return Ok(None);
        };
        if doc.local_name(root) != Some("Envelope") {
            return Ok(None);
        }
        Ok(doc.namespace_uri(root).and_then(SoapVersion::from_namespace))
    }
}

/// SOAP-aware construction and lookup over a document
pub struct SoapFactory<'d, C: XmlCursor> {
    doc: &'d mut Document<C>,
    version: SoapVersion,
}

impl<'d, C: XmlCursor> SoapFactory<'d, C> {
    pub fn new(doc: &'d mut Document<C>, version: SoapVersion) -> Self {
        SoapFactory { doc, version }
    }

    /// Factory for a parsed envelope, `None` when the root is not one
    pub fn detect(doc: &'d mut Document<C>) -> Result<Option<Self>> {
        Ok(SoapVersion::detect(doc)?.map(|version| SoapFactory { doc, version }))
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    pub fn document(&mut self) -> &mut Document<C> {
        &mut *self.doc
    }

    fn ns(&self) -> &'static str {
        self.version.envelope_namespace()
    }

    fn is_envelope_element(&self, id: NodeId, local_name: &str) -> bool {
        self.doc.has_name(id, Some(self.ns()), local_name)
    }

    fn create(&mut self, local_name: &str) -> NodeId {
        let ns = self.ns();
        self.doc.create_element(local_name, Some(ns), Some(ENVELOPE_PREFIX))
    }

    /// Free-standing `Envelope` declaring the envelope prefix
    pub fn create_envelope(&mut self) -> Result<NodeId> {
        let envelope = self.create("Envelope");
        let ns = self.ns();
        self.doc.declare_namespace(envelope, ENVELOPE_PREFIX, ns)?;
        Ok(envelope)
    }

    /// The envelope's `Header`, created as its first child when missing
    pub fn create_header(&mut self, envelope: NodeId) -> Result<NodeId> {
        if let Some(header) = self.header(envelope)? {
            return Ok(header);
        }
        let header = self.create("Header");
        match self.doc.first_child(envelope)? {
            Some(first) => self.doc.insert_sibling_before(first, header)?,
            None => self.doc.add_child(envelope, header)?,
        }
        Ok(header)
    }

    /// The envelope's `Body`, appended when missing
    pub fn create_body(&mut self, envelope: NodeId) -> Result<NodeId> {
        if let Some(body) = self.body(envelope)? {
            return Ok(body);
        }
        let body = self.create("Body");
        self.doc.add_child(envelope, body)?;
        Ok(body)
    }

    /// Append a `Fault` to `body`. `code` is the local part of a standard
    /// fault code (`Server`, `Client` for 1.1; `Receiver`, `Sender` for 1.2).
    pub fn create_fault(&mut self, body: NodeId, code: &str, reason: &str) -> Result<NodeId> {
        let fault = self.create("Fault");
        let qualified_code = format!("{}:{}", ENVELOPE_PREFIX, code);
        match self.version {
            SoapVersion::Soap11 => {
                let faultcode = self.doc.create_element("faultcode", None, None);
                self.doc.set_text(faultcode, &qualified_code)?;
                let faultstring = self.doc.create_element("faultstring", None, None);
                self.doc.set_text(faultstring, reason)?;
                self.doc.add_child(fault, faultcode)?;
                self.doc.add_child(fault, faultstring)?;
            }
            SoapVersion::Soap12 => {
                let code_el = self.create("Code");
                let value = self.create("Value");
                self.doc.set_text(value, &qualified_code)?;
                self.doc.add_child(code_el, value)?;

                let reason_el = self.create("Reason");
                let text = self.create("Text");
                self.doc
                    .add_attribute(text, "lang", Some(crate::dom::namespace::ns::XML), Some("xml"), "en")?;
                self.doc.set_text(text, reason)?;
                self.doc.add_child(reason_el, text)?;

                self.doc.add_child(fault, code_el)?;
                self.doc.add_child(fault, reason_el)?;
            }
        }
        // The code text is a QName in the envelope prefix
        let ns = self.ns();
        self.doc.declare_namespace(fault, ENVELOPE_PREFIX, ns)?;
        self.doc.add_child(body, fault)?;
        debug!(version = ?self.version, code, "created SOAP fault");
        Ok(fault)
    }

    /// `Header` if it is the first child element. Reads no further than
    /// that element's start tag.
    pub fn header(&mut self, envelope: NodeId) -> Result<Option<NodeId>> {
        let first = self.doc.first_child_element(envelope)?;
        Ok(first.filter(|&id| self.is_envelope_element(id, "Header")))
    }

    /// First `Body` child. Reads no further than its start tag.
    pub fn body(&mut self, envelope: NodeId) -> Result<Option<NodeId>> {
        let ns = self.ns();
        self.doc.first_child_with_name(envelope, Some(ns), "Body")
    }

    /// Check the envelope skeleton. Reads all children of the envelope.
    pub fn validate_envelope(&mut self, envelope: NodeId) -> Result<()> {
        if !self.is_envelope_element(envelope, "Envelope") {
            return Err(OmError::Soap(format!(
                "root is not an Envelope in {}",
                self.ns()
            )));
        }

        let children = self.doc.child_elements(envelope)?;
        let mut body_seen = false;
        for (index, &child) in children.iter().enumerate() {
            if self.is_envelope_element(child, "Header") {
                if index != 0 {
                    return Err(OmError::Soap("Header must be the first child of Envelope".to_string()));
                }
            } else if self.is_envelope_element(child, "Body") {
                if body_seen {
                    return Err(OmError::Soap("Envelope has more than one Body".to_string()));
                }
                body_seen = true;
            } else if body_seen && self.version == SoapVersion::Soap12 {
                return Err(OmError::Soap("SOAP 1.2 forbids elements after Body".to_string()));
            } else if !body_seen && self.version == SoapVersion::Soap12 {
                return Err(OmError::Soap(format!(
                    "unexpected element '{}' in Envelope",
                    self.doc.local_name(child).unwrap_or_default()
                )));
            }
        }
        if !body_seen {
            return Err(OmError::Soap("Envelope has no Body".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::XmlStreamReader;
    use crate::serializer::StreamWriter;

    const ENVELOPE: &str = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Header><h/></s:Header><s:Body><payload>x</payload></s:Body></s:Envelope>"#;

    #[test]
    fn test_detect_reads_only_root() {
        let mut doc = Document::open(XmlStreamReader::new(ENVELOPE));
        assert_eq!(SoapVersion::detect(&mut doc).unwrap(), Some(SoapVersion::Soap12));
        let root = doc.document_element().unwrap().unwrap();
        assert_eq!(doc.tree().node(root).unwrap().first_child, None);
        assert_eq!(SoapVersion::Soap12.media_type(), "application/soap+xml");
    }

    #[test]
    fn test_body_lookup_is_lazy() {
        let mut doc = Document::open(XmlStreamReader::new(ENVELOPE));
        let mut soap = SoapFactory::detect(&mut doc).unwrap().unwrap();
        let env = soap.document().document_element().unwrap().unwrap();
        let header = soap.header(env).unwrap().unwrap();
        let body = soap.body(env).unwrap().unwrap();
        assert!(soap.document().is_complete(header).unwrap());
        assert!(!soap.document().is_complete(body).unwrap());
        soap.validate_envelope(env).unwrap();
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"/>"#,
            r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Body/><s:Header/></s:Envelope>"#,
            r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Body/><s:Body/></s:Envelope>"#,
            r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Body/><extra/></s:Envelope>"#,
        ];
        for xml in cases {
            let mut doc = Document::open(XmlStreamReader::new(xml));
            let mut soap = SoapFactory::detect(&mut doc).unwrap().unwrap();
            let env = soap.document().document_element().unwrap().unwrap();
            assert!(matches!(soap.validate_envelope(env), Err(OmError::Soap(_))), "{}", xml);
        }
    }

    #[test]
    fn test_soap11_allows_trailing_elements() {
        let xml = r#"<e:Envelope xmlns:e="http://schemas.xmlsoap.org/soap/envelope/"><e:Body/><trailer/></e:Envelope>"#;
        let mut doc = Document::open(XmlStreamReader::new(xml));
        let mut soap = SoapFactory::detect(&mut doc).unwrap().unwrap();
        assert_eq!(soap.version(), SoapVersion::Soap11);
        let env = soap.document().document_element().unwrap().unwrap();
        soap.validate_envelope(env).unwrap();
    }

    #[test]
    fn test_build_soap11_fault() {
        let mut doc = Document::new();
        let mut soap = SoapFactory::new(&mut doc, SoapVersion::Soap11);
        let env = soap.create_envelope().unwrap();
        let body = soap.create_body(env).unwrap();
        let header = soap.create_header(env).unwrap();
        soap.create_fault(body, "Server", "boom").unwrap();
        assert_eq!(soap.header(env).unwrap(), Some(header));
        soap.validate_envelope(env).unwrap();

        let root = doc.root();
        doc.add_child(root, env).unwrap();
        let mut w = StreamWriter::new(Vec::new());
        doc.serialize(root, &mut w).unwrap();
        assert_eq!(
            String::from_utf8(w.into_inner()).unwrap(),
            concat!(
                r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">"#,
                "<soapenv:Header/><soapenv:Body><soapenv:Fault>",
                "<faultcode>soapenv:Server</faultcode><faultstring>boom</faultstring>",
                "</soapenv:Fault></soapenv:Body></soapenv:Envelope>"
            )
        );
    }

    #[test]
    fn test_build_soap12_fault() {
        let mut doc = Document::new();
        let mut soap = SoapFactory::new(&mut doc, SoapVersion::Soap12);
        let env = soap.create_envelope().unwrap();
        let body = soap.create_body(env).unwrap();
        let fault = soap.create_fault(body, "Receiver", "boom").unwrap();

        let doc = soap.document();
        let code = doc.first_child_element(fault).unwrap().unwrap();
        let value = doc.first_child_element(code).unwrap().unwrap();
        assert_eq!(doc.text(value).unwrap(), "soapenv:Receiver");
        let reason = doc.next_sibling_element(code).unwrap().unwrap();
        let text = doc.first_child_element(reason).unwrap().unwrap();
        assert_eq!(
            doc.attribute_value(text, Some(crate::dom::namespace::ns::XML), "lang").unwrap(),
            Some("en")
        );
    }
}
