//! Output writer contract and a byte-stream implementation

use std::io::Write;

use crate::core::entities::{encode_attribute, encode_text};
use crate::error::{OmError, Result};

/// Event-style XML writer driven by the serializer. Names arrive already
/// split into prefix and local name; prefixes have been resolved.
pub trait XmlWriter {
    fn write_xml_declaration(&mut self, version: &str, encoding: Option<&str>) -> Result<()>;

    fn write_start_element(&mut self, prefix: &str, local_name: &str) -> Result<()>;

    /// Close the most recently started element
    fn write_end_element(&mut self) -> Result<()>;

    fn write_attribute(&mut self, prefix: &str, local_name: &str, value: &str) -> Result<()>;

    /// `xmlns:prefix="uri"` on the current start tag
    fn write_namespace(&mut self, prefix: &str, uri: &str) -> Result<()>;

    /// `xmlns="uri"` on the current start tag; an empty URI undeclares
    fn write_default_namespace(&mut self, uri: &str) -> Result<()> {
        self.write_namespace("", uri)
    }

    fn write_characters(&mut self, text: &str) -> Result<()>;
    fn write_cdata(&mut self, text: &str) -> Result<()>;
    fn write_comment(&mut self, text: &str) -> Result<()>;
    fn write_processing_instruction(&mut self, target: &str, data: &str) -> Result<()>;
    fn write_doctype(&mut self, body: &str) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}

impl<W: XmlWriter + ?Sized> XmlWriter for &mut W {
    fn write_xml_declaration(&mut self, version: &str, encoding: Option<&str>) -> Result<()> {
        (**self).write_xml_declaration(version, encoding)
    }
    fn write_start_element(&mut self, prefix: &str, local_name: &str) -> Result<()> {
        (**self).write_start_element(prefix, local_name)
    }
    fn write_end_element(&mut self) -> Result<()> {
        (**self).write_end_element()
    }
    fn write_attribute(&mut self, prefix: &str, local_name: &str, value: &str) -> Result<()> {
        (**self).write_attribute(prefix, local_name, value)
    }
    fn write_namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
        (**self).write_namespace(prefix, uri)
    }
    fn write_default_namespace(&mut self, uri: &str) -> Result<()> {
        (**self).write_default_namespace(uri)
    }
    fn write_characters(&mut self, text: &str) -> Result<()> {
        (**self).write_characters(text)
    }
    fn write_cdata(&mut self, text: &str) -> Result<()> {
        (**self).write_cdata(text)
    }
    fn write_comment(&mut self, text: &str) -> Result<()> {
        (**self).write_comment(text)
    }
    fn write_processing_instruction(&mut self, target: &str, data: &str) -> Result<()> {
        (**self).write_processing_instruction(target, data)
    }
    fn write_doctype(&mut self, body: &str) -> Result<()> {
        (**self).write_doctype(body)
    }
    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Writes XML text to any [`std::io::Write`].
///
/// The `>` of a start tag is held back until the next event so that an
/// element without content is written as `<c/>`.
pub struct StreamWriter<W: Write> {
    out: W,
    /// Qualified names of open elements
    open: Vec<String>,
    start_tag_open: bool,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(out: W) -> Self {
        StreamWriter {
            out,
            open: Vec::with_capacity(32),
            start_tag_open: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Recover the underlying output
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Number of elements started and not yet ended
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn close_start_tag(&mut self) -> Result<()> {
        if self.start_tag_open {
            self.out.write_all(b">")?;
            self.start_tag_open = false;
        }
        Ok(())
    }

    fn write_qname(&mut self, prefix: &str, local_name: &str) -> Result<()> {
        if !prefix.is_empty() {
            self.out.write_all(prefix.as_bytes())?;
            self.out.write_all(b":")?;
        }
        self.out.write_all(local_name.as_bytes())?;
        Ok(())
    }

    fn require_start_tag(&self) -> Result<()> {
        if !self.start_tag_open {
            return Err(OmError::InvalidOperation("attribute written outside a start tag"));
        }
        Ok(())
    }
}

impl<W: Write> XmlWriter for StreamWriter<W> {
    fn write_xml_declaration(&mut self, version: &str, encoding: Option<&str>) -> Result<()> {
        write!(self.out, "<?xml version=\"{}\"", version)?;
        if let Some(encoding) = encoding {
            write!(self.out, " encoding=\"{}\"", encoding)?;
        }
        self.out.write_all(b"?>")?;
        Ok(())
    }

    fn write_start_element(&mut self, prefix: &str, local_name: &str) -> Result<()> {
        self.close_start_tag()?;
        self.out.write_all(b"<")?;
        self.write_qname(prefix, local_name)?;
        self.start_tag_open = true;
        self.open.push(if prefix.is_empty() {
            local_name.to_string()
        } else {
            format!("{}:{}", prefix, local_name)
        });
        Ok(())
    }

    fn write_end_element(&mut self) -> Result<()> {
        let name = self
            .open
            .pop()
            .ok_or(OmError::InvalidOperation("end element without a matching start"))?;
        if self.start_tag_open {
            self.out.write_all(b"/>")?;
            self.start_tag_open = false;
        } else {
            self.out.write_all(b"</")?;
            self.out.write_all(name.as_bytes())?;
            self.out.write_all(b">")?;
        }
        Ok(())
    }

    fn write_attribute(&mut self, prefix: &str, local_name: &str, value: &str) -> Result<()> {
        self.require_start_tag()?;
        self.out.write_all(b" ")?;
        self.write_qname(prefix, local_name)?;
        self.out.write_all(b"=\"")?;
        self.out.write_all(encode_attribute(value).as_bytes())?;
        self.out.write_all(b"\"")?;
        Ok(())
    }

    fn write_namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.require_start_tag()?;
        if prefix.is_empty() {
            self.out.write_all(b" xmlns=\"")?;
        } else {
            write!(self.out, " xmlns:{}=\"", prefix)?;
        }
        self.out.write_all(encode_attribute(uri).as_bytes())?;
        self.out.write_all(b"\"")?;
        Ok(())
    }

    fn write_characters(&mut self, text: &str) -> Result<()> {
        self.close_start_tag()?;
        self.out.write_all(encode_text(text).as_bytes())?;
        Ok(())
    }

    fn write_cdata(&mut self, text: &str) -> Result<()> {
        self.close_start_tag()?;
        // "]]>" cannot appear inside a section; split it across two
        let mut rest = text;
        self.out.write_all(b"<![CDATA[")?;
        while let Some(pos) = rest.find("]]>") {
            self.out.write_all(rest[..pos + 2].as_bytes())?;
            self.out.write_all(b"]]><![CDATA[")?;
            rest = &rest[pos + 2..];
        }
        self.out.write_all(rest.as_bytes())?;
        self.out.write_all(b"]]>")?;
        Ok(())
    }

    fn write_comment(&mut self, text: &str) -> Result<()> {
        self.close_start_tag()?;
        write!(self.out, "<!--{}-->", text)?;
        Ok(())
    }

    fn write_processing_instruction(&mut self, target: &str, data: &str) -> Result<()> {
        self.close_start_tag()?;
        if data.is_empty() {
            write!(self.out, "<?{}?>", target)?;
        } else {
            write!(self.out, "<?{} {}?>", target, data)?;
        }
        Ok(())
    }

    fn write_doctype(&mut self, body: &str) -> Result<()> {
        self.close_start_tag()?;
        write!(self.out, "<!DOCTYPE {}>", body)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.close_start_tag()?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(w: StreamWriter<Vec<u8>>) -> String {
        String::from_utf8(w.into_inner()).unwrap()
    }

    #[test]
    fn test_empty_element_collapses() {
        let mut w = StreamWriter::new(Vec::new());
        w.write_start_element("", "a").unwrap();
        w.write_start_element("p", "c").unwrap();
        w.write_namespace("p", "urn:p").unwrap();
        w.write_end_element().unwrap();
        w.write_characters("x<y").unwrap();
        w.write_end_element().unwrap();
        assert_eq!(output(w), r#"<a><p:c xmlns:p="urn:p"/>x&lt;y</a>"#);
    }

    #[test]
    fn test_attribute_escaping() {
        let mut w = StreamWriter::new(Vec::new());
        w.write_start_element("", "a").unwrap();
        w.write_attribute("", "v", "\"1\" & <2>").unwrap();
        w.write_default_namespace("").unwrap();
        w.write_end_element().unwrap();
        assert_eq!(output(w), r#"<a v="&quot;1&quot; &amp; &lt;2&gt;" xmlns=""/>"#);
    }

    #[test]
    fn test_attribute_outside_start_tag() {
        let mut w = StreamWriter::new(Vec::new());
        w.write_start_element("", "a").unwrap();
        w.write_characters("t").unwrap();
        assert!(w.write_attribute("", "late", "1").is_err());
        w.write_end_element().unwrap();
        assert!(w.write_end_element().is_err());
    }

    #[test]
    fn test_cdata_split() {
        let mut w = StreamWriter::new(Vec::new());
        w.write_start_element("", "a").unwrap();
        w.write_cdata("x]]>y").unwrap();
        w.write_end_element().unwrap();
        assert_eq!(output(w), "<a><![CDATA[x]]]]><![CDATA[>y]]></a>");
    }

    #[test]
    fn test_prolog_constructs() {
        let mut w = StreamWriter::new(Vec::new());
        w.write_xml_declaration("1.0", Some("UTF-8")).unwrap();
        w.write_doctype("a SYSTEM \"a.dtd\"").unwrap();
        w.write_processing_instruction("pi", "d").unwrap();
        w.write_comment("c").unwrap();
        assert_eq!(
            output(w),
            r#"<?xml version="1.0" encoding="UTF-8"?><!DOCTYPE a SYSTEM "a.dtd"><?pi d?><!--c-->"#
        );
    }
}
