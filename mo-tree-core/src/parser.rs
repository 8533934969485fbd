use std::fs;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use serde_json::Value;
use thiserror::Error;

use crate::tree::MoNode;

/// Errors that can occur while parsing an export into an [`MoNode`] tree.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Input XML could not be decoded or tokenized.
    #[error("failed to parse XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Input JSON could not be tokenized.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Input bytes were not valid UTF-8 for tag/attribute extraction.
    #[error("invalid UTF-8 while parsing: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// Failed to decode an attribute value.
    #[error("failed to decode attribute text: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),
    /// Failed to read input file.
    #[error("failed to read export file: {0}")]
    Io(#[from] std::io::Error),
    /// Structural issue in the export document.
    #[error("malformed export: {0}")]
    Malformed(String),
}

/// Parse export bytes into an [`MoNode`] tree, auto-detecting JSON or XML
/// from the first non-whitespace byte.
pub fn parse(bytes: &[u8]) -> Result<MoNode, ParseError> {
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') | Some(b'[') => parse_json(bytes),
        Some(b'<') => parse_xml(bytes),
        Some(_) => Err(ParseError::Malformed(
            "input is neither a JSON nor an XML export".to_string(),
        )),
        None => Err(ParseError::Malformed("empty input".to_string())),
    }
}

/// Parse an export file into an [`MoNode`] tree.
pub fn parse_file(path: &Path) -> Result<MoNode, ParseError> {
    let bytes = fs::read(path)?;
    parse(&bytes)
}

/// Parse a JSON export into an [`MoNode`] tree.
///
/// Accepts the three shapes APIC produces: an object with an `imdata`
/// array, a bare single-class object (`{"polUni": {...}}`), and a bare
/// array of single-class objects. Each managed object is a single-key map
/// from class tag to a body holding optional `attributes` and `children`.
pub fn parse_json(bytes: &[u8]) -> Result<MoNode, ParseError> {
    let value: Value = serde_json::from_slice(bytes)?;
    match &value {
        Value::Object(map) => {
            if let Some(imdata) = map.get("imdata") {
                let list = imdata.as_array().ok_or_else(|| {
                    ParseError::Malformed("imdata is not an array".to_string())
                })?;
                collect_imdata(list)
            } else {
                single_key_node(&value)
            }
        }
        Value::Array(list) => collect_imdata(list),
        _ => Err(ParseError::Malformed(
            "top level is neither an object nor an array".to_string(),
        )),
    }
}

fn collect_imdata(list: &[Value]) -> Result<MoNode, ParseError> {
    let mut root = MoNode::new("imdata");
    for item in list {
        root.children.push(single_key_node(item)?);
    }
    Ok(root)
}

fn single_key_node(value: &Value) -> Result<MoNode, ParseError> {
    let obj = value.as_object().ok_or_else(|| {
        ParseError::Malformed("managed object entry is not an object".to_string())
    })?;
    if obj.len() > 1 {
        return Err(ParseError::Malformed(format!(
            "managed object entry must have exactly one class key, found {}",
            obj.len()
        )));
    }
    let (class, body) = match obj.iter().next() {
        Some(entry) => entry,
        None => {
            return Err(ParseError::Malformed(
                "empty managed object entry".to_string(),
            ))
        }
    };
    build_json_node(class, body)
}

fn build_json_node(class: &str, body: &Value) -> Result<MoNode, ParseError> {
    let body = body.as_object().ok_or_else(|| {
        ParseError::Malformed(format!("body of {class} is not an object"))
    })?;

    let mut node = MoNode::new(class);

    if let Some(attrs) = body.get("attributes") {
        let attrs = attrs.as_object().ok_or_else(|| {
            ParseError::Malformed(format!("attributes of {class} is not an object"))
        })?;
        for (key, value) in attrs {
            if let Some(text) = scalar_to_string(value) {
                node.attributes.insert(key.clone(), text);
            }
        }
    }

    if let Some(children) = body.get("children") {
        let children = children.as_array().ok_or_else(|| {
            ParseError::Malformed(format!("children of {class} is not an array"))
        })?;
        for child in children {
            node.children.push(single_key_node(child)?);
        }
    }

    Ok(node)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Parse an XML export into an [`MoNode`] tree.
///
/// Element tags become class tags and XML attributes become the attribute
/// map. Text content is ignored; APIC exports carry data exclusively in
/// attributes.
pub fn parse_xml(xml: &[u8]) -> Result<MoNode, ParseError> {
    let mut reader = Reader::from_reader(xml);

    let mut buf = Vec::new();
    let mut stack: Vec<MoNode> = Vec::new();
    let mut root: Option<MoNode> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let node = build_xml_node(&e, &reader)?;
                stack.push(node);
            }
            Event::Empty(e) => {
                let node = build_xml_node(&e, &reader)?;
                attach(node, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| {
                    ParseError::Malformed("encountered closing tag without open tag".to_string())
                })?;
                attach(node, &mut stack, &mut root)?;
            }
            Event::Eof => break,
            Event::Text(_)
            | Event::CData(_)
            | Event::Decl(_)
            | Event::PI(_)
            | Event::DocType(_)
            | Event::Comment(_) => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(ParseError::Malformed(
            "unclosed element(s) at end of document".to_string(),
        ));
    }

    root.ok_or_else(|| ParseError::Malformed("no root element found".to_string()))
}

fn attach(
    node: MoNode,
    stack: &mut Vec<MoNode>,
    root: &mut Option<MoNode>,
) -> Result<(), ParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if root.is_none() {
        *root = Some(node);
    } else {
        return Err(ParseError::Malformed(
            "multiple top-level elements found".to_string(),
        ));
    }
    Ok(())
}

fn build_xml_node(
    e: &quick_xml::events::BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<MoNode, ParseError> {
    let class = qname_to_string(e.name())?;
    let mut node = MoNode::new(class);

    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = qname_to_string(attr.key)?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())?
            .into_owned();
        node.attributes.insert(key, value);
    }

    Ok(node)
}

fn qname_to_string(name: QName<'_>) -> Result<String, ParseError> {
    Ok(std::str::from_utf8(name.as_ref())?.to_string())
}

#[cfg(test)]
mod tests {
    use super::{parse, parse_file, parse_json, parse_xml};

    #[test]
    fn parses_imdata_json_export() {
        let root = parse_json(
            br#"{
                "totalCount": "1",
                "imdata": [
                    {"fvTenant": {
                        "attributes": {"name": "t1", "descr": "prod"},
                        "children": [
                            {"fvCtx": {"attributes": {"name": "vrf1"}}}
                        ]
                    }}
                ]
            }"#,
        )
        .expect("parse");

        assert_eq!(root.class, "imdata");
        let tenant = root.get_child("fvTenant").expect("tenant");
        assert_eq!(tenant.attr("name"), Some("t1"));
        assert_eq!(
            tenant.get_child("fvCtx").and_then(|c| c.attr("name")),
            Some("vrf1")
        );
    }

    #[test]
    fn parses_bare_object_and_numeric_attributes() {
        let root = parse_json(
            br#"{"polUni": {"attributes": {"dn": "uni", "count": 3}, "children": []}}"#,
        )
        .expect("parse");

        assert_eq!(root.class, "polUni");
        assert_eq!(root.attr("count"), Some("3"));
    }

    #[test]
    fn rejects_multi_key_managed_object() {
        let err = parse_json(br#"{"imdata": [{"fvTenant": {}, "fvCtx": {}}]}"#);
        assert!(err.is_err());
    }

    #[test]
    fn parses_xml_export() {
        let root = parse_xml(
            br#"<imdata totalCount="1">
                <fvTenant name="t1"><fvBD name="bd1" descr="&amp;x"/></fvTenant>
            </imdata>"#,
        )
        .expect("parse");

        assert_eq!(root.class, "imdata");
        let bd = root
            .get_child("fvTenant")
            .and_then(|t| t.get_child("fvBD"))
            .expect("bd");
        assert_eq!(bd.attr("descr"), Some("&x"));
    }

    #[test]
    fn auto_detects_format() {
        assert_eq!(
            parse(br#"  {"imdata": []}"#).expect("json").class,
            "imdata"
        );
        assert_eq!(parse(b"<imdata/>").expect("xml").class, "imdata");
        assert!(parse(b"hostname example").is_err());
        assert!(parse(b"   ").is_err());
    }

    #[test]
    fn truncated_json_is_fatal() {
        assert!(parse(br#"{"imdata": ["#).is_err());
    }

    #[test]
    fn parse_file_reads_an_export_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("export.json");
        std::fs::write(
            &path,
            br#"{"imdata": [{"fvTenant": {"attributes": {"name": "t1"}}}]}"#,
        )
        .expect("write export");

        let root = parse_file(&path).expect("parse");
        assert_eq!(
            root.get_child("fvTenant").and_then(|t| t.attr("name")),
            Some("t1")
        );
        assert!(parse_file(&dir.path().join("absent.json")).is_err());
    }
}
