//! keyvalues2 decoding.

use crate::codec::keyvalues2::lexer::{Lexer, Token};
use crate::codec::keyvalues2::value::{parse_array, parse_scalar};
use crate::codec::keyvalues2::ENCODING;
use crate::codec::{Header, LoadMode, LoadOptions};
use crate::error::DecodeError;
use crate::limits::{MAX_ARRAY_LEN, MAX_ATTRIBUTES, MAX_NESTING_DEPTH};
use crate::model::{Document, DocumentOptions, Element, ElementArray, ElementId, Value, ValueKind, ValueType};

/// Decodes keyvalues2 text into a new document.
///
/// The first top-level element becomes the root. Text is always decoded
/// eagerly; [`LoadMode::Deferred`] is accepted and ignored.
pub fn decode_document(header: &Header, body: &[u8], options: &LoadOptions) -> Result<Document, DecodeError> {
    let text = std::str::from_utf8(body).map_err(|e| DecodeError::InvalidUtf8 {
        field: "keyvalues2 body",
        offset: e.valid_up_to(),
    })?;
    if options.mode == LoadMode::Deferred {
        tracing::debug!("keyvalues2 has no deferred mode, decoding eagerly");
    }

    let document = Document::with_options(DocumentOptions {
        max_elements: options.max_elements,
        allow_random_ids: true,
    });
    document.set_format(header.format.clone(), header.format_version);
    document.set_encoding(ENCODING, header.encoding_version);

    // The header occupies line 1.
    let mut parser = Parser {
        lexer: Lexer::new(text, 2),
        document: &document,
    };
    let mut top_level = Vec::new();
    while parser.lexer.peek()?.is_some() {
        let class_name = parser.lexer.expect_text("element class name")?;
        top_level.push(parser.element_body(class_name, 0)?);
    }

    document.set_root(top_level.first())?;
    tracing::debug!(
        top_level = top_level.len(),
        elements = document.len(),
        "decoded keyvalues2 body"
    );
    Ok(document)
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    document: &'a Document,
}

impl Parser<'_> {
    /// Parses `{ "id" .. "name" .. attributes }` after the class name.
    fn element_body(&mut self, class_name: String, depth: usize) -> Result<Element, DecodeError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(DecodeError::LengthExceedsLimit {
                field: "element nesting",
                len: depth,
                max: MAX_NESTING_DEPTH,
            });
        }
        self.lexer.expect(Token::OpenBrace)?;

        let key = self.lexer.expect_text("\"id\"")?;
        if key != "id" {
            return Err(self.lexer.syntax(format!("element must begin with \"id\", found {key:?}")));
        }
        let id_type = self.lexer.expect_text("\"elementid\"")?;
        if id_type != "elementid" {
            return Err(self.lexer.syntax(format!("\"id\" must have type elementid, found {id_type:?}")));
        }
        let id = ElementId::parse(&self.lexer.expect_text("element id")?)?;
        let element = self.document.define_element(id, String::new(), class_name)?;

        let mut named = false;
        let mut count = 0usize;
        loop {
            let name = match self.lexer.next_token()? {
                Some(Token::CloseBrace) => break,
                Some(Token::Text(name)) => name,
                Some(token) => {
                    return Err(self
                        .lexer
                        .syntax(format!("expected attribute name or '}}', found {}", token.describe())))
                }
                None => return Err(self.lexer.syntax(format!("element {id} is not closed"))),
            };
            let type_name = self.lexer.expect_text("attribute type")?;
            if !named && name == "name" && type_name == "string" {
                element.set_name(self.lexer.expect_text("element name")?);
                named = true;
                continue;
            }
            let value = self.attribute_value(&type_name, depth)?;
            count += 1;
            if count > MAX_ATTRIBUTES {
                return Err(DecodeError::LengthExceedsLimit {
                    field: "attribute_count",
                    len: count,
                    max: MAX_ATTRIBUTES,
                });
            }
            element.insert_unchecked(name, value);
        }

        if !named {
            return Err(self.lexer.syntax(format!("element {id} has no \"name\"")));
        }
        Ok(element)
    }

    fn attribute_value(&mut self, type_name: &str, depth: usize) -> Result<Value, DecodeError> {
        // `"attr" "Class" { .. }` defines the referenced element inline.
        if self.lexer.peek()? == Some(&Token::OpenBrace) {
            let child = self.element_body(type_name.to_string(), depth + 1)?;
            return Ok(Value::Element(Some(child.id())));
        }

        let value_type = ValueType::from_name(type_name).ok_or_else(|| DecodeError::UnknownTypeName {
            name: type_name.to_string(),
            line: self.lexer.line(),
        })?;
        match (value_type.kind, value_type.is_array) {
            (ValueKind::Element, false) => {
                let guid = self.lexer.expect_text("element id")?;
                Ok(Value::Element(self.reference(&guid)?))
            }
            (ValueKind::Element, true) => {
                let ids = self.list(|parser| parser.element_item(depth))?;
                Ok(Value::ElementArray(ElementArray::from_ids_unchecked(self.document, ids)))
            }
            (kind, true) => {
                let items = self.list(|parser| parser.lexer.expect_text("array item"))?;
                parse_array(kind, &items).map_err(|text| self.invalid(value_type, text))
            }
            (kind, false) => {
                let text = self.lexer.expect_text("attribute value")?;
                parse_scalar(kind, &text).ok_or_else(|| self.invalid(value_type, text))
            }
        }
    }

    /// One item of an element array: an inline definition or a reference.
    fn element_item(&mut self, depth: usize) -> Result<Option<ElementId>, DecodeError> {
        let head = self.lexer.expect_text("element")?;
        if head == "element" && self.lexer.peek()? != Some(&Token::OpenBrace) {
            let guid = self.lexer.expect_text("element id")?;
            return self.reference(&guid);
        }
        self.element_body(head, depth + 1).map(|child| Some(child.id()))
    }

    /// Resolves a reference token. Unknown IDs get a stub that a later
    /// definition in the same text promotes.
    fn reference(&mut self, guid: &str) -> Result<Option<ElementId>, DecodeError> {
        if guid.is_empty() {
            return Ok(None);
        }
        let id = ElementId::parse(guid)?;
        self.document.get_or_create_stub(id)?;
        Ok(Some(id))
    }

    /// Parses `[ item, item, .. ]`. A trailing comma is accepted.
    fn list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>, DecodeError> {
        self.lexer.expect(Token::OpenBracket)?;
        let mut items = Vec::new();
        while !self.lexer.eat(&Token::CloseBracket)? {
            if items.len() >= MAX_ARRAY_LEN {
                return Err(DecodeError::LengthExceedsLimit {
                    field: "array_count",
                    len: items.len() + 1,
                    max: MAX_ARRAY_LEN,
                });
            }
            items.push(item(self)?);
            if !self.lexer.eat(&Token::Comma)? {
                self.lexer.expect(Token::CloseBracket)?;
                break;
            }
        }
        Ok(items)
    }

    fn invalid(&self, value_type: ValueType, text: String) -> DecodeError {
        DecodeError::InvalidValue {
            value_type,
            text,
            line: self.lexer.line(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{Color, Time, Vector3};

    const ROOT_ID: &str = "6f1b2c3d-0000-4000-8000-000000000001";
    const CHILD_ID: &str = "6f1b2c3d-0000-4000-8000-000000000002";
    const SHARED_ID: &str = "6f1b2c3d-0000-4000-8000-000000000003";

    fn decode_text(text: &str) -> Result<Document, DecodeError> {
        let (header, body) = Header::parse(text.as_bytes())?;
        decode_document(&header, &text.as_bytes()[body..], &LoadOptions::default())
    }

    fn doc_text(body: &str) -> String {
        format!("<!-- dmx encoding keyvalues2 1 format model 18 -->\n{body}")
    }

    #[test]
    fn test_decode_handwritten() {
        let text = doc_text(&format!(
            r#""DmeModel"
{{
	"id" "elementid" "{ROOT_ID}"
	"name" "string" "hero"
	"visible" "bool" "1"
	"tint" "color" "255 128 0 255"
	"origin" "vector3" "1 2.5 -3"
	"start" "time" "0.25"
	"blob" "binary" "00ff"
	"counts" "int_array" [ "1", "2", "3" ]
	"tags" "string_array"
	[
		"a",
		"b"
	]
	"child" "DmeMesh"
	{{
		"id" "elementid" "{CHILD_ID}"
		"name" "string" "body"
		"shared" "element" "{SHARED_ID}"
	}}
	"others" "element_array"
	[
		"element" "{SHARED_ID}",
		"element" ""
	]
}}

"DmElement"
{{
	"id" "elementid" "{SHARED_ID}"
	"name" "string" "shared"
}}
"#
        ));
        let doc = decode_text(&text).unwrap();
        assert_eq!(doc.format(), "model");
        assert_eq!(doc.format_version(), 18);
        assert_eq!(doc.encoding(), "keyvalues2");
        assert_eq!(doc.len(), 3);

        let root = doc.root().unwrap();
        assert_eq!(root.name(), "hero");
        assert_eq!(root.class_name(), "DmeModel");
        assert_eq!(root.get_as::<bool>("visible").unwrap(), Some(true));
        assert_eq!(root.get_as::<Color>("tint").unwrap(), Some(Color::new(255, 128, 0, 255)));
        assert_eq!(root.get_as::<Vector3>("origin").unwrap(), Some(Vector3::new(1.0, 2.5, -3.0)));
        assert_eq!(root.get_as::<Time>("start").unwrap(), Some(Time::from_ticks(2500)));
        assert_eq!(root.get_as::<Vec<u8>>("blob").unwrap(), Some(vec![0x00, 0xff]));
        assert_eq!(root.get_array::<i32>("counts").unwrap().unwrap().to_vec(), vec![1, 2, 3]);
        assert_eq!(root.get_array::<String>("tags").unwrap().unwrap().to_vec(), vec!["a", "b"]);
        assert_eq!(
            root.attribute_names().unwrap(),
            vec!["visible", "tint", "origin", "start", "blob", "counts", "tags", "child", "others"]
        );

        let child = root.get_element("child").unwrap().unwrap();
        assert_eq!(child.class_name(), "DmeMesh");
        let shared = child.get_element("shared").unwrap().unwrap();
        assert!(!shared.is_stub());
        assert_eq!(shared.name(), "shared");

        let others = root.get_element_array("others").unwrap().unwrap();
        assert_eq!(others.ids(), vec![Some(shared.id()), None]);
    }

    #[test]
    fn test_unknown_reference_stays_stub() {
        let text = doc_text(&format!(
            "\"DmElement\" {{ \"id\" \"elementid\" \"{ROOT_ID}\" \"name\" \"string\" \"r\" \"ext\" \"element\" \"{CHILD_ID}\" }}"
        ));
        let doc = decode_text(&text).unwrap();
        let ext = doc.element(ElementId::parse(CHILD_ID).unwrap()).unwrap();
        assert!(ext.is_stub());
        assert!(doc.root().unwrap().id() != ext.id());
    }

    #[test]
    fn test_id_must_come_first() {
        let text = doc_text(&format!(
            "\"DmElement\"\n{{\n\"name\" \"string\" \"r\"\n\"id\" \"elementid\" \"{ROOT_ID}\"\n}}"
        ));
        let err = decode_text(&text).unwrap_err();
        assert!(matches!(err, DecodeError::Syntax { line: 4, .. }), "{err:?}");
        assert_eq!(err.kind(), ErrorKind::MalformedStream);
    }

    #[test]
    fn test_name_required() {
        let text = doc_text(&format!("\"DmElement\" {{ \"id\" \"elementid\" \"{ROOT_ID}\" }}"));
        assert!(matches!(decode_text(&text), Err(DecodeError::Syntax { .. })));
    }

    #[test]
    fn test_duplicate_definition() {
        let body = format!("\"DmElement\" {{ \"id\" \"elementid\" \"{ROOT_ID}\" \"name\" \"string\" \"r\" }}\n");
        let text = doc_text(&body.repeat(2));
        assert_eq!(decode_text(&text).unwrap_err().kind(), ErrorKind::IdentityCollision);
    }

    #[test]
    fn test_unknown_type_name() {
        let text = doc_text(&format!(
            "\"DmElement\"\n{{\n\"id\" \"elementid\" \"{ROOT_ID}\"\n\"name\" \"string\" \"r\"\n\"x\" \"vector7\" \"1\"\n}}"
        ));
        assert_eq!(
            decode_text(&text).unwrap_err(),
            DecodeError::UnknownTypeName {
                name: "vector7".into(),
                line: 6
            }
        );
    }

    #[test]
    fn test_invalid_value() {
        let text = doc_text(&format!(
            "\"DmElement\" {{ \"id\" \"elementid\" \"{ROOT_ID}\" \"name\" \"string\" \"r\" \"n\" \"int\" \"many\" }}"
        ));
        assert!(matches!(
            decode_text(&text),
            Err(DecodeError::InvalidValue { ref text, .. }) if text == "many"
        ));
    }

    #[test]
    fn test_unclosed_element() {
        let text = doc_text(&format!("\"DmElement\" {{ \"id\" \"elementid\" \"{ROOT_ID}\" \"name\" \"string\" \"r\""));
        assert!(matches!(decode_text(&text), Err(DecodeError::Syntax { .. })));
    }
}
