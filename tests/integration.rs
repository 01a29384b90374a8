//! Integration tests against the concrete scenarios and quantified invariants from the
//! specification's testable-properties section, plus the error-path edge cases they
//! imply. Each scenario runs whole, and split at every byte offset, since "the sequence
//! of events is identical regardless of how the input is chunked" is the core invariant
//! a push parser must satisfy.

use pretty_assertions::assert_eq;
use std::convert::Infallible;

use sx_parser::{Attributes, Doctype, Parser, ParserOptions, Reader as XmlReader, XmlDecl};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Xml(String, Option<String>, Option<bool>),
    Doctype(String),
    Start(String, Vec<(String, String)>),
    Empty(String, Vec<(String, String)>),
    End(String),
    Text(String),
    Comment(String),
    Pi(String, String),
    EntityRef(String),
}

#[derive(Default)]
struct RecordingReader {
    events: Vec<Event>,
}

fn attrs_to_vec(attributes: &Attributes) -> Vec<(String, String)> {
    attributes.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

impl XmlReader for RecordingReader {
    type Error = Infallible;

    fn start(&mut self, name: &str, attributes: &Attributes) -> Result<(), Infallible> {
        self.events.push(Event::Start(name.to_string(), attrs_to_vec(attributes)));
        Ok(())
    }

    fn empty(&mut self, name: &str, attributes: &Attributes) -> Result<(), Infallible> {
        self.events.push(Event::Empty(name.to_string(), attrs_to_vec(attributes)));
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), Infallible> {
        self.events.push(Event::End(name.to_string()));
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), Infallible> {
        self.events.push(Event::Text(text.to_string()));
        Ok(())
    }

    fn xml(&mut self, decl: &XmlDecl) -> Result<(), Infallible> {
        self.events.push(Event::Xml(decl.version.clone(), decl.encoding.clone(), decl.standalone));
        Ok(())
    }

    fn doctype(&mut self, doctype: &Doctype) -> Result<(), Infallible> {
        self.events.push(Event::Doctype(doctype.name.clone()));
        Ok(())
    }

    fn pi(&mut self, target: &str, content: &str) -> Result<(), Infallible> {
        self.events.push(Event::Pi(target.to_string(), content.to_string()));
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), Infallible> {
        self.events.push(Event::Comment(text.to_string()));
        Ok(())
    }

    fn entity_ref(&mut self, name: &str) -> Result<(), Infallible> {
        self.events.push(Event::EntityRef(name.to_string()));
        Ok(())
    }

    fn wants_entity_ref(&self) -> bool {
        true
    }
}

fn run_whole(input: &str) -> (Vec<Event>, Option<sx_parser::Error>) {
    let mut parser = Parser::new(RecordingReader::default());
    let err = parser.write(input).err().or_else(|| parser.end().err());
    (parser.into_inner().events, err)
}

fn run_split(input: &str, at: usize) -> (Vec<Event>, Option<sx_parser::Error>) {
    let mut parser = Parser::new(RecordingReader::default());
    let (a, b) = input.split_at(at);
    let err = parser
        .write(a)
        .err()
        .or_else(|| parser.write(b).err())
        .or_else(|| parser.end().err());
    (parser.into_inner().events, err)
}

fn assert_every_split(input: &str, expect: impl Fn(&[Event], Option<&sx_parser::Error>)) {
    let (events, err) = run_whole(input);
    expect(&events, err.as_ref());
    for i in 0..=input.len() {
        if !input.is_char_boundary(i) {
            continue;
        }
        let (events, err) = run_split(input, i);
        expect(&events, err.as_ref());
    }
}

#[test]
fn scenario_1_basic_start_empty_end() {
    assert_every_split(r#"<root><a attr="1 &amp; 2"/></root>"#, |events, err| {
        assert!(err.is_none(), "unexpected error: {:?}", err);
        assert_eq!(
            events,
            &[
                Event::Start("root".into(), vec![]),
                Event::Empty("a".into(), vec![("attr".into(), "1 & 2".into())]),
                Event::End("root".into()),
            ]
        );
    });
}

#[test]
fn scenario_2_xml_declaration() {
    assert_every_split(r#"<?xml version="1.0" encoding="UTF-8" standalone='yes'?><r/>"#, |events, err| {
        assert!(err.is_none(), "unexpected error: {:?}", err);
        assert_eq!(
            events,
            &[
                Event::Xml("1.0".into(), Some("utf-8".into()), Some(true)),
                Event::Empty("r".into(), vec![]),
            ]
        );
    });
}

#[test]
fn scenario_3_text_normalization() {
    assert_every_split("<a>x\r\ny\rz</a>", |events, err| {
        assert!(err.is_none(), "unexpected error: {:?}", err);
        assert_eq!(
            events,
            &[
                Event::Start("a".into(), vec![]),
                Event::Text("x\ny\nz".into()),
                Event::End("a".into()),
            ]
        );
    });
}

#[test]
fn scenario_4_cdata_transparency() {
    assert_every_split("<a>pre<![CDATA[<&]]>post</a>", |events, err| {
        assert!(err.is_none(), "unexpected error: {:?}", err);
        assert_eq!(
            events,
            &[
                Event::Start("a".into(), vec![]),
                Event::Text("pre<&post".into()),
                Event::End("a".into()),
            ]
        );
    });
}

#[test]
fn scenario_5_mismatched_end_tag() {
    assert_every_split("<a></b>", |_events, err| {
        let err = err.expect("expected an error");
        assert_eq!(err.kind(), sx_parser::ErrorKind::InvalidEndTag);
    });
}

#[test]
fn scenario_6_cdend_forbidden_in_text() {
    assert_every_split("<a>]]></a>", |_events, err| {
        let err = err.expect("expected an error");
        assert_eq!(err.kind(), sx_parser::ErrorKind::InvalidCdEnd);
    });
}

#[test]
fn scenario_6_three_brackets_are_fine() {
    assert_every_split("<a>]]]</a>", |events, err| {
        assert!(err.is_none(), "unexpected error: {:?}", err);
        assert_eq!(
            events,
            &[
                Event::Start("a".into(), vec![]),
                Event::Text("]]]".into()),
                Event::End("a".into()),
            ]
        );
    });
}

#[test]
fn numeric_char_refs_decimal_and_hex_agree() {
    let (events, err) = run_whole("<a>&#65;&#x41;</a>");
    assert!(err.is_none(), "unexpected error: {:?}", err);
    assert_eq!(
        events,
        &[
            Event::Start("a".into(), vec![]),
            Event::Text("AA".into()),
            Event::End("a".into()),
        ]
    );
}

#[test]
fn numeric_char_ref_zero_is_invalid() {
    let (_, err) = run_whole("<a>&#0;</a>");
    assert_eq!(err.unwrap().kind(), sx_parser::ErrorKind::InvalidCharRef);
}

#[test]
fn numeric_char_ref_empty_is_invalid() {
    let (_, err) = run_whole("<a>&#;</a>");
    assert_eq!(err.unwrap().kind(), sx_parser::ErrorKind::InvalidCharRef);
}

#[test]
fn numeric_char_ref_surrogate_is_invalid() {
    let (_, err) = run_whole("<a>&#xD800;</a>");
    assert_eq!(err.unwrap().kind(), sx_parser::ErrorKind::InvalidCharRef);
}

#[test]
fn duplicate_attribute_is_an_error() {
    let (_, err) = run_whole(r#"<a x="1" x="2"/>"#);
    assert_eq!(err.unwrap().kind(), sx_parser::ErrorKind::DuplicateAttr);
}

#[test]
fn attribute_order_is_preserved() {
    let (events, err) = run_whole(r#"<a z="1" a="2" m="3"/>"#);
    assert!(err.is_none(), "unexpected error: {:?}", err);
    assert_eq!(
        events,
        &[Event::Empty(
            "a".into(),
            vec![("z".into(), "1".into()), ("a".into(), "2".into()), ("m".into(), "3".into())]
        )]
    );
}

#[test]
fn literal_angle_bracket_in_attribute_value_is_an_error() {
    let (_, err) = run_whole(r#"<a x="<"/>"#);
    assert_eq!(err.unwrap().kind(), sx_parser::ErrorKind::InvalidAttributeValue);
}

#[test]
fn comment_inside_element_content_does_not_break_surrounding_text() {
    let (events, err) = run_whole("<a>before<!-- hi -->after</a>");
    assert!(err.is_none(), "unexpected error: {:?}", err);
    assert_eq!(
        events,
        &[
            Event::Start("a".into(), vec![]),
            Event::Text("before".into()),
            Event::Comment(" hi ".into()),
            Event::Text("after".into()),
            Event::End("a".into()),
        ]
    );
}

#[test]
fn pi_inside_element_content_does_not_break_surrounding_text() {
    let (events, err) = run_whole("<a>before<?pi body?>after</a>");
    assert!(err.is_none(), "unexpected error: {:?}", err);
    assert_eq!(
        events,
        &[
            Event::Start("a".into(), vec![]),
            Event::Text("before".into()),
            Event::Pi("pi".into(), "body".into()),
            Event::Text("after".into()),
            Event::End("a".into()),
        ]
    );
}

#[test]
fn doctype_name_is_reported() {
    let (events, err) = run_whole("<!DOCTYPE root SYSTEM \"root.dtd\"><root/>");
    assert!(err.is_none(), "unexpected error: {:?}", err);
    assert_eq!(events, &[Event::Doctype("root".into()), Event::Empty("root".into(), vec![])]);
}

#[test]
fn doctype_internal_subset_is_skimmed_opaquely() {
    let (events, err) = run_whole("<!DOCTYPE root [ <!ENTITY foo \"bar\"> ]><root/>");
    assert!(err.is_none(), "unexpected error: {:?}", err);
    assert_eq!(events, &[Event::Doctype("root".into()), Event::Empty("root".into(), vec![])]);
}

#[test]
fn doctype_after_root_is_an_error() {
    let (_, err) = run_whole("<root/><!DOCTYPE root>");
    assert_eq!(err.unwrap().kind(), sx_parser::ErrorKind::InvalidDoctypeDecl);
}

#[test]
fn pi_with_xml_target_is_reserved() {
    let (_, err) = run_whole("<?xml?><r/>");
    assert_eq!(err.unwrap().kind(), sx_parser::ErrorKind::ReservedPi);
}

#[test]
fn pi_stylesheet_target_is_ordinary() {
    let (events, err) = run_whole("<?xml-stylesheet href=\"x\"?><r/>");
    assert!(err.is_none(), "unexpected error: {:?}", err);
    assert_eq!(
        events,
        &[Event::Pi("xml-stylesheet".into(), "href=\"x\"".into()), Event::Empty("r".into(), vec![])]
    );
}

#[test]
fn comment_with_embedded_double_dash_is_invalid() {
    let (_, err) = run_whole("<!--a--b--><r/>");
    assert_eq!(err.unwrap().kind(), sx_parser::ErrorKind::InvalidComment);
}

#[test]
fn comment_is_reported() {
    let (events, err) = run_whole("<!-- hello -->\n<r/>");
    assert!(err.is_none(), "unexpected error: {:?}", err);
    assert_eq!(events, &[Event::Comment(" hello ".into()), Event::Empty("r".into(), vec![])]);
}

#[test]
fn second_root_element_is_an_error() {
    let (_, err) = run_whole("<a/><b/>");
    assert_eq!(err.unwrap().kind(), sx_parser::ErrorKind::InvalidStartTag);
}

#[test]
fn named_entity_in_text_is_reported_not_resolved() {
    let (events, err) = run_whole("<a>&custom;</a>");
    assert!(err.is_none(), "unexpected error: {:?}", err);
    assert_eq!(
        events,
        &[Event::Start("a".into(), vec![]), Event::EntityRef("custom".into()), Event::End("a".into())]
    );
}

#[test]
fn named_entity_in_attribute_without_resolver_is_an_error() {
    let (_, err) = run_whole(r#"<a b="&custom;"/>"#);
    assert_eq!(err.unwrap().kind(), sx_parser::ErrorKind::UnresolvedEntity);
}

struct ResolvingReader(RecordingReader);

impl XmlReader for ResolvingReader {
    type Error = Infallible;

    fn start(&mut self, name: &str, attributes: &Attributes) -> Result<(), Infallible> {
        self.0.start(name, attributes)
    }

    fn empty(&mut self, name: &str, attributes: &Attributes) -> Result<(), Infallible> {
        self.0.empty(name, attributes)
    }

    fn end(&mut self, name: &str) -> Result<(), Infallible> {
        self.0.end(name)
    }

    fn text(&mut self, text: &str) -> Result<(), Infallible> {
        self.0.text(text)
    }

    fn replace_entity_ref(&mut self, name: &str) -> Option<String> {
        if name == "custom" {
            Some("VALUE".to_string())
        } else {
            None
        }
    }
}

#[test]
fn named_entity_in_attribute_with_resolver_is_spliced_in() {
    let mut parser = Parser::new(ResolvingReader(RecordingReader::default()));
    parser.write(r#"<a b="&custom;"/>"#).unwrap();
    parser.end().unwrap();
    let events = parser.into_inner().0.events;
    assert_eq!(events, &[Event::Empty("a".into(), vec![("b".into(), "VALUE".into())])]);
}

#[derive(Default)]
struct MinimalReader {
    events: Vec<Event>,
}

impl XmlReader for MinimalReader {
    type Error = Infallible;

    fn start(&mut self, name: &str, attributes: &Attributes) -> Result<(), Infallible> {
        self.events.push(Event::Start(name.to_string(), attrs_to_vec(attributes)));
        Ok(())
    }

    fn empty(&mut self, name: &str, attributes: &Attributes) -> Result<(), Infallible> {
        self.events.push(Event::Empty(name.to_string(), attrs_to_vec(attributes)));
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), Infallible> {
        self.events.push(Event::End(name.to_string()));
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), Infallible> {
        self.events.push(Event::Text(text.to_string()));
        Ok(())
    }
}

#[test]
fn named_entity_in_text_without_wants_entity_ref_is_an_error() {
    let mut parser = Parser::new(MinimalReader::default());
    let err = parser.write("<a>&custom;</a>").err().or_else(|| parser.end().err());
    assert_eq!(err.unwrap().kind(), sx_parser::ErrorKind::UnresolvedEntity);
}

#[test]
fn predefined_entity_in_text_does_not_require_wants_entity_ref() {
    let mut parser = Parser::new(MinimalReader::default());
    parser.write("<a>&amp;</a>").unwrap();
    parser.end().unwrap();
    let events = parser.into_inner().events;
    assert_eq!(
        events,
        &[Event::Start("a".into(), vec![]), Event::Text("&".into()), Event::End("a".into())]
    );
}

#[test]
fn crlf_split_exactly_between_cr_and_lf() {
    let mut parser = Parser::new(RecordingReader::default());
    parser.write("<a>x\r").unwrap();
    parser.write("\ny</a>").unwrap();
    parser.end().unwrap();
    let events = parser.into_inner().events;
    assert_eq!(
        events,
        &[
            Event::Start("a".into(), vec![]),
            Event::Text("x\ny".into()),
            Event::End("a".into()),
        ]
    );
}

#[test]
fn lone_cr_at_chunk_boundary_not_followed_by_lf() {
    let mut parser = Parser::new(RecordingReader::default());
    parser.write("<a>x\r").unwrap();
    parser.write("y</a>").unwrap();
    parser.end().unwrap();
    let events = parser.into_inner().events;
    assert_eq!(
        events,
        &[
            Event::Start("a".into(), vec![]),
            Event::Text("x\ny".into()),
            Event::End("a".into()),
        ]
    );
}

#[test]
fn end_fails_with_an_open_element() {
    let mut parser = Parser::new(RecordingReader::default());
    parser.write("<a>").unwrap();
    let err = parser.end().unwrap_err();
    assert_eq!(err.kind(), sx_parser::ErrorKind::UnexpectedEof);
}

#[test]
fn end_fails_when_no_root_ever_appeared() {
    let mut parser = Parser::new(RecordingReader::default());
    parser.write("   \n").unwrap();
    let err = parser.end().unwrap_err();
    assert_eq!(err.kind(), sx_parser::ErrorKind::UnexpectedEof);
}

#[test]
fn end_succeeds_with_trailing_misc() {
    let mut parser = Parser::new(RecordingReader::default());
    parser.write("<r/>   \n<!-- trailing -->\n").unwrap();
    parser.end().unwrap();
}

#[test]
fn write_after_error_is_rejected() {
    let mut parser = Parser::new(RecordingReader::default());
    assert!(parser.write("<a></b>").is_err());
    let err = parser.write("more").unwrap_err();
    assert_eq!(err.kind(), sx_parser::ErrorKind::UnexpectedEof);
}

#[test]
fn incomplete_text_nodes_option_may_split_but_concatenation_matches() {
    let mut parser =
        Parser::with_options(RecordingReader::default(), ParserOptions::new().incomplete_text_nodes(true));
    parser.write("<a>hello ").unwrap();
    parser.write("world</a>").unwrap();
    parser.end().unwrap();
    let events = parser.into_inner().events;
    let concatenated: String = events
        .iter()
        .filter_map(|e| match e {
            Event::Text(t) => Some(t.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(concatenated, "hello world");
    assert!(events.iter().filter(|e| matches!(e, Event::Text(_))).count() >= 2);
}
