//! Tests for [`PropertyPath`] parsing, rendering and JSON resolution.

use super::*;
use serde_json::json;

fn key(k: &str) -> PathSegment {
    PathSegment::Key(k.to_string())
}

mod parsing {
    use super::*;

    #[test]
    fn test_single_key() {
        let path = PropertyPath::parse("event").unwrap();
        assert_eq!(path.segments(), &[key("event")]);
        assert_eq!(path.first(), &key("event"));
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn test_dotted_keys() {
        let path = PropertyPath::parse("event.type").unwrap();
        assert_eq!(path.segments(), &[key("event"), key("type")]);
    }

    #[test]
    fn test_mixed_dot_and_index() {
        let path = PropertyPath::parse("events[2].data[0][1]").unwrap();
        assert_eq!(
            path.segments(),
            &[
                key("events"),
                PathSegment::Index(2),
                key("data"),
                PathSegment::Index(0),
                PathSegment::Index(1),
            ]
        );
    }

    #[test]
    fn test_quoted_keys_may_contain_dots() {
        let path = PropertyPath::parse(r#"data["dotted.key"]['single'].tail"#).unwrap();
        assert_eq!(
            path.segments(),
            &[key("data"), key("dotted.key"), key("single"), key("tail")]
        );
    }

    #[test]
    fn test_leading_bracket() {
        let path = PropertyPath::parse("['root'][0]").unwrap();
        assert_eq!(path.segments(), &[key("root"), PathSegment::Index(0)]);
    }

    #[test]
    fn test_escaped_quote_inside_key() {
        let path = PropertyPath::parse(r#"["say \"hi\""]"#).unwrap();
        assert_eq!(path.segments(), &[key(r#"say "hi""#)]);
    }

    #[test]
    fn test_attribute_key_is_plain_identifier() {
        let path = PropertyPath::parse("Event.@type").unwrap();
        assert_eq!(path.segments(), &[key("Event"), key("@type")]);
    }

    #[test]
    fn test_from_str() {
        let path: PropertyPath = "a.b".parse().unwrap();
        assert_eq!(path.len(), 2);
    }
}

mod errors {
    use super::*;

    #[test]
    fn test_empty_path() {
        assert_eq!(PropertyPath::parse(""), Err(PathError::Empty));
    }

    #[test]
    fn test_empty_segments() {
        assert_eq!(
            PropertyPath::parse(".a"),
            Err(PathError::EmptySegment { position: 0 })
        );
        assert_eq!(
            PropertyPath::parse("a..b"),
            Err(PathError::EmptySegment { position: 2 })
        );
        assert_eq!(
            PropertyPath::parse("a."),
            Err(PathError::EmptySegment { position: 2 })
        );
        assert_eq!(
            PropertyPath::parse("a[]"),
            Err(PathError::EmptySegment { position: 1 })
        );
        assert_eq!(
            PropertyPath::parse("a['']"),
            Err(PathError::EmptySegment { position: 1 })
        );
    }

    #[test]
    fn test_unterminated_bracket() {
        assert_eq!(
            PropertyPath::parse("a[0"),
            Err(PathError::UnterminatedBracket { position: 1 })
        );
        assert_eq!(
            PropertyPath::parse("a["),
            Err(PathError::UnterminatedBracket { position: 1 })
        );
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(
            PropertyPath::parse("a['key"),
            Err(PathError::UnterminatedQuote { position: 1 })
        );
    }

    #[test]
    fn test_invalid_index() {
        assert_eq!(
            PropertyPath::parse("a[x]"),
            Err(PathError::InvalidIndex {
                position: 2,
                value: "x".to_string()
            })
        );
        assert!(matches!(
            PropertyPath::parse("a[-1]"),
            Err(PathError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_stray_characters() {
        assert_eq!(
            PropertyPath::parse("a]"),
            Err(PathError::UnexpectedCharacter {
                position: 1,
                character: ']'
            })
        );
        assert_eq!(
            PropertyPath::parse("a[0]b"),
            Err(PathError::UnexpectedCharacter {
                position: 4,
                character: 'b'
            })
        );
        assert_eq!(
            PropertyPath::parse("a['k'x]"),
            Err(PathError::UnexpectedCharacter {
                position: 5,
                character: 'x'
            })
        );
    }

    #[test]
    fn test_whitespace_in_bare_key_rejected() {
        assert_eq!(
            PropertyPath::parse("a. b"),
            Err(PathError::UnexpectedCharacter {
                position: 2,
                character: ' '
            })
        );
        assert_eq!(
            PropertyPath::parse("event type"),
            Err(PathError::UnexpectedCharacter {
                position: 5,
                character: ' '
            })
        );
        assert!(PropertyPath::parse("a.b\t").is_err());
        // Quoted keys may still hold spaces.
        assert!(PropertyPath::parse("a[' b']").is_ok());
    }
}

mod display {
    use super::*;

    #[test]
    fn test_canonical_rendering() {
        let path = PropertyPath::parse("events[0]['name'].type").unwrap();
        assert_eq!(path.to_string(), "events[0].name.type");
    }

    #[test]
    fn test_non_plain_keys_use_brackets() {
        let path = PropertyPath::parse(r#"data["dotted.key"]["q\"uote"]"#).unwrap();
        assert_eq!(path.to_string(), r#"data["dotted.key"]["q\"uote"]"#);
    }

    #[test]
    fn test_rendering_parses_back_to_same_path() {
        let original = PropertyPath::parse(r#"['a b'][3]["x.y"].z"#).unwrap();
        let reparsed = PropertyPath::parse(&original.to_string()).unwrap();
        assert_eq!(original, reparsed);
    }
}

mod json_resolution {
    use super::*;

    #[test]
    fn test_resolves_nested_object() {
        let body = json!({"event": {"type": "push"}});
        let path = PropertyPath::parse("event.type").unwrap();
        assert_eq!(path.resolve_json(&body), Some(&json!("push")));
    }

    #[test]
    fn test_resolves_array_index() {
        let body = json!({"events": [{"name": "a"}, {"name": "b"}]});
        let path = PropertyPath::parse("events[1].name").unwrap();
        assert_eq!(path.resolve_json(&body), Some(&json!("b")));
    }

    #[test]
    fn test_out_of_range_index_does_not_resolve() {
        let body = json!({"events": []});
        let path = PropertyPath::parse("events[0]").unwrap();
        assert_eq!(path.resolve_json(&body), None);
    }

    #[test]
    fn test_type_mismatch_does_not_resolve() {
        let body = json!({"event": "push"});
        assert_eq!(
            PropertyPath::parse("event.type").unwrap().resolve_json(&body),
            None
        );
        assert_eq!(
            PropertyPath::parse("event[0]").unwrap().resolve_json(&body),
            None
        );
    }
}
