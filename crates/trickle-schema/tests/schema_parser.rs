//! End-to-end behavior of schemas resolved against a streaming parse.
//!
//! Each test plays the role of a consumer receiving fragments from a
//! producer: feed a chunk, resolve, look at the answer, repeat — always
//! threading the cache through like a real caller would.

use serde_json::json;
use trickle_parse::{ParserError, ParserState};
use trickle_schema::{self as s, Resolution, ResolutionCache, Schema, from_json_ast};

/// A parser state plus the cache threaded across resolutions.
struct Session {
    state: ParserState,
    cache: ResolutionCache,
}

impl Session {
    fn new() -> Self {
        Session {
            state: ParserState::new(),
            cache: ResolutionCache::new(),
        }
    }

    fn feed(&mut self, chunk: &str) {
        self.state.parse_chunk(chunk);
    }

    fn resolve(&mut self, schema: &Schema) -> Resolution {
        let cache = std::mem::take(&mut self.cache);
        let (result, cache) = from_json_ast(schema, &self.state, cache);
        self.cache = cache;
        result
    }
}

#[test]
fn streaming_string_emits_partials() {
    let schema = s::streaming::string("text");
    let mut session = Session::new();

    session.feed(r#""he"#);
    assert_eq!(session.resolve(&schema), Resolution::Match(json!("he")));

    session.feed("llo");
    assert_eq!(session.resolve(&schema), Resolution::Match(json!("hello")));

    session.feed(r#"""#);
    assert_eq!(session.resolve(&schema), Resolution::Match(json!("hello")));
}

#[test]
fn plain_string_waits_for_the_closing_quote() {
    let schema = s::string("text");
    let mut session = Session::new();

    session.feed(r#""he"#);
    assert_eq!(session.resolve(&schema), Resolution::Pending);

    session.feed(r#"llo""#);
    assert_eq!(session.resolve(&schema), Resolution::Match(json!("hello")));
}

#[test]
fn streaming_array_matches_its_settled_prefix() {
    let schema = s::streaming::array("numbers", s::number("n"));
    let mut session = Session::new();

    session.feed("[1");
    // 1 might continue as 12, so it has not settled yet.
    assert_eq!(session.resolve(&schema), Resolution::Match(json!([])));

    session.feed(",");
    assert_eq!(session.resolve(&schema), Resolution::Match(json!([1])));

    session.feed("2,3]");
    assert_eq!(session.resolve(&schema), Resolution::Match(json!([1, 2, 3])));
}

#[test]
fn streaming_array_of_strings_omits_the_open_tail() {
    let schema = s::streaming::array("words", s::string("w"));
    let mut session = Session::new();

    session.feed(r#"["a","b"#);
    assert_eq!(session.resolve(&schema), Resolution::Match(json!(["a"])));

    session.feed(r#"""#);
    assert_eq!(session.resolve(&schema), Resolution::Match(json!(["a", "b"])));
}

#[test]
fn plain_array_requires_closure() {
    let schema = s::array("numbers", s::number("n"));
    let mut session = Session::new();

    session.feed("[1,2");
    assert_eq!(session.resolve(&schema), Resolution::Pending);

    session.feed("]");
    assert_eq!(session.resolve(&schema), Resolution::Match(json!([1, 2])));
}

#[test]
fn strict_object_goes_pending_while_fields_are_missing() {
    let schema = s::object(
        "pair",
        vec![("a", s::string("first")), ("b", s::string("second"))],
    );
    let mut session = Session::new();

    session.feed(r#"{"a":"hi""#);
    assert_eq!(session.resolve(&schema), Resolution::Pending);

    // All fields present and matched: the object matches even though
    // its closing brace has not arrived.
    session.feed(r#","b":"yo""#);
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!({"a": "hi", "b": "yo"}))
    );

    session.feed("}");
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!({"a": "hi", "b": "yo"}))
    );
}

#[test]
fn strict_object_missing_field_after_close_is_invalid() {
    let schema = s::object(
        "pair",
        vec![("a", s::string("first")), ("b", s::string("second"))],
    );
    let mut session = Session::new();

    session.feed(r#"{"a":"hi"}"#);
    let result = session.resolve(&schema);
    let Resolution::Invalid(ParserError::SchemaInvalid { path, reason }) = result else {
        panic!("expected invalid, got {:?}", result);
    };
    assert_eq!(path, "$.b");
    assert_eq!(reason, "missing required field");
}

#[test]
fn objects_reject_undeclared_fields() {
    let schema = s::object("narrow", vec![("a", s::number("a"))]);
    let mut session = Session::new();

    session.feed(r#"{"a":1,"b":2}"#);
    let result = session.resolve(&schema);
    let Resolution::Invalid(ParserError::SchemaInvalid { path, reason }) = result else {
        panic!("expected invalid, got {:?}", result);
    };
    assert_eq!(path, "$.b");
    assert_eq!(reason, "unexpected field");
}

#[test]
fn streaming_objects_reject_undeclared_fields_too() {
    let schema = s::streaming::object("narrow", vec![("a", s::streaming::string("a"))]);
    let mut session = Session::new();

    session.feed(r#"{"a":"x""#);
    assert_eq!(session.resolve(&schema), Resolution::Match(json!({"a": "x"})));

    // The key lands on the node as soon as its value starts, so the
    // rejection does not wait for the closing brace.
    session.feed(r#","b":4"#);
    assert!(matches!(session.resolve(&schema), Resolution::Invalid(_)));
}

#[test]
fn nullish_field_may_be_absent() {
    let schema = s::object(
        "entry",
        vec![("name", s::string("name")), ("note", s::nullish("optional note"))],
    );
    let mut session = Session::new();

    session.feed(r#"{"name":"Ada"}"#);
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!({"name": "Ada", "note": null}))
    );
}

#[test]
fn nullish_matches_an_explicit_null() {
    let schema = s::nullish("nothing");
    let mut session = Session::new();

    session.feed("nu");
    assert_eq!(session.resolve(&schema), Resolution::Pending);

    session.feed("ll");
    assert_eq!(session.resolve(&schema), Resolution::Match(json!(null)));
}

#[test]
fn streaming_object_emits_fields_incrementally() {
    let schema = s::streaming::object(
        "post",
        vec![
            ("title", s::streaming::string("title")),
            ("body", s::streaming::string("body")),
        ],
    );
    let mut session = Session::new();

    // Missing streaming fields present as empty defaults.
    session.feed("{");
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!({"title": "", "body": ""}))
    );

    session.feed(r#""title":"He"#);
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!({"title": "He", "body": ""}))
    );

    session.feed(r#"llo","body":"Wor"#);
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!({"title": "Hello", "body": "Wor"}))
    );

    session.feed(r#"ld"}"#);
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!({"title": "Hello", "body": "World"}))
    );
}

#[test]
fn streaming_object_defaults_a_missing_object_to_empty() {
    let schema = s::streaming::object(
        "doc",
        vec![
            (
                "meta",
                s::streaming::object(
                    "meta",
                    vec![("tags", s::streaming::array("tags", s::string("tag")))],
                ),
            ),
            ("content", s::streaming::string("content")),
        ],
    );
    let mut session = Session::new();

    // The absent object defaults to {}, not to a tree of its own
    // fields' defaults.
    session.feed(r#"{"content":"hi"#);
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!({"meta": {}, "content": "hi"}))
    );

    session.feed(r#"","meta":{"#);
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!({"meta": {"tags": []}, "content": "hi"}))
    );
}

#[test]
fn streaming_object_omits_pending_strict_fields() {
    let schema = s::streaming::object(
        "progress",
        vec![
            ("label", s::string("label")),
            ("items", s::streaming::array("items", s::number("n"))),
        ],
    );
    let mut session = Session::new();

    session.feed(r#"{"label":"lo"#);
    // The strict string has not closed, so it is omitted; the missing
    // streaming array shows its empty default.
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!({"items": []}))
    );

    session.feed(r#"ad","items":[1,2"#);
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!({"label": "load", "items": [1]}))
    );
}

#[test]
fn any_of_prunes_alternatives_and_picks_the_first_match() {
    let schema = s::any_of(
        "answer",
        vec![s::literal("", "dog"), s::literal("", "cat")],
    );
    let mut session = Session::new();

    // "c" rules out "dog" forever; "cat" is still reachable.
    session.feed(r#""c"#);
    assert_eq!(session.resolve(&schema), Resolution::Pending);

    session.feed(r#"at""#);
    assert_eq!(session.resolve(&schema), Resolution::Match(json!("cat")));
}

#[test]
fn any_of_with_no_surviving_alternative_is_invalid() {
    let schema = s::any_of(
        "answer",
        vec![s::literal("", "dog"), s::literal("", "cat")],
    );
    let mut session = Session::new();

    session.feed(r#""cow"#);
    assert!(matches!(session.resolve(&schema), Resolution::Invalid(_)));
}

#[test]
fn any_of_discriminates_object_shapes() {
    let circle = s::object(
        "circle",
        vec![
            ("kind", s::literal("", "circle")),
            ("radius", s::number("radius")),
        ],
    );
    let square = s::object(
        "square",
        vec![
            ("kind", s::literal("", "square")),
            ("side", s::number("side")),
        ],
    );
    let schema = s::any_of("shape", vec![circle, square]);
    let mut session = Session::new();

    session.feed(r#"{"kind":"ci"#);
    // "ci" can never become "square", so that arm is pruned; the circle
    // arm is still waiting on its radius.
    assert_eq!(session.resolve(&schema), Resolution::Pending);

    session.feed(r#"rcle","radius":2}"#);
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!({"kind": "circle", "radius": 2}))
    );
}

#[test]
fn pruned_alternatives_stay_pruned_even_if_later_data_fits() {
    let circle = s::object(
        "circle",
        vec![
            ("kind", s::literal("", "circle")),
            ("radius", s::number("radius")),
        ],
    );
    let square = s::object(
        "square",
        vec![
            ("kind", s::literal("", "square")),
            ("side", s::number("side")),
        ],
    );
    let schema = s::any_of("shape", vec![circle, square]);
    let mut session = Session::new();

    // "square" rules the circle arm out.
    session.feed(r#"{"kind":"square""#);
    assert_eq!(session.resolve(&schema), Resolution::Pending);

    // A duplicate key rewrites "kind", so the document now reads as a
    // perfectly good circle. The circle arm was already ruled out, and
    // the ruling sticks; the square arm dies on the undeclared radius.
    session.feed(r#","radius":2,"kind":"circle"}"#);
    assert!(matches!(session.resolve(&schema), Resolution::Invalid(_)));
}

#[test]
fn earliest_declared_alternative_wins_ties() {
    // Both alternatives accept the same document; declaration order
    // decides.
    let schema = s::any_of(
        "text",
        vec![s::string("first"), s::enumeration("second", &["hi"])],
    );
    let mut session = Session::new();

    session.feed(r#""hi""#);
    assert_eq!(session.resolve(&schema), Resolution::Match(json!("hi")));
}

#[test]
fn parser_errors_make_everything_invalid() {
    let schema = s::streaming::string("text");
    let mut session = Session::new();

    session.feed(r#""ok""#);
    assert_eq!(session.resolve(&schema), Resolution::Match(json!("ok")));

    session.feed("x");
    let result = session.resolve(&schema);
    assert!(matches!(
        result,
        Resolution::Invalid(ParserError::Syntax { .. })
    ));
}

#[test]
fn wrapped_primitive_roots_unwrap() {
    let schema = s::number("the answer");
    let mut session = Session::new();

    session.feed(r#"{"value": 42}"#);
    assert_eq!(session.resolve(&schema), Resolution::Match(json!(42)));
}

#[test]
fn wrapped_primitive_streams_through_the_wrapper() {
    let schema = s::streaming::string("text");
    let mut session = Session::new();

    session.feed(r#"{"value": "str"#);
    assert_eq!(session.resolve(&schema), Resolution::Match(json!("str")));

    session.feed(r#"eaming"}"#);
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!("streaming"))
    );
}

#[test]
fn object_schemas_do_not_unwrap_a_value_key() {
    let schema = s::object("wrapper", vec![("value", s::number("n"))]);
    let mut session = Session::new();

    session.feed(r#"{"value": 42}"#);
    assert_eq!(
        session.resolve(&schema),
        Resolution::Match(json!({"value": 42}))
    );
}

#[test]
fn finalize_settles_a_trailing_scalar() {
    let schema = s::number("n");
    let mut session = Session::new();

    session.feed("12");
    assert_eq!(session.resolve(&schema), Resolution::Pending);

    session.state.finalize();
    assert_eq!(session.resolve(&schema), Resolution::Match(json!(12)));
}

#[test]
fn resolution_never_touches_parser_state() {
    let strings = s::streaming::string("text");
    let numbers = s::number("n");
    let mut session = Session::new();

    session.feed(r#""hal"#);
    let version = session.state.version();

    assert_eq!(session.resolve(&strings), Resolution::Match(json!("hal")));
    // Swapping schemas over the same state just re-evaluates; the parse
    // is untouched either way.
    assert_eq!(session.resolve(&numbers), Resolution::Invalid(
        ParserError::SchemaInvalid {
            path: "$".to_owned(),
            reason: "expected number, found string".to_owned(),
        }
    ));
    assert_eq!(session.state.version(), version);

    session.feed(r#"9000""#);
    assert_eq!(session.resolve(&strings), Resolution::Match(json!("hal9000")));
}

#[test]
fn cache_entries_survive_unrelated_edits() {
    let schema = s::object(
        "doc",
        vec![
            ("done", s::array("settled", s::number("n"))),
            ("tail", s::streaming::string("growing")),
        ],
    );
    let mut session = Session::new();

    session.feed(r#"{"done": [1, 2], "tail": ""#);
    session.resolve(&schema);
    let entries = session.cache.len();
    assert!(entries > 0);

    // Growing the sibling string re-resolves the object and the string,
    // but the settled array keeps its memoized entries.
    session.feed("abc");
    let result = session.resolve(&schema);
    assert_eq!(result, Resolution::Pending);
    assert_eq!(session.cache.len(), entries);
}

#[test]
fn deeply_nested_streaming_documents_resolve_at_every_step() {
    let schema = s::streaming::object(
        "report",
        vec![
            ("title", s::string("title")),
            (
                "sections",
                s::streaming::array(
                    "sections",
                    s::streaming::object(
                        "section",
                        vec![
                            ("heading", s::string("heading")),
                            ("text", s::streaming::string("text")),
                        ],
                    ),
                ),
            ),
        ],
    );
    let source = concat!(
        r#"{"title": "Q3", "sections": ["#,
        r#"{"heading": "Intro", "text": "All good"}, "#,
        r#"{"heading": "Risks", "text": "Som"#,
    );

    // Resolve after every chunk size from 1 byte upward; none of them
    // may ever report invalid, and the final answer must be identical
    // to the one-shot parse.
    let mut oneshot = Session::new();
    oneshot.feed(source);
    let expected = oneshot.resolve(&schema);
    assert!(expected.is_match());

    for size in 1..=source.len() {
        let mut session = Session::new();
        let mut rest = source;
        while !rest.is_empty() {
            let mut take = size.min(rest.len());
            while !rest.is_char_boundary(take) {
                take -= 1;
            }
            let (chunk, tail) = rest.split_at(take);
            session.feed(chunk);
            assert!(
                !matches!(session.resolve(&schema), Resolution::Invalid(_)),
                "chunk size {} produced an invalid intermediate state",
                size
            );
            rest = tail;
        }
        assert_eq!(session.resolve(&schema), expected, "chunk size {}", size);
    }
}
