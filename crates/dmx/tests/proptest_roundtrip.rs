//! Property-based round trips over random graphs.

mod common;

use common::{all_targets, assert_same_graph, supports};
use dmx::{load, load_with, save, Color, Document, LoadOptions, Time, Value, Vector3};
use proptest::prelude::*;

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.\\-\"\\\\\n\t\u{e9}\u{4e2d}]{0,24}"
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::Int),
        (-1.0e6f32..1.0e6f32).prop_map(Value::Float),
        any::<bool>().prop_map(Value::Bool),
        arb_text().prop_map(Value::String),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Binary),
        any::<i32>().prop_map(|t| Value::Time(Time::from_ticks(t))),
        any::<[u8; 4]>().prop_map(|[r, g, b, a]| Value::Color(Color::new(r, g, b, a))),
        (-1.0e3f32..1.0e3f32, -1.0e3f32..1.0e3f32, -1.0e3f32..1.0e3f32)
            .prop_map(|(x, y, z)| Value::Vector3(Vector3::new(x, y, z))),
        any::<u64>().prop_map(Value::UInt64),
        any::<u8>().prop_map(Value::UInt8),
        prop::collection::vec(any::<i32>(), 0..12).prop_map(Value::from),
        prop::collection::vec(-1.0e6f32..1.0e6f32, 0..12).prop_map(Value::from),
        prop::collection::vec(arb_text(), 0..6).prop_map(Value::from),
        prop::collection::vec(any::<u8>(), 0..12).prop_map(|v| Value::UInt8Array(v.into())),
    ]
}

/// A random graph description: element names, attributes per element, a
/// parent for every element after the root, and extra edges that may form
/// cycles.
#[derive(Debug, Clone)]
struct GraphShape {
    names: Vec<String>,
    attributes: Vec<Vec<(String, Value)>>,
    parents: Vec<usize>,
    extra_edges: Vec<(usize, usize)>,
}

fn arb_graph() -> impl Strategy<Value = GraphShape> {
    (1usize..8).prop_flat_map(|count| {
        (
            prop::collection::vec(arb_text(), count),
            prop::collection::vec(
                prop::collection::vec(("v_[a-z]{1,6}", arb_value()), 0..6),
                count,
            ),
            (1..count).map(|i| 0..i).collect::<Vec<_>>(),
            prop::collection::vec((0..count, 0..count), 0..4),
        )
            .prop_map(|(names, attributes, parents, extra_edges)| GraphShape {
                names,
                attributes,
                parents,
                extra_edges,
            })
    })
}

fn build(shape: &GraphShape, encoding: &str, version: i32) -> Document {
    let doc = Document::new();
    let elements: Vec<_> = shape
        .names
        .iter()
        .map(|name| doc.create_element(name.clone(), None, None).unwrap())
        .collect();
    for (element, attributes) in elements.iter().zip(&shape.attributes) {
        for (name, value) in attributes {
            if supports(encoding, version, value.value_type()) {
                element.set(name.clone(), value.deep_clone()).unwrap();
            }
        }
    }
    for (child, parent) in shape.parents.iter().enumerate() {
        let child = child + 1;
        elements[*parent]
            .set_element(format!("child_{child}"), Some(&elements[child]))
            .unwrap();
    }
    for (k, (from, to)) in shape.extra_edges.iter().enumerate() {
        elements[*from]
            .set_element(format!("link_{k}"), Some(&elements[*to]))
            .unwrap();
    }
    doc
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_graphs_roundtrip(shape in arb_graph()) {
        for (encoding, version) in all_targets() {
            let doc = build(&shape, encoding, version);
            let bytes = save(&doc, encoding, version).unwrap();
            let loaded = load(&bytes).unwrap();
            prop_assert_eq!(loaded.len(), doc.len(), "{} {}", encoding, version);
            assert_same_graph(&doc, &loaded);
        }
    }

    #[test]
    fn deferred_reads_match_eager(shape in arb_graph()) {
        let doc = build(&shape, "binary", 9);
        let bytes = save(&doc, "binary", 9).unwrap();
        let eager = load(&bytes).unwrap();
        let deferred = load_with(&bytes, &LoadOptions::deferred()).unwrap();
        assert_same_graph(&eager, &deferred);
    }

    #[test]
    fn encoding_is_deterministic(shape in arb_graph()) {
        let doc = build(&shape, "keyvalues2", 1);
        let first = save(&doc, "keyvalues2", 1).unwrap();
        let second = save(&load(&first).unwrap(), "keyvalues2", 1).unwrap();
        prop_assert_eq!(first, second);
    }
}
