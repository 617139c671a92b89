//! Deferred loading and concurrent access.

mod common;

use std::sync::Arc;
use std::thread;

use dmx::{load, load_with, save, Document, ErrorKind, LoadOptions, Value};

fn wide_document(elements: usize) -> Document {
    let doc = Document::new();
    let root = doc.create_element("root", None, None).unwrap();
    let children = dmx::ElementArray::new(&doc);
    for i in 0..elements {
        let child = doc.create_element(format!("child{i}"), None, Some("DmeChild")).unwrap();
        child.set("index", i as i32).unwrap();
        child.set("label", format!("label {i}")).unwrap();
        child.set("samples", (0..16).map(|s| (i * 16 + s) as f32).collect::<Vec<f32>>()).unwrap();
        children.push(&child).unwrap();
    }
    root.set("children", children).unwrap();
    doc
}

#[test]
fn test_pending_until_first_read() {
    let bytes = save(&wide_document(4), "binary", 5).unwrap();
    let doc = load_with(&bytes, &LoadOptions::deferred()).unwrap();
    let root = doc.root().unwrap();

    // Element references are decoded during load.
    assert!(!root.is_deferred("children"));
    let child = root.get_element_array("children").unwrap().unwrap().element(2).unwrap();
    assert!(child.is_deferred("index"));
    assert!(child.is_deferred("samples"));

    assert_eq!(child.get_as::<i32>("index").unwrap(), Some(2));
    assert!(!child.is_deferred("index"));
    assert!(child.is_deferred("samples"));
}

#[test]
fn test_resolve_all_then_release() {
    let bytes = save(&wide_document(8), "binary", 9).unwrap();
    let doc = load_with(&bytes, &LoadOptions::deferred()).unwrap();
    doc.resolve_all().unwrap();
    doc.release_deferred_source();
    assert!(!doc.has_deferred_source());
    common::assert_same_graph(&load(&bytes).unwrap(), &doc);
}

#[test]
fn test_release_without_resolve_fails_reads() {
    let bytes = save(&wide_document(2), "binary", 4).unwrap();
    let doc = load_with(&bytes, &LoadOptions::deferred()).unwrap();
    doc.release_deferred_source();
    let child = doc.root().unwrap().get_element_array("children").unwrap().unwrap().element(0).unwrap();
    let err = child.get("label").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeferredLoadFailure);
    assert!(child.is_deferred("label"));
}

#[test]
fn test_text_ignores_deferred_mode() {
    let bytes = save(&wide_document(2), "keyvalues2", 1).unwrap();
    let doc = load_with(&bytes, &LoadOptions::deferred()).unwrap();
    assert!(!doc.has_deferred_source());
    assert!(doc.elements().iter().all(|e| e.attribute_names().unwrap().iter().all(|n| !e.is_deferred(n))));
}

#[test]
fn test_concurrent_first_reads_agree() {
    let source = wide_document(64);
    let bytes = save(&source, "binary", 5).unwrap();
    let eager = load(&bytes).unwrap();
    let doc = Arc::new(load_with(&bytes, &LoadOptions::deferred()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let doc = Arc::clone(&doc);
            thread::spawn(move || {
                let mut seen = Vec::new();
                let elements = doc.elements();
                // Each worker starts at a different offset so first reads race.
                for k in 0..elements.len() {
                    let element = &elements[(k + worker * 7) % elements.len()];
                    for (name, value) in element.attributes().unwrap() {
                        seen.push((element.id(), name, value));
                    }
                }
                seen
            })
        })
        .collect();

    for handle in handles {
        for (id, name, value) in handle.join().unwrap() {
            let expected = eager.element(id).unwrap().get(&name).unwrap().unwrap();
            assert_eq!(value, expected, "{name} of {id}");
        }
    }
    assert!(doc.elements().iter().all(|e| {
        e.attribute_names().unwrap().iter().all(|n| !e.is_deferred(n))
    }));
}

#[test]
fn test_concurrent_writers_on_distinct_elements() {
    let doc = Arc::new(wide_document(16));
    let elements = doc.elements();
    let handles: Vec<_> = elements
        .into_iter()
        .map(|element| {
            thread::spawn(move || {
                for round in 0..50 {
                    element.set("round", round as i32).unwrap();
                    if let Some(samples) = element.get_array::<f32>("samples").unwrap() {
                        samples.push(round as f32);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    for element in doc.elements() {
        assert_eq!(element.get("round").unwrap(), Some(Value::Int(49)));
    }
    let child = doc.elements().into_iter().find(|e| e.name() == "child0").unwrap();
    assert_eq!(child.get_array::<f32>("samples").unwrap().unwrap().len(), 16 + 50);
}
