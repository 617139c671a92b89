//! Encode/decode round trips across every built-in target.

mod common;

use common::{all_targets, assert_same_graph, is_v9_only, sample_document, supports};
use dmx::{
    load, load_with, save, Document, EncodeError, ErrorKind, LoadOptions, Time, Value, ValueKind,
    ValueType,
};

#[test]
fn test_roundtrip_every_target() {
    for (encoding, version) in all_targets() {
        let doc = sample_document(encoding, version);
        let bytes = save(&doc, encoding, version).unwrap_or_else(|e| panic!("{encoding} {version}: {e}"));
        let loaded = load(&bytes).unwrap_or_else(|e| panic!("{encoding} {version}: {e}"));
        assert_eq!(loaded.encoding(), encoding);
        assert_eq!(loaded.encoding_version(), version);
        assert_same_graph(&doc, &loaded);
    }
}

#[test]
fn test_roundtrip_is_stable() {
    // Re-encoding a decoded document gives the same bytes.
    for (encoding, version) in all_targets() {
        let doc = sample_document(encoding, version);
        let first = save(&doc, encoding, version).unwrap();
        let second = save(&load(&first).unwrap(), encoding, version).unwrap();
        assert_eq!(first, second, "{encoding} {version}");
    }
}

#[test]
fn test_cross_encoding_conversion() {
    let doc = sample_document("binary", 9);
    let text = save(&doc, "keyvalues2", 1).unwrap();
    let from_text = load(&text).unwrap();
    let binary = save(&from_text, "binary", 9).unwrap();
    let back = load(&binary).unwrap();
    assert_same_graph(&doc, &back);
}

#[test]
fn test_deferred_load_matches_eager() {
    for version in [1, 2, 3, 4, 5, 9] {
        let doc = sample_document("binary", version);
        let bytes = save(&doc, "binary", version).unwrap();
        let eager = load(&bytes).unwrap();
        let deferred = load_with(&bytes, &LoadOptions::deferred()).unwrap();
        assert!(deferred.has_deferred_source());
        assert_same_graph(&eager, &deferred);
    }
}

#[test]
fn test_version_gating() {
    let doc = Document::new();
    let root = doc.create_element("root", None, None).unwrap();
    root.set("t", Time::from_ticks(5)).unwrap();
    for version in [1, 2] {
        let err = save(&doc, "binary", version).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
    }
    for version in [3, 4, 5, 9] {
        assert!(save(&doc, "binary", version).is_ok());
    }

    for kind in ValueKind::ALL.into_iter().filter(|k| is_v9_only(*k)) {
        for version in [1, 2, 3, 4, 5] {
            assert!(!supports("binary", version, ValueType::scalar(kind)));
            assert!(!supports("binary", version, ValueType::array(kind)));
        }
        assert!(supports("binary", 9, ValueType::array(kind)));
    }

    root.set("small", Value::UInt8(1)).unwrap();
    let err = save(&doc, "binary", 5).unwrap_err();
    assert_eq!(
        err,
        EncodeError::UnsupportedType {
            value_type: ValueType::scalar(ValueKind::UInt8),
            encoding: "binary",
            version: 5,
        }
    );
    assert!(save(&doc, "keyvalues2", 1).is_ok());
}

#[test]
fn test_only_reachable_elements_are_written() {
    let doc = Document::new();
    let root = doc.create_element("root", None, None).unwrap();
    let orphan = doc.create_element("orphan", None, None).unwrap();
    root.set("n", 1i32).unwrap();
    for (encoding, version) in all_targets() {
        let loaded = load(&save(&doc, encoding, version).unwrap()).unwrap();
        assert_eq!(loaded.len(), 1, "{encoding} {version}");
        assert!(loaded.element(orphan.id()).is_none());
    }
}

#[test]
fn test_missing_root_fails_every_target() {
    let doc = Document::new();
    for (encoding, version) in all_targets() {
        assert_eq!(save(&doc, encoding, version).unwrap_err(), EncodeError::NoRoot);
    }
}

#[test]
fn test_file_helpers() {
    let dir = std::env::temp_dir().join(format!("dmx-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("sample.dmx");

    let doc = sample_document("binary", 5);
    dmx::save_file(&doc, &path, "binary", 5).unwrap();
    let loaded = dmx::load_file(&path, &LoadOptions::default()).unwrap();
    assert_same_graph(&doc, &loaded);
    assert_eq!(loaded.save().unwrap(), std::fs::read(&path).unwrap());

    let missing = dmx::load_file(dir.join("missing.dmx"), &LoadOptions::default()).unwrap_err();
    assert!(matches!(missing, dmx::DecodeError::Io(_)));
    std::fs::remove_dir_all(&dir).unwrap();
}
