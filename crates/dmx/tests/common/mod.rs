//! Shared helpers for integration tests.

#![allow(dead_code)]

use dmx::codec::binary::Layout;
use dmx::{
    Color, Document, Element, ElementArray, ElementId, Matrix, QAngle, Quaternion, Time, Value,
    ValueKind, ValueType, Vector2, Vector3, Vector4,
};
use rustc_hash::FxHashSet;

/// Every (encoding, version) target served by the built-in codecs.
pub fn all_targets() -> Vec<(&'static str, i32)> {
    dmx::CodecRegistry::builtin().targets()
}

/// True if `encoding`/`version` can carry values of `value_type`.
pub fn supports(encoding: &str, version: i32, value_type: ValueType) -> bool {
    match encoding {
        "binary" => Layout::for_version(version).is_some_and(|layout| layout.type_id(value_type).is_some()),
        _ => true,
    }
}

/// One sample value per non-element kind, scalar and array.
pub fn sample_values() -> Vec<(String, Value)> {
    let m = Matrix::from_row_major(std::array::from_fn(|i| i as f32 * 0.5));
    vec![
        ("int".into(), Value::Int(-7)),
        ("float".into(), Value::Float(0.1)),
        ("bool".into(), Value::Bool(true)),
        ("string".into(), Value::from("hello \"world\"")),
        ("binary".into(), Value::Binary(vec![0, 1, 254, 255])),
        ("time".into(), Value::Time(Time::from_ticks(12_345))),
        ("color".into(), Value::Color(Color::new(10, 20, 30, 255))),
        ("vector2".into(), Value::Vector2(Vector2::new(1.0, -2.0))),
        ("vector3".into(), Value::Vector3(Vector3::new(0.25, 0.5, 0.75))),
        ("vector4".into(), Value::Vector4(Vector4::new(1.0, 2.0, 3.0, 4.0))),
        ("qangle".into(), Value::QAngle(QAngle::new(90.0, 45.0, 0.0))),
        ("quaternion".into(), Value::Quaternion(Quaternion::IDENTITY)),
        ("matrix".into(), Value::Matrix(m)),
        ("uint64".into(), Value::UInt64(u64::MAX - 1)),
        ("uint8".into(), Value::UInt8(200)),
        ("int_array".into(), Value::from(vec![1i32, 2, 3])),
        ("float_array".into(), Value::from(vec![0.5f32, -1.5])),
        ("bool_array".into(), Value::from(vec![true, false])),
        ("string_array".into(), Value::from(vec!["a".to_string(), String::new(), "c".to_string()])),
        ("binary_array".into(), Value::from(vec![vec![1u8, 2], vec![]])),
        ("time_array".into(), Value::from(vec![Time::from_ticks(1), Time::from_ticks(-1)])),
        ("color_array".into(), Value::from(vec![Color::new(1, 2, 3, 4)])),
        ("vector2_array".into(), Value::from(vec![Vector2::new(1.0, 2.0)])),
        ("vector3_array".into(), Value::from(vec![Vector3::new(1.0, 2.0, 3.0)])),
        ("vector4_array".into(), Value::from(vec![Vector4::new(1.0, 2.0, 3.0, 4.0)])),
        ("qangle_array".into(), Value::from(vec![QAngle::new(1.0, 2.0, 3.0)])),
        ("quaternion_array".into(), Value::from(vec![Quaternion::new(0.0, 0.0, 1.0, 0.0)])),
        ("matrix_array".into(), Value::from(vec![Matrix::IDENTITY, m])),
        ("uint64_array".into(), Value::from(vec![0u64, 1 << 63])),
        ("uint8_array".into(), Value::UInt8Array(vec![0u8, 9, 255].into())),
        ("empty_int_array".into(), Value::from(Vec::<i32>::new())),
    ]
}

/// Builds a document with shared, cyclic, null and stub references plus
/// every sample value the target supports.
pub fn sample_document(encoding: &str, version: i32) -> Document {
    let doc = Document::new();
    doc.set_format("model", 18);
    let root = doc.create_element("root", None, Some("DmeModel")).unwrap();
    let mesh = doc.create_element("mesh", None, Some("DmeMesh")).unwrap();
    let material = doc.create_element("material", None, Some("DmeMaterial")).unwrap();
    let bone_a = doc.create_element("bone_a", None, Some("DmeJoint")).unwrap();
    let bone_b = doc.create_element("bone_b", None, Some("DmeJoint")).unwrap();
    let external = doc.create_stub_element(ElementId::random()).unwrap();

    for (name, value) in sample_values() {
        if supports(encoding, version, value.value_type()) {
            root.set(name, value).unwrap();
        }
    }
    root.set_element("mesh", Some(&mesh)).unwrap();
    root.set_element("nothing", None).unwrap();
    root.set_element("external", Some(&external)).unwrap();

    mesh.set_element("material", Some(&material)).unwrap();
    mesh.set_element("owner", Some(&root)).unwrap();
    mesh.set("vertex_count", 3i32).unwrap();

    let bones = ElementArray::new(&doc);
    bones.push(&bone_a).unwrap();
    bones.push_null();
    bones.push(&bone_b).unwrap();
    bones.push(&material).unwrap();
    root.set("bones", bones).unwrap();
    bone_b.set_element("parent", Some(&bone_a)).unwrap();
    material.set("shader", "VertexLitGeneric").unwrap();
    doc
}

/// Structural comparison of everything reachable from both roots.
pub fn assert_same_graph(expected: &Document, actual: &Document) {
    let expected_root = expected.root().expect("expected root");
    let actual_root = actual.root().expect("actual root");
    assert_eq!(expected_root.id(), actual_root.id());
    assert_eq!(expected.format(), actual.format());
    assert_eq!(expected.format_version(), actual.format_version());

    let mut seen = FxHashSet::default();
    let mut stack = vec![expected_root.id()];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let left = expected.element(id).expect("expected element");
        let right = actual
            .element(id)
            .unwrap_or_else(|| panic!("element {id} missing after round trip"));
        assert_eq!(left.is_stub(), right.is_stub(), "stub flag of {id}");
        if left.is_stub() {
            continue;
        }
        assert_same_element(&left, &right);
        for (_, value) in left.attributes().unwrap() {
            stack.extend(value.element_ids());
        }
    }
}

pub fn assert_same_element(left: &Element, right: &Element) {
    assert_eq!(left.name(), right.name());
    assert_eq!(left.class_name(), right.class_name());
    let left_attrs = left.attributes().unwrap();
    let right_attrs = right.attributes().unwrap();
    let left_names: Vec<&String> = left_attrs.iter().map(|(n, _)| n).collect();
    let right_names: Vec<&String> = right_attrs.iter().map(|(n, _)| n).collect();
    assert_eq!(left_names, right_names, "attribute order of {}", left.name());
    for ((name, l), (_, r)) in left_attrs.iter().zip(&right_attrs) {
        assert_eq!(l, r, "attribute {name:?} of {}", left.name());
    }
}

/// Kinds that only binary v9 and keyvalues2 carry.
pub fn is_v9_only(kind: ValueKind) -> bool {
    matches!(kind, ValueKind::UInt64 | ValueKind::UInt8)
}
