//! Typed values stored in element attributes.
//!
//! The value domain is closed: every attribute holds one of the scalar
//! kinds in [`ValueKind`] or a homogeneous array of one of them.

use std::fmt;

use crate::model::{Array, ElementArray, ElementId};

/// Scalar kinds of the DMX value domain.
///
/// Declaration order matches the binary v9 type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Element,
    Int,
    Float,
    Bool,
    String,
    Binary,
    Time,
    Color,
    Vector2,
    Vector3,
    Vector4,
    QAngle,
    Quaternion,
    Matrix,
    UInt64,
    UInt8,
}

impl ValueKind {
    /// Every kind, in declaration order.
    pub const ALL: [ValueKind; 16] = [
        ValueKind::Element,
        ValueKind::Int,
        ValueKind::Float,
        ValueKind::Bool,
        ValueKind::String,
        ValueKind::Binary,
        ValueKind::Time,
        ValueKind::Color,
        ValueKind::Vector2,
        ValueKind::Vector3,
        ValueKind::Vector4,
        ValueKind::QAngle,
        ValueKind::Quaternion,
        ValueKind::Matrix,
        ValueKind::UInt64,
        ValueKind::UInt8,
    ];

    /// Returns the keyvalues2 type name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Element => "element",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::String => "string",
            ValueKind::Binary => "binary",
            ValueKind::Time => "time",
            ValueKind::Color => "color",
            ValueKind::Vector2 => "vector2",
            ValueKind::Vector3 => "vector3",
            ValueKind::Vector4 => "vector4",
            ValueKind::QAngle => "qangle",
            ValueKind::Quaternion => "quaternion",
            ValueKind::Matrix => "matrix",
            ValueKind::UInt64 => "uint64",
            ValueKind::UInt8 => "uint8",
        }
    }

    /// Looks up a kind by its keyvalues2 name.
    pub fn from_name(name: &str) -> Option<ValueKind> {
        ValueKind::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// A scalar kind plus whether the attribute holds an array of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueType {
    pub kind: ValueKind,
    pub is_array: bool,
}

impl ValueType {
    pub const fn scalar(kind: ValueKind) -> Self {
        Self { kind, is_array: false }
    }

    pub const fn array(kind: ValueKind) -> Self {
        Self { kind, is_array: true }
    }

    /// Parses `"int"` or `"int_array"` style names.
    pub fn from_name(name: &str) -> Option<ValueType> {
        match name.strip_suffix("_array") {
            Some(inner) => ValueKind::from_name(inner).map(ValueType::array),
            None => ValueKind::from_name(name).map(ValueType::scalar),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array {
            write!(f, "{}_array", self.kind.name())
        } else {
            f.write_str(self.kind.name())
        }
    }
}

// =============================================================================
// SCALAR STRUCTS
// =============================================================================

/// Time interval in ticks of 1/10000 second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(i32);

impl Time {
    pub const TICKS_PER_SECOND: i32 = 10_000;

    pub const fn from_ticks(ticks: i32) -> Self {
        Time(ticks)
    }

    pub const fn ticks(self) -> i32 {
        self.0
    }

    /// Rounds to the nearest tick, saturating at the i32 range.
    pub fn from_secs_f64(seconds: f64) -> Self {
        Time((seconds * Self::TICKS_PER_SECOND as f64).round() as i32)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / Self::TICKS_PER_SECOND as f64
    }
}

/// 8-bit RGBA color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vector4 {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

/// Euler angle in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QAngle {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl QAngle {
    pub const fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Row-major 4x4 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix(pub [[f32; 4]; 4]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    /// Builds a matrix from 16 values in row-major order.
    pub fn from_row_major(values: [f32; 16]) -> Self {
        let mut rows = [[0.0f32; 4]; 4];
        for (i, v) in values.into_iter().enumerate() {
            rows[i / 4][i % 4] = v;
        }
        Matrix(rows)
    }

    /// Returns the 16 values in row-major order.
    pub fn to_row_major(&self) -> [f32; 16] {
        let mut out = [0.0f32; 16];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.0[i / 4][i % 4];
        }
        out
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// =============================================================================
// VALUE
// =============================================================================

/// An attribute value.
///
/// Array variants are shared handles: cloning a `Value` that holds an array
/// yields a second handle onto the same storage. Use [`Value::deep_clone`]
/// for an independent copy.
///
/// Equality compares contents: element references by ID, element arrays
/// element-wise by ID in order, everything else structurally and exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Element(Option<ElementId>),
    Int(i32),
    Float(f32),
    Bool(bool),
    String(String),
    Binary(Vec<u8>),
    Time(Time),
    Color(Color),
    Vector2(Vector2),
    Vector3(Vector3),
    Vector4(Vector4),
    QAngle(QAngle),
    Quaternion(Quaternion),
    Matrix(Matrix),
    UInt64(u64),
    UInt8(u8),

    ElementArray(ElementArray),
    IntArray(Array<i32>),
    FloatArray(Array<f32>),
    BoolArray(Array<bool>),
    StringArray(Array<String>),
    BinaryArray(Array<Vec<u8>>),
    TimeArray(Array<Time>),
    ColorArray(Array<Color>),
    Vector2Array(Array<Vector2>),
    Vector3Array(Array<Vector3>),
    Vector4Array(Array<Vector4>),
    QAngleArray(Array<QAngle>),
    QuaternionArray(Array<Quaternion>),
    MatrixArray(Array<Matrix>),
    UInt64Array(Array<u64>),
    UInt8Array(Array<u8>),
}

impl Value {
    /// Returns the type of this value.
    pub fn value_type(&self) -> ValueType {
        use ValueKind as K;
        match self {
            Value::Element(_) => ValueType::scalar(K::Element),
            Value::Int(_) => ValueType::scalar(K::Int),
            Value::Float(_) => ValueType::scalar(K::Float),
            Value::Bool(_) => ValueType::scalar(K::Bool),
            Value::String(_) => ValueType::scalar(K::String),
            Value::Binary(_) => ValueType::scalar(K::Binary),
            Value::Time(_) => ValueType::scalar(K::Time),
            Value::Color(_) => ValueType::scalar(K::Color),
            Value::Vector2(_) => ValueType::scalar(K::Vector2),
            Value::Vector3(_) => ValueType::scalar(K::Vector3),
            Value::Vector4(_) => ValueType::scalar(K::Vector4),
            Value::QAngle(_) => ValueType::scalar(K::QAngle),
            Value::Quaternion(_) => ValueType::scalar(K::Quaternion),
            Value::Matrix(_) => ValueType::scalar(K::Matrix),
            Value::UInt64(_) => ValueType::scalar(K::UInt64),
            Value::UInt8(_) => ValueType::scalar(K::UInt8),
            Value::ElementArray(_) => ValueType::array(K::Element),
            Value::IntArray(_) => ValueType::array(K::Int),
            Value::FloatArray(_) => ValueType::array(K::Float),
            Value::BoolArray(_) => ValueType::array(K::Bool),
            Value::StringArray(_) => ValueType::array(K::String),
            Value::BinaryArray(_) => ValueType::array(K::Binary),
            Value::TimeArray(_) => ValueType::array(K::Time),
            Value::ColorArray(_) => ValueType::array(K::Color),
            Value::Vector2Array(_) => ValueType::array(K::Vector2),
            Value::Vector3Array(_) => ValueType::array(K::Vector3),
            Value::Vector4Array(_) => ValueType::array(K::Vector4),
            Value::QAngleArray(_) => ValueType::array(K::QAngle),
            Value::QuaternionArray(_) => ValueType::array(K::Quaternion),
            Value::MatrixArray(_) => ValueType::array(K::Matrix),
            Value::UInt64Array(_) => ValueType::array(K::UInt64),
            Value::UInt8Array(_) => ValueType::array(K::UInt8),
        }
    }

    pub fn is_array(&self) -> bool {
        self.value_type().is_array
    }

    /// Returns every element ID this value references, in order.
    pub fn element_ids(&self) -> Vec<ElementId> {
        match self {
            Value::Element(Some(id)) => vec![*id],
            Value::ElementArray(array) => array.ids().into_iter().flatten().collect(),
            _ => Vec::new(),
        }
    }

    /// Returns true if this value can reference elements.
    pub fn is_element_typed(&self) -> bool {
        matches!(self, Value::Element(_) | Value::ElementArray(_))
    }

    /// Copies the value, giving arrays fresh storage.
    ///
    /// Element arrays keep their document binding.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::ElementArray(a) => Value::ElementArray(a.deep_clone()),
            Value::IntArray(a) => Value::IntArray(a.deep_clone()),
            Value::FloatArray(a) => Value::FloatArray(a.deep_clone()),
            Value::BoolArray(a) => Value::BoolArray(a.deep_clone()),
            Value::StringArray(a) => Value::StringArray(a.deep_clone()),
            Value::BinaryArray(a) => Value::BinaryArray(a.deep_clone()),
            Value::TimeArray(a) => Value::TimeArray(a.deep_clone()),
            Value::ColorArray(a) => Value::ColorArray(a.deep_clone()),
            Value::Vector2Array(a) => Value::Vector2Array(a.deep_clone()),
            Value::Vector3Array(a) => Value::Vector3Array(a.deep_clone()),
            Value::Vector4Array(a) => Value::Vector4Array(a.deep_clone()),
            Value::QAngleArray(a) => Value::QAngleArray(a.deep_clone()),
            Value::QuaternionArray(a) => Value::QuaternionArray(a.deep_clone()),
            Value::MatrixArray(a) => Value::MatrixArray(a.deep_clone()),
            Value::UInt64Array(a) => Value::UInt64Array(a.deep_clone()),
            Value::UInt8Array(a) => Value::UInt8Array(a.deep_clone()),
            scalar => scalar.clone(),
        }
    }

    /// Number of items for arrays, `None` for scalars.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Value::ElementArray(a) => Some(a.len()),
            Value::IntArray(a) => Some(a.len()),
            Value::FloatArray(a) => Some(a.len()),
            Value::BoolArray(a) => Some(a.len()),
            Value::StringArray(a) => Some(a.len()),
            Value::BinaryArray(a) => Some(a.len()),
            Value::TimeArray(a) => Some(a.len()),
            Value::ColorArray(a) => Some(a.len()),
            Value::Vector2Array(a) => Some(a.len()),
            Value::Vector3Array(a) => Some(a.len()),
            Value::Vector4Array(a) => Some(a.len()),
            Value::QAngleArray(a) => Some(a.len()),
            Value::QuaternionArray(a) => Some(a.len()),
            Value::MatrixArray(a) => Some(a.len()),
            Value::UInt64Array(a) => Some(a.len()),
            Value::UInt8Array(a) => Some(a.len()),
            _ => None,
        }
    }
}

// =============================================================================
// SCALAR TRAIT
// =============================================================================

/// Rust types that map onto one non-element scalar kind.
pub trait Scalar: Clone + PartialEq + Send + Sync + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> Value;
    fn from_value(value: &Value) -> Option<Self>;
    fn into_array_value(array: Array<Self>) -> Value;
    fn array_from_value(value: &Value) -> Option<Array<Self>>;
}

macro_rules! impl_scalar {
    ($ty:ty, $kind:ident, $scalar:ident, $array:ident) => {
        impl Scalar for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn into_value(self) -> Value {
                Value::$scalar(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$scalar(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_array_value(array: Array<Self>) -> Value {
                Value::$array(array)
            }

            fn array_from_value(value: &Value) -> Option<Array<Self>> {
                match value {
                    Value::$array(a) => Some(a.clone()),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$scalar(v)
            }
        }

        impl From<Array<$ty>> for Value {
            fn from(a: Array<$ty>) -> Self {
                Value::$array(a)
            }
        }
    };
}

// `Vec<u8>` converts to a binary blob, so `u8` arrays are built explicitly.
macro_rules! impl_from_vec {
    ($($ty:ty),*) => {
        $(
            impl From<Vec<$ty>> for Value {
                fn from(items: Vec<$ty>) -> Self {
                    <$ty as Scalar>::into_array_value(Array::from_vec(items))
                }
            }
        )*
    };
}

impl_scalar!(i32, Int, Int, IntArray);
impl_scalar!(f32, Float, Float, FloatArray);
impl_scalar!(bool, Bool, Bool, BoolArray);
impl_scalar!(String, String, String, StringArray);
impl_scalar!(Vec<u8>, Binary, Binary, BinaryArray);
impl_scalar!(Time, Time, Time, TimeArray);
impl_scalar!(Color, Color, Color, ColorArray);
impl_scalar!(Vector2, Vector2, Vector2, Vector2Array);
impl_scalar!(Vector3, Vector3, Vector3, Vector3Array);
impl_scalar!(Vector4, Vector4, Vector4, Vector4Array);
impl_scalar!(QAngle, QAngle, QAngle, QAngleArray);
impl_scalar!(Quaternion, Quaternion, Quaternion, QuaternionArray);
impl_scalar!(Matrix, Matrix, Matrix, MatrixArray);
impl_scalar!(u64, UInt64, UInt64, UInt64Array);
impl_scalar!(u8, UInt8, UInt8, UInt8Array);

impl_from_vec!(
    i32, f32, bool, String, Vec<u8>, Time, Color, Vector2, Vector3, Vector4, QAngle, Quaternion,
    Matrix, u64
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<ElementId> for Value {
    fn from(id: ElementId) -> Self {
        Value::Element(Some(id))
    }
}

impl From<Option<ElementId>> for Value {
    fn from(id: Option<ElementId>) -> Self {
        Value::Element(id)
    }
}

impl From<ElementArray> for Value {
    fn from(array: ElementArray) -> Self {
        Value::ElementArray(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_roundtrip() {
        for kind in ValueKind::ALL {
            assert_eq!(ValueType::from_name(kind.name()), Some(ValueType::scalar(kind)));
            let array = ValueType::array(kind);
            assert_eq!(ValueType::from_name(&array.to_string()), Some(array));
        }
        assert_eq!(ValueType::from_name("elementid"), None);
    }

    #[test]
    fn test_scalar_and_array_types_differ() {
        let scalar = Value::Int(3);
        let array = Value::from(vec![3i32]);
        assert_eq!(scalar.value_type().kind, array.value_type().kind);
        assert_ne!(scalar, array);
        assert!(array.is_array());
    }

    #[test]
    fn test_exact_float_equality() {
        let a = Value::Vector3(Vector3::new(1.0, 2.0, 3.0));
        let b = Value::Vector3(Vector3::new(1.0, 2.0, 3.000_001));
        assert_ne!(a, b);
    }

    #[test]
    fn test_time_seconds() {
        let t = Time::from_secs_f64(1.25);
        assert_eq!(t.ticks(), 12_500);
        assert_eq!(t.as_secs_f64(), 1.25);
        assert_eq!(Time::from_secs_f64(-0.0001).ticks(), -1);
    }

    #[test]
    fn test_matrix_row_major() {
        let values: [f32; 16] = std::array::from_fn(|i| i as f32);
        let m = Matrix::from_row_major(values);
        assert_eq!(m.0[1][2], 6.0);
        assert_eq!(m.to_row_major(), values);
    }

    #[test]
    fn test_deep_clone_detaches_storage() {
        let original = Value::from(vec![1i32, 2, 3]);
        let shared = original.clone();
        let copy = original.deep_clone();
        if let Value::IntArray(a) = &original {
            a.push(4);
        }
        assert_eq!(original, shared);
        assert_ne!(original, copy);
    }

    #[test]
    fn test_scalar_extraction() {
        assert_eq!(i32::from_value(&Value::Int(5)), Some(5));
        assert_eq!(i32::from_value(&Value::Float(5.0)), None);
        assert_eq!(
            String::from_value(&Value::from("abc")),
            Some("abc".to_string())
        );
    }
}
