//! Text forms of attribute values.

use crate::model::{
    Array, Color, Matrix, QAngle, Quaternion, Time, Value, ValueKind, Vector2, Vector3, Vector4,
};

/// A scalar with a single-token text form.
pub trait TextScalar: Sized {
    fn to_text(&self) -> String;
    fn parse_text(text: &str) -> Option<Self>;
}

fn floats<const N: usize>(text: &str) -> Option<[f32; N]> {
    let mut out = [0.0f32; N];
    let mut parts = text.split_whitespace();
    for slot in out.iter_mut() {
        *slot = parts.next()?.parse().ok()?;
    }
    parts.next().is_none().then_some(out)
}

fn join(values: &[f32]) -> String {
    values.iter().map(f32::to_string).collect::<Vec<_>>().join(" ")
}

macro_rules! impl_text_parse {
    ($($ty:ty),*) => {
        $(impl TextScalar for $ty {
            fn to_text(&self) -> String {
                self.to_string()
            }

            fn parse_text(text: &str) -> Option<Self> {
                text.trim().parse().ok()
            }
        })*
    };
}

impl_text_parse!(i32, f32, u64, u8);

impl TextScalar for bool {
    fn to_text(&self) -> String {
        let text = if *self { "1" } else { "0" };
        text.to_string()
    }

    fn parse_text(text: &str) -> Option<Self> {
        match text.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        }
    }
}

impl TextScalar for String {
    fn to_text(&self) -> String {
        self.clone()
    }

    fn parse_text(text: &str) -> Option<Self> {
        Some(text.to_string())
    }
}

impl TextScalar for Vec<u8> {
    fn to_text(&self) -> String {
        hex::encode_upper(self)
    }

    fn parse_text(text: &str) -> Option<Self> {
        let compact: String = text.split_whitespace().collect();
        hex::decode(compact).ok()
    }
}

impl TextScalar for Time {
    fn to_text(&self) -> String {
        self.as_secs_f64().to_string()
    }

    fn parse_text(text: &str) -> Option<Self> {
        let seconds: f64 = text.trim().parse().ok()?;
        seconds.is_finite().then(|| Time::from_secs_f64(seconds))
    }
}

impl TextScalar for Color {
    fn to_text(&self) -> String {
        format!("{} {} {} {}", self.r, self.g, self.b, self.a)
    }

    fn parse_text(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace().map(|p| p.parse::<u8>());
        let mut next = || parts.next()?.ok();
        let color = Color::new(next()?, next()?, next()?, next()?);
        parts.next().is_none().then_some(color)
    }
}

impl TextScalar for Vector2 {
    fn to_text(&self) -> String {
        join(&[self.x, self.y])
    }

    fn parse_text(text: &str) -> Option<Self> {
        floats::<2>(text).map(|[x, y]| Vector2::new(x, y))
    }
}

impl TextScalar for Vector3 {
    fn to_text(&self) -> String {
        join(&[self.x, self.y, self.z])
    }

    fn parse_text(text: &str) -> Option<Self> {
        floats::<3>(text).map(|[x, y, z]| Vector3::new(x, y, z))
    }
}

impl TextScalar for Vector4 {
    fn to_text(&self) -> String {
        join(&[self.x, self.y, self.z, self.w])
    }

    fn parse_text(text: &str) -> Option<Self> {
        floats::<4>(text).map(|[x, y, z, w]| Vector4::new(x, y, z, w))
    }
}

impl TextScalar for QAngle {
    fn to_text(&self) -> String {
        join(&[self.pitch, self.yaw, self.roll])
    }

    fn parse_text(text: &str) -> Option<Self> {
        floats::<3>(text).map(|[pitch, yaw, roll]| QAngle::new(pitch, yaw, roll))
    }
}

impl TextScalar for Quaternion {
    fn to_text(&self) -> String {
        join(&[self.x, self.y, self.z, self.w])
    }

    fn parse_text(text: &str) -> Option<Self> {
        floats::<4>(text).map(|[x, y, z, w]| Quaternion::new(x, y, z, w))
    }
}

impl TextScalar for Matrix {
    fn to_text(&self) -> String {
        join(&self.to_row_major())
    }

    fn parse_text(text: &str) -> Option<Self> {
        floats::<16>(text).map(Matrix::from_row_major)
    }
}

/// Kinds whose arrays are written on one line.
pub fn is_single_line(kind: ValueKind) -> bool {
    matches!(
        kind,
        ValueKind::Int
            | ValueKind::Float
            | ValueKind::Bool
            | ValueKind::Time
            | ValueKind::UInt64
            | ValueKind::UInt8
    )
}

/// Text of a non-element scalar. `None` for element kinds and arrays.
pub fn format_scalar(value: &Value) -> Option<String> {
    Some(match value {
        Value::Int(v) => v.to_text(),
        Value::Float(v) => v.to_text(),
        Value::Bool(v) => v.to_text(),
        Value::String(v) => v.to_text(),
        Value::Binary(v) => v.to_text(),
        Value::Time(v) => v.to_text(),
        Value::Color(v) => v.to_text(),
        Value::Vector2(v) => v.to_text(),
        Value::Vector3(v) => v.to_text(),
        Value::Vector4(v) => v.to_text(),
        Value::QAngle(v) => v.to_text(),
        Value::Quaternion(v) => v.to_text(),
        Value::Matrix(v) => v.to_text(),
        Value::UInt64(v) => v.to_text(),
        Value::UInt8(v) => v.to_text(),
        _ => return None,
    })
}

fn texts<T: TextScalar + Clone + Send + Sync + 'static>(array: &Array<T>) -> Vec<String> {
    array.with_items(|items| items.iter().map(TextScalar::to_text).collect())
}

/// Item texts of a non-element array. `None` for scalars and element arrays.
pub fn format_array(value: &Value) -> Option<Vec<String>> {
    Some(match value {
        Value::IntArray(a) => texts(a),
        Value::FloatArray(a) => texts(a),
        Value::BoolArray(a) => texts(a),
        Value::StringArray(a) => texts(a),
        Value::BinaryArray(a) => texts(a),
        Value::TimeArray(a) => texts(a),
        Value::ColorArray(a) => texts(a),
        Value::Vector2Array(a) => texts(a),
        Value::Vector3Array(a) => texts(a),
        Value::Vector4Array(a) => texts(a),
        Value::QAngleArray(a) => texts(a),
        Value::QuaternionArray(a) => texts(a),
        Value::MatrixArray(a) => texts(a),
        Value::UInt64Array(a) => texts(a),
        Value::UInt8Array(a) => texts(a),
        _ => return None,
    })
}

/// Parses a non-element scalar.
pub fn parse_scalar(kind: ValueKind, text: &str) -> Option<Value> {
    Some(match kind {
        ValueKind::Element => return None,
        ValueKind::Int => Value::Int(TextScalar::parse_text(text)?),
        ValueKind::Float => Value::Float(TextScalar::parse_text(text)?),
        ValueKind::Bool => Value::Bool(TextScalar::parse_text(text)?),
        ValueKind::String => Value::String(text.to_string()),
        ValueKind::Binary => Value::Binary(TextScalar::parse_text(text)?),
        ValueKind::Time => Value::Time(TextScalar::parse_text(text)?),
        ValueKind::Color => Value::Color(TextScalar::parse_text(text)?),
        ValueKind::Vector2 => Value::Vector2(TextScalar::parse_text(text)?),
        ValueKind::Vector3 => Value::Vector3(TextScalar::parse_text(text)?),
        ValueKind::Vector4 => Value::Vector4(TextScalar::parse_text(text)?),
        ValueKind::QAngle => Value::QAngle(TextScalar::parse_text(text)?),
        ValueKind::Quaternion => Value::Quaternion(TextScalar::parse_text(text)?),
        ValueKind::Matrix => Value::Matrix(TextScalar::parse_text(text)?),
        ValueKind::UInt64 => Value::UInt64(TextScalar::parse_text(text)?),
        ValueKind::UInt8 => Value::UInt8(TextScalar::parse_text(text)?),
    })
}

/// Parses array items. On failure returns the first item that did not parse.
pub fn parse_array(kind: ValueKind, items: &[String]) -> Result<Value, String> {
    fn collect<T: TextScalar + Clone + Send + Sync + 'static>(items: &[String]) -> Result<Array<T>, String> {
        items
            .iter()
            .map(|item| T::parse_text(item).ok_or_else(|| item.clone()))
            .collect::<Result<Vec<T>, String>>()
            .map(Array::from_vec)
    }

    Ok(match kind {
        ValueKind::Element => return Err(String::new()),
        ValueKind::Int => Value::IntArray(collect(items)?),
        ValueKind::Float => Value::FloatArray(collect(items)?),
        ValueKind::Bool => Value::BoolArray(collect(items)?),
        ValueKind::String => Value::StringArray(collect(items)?),
        ValueKind::Binary => Value::BinaryArray(collect(items)?),
        ValueKind::Time => Value::TimeArray(collect(items)?),
        ValueKind::Color => Value::ColorArray(collect(items)?),
        ValueKind::Vector2 => Value::Vector2Array(collect(items)?),
        ValueKind::Vector3 => Value::Vector3Array(collect(items)?),
        ValueKind::Vector4 => Value::Vector4Array(collect(items)?),
        ValueKind::QAngle => Value::QAngleArray(collect(items)?),
        ValueKind::Quaternion => Value::QuaternionArray(collect(items)?),
        ValueKind::Matrix => Value::MatrixArray(collect(items)?),
        ValueKind::UInt64 => Value::UInt64Array(collect(items)?),
        ValueKind::UInt8 => Value::UInt8Array(collect(items)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_forms() {
        assert_eq!(format_scalar(&Value::Bool(true)).unwrap(), "1");
        assert_eq!(format_scalar(&Value::Binary(vec![0xde, 0xad])).unwrap(), "DEAD");
        assert_eq!(format_scalar(&Value::Time(Time::from_ticks(15_000))).unwrap(), "1.5");
        assert_eq!(format_scalar(&Value::Color(Color::new(1, 2, 3, 255))).unwrap(), "1 2 3 255");
        assert_eq!(format_scalar(&Value::Vector3(Vector3::new(0.5, -1.0, 2.0))).unwrap(), "0.5 -1 2");
        assert!(format_scalar(&Value::Element(None)).is_none());
    }

    #[test]
    fn test_parse_accepts_loose_forms() {
        assert_eq!(parse_scalar(ValueKind::Bool, "true"), Some(Value::Bool(true)));
        assert_eq!(parse_scalar(ValueKind::Binary, "de ad"), Some(Value::Binary(vec![0xde, 0xad])));
        assert_eq!(parse_scalar(ValueKind::Int, " 42 "), Some(Value::Int(42)));
        assert_eq!(parse_scalar(ValueKind::Vector2, "1 2 3"), None);
        assert_eq!(parse_scalar(ValueKind::Color, "1 2 3 300"), None);
        assert_eq!(parse_scalar(ValueKind::Time, "inf"), None);
    }

    #[test]
    fn test_float_text_is_exact() {
        for v in [0.1f32, 1.0 / 3.0, f32::MIN_POSITIVE, 123456.79, -0.0] {
            let text = v.to_text();
            assert_eq!(f32::parse_text(&text).unwrap().to_bits(), v.to_bits());
        }
    }

    #[test]
    fn test_time_text_is_exact() {
        for ticks in [0, 1, -1, 12_345, i32::MAX, i32::MIN] {
            let time = Time::from_ticks(ticks);
            assert_eq!(Time::parse_text(&time.to_text()), Some(time));
        }
    }

    #[test]
    fn test_matrix_text() {
        let m = Matrix::from_row_major(std::array::from_fn(|i| i as f32));
        assert_eq!(Matrix::parse_text(&m.to_text()), Some(m));
    }

    #[test]
    fn test_parse_array_reports_bad_item() {
        let items = vec!["1".to_string(), "x".to_string()];
        assert_eq!(parse_array(ValueKind::Int, &items), Err("x".to_string()));
        let items = vec!["1".to_string(), "2".to_string()];
        assert_eq!(
            parse_array(ValueKind::Int, &items),
            Ok(Value::IntArray(Array::from_vec(vec![1, 2])))
        );
    }
}
