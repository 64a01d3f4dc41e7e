use std::collections::BTreeMap;
use std::fmt;

/// A management attribute value as read from a store.
///
/// Composite values carry named fields and are descended into by dotted
/// attribute paths; all other variants are scalars.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A signed integer of any width.
    Int(i64),
    /// An unsigned integer of any width.
    UInt(u64),
    /// A floating point number.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// Text, and anything that is only known by its textual form.
    Text(String),
    /// A value with named fields.
    Composite(BTreeMap<String, Option<Value>>),
}

/// The class of data a [`Value`] belongs to on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// No value was present.
    Missing = 0,
    /// Integer-like values.
    Numeric = 1,
    /// Floating point values.
    FloatingPoint = 2,
    /// Booleans.
    Boolean = 3,
    /// Everything else.
    Text = 4,
}

impl TypeTag {
    /// The numeric code sent to the collector.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Value {
    /// Classifies the value. Never fails.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Int(_) | Value::UInt(_) => TypeTag::Numeric,
            Value::Float(_) => TypeTag::FloatingPoint,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Text(_) | Value::Composite(_) => TypeTag::Text,
        }
    }

    /// Looks up a field of a composite value.
    ///
    /// Returns `None` for scalars and for unknown fields; a present field
    /// holding no value is `Some(None)`.
    pub fn field(&self, name: &str) -> Option<Option<&Value>> {
        match self {
            Value::Composite(fields) => fields.get(name).map(Option::as_ref),
            _ => None,
        }
    }

    /// Returns the text if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a signed integer if it is integer-like and fits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            // keep the fraction so whole numbers still read as floating point
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Composite(fields) => {
                f.write_str("{")?;
                for (idx, (key, value)) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    match value {
                        Some(value) => write!(f, "{}={}", key, value)?,
                        None => write!(f, "{}=null", key)?,
                    }
                }
                f.write_str("}")
            }
        }
    }
}

macro_rules! impl_from {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for Value {
                fn from(v: $source) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )+
    };
}

impl_from!(Int, i64, i8, i16, i32, i64, isize);
impl_from!(UInt, u64, u8, u16, u32, u64, usize);
impl_from!(Float, f64, f32, f64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<BTreeMap<String, Option<Value>>> for Value {
    fn from(v: BTreeMap<String, Option<Value>>) -> Self {
        Value::Composite(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Value::from(7_i8), TypeTag::Numeric)]
    #[case(Value::from(7_i16), TypeTag::Numeric)]
    #[case(Value::from(7_i32), TypeTag::Numeric)]
    #[case(Value::from(-7_i64), TypeTag::Numeric)]
    #[case(Value::from(7_u64), TypeTag::Numeric)]
    #[case(Value::from(1.5_f32), TypeTag::FloatingPoint)]
    #[case(Value::from(1.5_f64), TypeTag::FloatingPoint)]
    #[case(Value::from(true), TypeTag::Boolean)]
    #[case(Value::from("text"), TypeTag::Text)]
    #[case(Value::from('c'), TypeTag::Text)]
    #[case(Value::Composite(BTreeMap::new()), TypeTag::Text)]
    fn test_type_tag(#[case] value: Value, #[case] expected: TypeTag) {
        assert_eq!(value.type_tag(), expected);
    }

    #[rstest]
    #[case(Value::Float(1.0), "1.0")]
    #[case(Value::Float(0.5), "0.5")]
    #[case(Value::Float(-3.0), "-3.0")]
    #[case(Value::from(2.5_f32), "2.5")]
    #[case(Value::Int(1), "1")]
    #[case(Value::UInt(u64::MAX), "18446744073709551615")]
    #[case(Value::Bool(false), "false")]
    fn test_display(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }

    #[test]
    fn test_tag_codes() {
        assert_eq!(TypeTag::Missing.to_string(), "0");
        assert_eq!(TypeTag::Numeric.to_string(), "1");
        assert_eq!(TypeTag::FloatingPoint.to_string(), "2");
        assert_eq!(TypeTag::Boolean.to_string(), "3");
        assert_eq!(TypeTag::Text.to_string(), "4");
    }

    #[test]
    fn test_composite_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("used".to_owned(), Some(Value::from(42_i64)));
        fields.insert("max".to_owned(), None);
        let value = Value::from(fields);

        assert_eq!(value.field("used"), Some(Some(&Value::Int(42))));
        assert_eq!(value.field("max"), Some(None));
        assert_eq!(value.field("committed"), None);
        assert_eq!(Value::Int(1).field("used"), None);
        assert_eq!(value.to_string(), "{max=null, used=42}");
    }
}
