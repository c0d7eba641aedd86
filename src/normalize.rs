use serde::ser::{Serialize, Serializer};

/// Dynamic cell value as produced by the table loader. `Flag` is the
/// boolean-like wrapper read from a table column; a non-finite `Float` is
/// the loader's missing-value sentinel. `Bool` is the native form that only
/// exists after [`normalize`].
#[derive(Debug, Clone)]
pub enum Datum {
    Null,
    Bool(bool),
    Flag(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Datum>),
    Map(Vec<(String, Datum)>),
}

pub const MISSING: Datum = Datum::Float(f64::NAN);

/// Structural equality with one exception: two NaN floats are equal, so the
/// missing sentinel compares equal to itself. Join-key matching excludes
/// missing values before it ever reaches this comparison.
impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Datum::Null, Datum::Null) => true,
            (Datum::Bool(a), Datum::Bool(b)) => a == b,
            (Datum::Flag(a), Datum::Flag(b)) => a == b,
            (Datum::Int(a), Datum::Int(b)) => a == b,
            (Datum::Float(a), Datum::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Datum::Text(a), Datum::Text(b)) => a == b,
            (Datum::List(a), Datum::List(b)) => a == b,
            (Datum::Map(a), Datum::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Datum {
    pub fn text(value: impl Into<String>) -> Self {
        Datum::Text(value.into())
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Datum::Null => true,
            Datum::Float(value) => value.is_nan(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Datum::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

/// Converts loader-specific values into their portable form: `Flag` becomes
/// a native boolean, the non-finite float sentinel becomes `Null`, maps and
/// lists are walked recursively, everything else passes through unchanged.
/// Applying it twice yields the same result as applying it once.
pub fn normalize(datum: &Datum) -> Datum {
    match datum {
        Datum::Map(entries) => Datum::Map(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), normalize(value)))
                .collect(),
        ),
        Datum::List(items) => Datum::List(items.iter().map(normalize).collect()),
        Datum::Flag(flag) => Datum::Bool(*flag),
        Datum::Float(value) if !value.is_finite() => Datum::Null,
        other => other.clone(),
    }
}

impl Serialize for Datum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Datum::Null => serializer.serialize_unit(),
            Datum::Bool(value) | Datum::Flag(value) => serializer.serialize_bool(*value),
            Datum::Int(value) => serializer.serialize_i64(*value),
            Datum::Float(value) if value.is_finite() => serializer.serialize_f64(*value),
            Datum::Float(_) => serializer.serialize_unit(),
            Datum::Text(value) => serializer.serialize_str(value),
            Datum::List(items) => serializer.collect_seq(items),
            Datum::Map(entries) => {
                serializer.collect_map(entries.iter().map(|(key, value)| (key, value)))
            }
        }
    }
}
