//! Python-shaped data exchanged with a sandboxed routine.
//!
//! JSON cannot carry NaN, tuples or bounded deques, so those travel as small
//! tagged objects: `{"$float": "nan"}`, `{"$tuple": [...]}`,
//! `{"$deque": [...], "maxlen": n}`, `{"$iter": [...], "type": t, "sized": b}`
//! for other iterables drained by the driver, and `{"$repr": "..."}` for
//! anything it could not represent structurally (including reference cycles).

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value as Json};

/// A value crossing the sandbox boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Bounded FIFO; `maxlen` of `None` means unbounded.
    Deque {
        items: Vec<Value>,
        maxlen: Option<usize>,
    },
    Dict(BTreeMap<String, Value>),
    /// Any other iterable (generator, set, map object, ...), drained.
    Iterable {
        type_name: String,
        items: Vec<Value>,
        /// Whether `len()` works on the original object.
        sized: bool,
    },
    /// Representation of an object with no structural encoding.
    Opaque(String),
}

impl Value {
    /// Build a dict from key/value pairs.
    pub fn dict<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a bounded deque.
    pub fn deque(items: Vec<Value>, maxlen: usize) -> Self {
        Value::Deque {
            items,
            maxlen: Some(maxlen),
        }
    }

    /// Look up a key when this is a dict.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(map) => map.get(key),
            _ => None,
        }
    }

    pub fn is_dict(&self) -> bool {
        matches!(self, Value::Dict(_))
    }

    /// Numeric view of ints and floats. Booleans are not numbers here.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        self.as_number().is_some()
    }

    /// True only for a float holding NaN.
    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Float(f) if f.is_nan())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of any sequence type (list, tuple, deque).
    pub fn items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) | Value::Deque { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Python type name, used in diagnostics.
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Deque { .. } => "collections.deque",
            Value::Dict(_) => "dict",
            Value::Iterable { type_name, .. } => type_name,
            Value::Opaque(_) => "object",
        }
    }

    /// Encode for the driver protocol.
    pub fn to_json(&self) -> Json {
        match self {
            Value::None => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::Number((*i).into()),
            Value::Float(f) => match Number::from_f64(*f) {
                Some(n) => Json::Number(n),
                None => tagged("$float", Json::String(float_repr(*f).to_string())),
            },
            Value::Str(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Tuple(items) => tagged(
                "$tuple",
                Json::Array(items.iter().map(Value::to_json).collect()),
            ),
            Value::Deque { items, maxlen } => {
                let mut map = Map::new();
                map.insert(
                    "$deque".to_string(),
                    Json::Array(items.iter().map(Value::to_json).collect()),
                );
                map.insert(
                    "maxlen".to_string(),
                    maxlen.map_or(Json::Null, |n| Json::Number(n.into())),
                );
                Json::Object(map)
            }
            Value::Dict(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Iterable {
                type_name,
                items,
                sized,
            } => {
                let mut map = Map::new();
                map.insert(
                    "$iter".to_string(),
                    Json::Array(items.iter().map(Value::to_json).collect()),
                );
                map.insert("type".to_string(), Json::String(type_name.clone()));
                map.insert("sized".to_string(), Json::Bool(*sized));
                Json::Object(map)
            }
            Value::Opaque(repr) => tagged("$repr", Json::String(repr.clone())),
        }
    }

    /// Decode a driver protocol value. Unknown shapes decode structurally.
    pub fn from_json(json: &Json) -> Self {
        match json {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => decode_object(map),
        }
    }
}

fn tagged(tag: &str, payload: Json) -> Json {
    let mut map = Map::new();
    map.insert(tag.to_string(), payload);
    Json::Object(map)
}

fn float_repr(f: f64) -> &'static str {
    if f.is_nan() {
        "nan"
    } else if f.is_sign_negative() {
        "-inf"
    } else {
        "inf"
    }
}

fn parse_float_repr(repr: &str) -> f64 {
    match repr {
        "nan" => f64::NAN,
        "inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        other => other.parse().unwrap_or(f64::NAN),
    }
}

fn decode_object(map: &Map<String, Json>) -> Value {
    let only = |key: &str| map.len() == 1 && map.contains_key(key);

    if only("$float") {
        if let Some(Json::String(repr)) = map.get("$float") {
            return Value::Float(parse_float_repr(repr));
        }
    }
    if only("$tuple") {
        if let Some(Json::Array(items)) = map.get("$tuple") {
            return Value::Tuple(items.iter().map(Value::from_json).collect());
        }
    }
    if only("$repr") {
        if let Some(Json::String(repr)) = map.get("$repr") {
            return Value::Opaque(repr.clone());
        }
    }
    if map.len() == 2 {
        if let (Some(Json::Array(items)), Some(maxlen)) = (map.get("$deque"), map.get("maxlen")) {
            return Value::Deque {
                items: items.iter().map(Value::from_json).collect(),
                maxlen: maxlen.as_u64().map(|n| n as usize),
            };
        }
    }

    if map.len() == 3 {
        if let (Some(Json::Array(items)), Some(Json::String(type_name)), Some(Json::Bool(sized))) =
            (map.get("$iter"), map.get("type"), map.get("sized"))
        {
            return Value::Iterable {
                type_name: type_name.clone(),
                items: items.iter().map(Value::from_json).collect(),
                sized: *sized,
            };
        }
    }

    Value::Dict(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v)))
            .collect(),
    )
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::None, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_finite_floats_are_tagged() {
        assert_eq!(Value::Float(f64::NAN).to_json(), json!({"$float": "nan"}));
        assert_eq!(Value::Float(f64::INFINITY).to_json(), json!({"$float": "inf"}));
        assert_eq!(
            Value::Float(f64::NEG_INFINITY).to_json(),
            json!({"$float": "-inf"})
        );
        assert!(Value::from_json(&json!({"$float": "nan"})).is_nan());
    }

    #[test]
    fn test_ints_and_floats_stay_distinct() {
        assert_eq!(Value::from_json(&json!(5)), Value::Int(5));
        assert_eq!(Value::from_json(&json!(5.0)), Value::Float(5.0));
        assert_eq!(Value::Float(9.0).to_json().to_string(), "9.0");
    }

    #[test]
    fn test_deque_keeps_maxlen() {
        let deque = Value::deque(vec![Value::Int(1)], 240);
        let wire = deque.to_json();
        assert_eq!(wire, json!({"$deque": [1], "maxlen": 240}));
        assert_eq!(Value::from_json(&wire), deque);

        let unbounded = Value::from_json(&json!({"$deque": [], "maxlen": null}));
        assert_eq!(
            unbounded,
            Value::Deque {
                items: vec![],
                maxlen: None
            }
        );
    }

    #[test]
    fn test_plain_dict_with_dollar_key_is_not_mistaken_for_tag() {
        let decoded = Value::from_json(&json!({"$float": "nan", "other": 1}));
        assert!(decoded.is_dict());
        assert_eq!(decoded.get("other"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_tuple_and_opaque_decode() {
        let decoded = Value::from_json(&json!({"$tuple": [1, "a"]}));
        assert_eq!(
            decoded,
            Value::Tuple(vec![Value::Int(1), Value::Str("a".to_string())])
        );
        assert_eq!(decoded.items().map(|i| i.len()), Some(2));

        let opaque = Value::from_json(&json!({"$repr": "<object at 0x1>"}));
        assert_eq!(opaque.type_name(), "object");
    }

    #[test]
    fn test_drained_iterable_decodes_with_its_type() {
        let decoded = Value::from_json(&json!({"$iter": [1, 2], "type": "generator", "sized": false}));
        assert_eq!(
            decoded,
            Value::Iterable {
                type_name: "generator".to_string(),
                items: vec![Value::Int(1), Value::Int(2)],
                sized: false,
            }
        );
        assert_eq!(decoded.type_name(), "generator");
        assert_eq!(decoded.items(), None);

        let user_dict = Value::from_json(&json!({"$iter": [], "type": "x", "extra": 1}));
        assert!(user_dict.is_dict());
    }

    #[test]
    fn test_numeric_view_excludes_bool() {
        assert!(Value::Int(3).is_number());
        assert!(Value::Float(3.5).is_number());
        assert!(!Value::Bool(true).is_number());
        assert!(!Value::Str("3".to_string()).is_number());
        assert!(!Value::Int(1).is_nan());
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<&str>), Value::None);
        assert_eq!(Value::from(Some("5.4")), Value::Str("5.4".to_string()));
    }
}
