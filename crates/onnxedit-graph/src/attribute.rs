//! Node attributes - the closed value type edits operate on
//!
//! Scalar and list attributes are held natively so edits can read and rewrite
//! them. Everything else (tensors, subgraphs, type protos, reference
//! attributes) is kept as the decoded protobuf and written back untouched.

use crate::onnx::{attribute_proto::AttributeType, AttributeProto, GraphProto, TensorProto};
use onnxedit_core::{AttrKind, AttrValue, Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum Attribute {
    Int(i64),
    Float(f32),
    String(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
    Opaque(Box<AttributeProto>),
}

impl Attribute {
    pub fn from_proto(mut proto: AttributeProto) -> Self {
        if !proto.ref_attr_name.is_empty() || !proto.doc_string.is_empty() {
            return Self::Opaque(Box::new(proto));
        }
        match AttributeType::try_from(proto.r#type) {
            Ok(AttributeType::Int) => Self::Int(proto.i.unwrap_or_default()),
            Ok(AttributeType::Float) => Self::Float(proto.f.unwrap_or_default()),
            Ok(AttributeType::Ints) => Self::Ints(proto.ints),
            Ok(AttributeType::Floats) => Self::Floats(proto.floats),
            Ok(AttributeType::String) => match String::from_utf8(proto.s.take().unwrap_or_default()) {
                Ok(s) => Self::String(s),
                Err(e) => Self::Opaque(Box::new(AttributeProto {
                    s: Some(e.into_bytes()),
                    ..proto
                })),
            },
            Ok(AttributeType::Strings) => {
                if proto.strings.iter().all(|s| std::str::from_utf8(s).is_ok()) {
                    Self::Strings(
                        proto
                            .strings
                            .into_iter()
                            .map(|s| String::from_utf8(s).unwrap_or_default())
                            .collect(),
                    )
                } else {
                    Self::Opaque(Box::new(proto))
                }
            }
            _ => Self::Opaque(Box::new(proto)),
        }
    }

    pub fn to_proto(&self, name: &str) -> AttributeProto {
        let mut proto = AttributeProto {
            name: name.to_string(),
            ..Default::default()
        };
        match self {
            Self::Int(i) => {
                proto.r#type = AttributeType::Int as i32;
                proto.i = Some(*i);
            }
            Self::Float(f) => {
                proto.r#type = AttributeType::Float as i32;
                proto.f = Some(*f);
            }
            Self::String(s) => {
                proto.r#type = AttributeType::String as i32;
                proto.s = Some(s.as_bytes().to_vec());
            }
            Self::Ints(v) => {
                proto.r#type = AttributeType::Ints as i32;
                proto.ints = v.clone();
            }
            Self::Floats(v) => {
                proto.r#type = AttributeType::Floats as i32;
                proto.floats = v.clone();
            }
            Self::Strings(v) => {
                proto.r#type = AttributeType::Strings as i32;
                proto.strings = v.iter().map(|s| s.as_bytes().to_vec()).collect();
            }
            Self::Opaque(inner) => {
                proto = (**inner).clone();
                proto.name = name.to_string();
            }
        }
        proto
    }

    /// The attribute as the GUI sees it. Opaque payloads and non-finite floats
    /// have no JSON form.
    pub fn to_value(&self) -> Option<AttrValue> {
        match self {
            Self::Int(i) => Some(AttrValue::int(*i)),
            Self::Float(f) => AttrValue::float(*f as f64),
            Self::String(s) => Some(AttrValue::string(s.clone())),
            Self::Ints(v) => Some(AttrValue::from(v.clone())),
            Self::Floats(v) => v
                .iter()
                .map(|f| serde_json::Number::from_f64(*f as f64))
                .collect::<Option<Vec<_>>>()
                .map(AttrValue::NumberList),
            Self::Strings(v) => Some(AttrValue::StringList(v.clone())),
            Self::Opaque(_) => None,
        }
    }

    pub fn kind(&self) -> Option<AttrKind> {
        match self {
            Self::Int(_) => Some(AttrKind::Int),
            Self::Float(_) => Some(AttrKind::Float),
            Self::String(_) => Some(AttrKind::String),
            Self::Ints(_) => Some(AttrKind::Ints),
            Self::Floats(_) => Some(AttrKind::Floats),
            Self::Strings(_) => Some(AttrKind::Strings),
            Self::Opaque(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&TensorProto> {
        match self {
            Self::Opaque(proto) => proto.t.as_ref(),
            _ => None,
        }
    }

    /// Subgraphs carried by this attribute (control-flow bodies).
    pub fn subgraphs(&self) -> Vec<&GraphProto> {
        match self {
            Self::Opaque(proto) => proto.g.iter().chain(proto.graphs.iter()).collect(),
            _ => Vec::new(),
        }
    }

    /// Convert the value to another attribute type. Fails without side effects
    /// when the value has no representation in the target type.
    pub fn convert(&self, kind: AttrKind) -> Result<Attribute> {
        if self.kind() == Some(kind) {
            return Ok(self.clone());
        }
        let converted = match (self, kind) {
            (Self::Opaque(proto), _) => {
                let ty = AttributeType::try_from(proto.r#type).unwrap_or(AttributeType::Undefined);
                return Err(Error::coercion(format!("cannot convert a {ty:?} attribute")));
            }

            (Self::Float(f), AttrKind::Int) => Self::Int(float_to_int(*f)?),
            (Self::String(s), AttrKind::Int) => Self::Int(parse_int(s)?),
            (Self::Ints(v), AttrKind::Int) => Self::Int(single(v)?),
            (Self::Floats(v), AttrKind::Int) => Self::Int(float_to_int(single(v)?)?),
            (Self::Strings(v), AttrKind::Int) => Self::Int(parse_int(&single(v)?)?),

            (Self::Int(i), AttrKind::Float) => Self::Float(*i as f32),
            (Self::String(s), AttrKind::Float) => Self::Float(parse_float(s)?),
            (Self::Ints(v), AttrKind::Float) => Self::Float(single(v)? as f32),
            (Self::Floats(v), AttrKind::Float) => Self::Float(single(v)?),
            (Self::Strings(v), AttrKind::Float) => Self::Float(parse_float(&single(v)?)?),

            (Self::Int(i), AttrKind::String) => Self::String(i.to_string()),
            (Self::Float(f), AttrKind::String) => Self::String(f.to_string()),
            (Self::Ints(v), AttrKind::String) => Self::String(single(v)?.to_string()),
            (Self::Floats(v), AttrKind::String) => Self::String(single(v)?.to_string()),
            (Self::Strings(v), AttrKind::String) => Self::String(single(v)?),

            (Self::Int(i), AttrKind::Ints) => Self::Ints(vec![*i]),
            (Self::Float(f), AttrKind::Ints) => Self::Ints(vec![float_to_int(*f)?]),
            (Self::String(s), AttrKind::Ints) => Self::Ints(vec![parse_int(s)?]),
            (Self::Floats(v), AttrKind::Ints) => Self::Ints(
                v.iter()
                    .map(|f| float_to_int(*f))
                    .collect::<Result<Vec<_>>>()?,
            ),
            (Self::Strings(v), AttrKind::Ints) => {
                Self::Ints(v.iter().map(|s| parse_int(s)).collect::<Result<Vec<_>>>()?)
            }

            (Self::Int(i), AttrKind::Floats) => Self::Floats(vec![*i as f32]),
            (Self::Float(f), AttrKind::Floats) => Self::Floats(vec![*f]),
            (Self::String(s), AttrKind::Floats) => Self::Floats(vec![parse_float(s)?]),
            (Self::Ints(v), AttrKind::Floats) => Self::Floats(v.iter().map(|i| *i as f32).collect()),
            (Self::Strings(v), AttrKind::Floats) => Self::Floats(
                v.iter()
                    .map(|s| parse_float(s))
                    .collect::<Result<Vec<_>>>()?,
            ),

            (Self::Int(i), AttrKind::Strings) => Self::Strings(vec![i.to_string()]),
            (Self::Float(f), AttrKind::Strings) => Self::Strings(vec![f.to_string()]),
            (Self::String(s), AttrKind::Strings) => Self::Strings(vec![s.clone()]),
            (Self::Ints(v), AttrKind::Strings) => {
                Self::Strings(v.iter().map(|i| i.to_string()).collect())
            }
            (Self::Floats(v), AttrKind::Strings) => {
                Self::Strings(v.iter().map(|f| f.to_string()).collect())
            }

            // Same-kind pairs returned early above.
            (Self::Int(_), AttrKind::Int)
            | (Self::Float(_), AttrKind::Float)
            | (Self::String(_), AttrKind::String)
            | (Self::Ints(_), AttrKind::Ints)
            | (Self::Floats(_), AttrKind::Floats)
            | (Self::Strings(_), AttrKind::Strings) => self.clone(),
        };
        Ok(converted)
    }
}

impl From<AttrValue> for Attribute {
    fn from(value: AttrValue) -> Self {
        match value {
            AttrValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default() as f32),
            },
            AttrValue::String(s) => Self::String(s),
            AttrValue::NumberList(list) => {
                let ints: Option<Vec<i64>> = list.iter().map(|n| n.as_i64()).collect();
                match ints {
                    Some(ints) => Self::Ints(ints),
                    None => Self::Floats(
                        list.iter()
                            .map(|n| n.as_f64().unwrap_or_default() as f32)
                            .collect(),
                    ),
                }
            }
            AttrValue::StringList(list) => Self::Strings(list),
        }
    }
}

fn single<T: Clone>(values: &[T]) -> Result<T> {
    match values {
        [v] => Ok(v.clone()),
        _ => Err(Error::coercion(format!(
            "expected exactly one element, found {}",
            values.len()
        ))),
    }
}

fn float_to_int(f: f32) -> Result<i64> {
    if f.is_finite() {
        Ok(f.trunc() as i64)
    } else {
        Err(Error::coercion(format!("{f} has no integer value")))
    }
}

fn parse_int(s: &str) -> Result<i64> {
    s.trim()
        .parse::<i64>()
        .map_err(|e| Error::coercion(format!("'{s}' is not an integer: {e}")))
}

fn parse_float(s: &str) -> Result<f32> {
    s.trim()
        .parse::<f32>()
        .map_err(|e| Error::coercion(format!("'{s}' is not a number: {e}")))
}
