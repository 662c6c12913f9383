//! The food inventory record and the loosely-typed shapes it is built from.
//!
//! Request bodies and query strings are lenient: numbers may arrive as
//! numeric strings, and `null` or `""` count as "not supplied".

use std::fmt;

use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::errors::ServiceError;

/// Names of the five data fields, in wire order.
pub const FIELD_NAMES: [&str; 5] = ["product", "amount", "price", "shop", "todate"];

/// Record identity. Sequential stores hand out integers; uuid and
/// document-database stores hand out opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    Seq(u64),
    Opaque(String),
}

impl RecordId {
    /// Canonical digit strings (`"42"`, not `"042"`) become `Seq`,
    /// anything else non-empty `Opaque`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match raw.parse::<u64>() {
            Ok(n) if n.to_string() == raw => Self::Seq(n),
            _ => Self::Opaque(raw.to_string()),
        })
    }

    pub fn as_seq(&self) -> Option<u64> {
        match self {
            Self::Seq(n) => Some(*n),
            Self::Opaque(_) => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seq(n) => write!(f, "{n}"),
            Self::Opaque(s) => f.write_str(s),
        }
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self { Self::Seq(n) }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Seq(n) => s.serialize_u64(*n),
            Self::Opaque(v) => s.serialize_str(v),
        }
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        d.deserialize_any(IdVisitor)?
            .ok_or_else(|| de::Error::custom("record id must not be empty"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub product: String,
    #[serde(serialize_with = "ser_number", deserialize_with = "number")]
    pub amount: f64,
    #[serde(serialize_with = "ser_number", deserialize_with = "number")]
    pub price: f64,
    pub shop: String,
    pub todate: String,
}

/// Fields supplied by a caller. Used whole for create/replace and as a
/// partial overlay for update. `id` only carries the target of PUT/PATCH
/// bodies; it never overwrites a stored id.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordFields {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "opt_text")]
    pub product: Option<String>,
    #[serde(default, deserialize_with = "opt_number")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "opt_text")]
    pub shop: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub todate: Option<String>,
}

impl RecordFields {
    /// Data fields that were not supplied, in wire order.
    pub fn missing(&self) -> Vec<&'static str> {
        let present = [
            self.product.is_some(),
            self.amount.is_some(),
            self.price.is_some(),
            self.shop.is_some(),
            self.todate.is_some(),
        ];
        FIELD_NAMES
            .iter()
            .zip(present)
            .filter(|(_, p)| !p)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn require_complete(&self) -> Result<(), ServiceError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing_fields(&missing))
        }
    }

    /// Build a full record under `id`; every data field must be present.
    pub fn into_record(self, id: RecordId) -> Result<Record, ServiceError> {
        match self {
            RecordFields {
                product: Some(product),
                amount: Some(amount),
                price: Some(price),
                shop: Some(shop),
                todate: Some(todate),
                ..
            } => Ok(Record { id, product, amount, price, shop, todate }),
            incomplete => Err(missing_fields(&incomplete.missing())),
        }
    }

    /// Overwrite exactly the supplied fields of `record`.
    pub fn apply_to(self, record: &mut Record) {
        if let Some(v) = self.product { record.product = v; }
        if let Some(v) = self.amount { record.amount = v; }
        if let Some(v) = self.price { record.price = v; }
        if let Some(v) = self.shop { record.shop = v; }
        if let Some(v) = self.todate { record.todate = v; }
    }

    /// The supplied data fields as a JSON object.
    pub fn data_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(v) = &self.product { map.insert("product".into(), Value::String(v.clone())); }
        if let Some(v) = self.amount { map.insert("amount".into(), number_value(v)); }
        if let Some(v) = self.price { map.insert("price".into(), number_value(v)); }
        if let Some(v) = &self.shop { map.insert("shop".into(), Value::String(v.clone())); }
        if let Some(v) = &self.todate { map.insert("todate".into(), Value::String(v.clone())); }
        map
    }
}

fn missing_fields(missing: &[&str]) -> ServiceError {
    ServiceError::Validation(format!("missing required fields: {}", missing.join(", ")))
}

/// Equality constraints for `list`; absent members do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordFilter {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "opt_text")]
    pub product: Option<String>,
    #[serde(default, deserialize_with = "filter_number")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "filter_number")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "opt_text")]
    pub shop: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub todate: Option<String>,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.equalities().is_empty()
    }

    /// A numeric constraint that is not a finite number; no record can match it.
    pub fn matches_nothing(&self) -> bool {
        [self.amount, self.price]
            .into_iter()
            .any(|n| n.is_some_and(|n| !n.is_finite()))
    }

    pub fn matches(&self, r: &Record) -> bool {
        fn eq<T: PartialEq + ?Sized>(want: Option<&T>, have: &T) -> bool {
            want.map_or(true, |w| w == have)
        }
        eq(self.id.as_ref(), &r.id)
            && eq(self.product.as_deref(), r.product.as_str())
            && eq(self.amount.as_ref(), &r.amount)
            && eq(self.price.as_ref(), &r.price)
            && eq(self.shop.as_deref(), r.shop.as_str())
            && eq(self.todate.as_deref(), r.todate.as_str())
    }

    /// `(field, value)` pairs of the supplied constraints.
    pub fn equalities(&self) -> Vec<(&'static str, Value)> {
        let mut out = Vec::new();
        if let Some(id) = &self.id {
            let v = match id {
                RecordId::Seq(n) => Value::from(*n),
                RecordId::Opaque(s) => Value::String(s.clone()),
            };
            out.push(("id", v));
        }
        if let Some(v) = &self.product { out.push(("product", Value::String(v.clone()))); }
        if let Some(v) = self.amount { out.push(("amount", number_value(v))); }
        if let Some(v) = self.price { out.push(("price", number_value(v))); }
        if let Some(v) = &self.shop { out.push(("shop", Value::String(v.clone()))); }
        if let Some(v) = &self.todate { out.push(("todate", Value::String(v.clone()))); }
        out
    }
}

/// `PUT`/`PATCH` and `DELETE` need a target id.
pub fn require_id(id: Option<RecordId>) -> Result<RecordId, ServiceError> {
    id.ok_or_else(|| ServiceError::Validation("id is required".into()))
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn is_integral(n: f64) -> bool {
    n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER
}

/// Whole numbers are emitted as JSON integers, `5` rather than `5.0`.
pub fn number_value(n: f64) -> Value {
    if is_integral(n) {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

fn ser_number<S: Serializer>(n: &f64, s: S) -> Result<S::Ok, S::Error> {
    if is_integral(*n) {
        s.serialize_i64(*n as i64)
    } else {
        s.serialize_f64(*n)
    }
}

fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    d.deserialize_any(NumberVisitor)?
        .ok_or_else(|| de::Error::custom("expected a number"))
}

/// Optional record id; `null` and `""` read as absent.
pub fn opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<RecordId>, D::Error> {
    d.deserialize_any(IdVisitor)
}

/// Optional number; accepts numeric strings.
pub fn opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    d.deserialize_any(NumberVisitor)
}

/// Filter number. Values that do not read as a number are kept as NaN,
/// which equals no record.
fn filter_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    d.deserialize_any(FilterNumberVisitor)
}

/// Optional string; scalars are taken in their display form.
pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    d.deserialize_any(TextVisitor)
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = Option<RecordId>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a record id (non-negative integer or string)")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(RecordId::Seq(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(|n| Some(RecordId::Seq(n)))
            .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if v >= 0.0 && is_integral(v) {
            Ok(Some(RecordId::Seq(v as u64)))
        } else {
            Err(E::invalid_value(Unexpected::Float(v), &self))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(RecordId::parse(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(IdVisitor)
    }
}

struct NumberVisitor;

impl NumberVisitor {
    fn finite<E: de::Error>(&self, v: f64) -> Result<Option<f64>, E> {
        if v.is_finite() {
            Ok(Some(v))
        } else {
            Err(E::invalid_value(Unexpected::Float(v), self))
        }
    }
}

impl<'de> Visitor<'de> for NumberVisitor {
    type Value = Option<f64>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a finite number or numeric string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        self.finite(v)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        match trimmed.parse::<f64>() {
            Ok(n) => self.finite(n),
            Err(_) => Err(E::invalid_value(Unexpected::Str(v), &self)),
        }
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(NumberVisitor)
    }
}

struct FilterNumberVisitor;

impl<'de> Visitor<'de> for FilterNumberVisitor {
    type Value = Option<f64>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number filter")
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<Self::Value, E> {
        Ok(Some(f64::NAN))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(trimmed.parse::<f64>().unwrap_or(f64::NAN)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(FilterNumberVisitor)
    }
}

struct TextVisitor;

impl<'de> Visitor<'de> for TextVisitor {
    type Value = Option<String>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok((!v.is_empty()).then(|| v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok((!v.is_empty()).then_some(v))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(TextVisitor)
    }
}
