//! Attribute values and items: the rows a tree learns from.

use std::cmp::Ordering;
use std::fmt;

use crate::error::TreeError;

/// A single attribute value: either a number or a piece of text.
///
/// Equality is typed, so `Number(5.0)` never equals `Text("5")`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    /// A finite floating-point number.
    Number(f64),
    /// Free-form text.
    Text(String),
}

impl Value {
    /// Return `true` if this value is a number.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// Return the number, if this value is numeric.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    /// Return the text, if this value is textual.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Number(_) => None,
            Value::Text(s) => Some(s),
        }
    }

    /// Order two values of the same kind. Mixed kinds are unordered.
    pub(crate) fn partial_order(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Hashable identity used to deduplicate split candidates.
    pub(crate) fn key(&self) -> ValueKey<'_> {
        match self {
            // -0.0 and 0.0 compare equal, so they must share a key.
            Value::Number(n) if *n == 0.0 => ValueKey::Number(0.0f64.to_bits()),
            Value::Number(n) => ValueKey::Number(n.to_bits()),
            Value::Text(s) => ValueKey::Text(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ValueKey<'a> {
    Number(u64),
    Text(&'a str),
}

/// One row of a training set: an ordered mapping from attribute name to value.
///
/// The insertion order of attributes is the order in which candidate splits
/// are searched, so it participates in tie-breaking between equal gains.
/// Attributes that were never set are simply absent.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Item {
    fields: Vec<(String, Value)>,
}

impl Item {
    /// Create an item with no attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute and return the item, for chained construction.
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(attribute, value);
        self
    }

    /// Set an attribute. An existing attribute keeps its position.
    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        let attribute = attribute.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == attribute) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((attribute, value)),
        }
    }

    /// Look up an attribute value.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, value)| value)
    }

    /// Iterate over `(attribute, value)` pairs in insertion order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Return the number of attributes present on this item.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Return `true` if the item has no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Item
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut item = Item::new();
        for (attribute, value) in iter {
            item.insert(attribute, value);
        }
        item
    }
}

/// Check a training set before any recursion starts.
///
/// Returns the category value of every item, in item order.
pub(crate) fn validate_training_set<'a>(
    items: &'a [Item],
    category_attr: &str,
) -> Result<Vec<&'a Value>, TreeError> {
    if items.is_empty() {
        return Err(TreeError::EmptyTrainingSet);
    }
    let mut categories = Vec::with_capacity(items.len());
    for (item_index, item) in items.iter().enumerate() {
        for (attribute, value) in item.attributes() {
            if let Value::Number(n) = value {
                if !n.is_finite() {
                    return Err(TreeError::NonFiniteValue {
                        item_index,
                        attribute: attribute.to_string(),
                    });
                }
            }
        }
        let category = item.get(category_attr).ok_or_else(|| TreeError::MissingCategory {
            item_index,
            category_attr: category_attr.to_string(),
        })?;
        categories.push(category);
    }
    Ok(categories)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut item = Item::new().with("x", 1.0).with("y", "a");
        item.insert("x", 2.0);
        let names: Vec<&str> = item.attributes().map(|(n, _)| n).collect();
        assert_eq!(names, ["x", "y"]);
        assert_eq!(item.get("x"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn absent_attribute_is_none() {
        let item = Item::new().with("x", 1.0);
        assert!(item.get("y").is_none());
    }

    #[test]
    fn typed_equality() {
        assert_ne!(Value::from(5), Value::from("5"));
        assert_eq!(Value::from(5), Value::from(5.0));
    }

    #[test]
    fn mixed_kinds_are_unordered() {
        assert!(Value::from(1.0).partial_order(&Value::from("a")).is_none());
        assert_eq!(
            Value::from("a").partial_order(&Value::from("b")),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn signed_zero_shares_key() {
        assert_eq!(Value::from(0.0).key(), Value::from(-0.0).key());
    }

    #[test]
    fn collect_from_pairs() {
        let item: Item = vec![("a", 1.0), ("b", 2.0)].into_iter().collect();
        assert_eq!(item.len(), 2);
        assert_eq!(item.get("b").and_then(Value::as_number), Some(2.0));
    }

    #[test]
    fn validation_rejects_empty_set() {
        let err = validate_training_set(&[], "category").unwrap_err();
        assert!(matches!(err, TreeError::EmptyTrainingSet));
    }

    #[test]
    fn validation_rejects_missing_category() {
        let items = vec![
            Item::new().with("x", 1.0).with("category", "A"),
            Item::new().with("x", 2.0),
        ];
        let err = validate_training_set(&items, "category").unwrap_err();
        assert!(matches!(err, TreeError::MissingCategory { item_index: 1, .. }));
    }

    #[test]
    fn validation_rejects_non_finite() {
        let items = vec![Item::new().with("x", f64::NAN).with("category", "A")];
        let err = validate_training_set(&items, "category").unwrap_err();
        assert!(matches!(err, TreeError::NonFiniteValue { item_index: 0, .. }));
    }
}
