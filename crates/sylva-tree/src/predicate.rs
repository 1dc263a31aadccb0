use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::TreeError;
use crate::item::Value;

/// A named binary comparison between an item's value and a split pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Predicate {
    /// `value == pivot` (typed: numbers never equal text).
    Equals,
    /// `value >= pivot` for two numbers or two texts.
    GreaterOrEqual,
    /// `value <= pivot` for two numbers or two texts.
    LessOrEqual,
}

impl Predicate {
    /// Evaluate `predicate(value, pivot)`.
    #[must_use]
    pub fn apply(self, value: &Value, pivot: &Value) -> bool {
        match self {
            Predicate::Equals => value == pivot,
            Predicate::GreaterOrEqual => matches!(
                value.partial_order(pivot),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Predicate::LessOrEqual => matches!(
                value.partial_order(pivot),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }

    /// Return the canonical name, e.g. `greater-or-equal`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Predicate::Equals => "equals",
            Predicate::GreaterOrEqual => "greater-or-equal",
            Predicate::LessOrEqual => "less-or-equal",
        }
    }

    /// Return the operator symbol, e.g. `>=`.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Predicate::Equals => "==",
            Predicate::GreaterOrEqual => ">=",
            Predicate::LessOrEqual => "<=",
        }
    }

    /// Whether this predicate is worth trying against `pivot` during split search.
    ///
    /// Ordering predicates are only tried against numeric pivots.
    pub(crate) fn accepts_pivot(self, pivot: &Value) -> bool {
        self == Predicate::Equals || pivot.is_number()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Predicate {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" | "==" => Ok(Predicate::Equals),
            "greater-or-equal" | ">=" => Ok(Predicate::GreaterOrEqual),
            "less-or-equal" | "<=" => Ok(Predicate::LessOrEqual),
            other => Err(TreeError::UnknownPredicate {
                name: other.to_string(),
            }),
        }
    }
}

/// An ordered, duplicate-free set of predicates.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PredicateSet(Vec<Predicate>);

impl PredicateSet {
    /// `[==, >=, <=]`.
    #[must_use]
    pub fn all() -> Self {
        Self(vec![
            Predicate::Equals,
            Predicate::GreaterOrEqual,
            Predicate::LessOrEqual,
        ])
    }

    /// Build a set from the given predicates, dropping repeats.
    #[must_use]
    pub fn from_predicates(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        let mut set = Vec::new();
        for p in predicates {
            if !set.contains(&p) {
                set.push(p);
            }
        }
        Self(set)
    }

    /// Return the set without `predicate`.
    #[must_use]
    pub fn without(mut self, predicate: Predicate) -> Self {
        self.0.retain(|&p| p != predicate);
        self
    }

    /// Return the predicates in search order.
    #[must_use]
    pub fn as_slice(&self) -> &[Predicate] {
        &self.0
    }

    /// Return `true` if the set has no predicates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which predicates the tree builder tries for each candidate pivot.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PredicateSelection {
    /// One predicate per pivot: `>=` for numbers, `==` for text.
    #[default]
    ByValueType,
    /// Every predicate of the set, in order. Ordering predicates skip text pivots.
    Fixed(PredicateSet),
}

impl PredicateSelection {
    /// Predicates to evaluate for `pivot`, in search order.
    pub(crate) fn candidates_for(&self, pivot: &Value) -> Vec<Predicate> {
        match self {
            PredicateSelection::ByValueType => {
                if pivot.is_number() {
                    vec![Predicate::GreaterOrEqual]
                } else {
                    vec![Predicate::Equals]
                }
            }
            PredicateSelection::Fixed(set) => set
                .as_slice()
                .iter()
                .copied()
                .filter(|p| p.accepts_pivot(pivot))
                .collect(),
        }
    }
}
