//! The compiled boolean condition tree rendered by backends.
//!
//! A rule's declarative detection section compiles into a [`ConditionNode`]
//! tree of field/value leaves combined with AND/OR/NOT. Backends render the
//! tree with an exhaustive match — adding a backend means writing one more
//! renderer, never extending the tree type.

use std::collections::BTreeSet;
use std::fmt;

use sigmaq_parser::SigmaValue;

use crate::error::{ConversionError, Result};

// =============================================================================
// Operators
// =============================================================================

/// Comparison operator of a [`FieldMatch`] leaf.
///
/// Closed set; a backend contract may support only a subset and reports
/// `UnsupportedOperator` for the rest at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
    Cidr,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Equals => "equals",
            Operator::Contains => "contains",
            Operator::StartsWith => "startswith",
            Operator::EndsWith => "endswith",
            Operator::Regex => "re",
            Operator::Cidr => "cidr",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
        };
        write!(f, "{s}")
    }
}

// =============================================================================
// Leaves
// =============================================================================

/// A single field/value predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    /// Field name; `None` for keyword matches without a field binding.
    pub field: Option<String>,
    pub op: Operator,
    pub value: SigmaValue,
}

impl FieldMatch {
    pub fn new(field: impl Into<String>, op: Operator, value: SigmaValue) -> Self {
        FieldMatch {
            field: Some(field.into()),
            op,
            value,
        }
    }

    pub fn keyword(op: Operator, value: SigmaValue) -> Self {
        FieldMatch {
            field: None,
            op,
            value,
        }
    }
}

// =============================================================================
// Condition tree
// =============================================================================

/// A compiled boolean condition tree.
///
/// Trees are finite and non-cyclic by construction. Empty conjunctions and
/// disjunctions are rejected by the [`ConditionNode::conjunction`] /
/// [`ConditionNode::disjunction`] constructors — an empty group is never
/// silently treated as true or false.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    /// A field/value predicate leaf.
    Match(FieldMatch),
    /// Logical AND over the ordered children.
    And(Vec<ConditionNode>),
    /// Logical OR over the ordered children.
    Or(Vec<ConditionNode>),
    /// Logical NOT of the child.
    Not(Box<ConditionNode>),
}

impl ConditionNode {
    /// Build an AND group, rejecting the empty group.
    pub fn conjunction(children: Vec<ConditionNode>) -> Result<ConditionNode> {
        if children.is_empty() {
            return Err(ConversionError::InvalidCondition(
                "empty conjunction".into(),
            ));
        }
        Ok(ConditionNode::And(children))
    }

    /// Build an OR group, rejecting the empty group.
    pub fn disjunction(children: Vec<ConditionNode>) -> Result<ConditionNode> {
        if children.is_empty() {
            return Err(ConversionError::InvalidCondition(
                "empty disjunction".into(),
            ));
        }
        Ok(ConditionNode::Or(children))
    }

    pub fn negation(child: ConditionNode) -> ConditionNode {
        ConditionNode::Not(Box::new(child))
    }

    /// Visit every leaf in the tree.
    pub fn for_each_match<F>(&self, f: &mut F)
    where
        F: FnMut(&FieldMatch),
    {
        match self {
            ConditionNode::Match(m) => f(m),
            ConditionNode::And(children) | ConditionNode::Or(children) => {
                for child in children {
                    child.for_each_match(f);
                }
            }
            ConditionNode::Not(child) => child.for_each_match(f),
        }
    }

    /// Visit every leaf in the tree mutably.
    pub fn for_each_match_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut FieldMatch),
    {
        match self {
            ConditionNode::Match(m) => f(m),
            ConditionNode::And(children) | ConditionNode::Or(children) => {
                for child in children {
                    child.for_each_match_mut(f);
                }
            }
            ConditionNode::Not(child) => child.for_each_match_mut(f),
        }
    }

    /// The set of field names referenced by this tree.
    ///
    /// Derived on demand, so field-renaming transformations can never leave a
    /// stored copy stale.
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        self.for_each_match(&mut |m| {
            if let Some(ref name) = m.field {
                fields.insert(name.clone());
            }
        });
        fields
    }
}
