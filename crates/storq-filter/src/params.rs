use crate::ast::{Expr, Operand, Scalar};
use std::collections::BTreeMap;
use storq_schema::ParameterValue;
use thiserror::Error as ThisError;

///
/// Substitution
///
/// The literal a parameter leaf resolves to: a scalar, or a whole array
/// literal. Produced by the stored-query resolver after schema validation.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Substitution {
    Scalar(Scalar),
    Array(Vec<Scalar>),
}

impl Substitution {
    fn into_operand(self) -> Operand {
        match self {
            Self::Scalar(scalar) => Operand::Literal(scalar),
            Self::Array(items) => Operand::Array(items.into_iter().map(Operand::Literal).collect()),
        }
    }
}

///
/// SubstituteError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum SubstituteError {
    #[error("no substitution provided for filter parameter '{name}'")]
    Missing { name: String },
}

/// Collect every parameter leaf in depth-first, left-to-right order.
///
/// Occurrence order is a contract: the collector's first-write-wins merge
/// keys off it. Duplicates are reported as often as they occur.
#[must_use]
pub fn extract_parameters(expr: &Expr) -> Vec<&ParameterValue> {
    let mut found = Vec::new();
    walk_expr(expr, &mut found);
    found
}

fn walk_expr<'a>(expr: &'a Expr, found: &mut Vec<&'a ParameterValue>) {
    match expr {
        Expr::And(children) | Expr::Or(children) => {
            for child in children {
                walk_expr(child, found);
            }
        }
        Expr::Not(inner) => walk_expr(inner, found),
        Expr::Compare { operand, .. } => walk_operand(operand, found),
        Expr::In { items, .. } => {
            for item in items {
                walk_operand(item, found);
            }
        }
        Expr::Between { lower, upper, .. } => {
            walk_operand(lower, found);
            walk_operand(upper, found);
        }
        Expr::IsNull { .. } => {}
    }
}

fn walk_operand<'a>(operand: &'a Operand, found: &mut Vec<&'a ParameterValue>) {
    match operand {
        Operand::Property(_) | Operand::Literal(_) => {}
        Operand::Array(items) => {
            for item in items {
                walk_operand(item, found);
            }
        }
        Operand::Parameter(parameter) => found.push(parameter),
    }
}

/// Structural copy with every parameter leaf replaced by its literal.
///
/// Non-parameter nodes are copied unchanged. Fails on the first parameter
/// without an entry in `substitutions`.
pub fn substitute(
    expr: &Expr,
    substitutions: &BTreeMap<String, Substitution>,
) -> Result<Expr, SubstituteError> {
    let resolved = match expr {
        Expr::And(children) => Expr::And(substitute_all(children, substitutions)?),
        Expr::Or(children) => Expr::Or(substitute_all(children, substitutions)?),
        Expr::Not(inner) => Expr::Not(Box::new(substitute(inner, substitutions)?)),
        Expr::Compare {
            op,
            property,
            operand,
        } => Expr::Compare {
            op: *op,
            property: property.clone(),
            operand: substitute_operand(operand, substitutions)?,
        },
        Expr::In { property, items } => Expr::In {
            property: property.clone(),
            items: items
                .iter()
                .map(|item| substitute_operand(item, substitutions))
                .collect::<Result<Vec<_>, _>>()?,
        },
        Expr::Between {
            property,
            lower,
            upper,
        } => Expr::Between {
            property: property.clone(),
            lower: substitute_operand(lower, substitutions)?,
            upper: substitute_operand(upper, substitutions)?,
        },
        Expr::IsNull { property } => Expr::IsNull {
            property: property.clone(),
        },
    };

    Ok(resolved)
}

fn substitute_all(
    children: &[Expr],
    substitutions: &BTreeMap<String, Substitution>,
) -> Result<Vec<Expr>, SubstituteError> {
    children
        .iter()
        .map(|child| substitute(child, substitutions))
        .collect()
}

fn substitute_operand(
    operand: &Operand,
    substitutions: &BTreeMap<String, Substitution>,
) -> Result<Operand, SubstituteError> {
    match operand {
        Operand::Property(_) | Operand::Literal(_) => Ok(operand.clone()),
        Operand::Array(items) => {
            let items = items
                .iter()
                .map(|item| substitute_operand(item, substitutions))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Operand::Array(items))
        }
        Operand::Parameter(parameter) => substitutions
            .get(&parameter.name)
            .cloned()
            .map(Substitution::into_operand)
            .ok_or_else(|| SubstituteError::Missing {
                name: parameter.name.clone(),
            }),
    }
}

///
/// TESTS
///
