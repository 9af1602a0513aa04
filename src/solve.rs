//! Backward solving and decision enumeration.
//!
//! `how_to_bool` derives the input constraints that force a boolean
//! expression to a target truth value; `ask` walks branching nodes to list
//! every reachable outcome with its triggering conditions. Both return
//! pull-based, restartable sequences: items are computed on demand, a
//! consumer may stop pulling at any point, and iterating again from the same
//! node reproduces the same sequence. The sequences are finite but worst-case
//! exponential in the combined branch fan-out; bounding them is caller
//! policy.

use std::iter;

use log::debug;

use crate::error::Error;
use crate::expression::Expr;
use crate::value::Value;
use crate::Env;

/// One atomic textual predicate, e.g. `age > 18` or `not (age > 18)`.
pub type Condition = String;

/// Ordered conjunction of conditions.
pub type ConditionSet = Vec<Condition>;

/// One reachable outcome of a branching expression, with the conjunction of
/// conditions that produces it.
#[derive(Clone, Debug, PartialEq)]
pub struct DecisionEntry {
    pub conditions: ConditionSet,
    pub value: Value,
}

impl Expr {
    /// Enumerates every condition set that forces this expression to evaluate
    /// to `target`.
    ///
    /// Supported for nodes with boolean semantics (boolean binary operators,
    /// `Between`, `And`, `Or`, `Select` over boolean branches); anything else
    /// fails with [`Error::UnsupportedBooleanQuery`]. Capability and
    /// constant-subexpression faults are checked eagerly, before the first
    /// item is produced.
    ///
    /// Known simplification, kept deliberately: for `And` with
    /// `target == false` each conjunct's falsifying sets are yielded
    /// independently, not the full combinatorial set of "exactly this
    /// conjunct false, others either way"; `Or` with `target == true` is the
    /// dual. Downstream consumers depend on this sampling.
    pub fn how_to_bool(
        &self,
        target: bool,
    ) -> Result<Box<dyn Iterator<Item = ConditionSet> + '_>, Error> {
        debug!("how_to_bool(target = {target})");
        self.ensure_boolean("how_to_bool")?;
        Ok(self.condition_sets(target))
    }

    /// Enumerates every reachable outcome of a branching expression together
    /// with the conditions that produce it.
    ///
    /// Defined for `Select` nesting that terminates in concrete values (plus
    /// the degenerate `Const`, and `Curry` wrappers); other shapes fail with
    /// [`Error::UnsupportedBooleanQuery`] unless partial evaluation reduces
    /// them to a branching form first.
    pub fn ask(&self) -> Result<Box<dyn Iterator<Item = DecisionEntry> + '_>, Error> {
        debug!("ask()");
        self.ensure_askable()?;
        Ok(self.entries())
    }

    /// Validates boolean-query capability (and evaluates constant
    /// subconditions so arithmetic faults surface here, not mid-iteration).
    fn ensure_boolean(&self, operation: &'static str) -> Result<(), Error> {
        match self {
            Expr::Const(Value::Bool(_)) => Ok(()),
            Expr::Binary { op, .. } if op.is_boolean() => Ok(()),
            Expr::Between { .. } => Ok(()),
            Expr::And(children) | Expr::Or(children) => children
                .iter()
                .try_for_each(|child| child.ensure_boolean(operation)),
            Expr::Curry { inner, .. } => inner.ensure_boolean(operation),
            Expr::Select {
                condition,
                then_branch,
                else_branch,
            } => {
                if condition.free_vars().is_empty() {
                    condition.evaluate(&Env::new())?;
                } else {
                    condition.ensure_boolean(operation)?;
                }
                for branch in [then_branch, else_branch] {
                    if branch.free_vars().is_empty() {
                        branch.evaluate(&Env::new())?;
                    } else {
                        branch.ensure_boolean(operation)?;
                    }
                }
                Ok(())
            }
            other => Err(Error::UnsupportedBooleanQuery {
                variant: other.variant_name(),
                operation,
            }),
        }
    }

    fn ensure_askable(&self) -> Result<(), Error> {
        match self {
            Expr::Const(_) => Ok(()),
            Expr::Curry { inner, .. } => inner.ensure_askable(),
            Expr::Select {
                condition,
                then_branch,
                else_branch,
            } => {
                if condition.free_vars().is_empty() {
                    condition.evaluate(&Env::new())?;
                } else {
                    condition.ensure_boolean("ask")?;
                }
                for branch in [then_branch, else_branch] {
                    if branch.free_vars().is_empty() {
                        branch.evaluate(&Env::new())?;
                    } else {
                        branch.ensure_askable()?;
                    }
                }
                Ok(())
            }
            other => Err(Error::UnsupportedBooleanQuery {
                variant: other.variant_name(),
                operation: "ask",
            }),
        }
    }

    /// Infallible recursion behind `how_to_bool`; shapes and constant
    /// subexpressions were validated up front.
    fn condition_sets(&self, target: bool) -> Box<dyn Iterator<Item = ConditionSet> + '_> {
        match self {
            // A constant conjunct contributes an empty set when it matches the
            // target and nothing otherwise, so it drops out of products.
            Expr::Const(value) => {
                if value.is_truthy() == target {
                    Box::new(iter::once(Vec::new()))
                } else {
                    Box::new(iter::empty())
                }
            }

            Expr::Binary { op, .. } if op.is_boolean() => {
                Box::new(iter::once(atom(self.condition_text(), target)))
            }
            Expr::Between { .. } => Box::new(iter::once(atom(self.condition_text(), target))),

            Expr::And(children) => {
                if target {
                    product(children, true)
                } else {
                    Box::new(children.iter().flat_map(|child| child.condition_sets(false)))
                }
            }

            Expr::Or(children) => {
                if target {
                    Box::new(children.iter().flat_map(|child| child.condition_sets(true)))
                } else {
                    product(children, false)
                }
            }

            Expr::Curry { inner, .. } => inner.condition_sets(target),

            Expr::Select {
                condition,
                then_branch,
                else_branch,
            } => {
                if let Some(cond) = condition.concrete_value() {
                    let taken = if cond.is_truthy() {
                        then_branch
                    } else {
                        else_branch
                    };
                    branch_sets(taken, target)
                } else {
                    Box::new(
                        select_side(condition, true, then_branch, target)
                            .chain(select_side(condition, false, else_branch, target)),
                    )
                }
            }

            // Excluded by ensure_boolean.
            _ => Box::new(iter::empty()),
        }
    }

    fn entries(&self) -> Box<dyn Iterator<Item = DecisionEntry> + '_> {
        match self {
            Expr::Const(value) => Box::new(iter::once(DecisionEntry {
                conditions: Vec::new(),
                value: value.clone(),
            })),

            Expr::Curry { inner, .. } => inner.entries(),

            Expr::Select {
                condition,
                then_branch,
                else_branch,
            } => {
                // Equal concrete branches collapse; the condition is
                // irrelevant to the outcome.
                if let (Some(then_value), Some(else_value)) =
                    (then_branch.concrete_value(), else_branch.concrete_value())
                {
                    if then_value == else_value {
                        return Box::new(iter::once(DecisionEntry {
                            conditions: Vec::new(),
                            value: then_value,
                        }));
                    }
                }
                if let Some(cond) = condition.concrete_value() {
                    let taken = if cond.is_truthy() {
                        then_branch
                    } else {
                        else_branch
                    };
                    branch_entries(taken)
                } else {
                    Box::new(
                        ask_side(condition, true, then_branch)
                            .chain(ask_side(condition, false, else_branch)),
                    )
                }
            }

            // Excluded by ensure_askable.
            _ => Box::new(iter::empty()),
        }
    }

    /// Value of a node with no free variables; `None` when still symbolic.
    fn concrete_value(&self) -> Option<Value> {
        if self.free_vars().is_empty() {
            // Faults in constant subexpressions were surfaced by the ensure
            // pass before iteration started.
            self.evaluate(&Env::new()).ok()
        } else {
            None
        }
    }
}

fn atom(text: String, target: bool) -> ConditionSet {
    if target {
        vec![text]
    } else {
        vec![format!("not ({text})")]
    }
}

/// Lazy Cartesian product over the children's own condition sets, yielding
/// the concatenation of one choice per child, in child order. Children's
/// sequences are pulled on demand (and restarted per prefix), never
/// materialized up front.
fn product<'a>(
    children: &'a [Expr],
    target: bool,
) -> Box<dyn Iterator<Item = ConditionSet> + 'a> {
    match children.split_first() {
        None => Box::new(iter::once(Vec::new())),
        Some((head, rest)) => Box::new(head.condition_sets(target).flat_map(move |prefix| {
            product(rest, target).map(move |tail| {
                let mut set = prefix.clone();
                set.extend(tail);
                set
            })
        })),
    }
}

/// One side of a symbolic `Select`: the Cartesian concatenation of the
/// condition's sets (toward `cond_target`) with the branch's own sets.
fn select_side<'a>(
    condition: &'a Expr,
    cond_target: bool,
    branch: &'a Expr,
    target: bool,
) -> Box<dyn Iterator<Item = ConditionSet> + 'a> {
    Box::new(condition.condition_sets(cond_target).flat_map(move |prefix| {
        branch_sets(branch, target).map(move |suffix| {
            let mut set = prefix.clone();
            set.extend(suffix);
            set
        })
    }))
}

/// A plain-value branch contributes the bare prefix when it matches the
/// target and nothing otherwise; a symbolic branch recurses.
fn branch_sets<'a>(branch: &'a Expr, target: bool) -> Box<dyn Iterator<Item = ConditionSet> + 'a> {
    match branch.concrete_value() {
        Some(value) => {
            if value.is_truthy() == target {
                Box::new(iter::once(Vec::new()))
            } else {
                Box::new(iter::empty())
            }
        }
        None => branch.condition_sets(target),
    }
}

fn ask_side<'a>(
    condition: &'a Expr,
    cond_target: bool,
    branch: &'a Expr,
) -> Box<dyn Iterator<Item = DecisionEntry> + 'a> {
    Box::new(condition.condition_sets(cond_target).flat_map(move |prefix| {
        branch_entries(branch).map(move |entry| DecisionEntry {
            conditions: prefix
                .iter()
                .cloned()
                .chain(entry.conditions)
                .collect(),
            value: entry.value,
        })
    }))
}

fn branch_entries<'a>(branch: &'a Expr) -> Box<dyn Iterator<Item = DecisionEntry> + 'a> {
    match branch.concrete_value() {
        Some(value) => Box::new(iter::once(DecisionEntry {
            conditions: Vec::new(),
            value,
        })),
        None => branch.entries(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Interval;

    fn sets(expr: &Expr, target: bool) -> Vec<ConditionSet> {
        expr.how_to_bool(target).unwrap().collect()
    }

    #[test]
    fn comparison_yields_single_atom() {
        let f = Expr::var("age").gt(18);
        assert_eq!(sets(&f, true), [vec!["age > 18".to_string()]]);
        assert_eq!(sets(&f, false), [vec!["not (age > 18)".to_string()]]);
    }

    #[test]
    fn and_true_is_cartesian_product() {
        let f = Expr::all([
            Expr::any([Expr::var("a").gt(0), Expr::var("b").gt(0)]),
            Expr::any([Expr::var("c").gt(0), Expr::var("d").gt(0)]),
        ]);
        let got = sets(&f, true);
        assert_eq!(
            got,
            [
                vec!["a > 0".to_string(), "c > 0".to_string()],
                vec!["a > 0".to_string(), "d > 0".to_string()],
                vec!["b > 0".to_string(), "c > 0".to_string()],
                vec!["b > 0".to_string(), "d > 0".to_string()],
            ]
        );
    }

    #[test]
    fn and_false_samples_each_child_independently() {
        // Deliberately not the full combinatorial enumeration.
        let f = Expr::all([Expr::var("a").gt(0), Expr::var("b").gt(0)]);
        assert_eq!(
            sets(&f, false),
            [
                vec!["not (a > 0)".to_string()],
                vec!["not (b > 0)".to_string()],
            ]
        );
    }

    #[test]
    fn or_is_the_dual_of_and() {
        let f = Expr::any([Expr::var("a").gt(0), Expr::var("b").gt(0)]);
        assert_eq!(
            sets(&f, true),
            [vec!["a > 0".to_string()], vec!["b > 0".to_string()]]
        );
        assert_eq!(
            sets(&f, false),
            [vec!["not (a > 0)".to_string(), "not (b > 0)".to_string()]]
        );
    }

    #[test]
    fn product_is_pulled_on_demand() {
        let wide = Expr::all([
            Expr::any((0..8).map(|i| Expr::var(format!("a{i}")).gt(0)).collect::<Vec<_>>()),
            Expr::any((0..8).map(|i| Expr::var(format!("b{i}")).gt(0)).collect::<Vec<_>>()),
        ]);
        // 64 combinations exist; taking two must not require the rest.
        let first_two: Vec<_> = wide.how_to_bool(true).unwrap().take(2).collect();
        assert_eq!(
            first_two,
            [
                vec!["a0 > 0".to_string(), "b0 > 0".to_string()],
                vec!["a0 > 0".to_string(), "b1 > 0".to_string()],
            ]
        );
    }

    #[test]
    fn sequences_are_restartable() {
        let f = Expr::any([Expr::var("a").gt(0), Expr::var("b").gt(0)]);
        assert_eq!(sets(&f, true), sets(&f, true));
    }

    #[test]
    fn select_unions_both_sides() {
        let f = Expr::select(
            Expr::var("kind").eq_to("renewal"),
            Expr::between(Expr::var("age"), 1, 99),
            Expr::between(Expr::var("age"), 1, 60),
        );
        assert_eq!(
            sets(&f, true),
            [
                vec![
                    "kind == renewal".to_string(),
                    "age 在 (1)~(99) 范围内".to_string(),
                ],
                vec![
                    "not (kind == renewal)".to_string(),
                    "age 在 (1)~(60) 范围内".to_string(),
                ],
            ]
        );
    }

    #[test]
    fn select_with_constant_boolean_branch() {
        let f = Expr::select(Expr::var("vip").eq_to(true), true, Expr::var("age").gt(18));
        // The then-branch equals the target, so the condition alone suffices.
        assert_eq!(
            sets(&f, true),
            [
                vec!["vip == true".to_string()],
                vec!["not (vip == true)".to_string(), "age > 18".to_string()],
            ]
        );
    }

    #[test]
    fn select_with_concrete_condition_keeps_taken_branch_only() {
        let f = Expr::select(Expr::constant(true), Expr::var("age").gt(18), false);
        assert_eq!(sets(&f, true), [vec!["age > 18".to_string()]]);
    }

    #[test]
    fn non_boolean_query_is_rejected() {
        let f = Expr::var("x") + 3;
        let err = f.how_to_bool(true).map(|_| ()).unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedBooleanQuery {
                variant: "Binary",
                operation: "how_to_bool",
            }
        );
        let err = Expr::var("x").ask().map(|_| ()).unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedBooleanQuery {
                variant: "Variable",
                operation: "ask",
            }
        );
    }

    #[test]
    fn ask_lists_both_outcomes() {
        let sel = Expr::select(Expr::var("age").gt(18), "adult", "minor");
        let got: Vec<_> = sel.ask().unwrap().collect();
        assert_eq!(
            got,
            [
                DecisionEntry {
                    conditions: vec!["age > 18".to_string()],
                    value: Value::Str("adult".into()),
                },
                DecisionEntry {
                    conditions: vec!["not (age > 18)".to_string()],
                    value: Value::Str("minor".into()),
                },
            ]
        );
    }

    #[test]
    fn ask_recurses_into_nested_branches() {
        let sel = Expr::select(
            Expr::var("a").gt(0),
            Expr::select(Expr::var("b").gt(0), "both", "a-only"),
            "none",
        );
        let got: Vec<_> = sel.ask().unwrap().collect();
        assert_eq!(
            got,
            [
                DecisionEntry {
                    conditions: vec!["a > 0".to_string(), "b > 0".to_string()],
                    value: Value::Str("both".into()),
                },
                DecisionEntry {
                    conditions: vec!["a > 0".to_string(), "not (b > 0)".to_string()],
                    value: Value::Str("a-only".into()),
                },
                DecisionEntry {
                    conditions: vec!["not (a > 0)".to_string()],
                    value: Value::Str("none".into()),
                },
            ]
        );
    }

    #[test]
    fn ask_collapses_equal_branches() {
        let sel = Expr::select(Expr::var("whatever").gt(0), "same", "same");
        let got: Vec<_> = sel.ask().unwrap().collect();
        assert_eq!(
            got,
            [DecisionEntry {
                conditions: vec![],
                value: Value::Str("same".into()),
            }]
        );
    }

    #[test]
    fn ask_yields_inert_payloads() {
        let ranges = Expr::select(
            Expr::var("kind").eq_to("renewal"),
            Expr::constant(Interval::new(1.0, 99.0)),
            Expr::constant(Interval::new(1.0, 60.0)),
        );
        let got: Vec<_> = ranges.ask().unwrap().collect();
        assert_eq!(
            got,
            [
                DecisionEntry {
                    conditions: vec!["kind == renewal".to_string()],
                    value: Value::Interval(Interval::new(1.0, 99.0)),
                },
                DecisionEntry {
                    conditions: vec!["not (kind == renewal)".to_string()],
                    value: Value::Interval(Interval::new(1.0, 60.0)),
                },
            ]
        );
    }

    #[test]
    fn ask_with_concrete_condition_recurses_into_taken_branch() {
        let sel = Expr::select(
            Expr::constant(false),
            "unreachable",
            Expr::select(Expr::var("b").gt(0), "pos", "non-pos"),
        );
        let got: Vec<_> = sel.ask().unwrap().collect();
        assert_eq!(
            got,
            [
                DecisionEntry {
                    conditions: vec!["b > 0".to_string()],
                    value: Value::Str("pos".into()),
                },
                DecisionEntry {
                    conditions: vec!["not (b > 0)".to_string()],
                    value: Value::Str("non-pos".into()),
                },
            ]
        );
    }
}
