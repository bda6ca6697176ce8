/**************************************************************************/
/*  This file is part of WMINT.                                           */
/*                                                                        */
/*  Copyright (C) 2026                                                    */
/*                                                                        */
/*  you can redistribute it and/or modify it under the terms of the GNU   */
/*  Lesser General Public License as published by the Free Software       */
/*  Foundation, version 2.1.                                              */
/*                                                                        */
/*  It is distributed in the hope that it will be useful,                 */
/*  but WITHOUT ANY WARRANTY; without even the implied warranty of        */
/*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the         */
/*  GNU Lesser General Public License for more details.                   */
/*                                                                        */
/*  See the GNU Lesser General Public License version 2.1                 */
/*  for more details.                                                     */
/*                                                                        */
/**************************************************************************/

//! Piecewise-polynomial weight functions and the branch labelling transform.
//!
//! Labelling rewrites the weight into a pure polynomial-selection tree whose
//! branch conditions are fresh Boolean atoms, plus the conjunction of
//! `label ⟺ condition` biconditionals. Conjoined to the support, the
//! biconditionals make every enumerated model fix which weight branch
//! applies, so the per-region residual is a plain tree descent.

use crate::error::WmiError;
use crate::formula::{Atom, BoolVar, Formula};
use crate::polynomial::{Polynomial, RealVar};
use std::collections::{BTreeMap, BTreeSet};

/// A piecewise-polynomial weight function: a tree alternating conditionals
/// and polynomial leaves. Every leaf is reachable under a unique conjunction
/// of branch conditions and their negations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Weight {
    /// A polynomial leaf.
    Poly(Polynomial),
    /// `if condition then .. else ..`
    Ite(Box<Formula>, Box<Weight>, Box<Weight>),
}

impl Weight {
    /// The constant weight 1, the default when a problem declares none.
    pub fn one() -> Weight {
        Weight::Poly(Polynomial::one())
    }

    /// A conditional node.
    pub fn ite(cond: Formula, then: Weight, els: Weight) -> Weight {
        Weight::Ite(Box::new(cond), Box::new(then), Box::new(els))
    }

    /// Collects the atoms of every branch condition into `out`.
    pub fn collect_condition_atoms(&self, out: &mut BTreeSet<Atom>) {
        match self {
            Weight::Poly(_) => {}
            Weight::Ite(c, t, e) => {
                c.collect_atoms(out);
                t.collect_condition_atoms(out);
                e.collect_condition_atoms(out);
            }
        }
    }

    /// Collects the real variables of every polynomial leaf into `out`.
    pub fn collect_leaf_vars(&self, out: &mut BTreeSet<RealVar>) {
        match self {
            Weight::Poly(p) => p.collect_vars(out),
            Weight::Ite(_, t, e) => {
                t.collect_leaf_vars(out);
                e.collect_leaf_vars(out);
            }
        }
    }

    /// Resolves the polynomial leaf active under an assignment of the label
    /// atoms, by descending the tree in O(depth). Only meaningful on the
    /// labelled tree, where every condition is a single Boolean atom.
    pub fn residual(
        &self,
        value_of: &impl Fn(BoolVar) -> Option<bool>,
    ) -> anyhow::Result<&Polynomial> {
        match self {
            Weight::Poly(p) => Ok(p),
            Weight::Ite(c, t, e) => {
                let label = match c.as_ref() {
                    Formula::Atom(Atom::Bool(b)) => *b,
                    other => {
                        return Err(WmiError::Runtime(format!(
                            "weight residual requested on an unlabelled condition {:?}",
                            other
                        ))
                        .into())
                    }
                };
                match value_of(label) {
                    Some(true) => t.residual(value_of),
                    Some(false) => e.residual(value_of),
                    None => Err(WmiError::Runtime(format!(
                        "weight label b{} is unassigned in this region",
                        label
                    ))
                    .into()),
                }
            }
        }
    }
}

/// The condition-to-label table of one (formula, weight) pair, scoped to a
/// single query. Never shared across queries: label indices would collide.
#[derive(Debug)]
pub struct Labelling {
    /// The weight tree with every branch condition replaced by its label.
    pub labelled: Weight,
    /// `⋀ (label ⟺ condition)`, `True` when the weight has no conditional.
    pub formula: Formula,
    /// Condition-to-label table; structurally identical conditions share one
    /// label to avoid a combinatorial blow-up in the enumerator.
    pub labels: BTreeMap<Formula, BoolVar>,
}

impl Labelling {
    /// The minted label variables.
    pub fn label_vars(&self) -> BTreeSet<BoolVar> {
        self.labels.values().copied().collect()
    }
}

/// Labels a weight function. Fresh label atoms are allocated from
/// `next_bool`, which the caller primes past every Boolean variable in use.
/// Total over well-formed trees; a pure polynomial yields a `True` labelling
/// formula and the weight unchanged.
pub fn label(weight: &Weight, next_bool: &mut BoolVar) -> Labelling {
    let mut labels = BTreeMap::new();
    let mut conjuncts = Vec::new();
    let labelled = rewrite(weight, &mut labels, &mut conjuncts, next_bool);
    let formula = if conjuncts.is_empty() {
        Formula::True
    } else {
        Formula::and(conjuncts)
    };
    Labelling {
        labelled,
        formula,
        labels,
    }
}

fn rewrite(
    weight: &Weight,
    labels: &mut BTreeMap<Formula, BoolVar>,
    conjuncts: &mut Vec<Formula>,
    next_bool: &mut BoolVar,
) -> Weight {
    match weight {
        Weight::Poly(p) => Weight::Poly(p.clone()),
        Weight::Ite(c, t, e) => {
            let label = match labels.get(c.as_ref()) {
                Some(&b) => b,
                None => {
                    let b = *next_bool;
                    *next_bool += 1;
                    labels.insert(c.as_ref().clone(), b);
                    conjuncts.push(Formula::iff(Formula::boolvar(b), c.as_ref().clone()));
                    b
                }
            };
            Weight::ite(
                Formula::boolvar(label),
                rewrite(t, labels, conjuncts, next_bool),
                rewrite(e, labels, conjuncts, next_bool),
            )
        }
    }
}
