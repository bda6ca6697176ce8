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

//! The weighted model integration engine.
//!
//! `compute` glues the pipeline together: label the weight, conjoin the
//! labelling to the support, enumerate the satisfiable truth assignments in
//! the requested mode, and for each region integrate the weight residual
//! over the region's polytope, accumulating the exact rational total. All
//! three modes compute the same number; they differ in how many integrator
//! calls they spend on it.

use crate::enumerate::{EnumerationSession, Mode};
use crate::error::WmiError;
use crate::formula::{Atom, Formula};
use crate::integrate;
use crate::polynomial::RealVar;
use crate::weight::{self, Weight};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// The outcome of one weighted model integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WmiResult {
    /// The exact weighted volume of the support.
    pub volume: BigRational,
    /// How many polytope integrations were performed. The figure of merit
    /// when comparing modes: volumes are equal, integration counts are not.
    pub integrations: usize,
}

impl WmiResult {
    /// The volume as a float, for display.
    pub fn volume_f64(&self) -> f64 {
        self.volume.to_f64().unwrap_or(f64::NAN)
    }
}

impl std::fmt::Display for WmiResult {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} ({} integrations)",
            self.volume_f64(),
            self.integrations
        )
    }
}

/// A normalized query: `P(query | support) = wmi(support ∧ query) /
/// wmi(support)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    /// The conditional probability, in `[0, 1]` by construction.
    pub probability: BigRational,
    /// Weighted volume of `support ∧ query`.
    pub numerator: WmiResult,
    /// Weighted volume of the support alone.
    pub denominator: WmiResult,
}

impl QueryResult {
    /// The probability as a float, for display.
    pub fn probability_f64(&self) -> f64 {
        self.probability.to_f64().unwrap_or(f64::NAN)
    }
}

/// Computes the weighted model integral of `weight` over the models of
/// `formula`. The formula must bound every real variable it or the weight
/// mentions, otherwise `UnboundedIntegration` is reported.
pub fn compute(
    formula: &Formula,
    weight: &Weight,
    mode: Mode,
    budget: Option<Duration>,
) -> anyhow::Result<WmiResult> {
    let deadline = budget.map(|b| Instant::now() + b);
    compute_with_deadline(formula, weight, mode, deadline)
}

/// Computes `P(query | support)` under the weight. Both volumes share one
/// deadline. Fails with `ZeroMassSupport` when the support has zero weighted
/// volume, since the conditional probability is then undefined.
pub fn compute_normalized_probability(
    support: &Formula,
    weight: &Weight,
    query: &Formula,
    mode: Mode,
    budget: Option<Duration>,
) -> anyhow::Result<QueryResult> {
    let deadline = budget.map(|b| Instant::now() + b);
    let denominator = compute_with_deadline(support, weight, mode, deadline)?;
    if denominator.volume.is_zero() {
        return Err(WmiError::ZeroMassSupport.into());
    }
    let conjoined = Formula::and(vec![support.clone(), query.clone()]);
    let numerator = compute_with_deadline(&conjoined, weight, mode, deadline)?;
    let probability = &numerator.volume / &denominator.volume;
    Ok(QueryResult {
        probability,
        numerator,
        denominator,
    })
}

fn compute_with_deadline(
    formula: &Formula,
    weight: &Weight,
    mode: Mode,
    deadline: Option<Instant>,
) -> anyhow::Result<WmiResult> {
    // mint labels past every Boolean variable in sight
    let mut atoms = formula.atoms();
    weight.collect_condition_atoms(&mut atoms);
    let mut next_bool = atoms
        .iter()
        .filter_map(|a| match a {
            Atom::Bool(b) => Some(b + 1),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    let labelling = weight::label(weight, &mut next_bool);
    let working = Formula::and(vec![formula.clone(), labelling.formula.clone()]);

    // the integration space is every real variable mentioned anywhere;
    // branch-condition variables reach it through the labelling conjuncts
    let mut vars: BTreeSet<RealVar> = BTreeSet::new();
    for atom in working.atoms() {
        if let Atom::Linear(l) = atom {
            vars.extend(l.vars());
        }
    }
    labelling.labelled.collect_leaf_vars(&mut vars);
    let vars: Vec<RealVar> = vars.into_iter().collect();
    trace!(
        mode = ?mode,
        labels = labelling.labels.len(),
        real_vars = vars.len(),
        "starting enumeration"
    );

    let label_vars = labelling.label_vars();
    let mut session = EnumerationSession::new(&working, &label_vars, mode, deadline)?;
    let mut volume = BigRational::zero();
    let mut integrations = 0usize;
    while let Some(region) = session.next_region()? {
        let table = session.table();
        let residual = labelling.labelled.residual(&|b| {
            table
                .index_of(&Atom::Bool(b))
                .and_then(|i| region.assignment.value(i))
        })?;
        let part = integrate::integrate(&region.polytope, residual, &vars, deadline)?;
        integrations += 1;
        trace!(%part, ?region, "region integrated");
        volume += part * BigRational::from_integer(BigInt::from(region.multiplicity.clone()));
    }
    debug!(
        volume = %volume,
        integrations,
        oracle_calls = session.oracle_calls(),
        "weighted model integral computed"
    );
    Ok(WmiResult {
        volume,
        integrations,
    })
}
