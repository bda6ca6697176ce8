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

//! Exact integration of polynomials over convex polytopes.
//!
//! The integral is computed by eliminating one variable at a time: for the
//! innermost variable, every (lower facet, upper facet) pair contributes the
//! antiderivative difference over the subregion where that pair dominates
//! the other facets. Integration is additive over both the polynomial's
//! monomials and this decomposition, so summing the contributions is exact.
//! Feasibility questions are answered by Fourier-Motzkin elimination on the
//! same inequality representation.

use crate::error::WmiError;
use crate::formula::LinearAtom;
use crate::polynomial::{Polynomial, RealVar};
use itertools::Itertools;
use num_rational::BigRational;
use num_traits::Zero;
use std::collections::BTreeSet;
use std::time::Instant;

/// A conjunction of linear inequalities.
pub type Polytope = Vec<LinearAtom>;

/// Fails with `WmiError::Timeout` once the deadline has passed.
pub(crate) fn check_deadline(deadline: Option<Instant>) -> anyhow::Result<()> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(WmiError::Timeout.into()),
        _ => Ok(()),
    }
}

/// Eliminates `v`: every (lower, upper) facet pair is combined into the
/// implied constraint on the remaining variables, with positive scaling
/// factors so no division is needed. Strictness is inherited from either
/// side.
fn eliminate(constraints: Vec<LinearAtom>, v: RealVar) -> Vec<LinearAtom> {
    let mut lowers = Vec::new();
    let mut uppers = Vec::new();
    let mut rest = Vec::new();
    for c in constraints {
        let a = c.coeff(v);
        if a.is_zero() {
            rest.push(c);
        } else if a > BigRational::zero() {
            uppers.push(c);
        } else {
            lowers.push(c);
        }
    }
    for (l, u) in lowers.iter().cartesian_product(uppers.iter()) {
        let scale_u = -l.coeff(v); // > 0
        let scale_l = u.coeff(v); // > 0
        let vars: BTreeSet<RealVar> = l.vars().chain(u.vars()).filter(|&w| w != v).collect();
        let coeffs = vars
            .into_iter()
            .map(|w| (w, &scale_u * u.coeff(w) + &scale_l * l.coeff(w)));
        let bound = &scale_u * u.bound() + &scale_l * l.bound();
        rest.push(LinearAtom::new(
            coeffs.collect::<Vec<_>>(),
            bound,
            l.is_strict() || u.is_strict(),
        ));
    }
    rest
}

/// Whether the polytope has at least one point, strictness included.
pub fn feasible(polytope: &[LinearAtom]) -> bool {
    let mut constraints: Vec<LinearAtom> = polytope.to_vec();
    loop {
        let mut remaining = Vec::new();
        for c in constraints {
            match c.constant_value() {
                Some(false) => return false,
                Some(true) => {}
                None => remaining.push(c),
            }
        }
        let v = match remaining.first().and_then(|c| c.vars().next()) {
            None => return true,
            Some(v) => v,
        };
        constraints = eliminate(remaining, v);
    }
}

/// The affine expression bounding `v` in `c`: `(bound - rest) / coeff(v)`.
/// An upper bound when the coefficient is positive, a lower bound when it is
/// negative (the division flips the inequality).
fn facet_expr(c: &LinearAtom, v: RealVar) -> Polynomial {
    let a = c.coeff(v);
    let mut p = Polynomial::constant(c.bound().clone());
    for (w, cw) in c.coeffs() {
        if w != v {
            p = p.sub(&Polynomial::var(w).scale(cw));
        }
    }
    p.scale(&a.recip())
}

fn affine_le(lhs: &Polynomial, rhs: &Polynomial) -> anyhow::Result<LinearAtom> {
    LinearAtom::from_polynomials(lhs, rhs, false)
}

/// Integrates `poly` over the polytope, the variables of `vars` being the
/// integration space. Exact; 0 for empty or degenerate regions. Fails with
/// `UnboundedIntegrationError` semantics when a direction is unbounded and
/// the integrand does not vanish, since the support is expected to assert
/// finite domain bounds for every variable.
pub fn integrate(
    polytope: &[LinearAtom],
    poly: &Polynomial,
    vars: &[RealVar],
    deadline: Option<Instant>,
) -> anyhow::Result<BigRational> {
    integrate_rec(polytope.to_vec(), poly.clone(), vars, deadline)
}

fn integrate_rec(
    constraints: Vec<LinearAtom>,
    poly: Polynomial,
    vars: &[RealVar],
    deadline: Option<Instant>,
) -> anyhow::Result<BigRational> {
    check_deadline(deadline)?;
    let (&v, outer_vars) = match vars.split_last() {
        None => {
            for c in &constraints {
                match c.constant_value() {
                    Some(false) => return Ok(BigRational::zero()),
                    Some(true) => {}
                    None => {
                        return Err(WmiError::Runtime(format!(
                            "constraint {} mentions a variable outside the integration space",
                            c
                        ))
                        .into())
                    }
                }
            }
            return match poly.as_constant() {
                Some(c) => Ok(c),
                None => Err(WmiError::Runtime(format!(
                    "integrand {} is not constant after eliminating all variables",
                    poly
                ))
                .into()),
            };
        }
        Some(split) => split,
    };

    let mut lowers: Vec<Polynomial> = Vec::new();
    let mut uppers: Vec<Polynomial> = Vec::new();
    let mut free = Vec::new();
    for c in &constraints {
        let a = c.coeff(v);
        if a.is_zero() {
            free.push(c.clone());
        } else if a > BigRational::zero() {
            uppers.push(facet_expr(c, v));
        } else {
            lowers.push(facet_expr(c, v));
        }
    }
    // identical facet expressions would make dominance pairs double count
    dedup(&mut lowers);
    dedup(&mut uppers);

    if lowers.is_empty() || uppers.is_empty() {
        if !feasible(&constraints) {
            return Ok(BigRational::zero());
        }
        if poly.is_zero() {
            return Ok(BigRational::zero());
        }
        return Err(WmiError::UnboundedIntegration.into());
    }

    let anti = poly.antiderivative(v);
    let mut total = BigRational::zero();
    for (i, l) in lowers.iter().enumerate() {
        for (j, u) in uppers.iter().enumerate() {
            // subregion where l is the greatest lower facet and u the least
            // upper facet; ties overlap on measure-zero sets only
            let mut sub = free.clone();
            for (k, l2) in lowers.iter().enumerate() {
                if k != i {
                    sub.push(affine_le(l2, l)?);
                }
            }
            for (k, u2) in uppers.iter().enumerate() {
                if k != j {
                    sub.push(affine_le(u, u2)?);
                }
            }
            sub.push(affine_le(l, u)?);
            let integrand = anti.substitute(v, u).sub(&anti.substitute(v, l));
            total += integrate_rec(sub, integrand, outer_vars, deadline)?;
        }
    }
    Ok(total)
}

fn dedup(exprs: &mut Vec<Polynomial>) {
    let mut seen = BTreeSet::new();
    exprs.retain(|e| seen.insert(e.clone()));
}

#[cfg(test)]
mod test {
    use super::*;

    fn q(n: i64) -> BigRational {
        BigRational::from_integer(n.into())
    }

    fn qr(n: i64, d: i64) -> BigRational {
        BigRational::new(n.into(), d.into())
    }

    fn interval(v: RealVar, lo: i64, hi: i64) -> Vec<LinearAtom> {
        vec![LinearAtom::var_ge(v, q(lo)), LinearAtom::var_le(v, q(hi))]
    }

    #[test]
    fn square_area() {
        let mut p = interval(0, 0, 2);
        p.extend(interval(1, 0, 2));
        let area = integrate(&p, &Polynomial::one(), &[0, 1], None).unwrap();
        assert_eq!(area, q(4));
    }

    #[test]
    fn triangle_area() {
        // x >= 0, y >= 0, x + y <= 1
        let p = vec![
            LinearAtom::var_ge(0, q(0)),
            LinearAtom::var_ge(1, q(0)),
            LinearAtom::new(vec![(0, q(1)), (1, q(1))], q(1), false),
        ];
        let area = integrate(&p, &Polynomial::one(), &[0, 1], None).unwrap();
        assert_eq!(area, qr(1, 2));
    }

    #[test]
    fn linear_integrand() {
        // ∫∫ x over the unit square is 1/2
        let mut p = interval(0, 0, 1);
        p.extend(interval(1, 0, 1));
        let vol = integrate(&p, &Polynomial::var(0), &[0, 1], None).unwrap();
        assert_eq!(vol, qr(1, 2));
        // ∫∫ (x + y) over [0,2]x[0,1] is 3
        let mut p = interval(0, 0, 2);
        p.extend(interval(1, 0, 1));
        let sum = Polynomial::var(0).add(&Polynomial::var(1));
        let vol = integrate(&p, &sum, &[0, 1], None).unwrap();
        assert_eq!(vol, q(3));
    }

    #[test]
    fn empty_polytope_is_zero() {
        // x <= 0 and x >= 1
        let p = vec![LinearAtom::var_le(0, q(0)), LinearAtom::var_ge(0, q(1))];
        assert!(!feasible(&p));
        let vol = integrate(&p, &Polynomial::one(), &[0], None).unwrap();
        assert_eq!(vol, q(0));
    }

    #[test]
    fn degenerate_polytope_is_zero() {
        let p = vec![LinearAtom::var_le(0, q(1)), LinearAtom::var_ge(0, q(1))];
        assert!(feasible(&p));
        let vol = integrate(&p, &Polynomial::one(), &[0], None).unwrap();
        assert_eq!(vol, q(0));
    }

    #[test]
    fn unbounded_region_fails() {
        let p = vec![LinearAtom::var_ge(0, q(0))];
        let err = integrate(&p, &Polynomial::one(), &[0], None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WmiError>(),
            Some(WmiError::UnboundedIntegration)
        ));
        // a vanishing integrand is fine
        let vol = integrate(&p, &Polynomial::zero(), &[0], None).unwrap();
        assert_eq!(vol, q(0));
    }

    #[test]
    fn strictness_matters_for_feasibility() {
        // x < 0 and x > 0 is empty, x <= 0 and x >= 0 is a point
        let open = vec![
            LinearAtom::var_le(0, q(0)).negated(),
            LinearAtom::var_ge(0, q(0)).negated(),
        ];
        assert!(!feasible(&open));
        let point = vec![LinearAtom::var_le(0, q(0)), LinearAtom::var_ge(0, q(0))];
        assert!(feasible(&point));
    }

    #[test]
    fn quadratic_integrand() {
        // ∫ x^2 over [0,3] is 9
        let p = interval(0, 0, 3);
        let vol = integrate(&p, &Polynomial::var(0).pow(2), &[0], None).unwrap();
        assert_eq!(vol, q(9));
    }

    #[test]
    fn union_of_facets() {
        // x in [0,2], y in [0,2], y <= x: a triangle of area 2
        let mut p = interval(0, 0, 2);
        p.extend(interval(1, 0, 2));
        p.push(LinearAtom::new(vec![(1, q(1)), (0, q(-1))], q(0), false));
        let vol = integrate(&p, &Polynomial::one(), &[0, 1], None).unwrap();
        assert_eq!(vol, q(2));
    }
}
