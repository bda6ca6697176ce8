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

//! Exact multivariate polynomials with rational coefficients.
//!
//! Weight leaves and integration are both expressed on this type; everything
//! stays in `BigRational` so the per-region integrals are exact and the
//! cross-mode equality of the engine can be tested with `==`.

use itertools::Itertools;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};
use std::collections::{BTreeMap, BTreeSet};

/// Index of a real variable in the problem domain.
pub type RealVar = usize;

/// A product of variable powers with non-negative integer exponents.
/// Zero exponents are never stored; the empty monomial is the constant 1.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Monomial(BTreeMap<RealVar, u32>);

impl Monomial {
    /// The constant monomial 1.
    pub fn one() -> Monomial {
        Monomial(BTreeMap::new())
    }

    /// The monomial `x_v`.
    pub fn var(v: RealVar) -> Monomial {
        let mut m = BTreeMap::new();
        m.insert(v, 1);
        Monomial(m)
    }

    /// Exponent of `v` in this monomial.
    pub fn exponent(&self, v: RealVar) -> u32 {
        self.0.get(&v).copied().unwrap_or(0)
    }

    /// Product of two monomials (exponents add).
    pub fn product(&self, other: &Monomial) -> Monomial {
        let mut m = self.0.clone();
        for (&v, &e) in other.0.iter() {
            *m.entry(v).or_insert(0) += e;
        }
        Monomial(m)
    }

    /// Total degree.
    pub fn degree(&self) -> u32 {
        self.0.values().sum()
    }

    fn with_exponent(&self, v: RealVar, e: u32) -> Monomial {
        let mut m = self.0.clone();
        if e == 0 {
            m.remove(&v);
        } else {
            m.insert(v, e);
        }
        Monomial(m)
    }

    fn without(&self, v: RealVar) -> Monomial {
        self.with_exponent(v, 0)
    }

    /// Variables with a non-zero exponent.
    pub fn vars(&self) -> impl Iterator<Item = RealVar> + '_ {
        self.0.keys().copied()
    }
}

impl std::fmt::Display for Monomial {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "1");
        }
        let txt = self
            .0
            .iter()
            .map(|(v, e)| {
                if *e == 1 {
                    format!("x{}", v)
                } else {
                    format!("x{}^{}", v, e)
                }
            })
            .join("*");
        write!(f, "{}", txt)
    }
}

/// A sum of monomials with rational coefficients.
/// Invariant: no stored coefficient is zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Polynomial {
    terms: BTreeMap<Monomial, BigRational>,
}

impl Polynomial {
    /// The zero polynomial.
    pub fn zero() -> Polynomial {
        Polynomial::default()
    }

    /// The constant polynomial 1.
    pub fn one() -> Polynomial {
        Polynomial::constant(BigRational::one())
    }

    /// A constant polynomial.
    pub fn constant(c: BigRational) -> Polynomial {
        let mut p = Polynomial::zero();
        p.add_term(Monomial::one(), c);
        p
    }

    /// The polynomial `x_v`.
    pub fn var(v: RealVar) -> Polynomial {
        let mut p = Polynomial::zero();
        p.add_term(Monomial::var(v), BigRational::one());
        p
    }

    /// Adds `c * m` to the polynomial, dropping the term if it cancels.
    pub fn add_term(&mut self, m: Monomial, c: BigRational) {
        if c.is_zero() {
            return;
        }
        let entry = self.terms.entry(m.clone()).or_insert_with(BigRational::zero);
        *entry += c;
        if entry.is_zero() {
            self.terms.remove(&m);
        }
    }

    /// True when the polynomial is identically zero.
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// The constant value, if the polynomial has degree zero.
    pub fn as_constant(&self) -> Option<BigRational> {
        if self.terms.is_empty() {
            return Some(BigRational::zero());
        }
        if self.terms.len() == 1 {
            if let Some(c) = self.terms.get(&Monomial::one()) {
                return Some(c.clone());
            }
        }
        None
    }

    /// Iterates over the (monomial, coefficient) terms.
    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &BigRational)> {
        self.terms.iter()
    }

    /// Sum of two polynomials.
    pub fn add(&self, other: &Polynomial) -> Polynomial {
        let mut res = self.clone();
        for (m, c) in other.terms.iter() {
            res.add_term(m.clone(), c.clone());
        }
        res
    }

    /// Difference of two polynomials.
    pub fn sub(&self, other: &Polynomial) -> Polynomial {
        self.add(&other.neg())
    }

    /// Negation.
    pub fn neg(&self) -> Polynomial {
        let mut res = Polynomial::zero();
        for (m, c) in self.terms.iter() {
            res.add_term(m.clone(), -c.clone());
        }
        res
    }

    /// Multiplication by a rational constant.
    pub fn scale(&self, k: &BigRational) -> Polynomial {
        let mut res = Polynomial::zero();
        for (m, c) in self.terms.iter() {
            res.add_term(m.clone(), c * k);
        }
        res
    }

    /// Product of two polynomials.
    pub fn mul(&self, other: &Polynomial) -> Polynomial {
        let mut res = Polynomial::zero();
        for (m1, c1) in self.terms.iter() {
            for (m2, c2) in other.terms.iter() {
                res.add_term(m1.product(m2), c1 * c2);
            }
        }
        res
    }

    /// Integer power by repeated multiplication; exponents stay small in
    /// practice (weight leaves have low degree).
    pub fn pow(&self, e: u32) -> Polynomial {
        let mut res = Polynomial::one();
        for _ in 0..e {
            res = res.mul(self);
        }
        res
    }

    /// Antiderivative with respect to `v`: each `c * m * v^e` becomes
    /// `c/(e+1) * m * v^(e+1)`.
    pub fn antiderivative(&self, v: RealVar) -> Polynomial {
        let mut res = Polynomial::zero();
        for (m, c) in self.terms.iter() {
            let e = m.exponent(v);
            let denom = BigRational::from_integer(BigInt::from(e + 1));
            res.add_term(m.with_exponent(v, e + 1), c / denom);
        }
        res
    }

    /// Substitutes the polynomial `by` for the variable `v`.
    pub fn substitute(&self, v: RealVar, by: &Polynomial) -> Polynomial {
        let mut res = Polynomial::zero();
        for (m, c) in self.terms.iter() {
            let e = m.exponent(v);
            let base = Polynomial {
                terms: std::iter::once((m.without(v), c.clone())).collect(),
            };
            let replaced = if e == 0 { base } else { base.mul(&by.pow(e)) };
            res = res.add(&replaced);
        }
        res
    }

    /// Collects the variables occurring in the polynomial into `out`.
    pub fn collect_vars(&self, out: &mut BTreeSet<RealVar>) {
        for (m, _) in self.terms.iter() {
            out.extend(m.vars());
        }
    }

    /// Highest exponent of `v` over all terms.
    pub fn degree_in(&self, v: RealVar) -> u32 {
        self.terms
            .keys()
            .map(|m| m.exponent(v))
            .max()
            .unwrap_or(0)
    }
}

impl std::fmt::Display for Polynomial {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        let txt = self
            .terms
            .iter()
            .map(|(m, c)| format!("{}*{}", c, m))
            .join(" + ");
        write!(f, "{}", txt)
    }
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

    #[test]
    fn arithmetic() {
        // (x + 1)^2 = x^2 + 2x + 1
        let p = Polynomial::var(0).add(&Polynomial::one());
        let sq = p.pow(2);
        let mut expected = Polynomial::one();
        expected.add_term(Monomial::var(0), q(2));
        expected.add_term(Monomial::var(0).product(&Monomial::var(0)), q(1));
        assert_eq!(sq, expected);
    }

    #[test]
    fn cancellation() {
        let p = Polynomial::var(0).sub(&Polynomial::var(0));
        assert!(p.is_zero());
        assert_eq!(p.as_constant(), Some(q(0)));
    }

    #[test]
    fn antiderivative_of_square() {
        // ∫ x^2 dx = x^3 / 3
        let p = Polynomial::var(0).pow(2);
        let a = p.antiderivative(0);
        let mut expected = Polynomial::zero();
        expected.add_term(Monomial::var(0).product(&Monomial::var(0)).product(&Monomial::var(0)), qr(1, 3));
        assert_eq!(a, expected);
    }

    #[test]
    fn substitution() {
        // x^2 with x := y + 1 gives y^2 + 2y + 1
        let p = Polynomial::var(0).pow(2);
        let by = Polynomial::var(1).add(&Polynomial::one());
        let s = p.substitute(0, &by);
        assert_eq!(s, by.pow(2));
        assert_eq!(s.degree_in(0), 0);
        assert_eq!(s.degree_in(1), 2);
    }

    #[test]
    fn constant_queries() {
        let c = Polynomial::constant(qr(3, 2));
        assert_eq!(c.as_constant(), Some(qr(3, 2)));
        assert_eq!(Polynomial::var(2).as_constant(), None);
    }
}
