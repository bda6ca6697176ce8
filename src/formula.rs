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

//! Boolean atoms, linear-arithmetic atoms, and formulas over them.

use crate::polynomial::{Polynomial, RealVar};
use num_rational::BigRational;
use num_traits::Zero;
use std::collections::{BTreeMap, BTreeSet};

/// Index of a Boolean variable. Label atoms minted by the weight labeller
/// use indices past every user-declared variable.
pub type BoolVar = usize;

/// A linear inequality `Σ cᵢ·xᵢ ≤ bound` (or `<` when `strict`).
/// Immutable once constructed; zero coefficients are never stored.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LinearAtom {
    coeffs: BTreeMap<RealVar, BigRational>,
    bound: BigRational,
    strict: bool,
}

impl LinearAtom {
    /// Builds an inequality, dropping zero coefficients.
    pub fn new(
        coeffs: impl IntoIterator<Item = (RealVar, BigRational)>,
        bound: BigRational,
        strict: bool,
    ) -> LinearAtom {
        let coeffs = coeffs.into_iter().filter(|(_, c)| !c.is_zero()).collect();
        LinearAtom {
            coeffs,
            bound,
            strict,
        }
    }

    /// `x_v ≤ c`
    pub fn var_le(v: RealVar, c: BigRational) -> LinearAtom {
        LinearAtom::new(vec![(v, BigRational::from_integer(1.into()))], c, false)
    }

    /// `x_v ≥ c`, canonicalized to `-x_v ≤ -c`.
    pub fn var_ge(v: RealVar, c: BigRational) -> LinearAtom {
        LinearAtom::new(vec![(v, BigRational::from_integer((-1).into()))], -c, false)
    }

    /// Builds `lhs ≤ rhs` (or `<`) from two polynomials. Fails when the
    /// difference is not linear.
    pub fn from_polynomials(
        lhs: &Polynomial,
        rhs: &Polynomial,
        strict: bool,
    ) -> anyhow::Result<LinearAtom> {
        let diff = lhs.sub(rhs);
        let mut coeffs = BTreeMap::new();
        let mut constant = BigRational::zero();
        for (m, c) in diff.terms() {
            match m.degree() {
                0 => constant = c.clone(),
                1 => {
                    let v = m.vars().next().expect("degree 1 monomial has a variable");
                    coeffs.insert(v, c.clone());
                }
                _ => anyhow::bail!("non-linear atom: {}", diff),
            }
        }
        // Σ c·x + k ⊙ 0  ≡  Σ c·x ⊙ -k
        Ok(LinearAtom::new(coeffs, -constant, strict))
    }

    /// The negated inequality: `¬(e ≤ b)` is `-e < -b` and `¬(e < b)` is
    /// `-e ≤ -b`.
    pub fn negated(&self) -> LinearAtom {
        LinearAtom {
            coeffs: self.coeffs.iter().map(|(&v, c)| (v, -c.clone())).collect(),
            bound: -self.bound.clone(),
            strict: !self.strict,
        }
    }

    /// Truth value when the inequality mentions no variable (`0 ⊙ bound`).
    pub fn constant_value(&self) -> Option<bool> {
        if !self.coeffs.is_empty() {
            return None;
        }
        Some(if self.strict {
            BigRational::zero() < self.bound
        } else {
            BigRational::zero() <= self.bound
        })
    }

    /// Coefficient of `v`, zero when absent.
    pub fn coeff(&self, v: RealVar) -> BigRational {
        self.coeffs.get(&v).cloned().unwrap_or_else(BigRational::zero)
    }

    /// The (variable, coefficient) pairs of the left-hand side.
    pub fn coeffs(&self) -> impl Iterator<Item = (RealVar, &BigRational)> {
        self.coeffs.iter().map(|(&v, c)| (v, c))
    }

    /// Right-hand side constant.
    pub fn bound(&self) -> &BigRational {
        &self.bound
    }

    /// Whether the comparison is `<` rather than `≤`.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Variables mentioned by the inequality.
    pub fn vars(&self) -> impl Iterator<Item = RealVar> + '_ {
        self.coeffs.keys().copied()
    }
}

impl std::fmt::Display for LinearAtom {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use itertools::Itertools;
        let lhs = if self.coeffs.is_empty() {
            "0".to_owned()
        } else {
            self.coeffs
                .iter()
                .map(|(v, c)| format!("{}*x{}", c, v))
                .join(" + ")
        };
        write!(
            f,
            "{} {} {}",
            lhs,
            if self.strict { "<" } else { "<=" },
            self.bound
        )
    }
}

/// Either a named Boolean atom or a theory atom.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Atom {
    /// A Boolean variable, no structure.
    Bool(BoolVar),
    /// A linear inequality over the real variables.
    Linear(LinearAtom),
}

impl Atom {
    /// True for theory atoms.
    pub fn is_theory(&self) -> bool {
        matches!(self, Atom::Linear(_))
    }
}

/// A finite formula tree over atoms. Trees, not graphs: labelling and
/// enumeration both require well-founded structure.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Formula {
    /// Tautology
    True,
    /// Contradiction
    False,
    /// A single atom
    Atom(Atom),
    /// Negation
    Not(Box<Formula>),
    /// Conjunction
    And(Vec<Formula>),
    /// Disjunction
    Or(Vec<Formula>),
}

impl Formula {
    /// A Boolean variable as a formula.
    pub fn boolvar(b: BoolVar) -> Formula {
        Formula::Atom(Atom::Bool(b))
    }

    /// A linear atom as a formula.
    pub fn linear(l: LinearAtom) -> Formula {
        Formula::Atom(Atom::Linear(l))
    }

    /// Negation.
    pub fn not(f: Formula) -> Formula {
        Formula::Not(Box::new(f))
    }

    /// N-ary conjunction.
    pub fn and(fs: Vec<Formula>) -> Formula {
        Formula::And(fs)
    }

    /// N-ary disjunction.
    pub fn or(fs: Vec<Formula>) -> Formula {
        Formula::Or(fs)
    }

    /// `a → b`
    pub fn implies(a: Formula, b: Formula) -> Formula {
        Formula::or(vec![Formula::not(a), b])
    }

    /// `a ⟺ b`
    pub fn iff(a: Formula, b: Formula) -> Formula {
        Formula::and(vec![
            Formula::implies(a.clone(), b.clone()),
            Formula::implies(b, a),
        ])
    }

    /// Collects the distinct atoms of the formula into `out`.
    pub fn collect_atoms(&self, out: &mut BTreeSet<Atom>) {
        match self {
            Formula::True | Formula::False => {}
            Formula::Atom(a) => {
                out.insert(a.clone());
            }
            Formula::Not(f) => f.collect_atoms(out),
            Formula::And(fs) | Formula::Or(fs) => {
                for f in fs {
                    f.collect_atoms(out)
                }
            }
        }
    }

    /// The distinct atoms of the formula.
    pub fn atoms(&self) -> BTreeSet<Atom> {
        let mut out = BTreeSet::new();
        self.collect_atoms(&mut out);
        out
    }

    /// Constant folding: trivially true/false atoms and subtrees are
    /// eliminated. The result is `True`, `False`, or a constant-free tree.
    pub fn simplify(&self) -> Formula {
        match self {
            Formula::True => Formula::True,
            Formula::False => Formula::False,
            Formula::Atom(Atom::Linear(l)) => match l.constant_value() {
                Some(true) => Formula::True,
                Some(false) => Formula::False,
                None => self.clone(),
            },
            Formula::Atom(_) => self.clone(),
            Formula::Not(f) => match f.simplify() {
                Formula::True => Formula::False,
                Formula::False => Formula::True,
                Formula::Not(inner) => *inner,
                g => Formula::not(g),
            },
            Formula::And(fs) => {
                let mut out = Vec::new();
                for f in fs {
                    match f.simplify() {
                        Formula::True => {}
                        Formula::False => return Formula::False,
                        g => out.push(g),
                    }
                }
                match out.len() {
                    0 => Formula::True,
                    1 => out.pop().expect("len checked"),
                    _ => Formula::And(out),
                }
            }
            Formula::Or(fs) => {
                let mut out = Vec::new();
                for f in fs {
                    match f.simplify() {
                        Formula::False => {}
                        Formula::True => return Formula::True,
                        g => out.push(g),
                    }
                }
                match out.len() {
                    0 => Formula::False,
                    1 => out.pop().expect("len checked"),
                    _ => Formula::Or(out),
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn q(n: i64) -> BigRational {
        BigRational::from_integer(n.into())
    }

    #[test]
    fn negation_flips_inequality() {
        let a = LinearAtom::var_le(0, q(2));
        let n = a.negated();
        assert!(n.is_strict());
        assert_eq!(n.coeff(0), q(-1));
        assert_eq!(n.bound(), &q(-2));
        assert_eq!(n.negated(), a);
    }

    #[test]
    fn constant_atoms_fold() {
        // 0 <= 1 is true, 0 < 0 is false
        let t = LinearAtom::new(vec![], q(1), false);
        let f = LinearAtom::new(vec![], q(0), true);
        assert_eq!(t.constant_value(), Some(true));
        assert_eq!(f.constant_value(), Some(false));
        let formula = Formula::and(vec![
            Formula::linear(t),
            Formula::or(vec![Formula::linear(f), Formula::boolvar(0)]),
        ]);
        assert_eq!(formula.simplify(), Formula::boolvar(0));
    }

    #[test]
    fn double_negation() {
        let f = Formula::not(Formula::not(Formula::boolvar(1)));
        assert_eq!(f.simplify(), Formula::boolvar(1));
    }

    #[test]
    fn atom_collection() {
        let a = LinearAtom::var_le(0, q(1));
        let f = Formula::and(vec![
            Formula::linear(a.clone()),
            Formula::implies(Formula::boolvar(0), Formula::linear(a.clone())),
        ]);
        let atoms = f.atoms();
        assert_eq!(atoms.len(), 2);
        assert!(atoms.contains(&Atom::Bool(0)));
        assert!(atoms.contains(&Atom::Linear(a)));
    }

    #[test]
    fn linearity_is_enforced() {
        let sq = Polynomial::var(0).pow(2);
        assert!(LinearAtom::from_polynomials(&sq, &Polynomial::one(), false).is_err());
        let ok = LinearAtom::from_polynomials(
            &Polynomial::var(0).add(&Polynomial::one()),
            &Polynomial::var(1),
            true,
        )
        .unwrap();
        // x0 + 1 < x1  ≡  x0 - x1 < -1
        assert_eq!(ok.coeff(0), q(1));
        assert_eq!(ok.coeff(1), q(-1));
        assert_eq!(ok.bound(), &q(-1));
        assert!(ok.is_strict());
    }
}
