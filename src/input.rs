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

//! Parsing of JSON problem descriptions into typed formulas and weights.
//!
//! A problem declares a domain (real variables with finite bounds, named
//! Booleans), a support formula, an optional weight term and optional query
//! formulas. Terms are externally tagged: `{"le": [{"var": "x"},
//! {"const": 1}]}`. Compilation resolves names to indices, conjoins the
//! domain bounds into the support, and rejects ill-typed weight terms with
//! `MalformedWeight` errors.

use crate::error::WmiError;
use crate::formula::{Formula, LinearAtom};
use crate::polynomial::Polynomial;
use crate::weight::Weight;
use anyhow::Context;
use num_rational::BigRational;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Declaration of one real variable with its finite bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct RealDecl {
    /// Variable name, referenced by `{"var": name}` terms.
    pub name: String,
    /// Lower domain bound.
    pub lower: f64,
    /// Upper domain bound.
    pub upper: f64,
}

/// The variables of a problem.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DomainSpec {
    /// Real variables, in declaration order.
    #[serde(default)]
    pub reals: Vec<RealDecl>,
    /// Boolean variables, in declaration order.
    #[serde(default)]
    pub bools: Vec<String>,
}

/// A term of the input language. One tag per operation; formulas and
/// arithmetic share the syntax and are told apart during compilation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermSpec {
    /// A real variable by name.
    Var(String),
    /// A rational constant, given as a float.
    Const(f64),
    /// A Boolean variable by name.
    Bool(String),
    /// N-ary conjunction.
    And(Vec<TermSpec>),
    /// N-ary disjunction.
    Or(Vec<TermSpec>),
    /// Negation.
    Not(Box<TermSpec>),
    /// Implication.
    Implies(Box<(TermSpec, TermSpec)>),
    /// Biconditional.
    Iff(Box<(TermSpec, TermSpec)>),
    /// `lhs <= rhs` over linear arithmetic.
    Le(Box<(TermSpec, TermSpec)>),
    /// `lhs < rhs`.
    Lt(Box<(TermSpec, TermSpec)>),
    /// `lhs >= rhs`.
    Ge(Box<(TermSpec, TermSpec)>),
    /// `lhs > rhs`.
    Gt(Box<(TermSpec, TermSpec)>),
    /// N-ary sum.
    Add(Vec<TermSpec>),
    /// N-ary product.
    Mul(Vec<TermSpec>),
    /// Difference.
    Sub(Box<(TermSpec, TermSpec)>),
    /// Arithmetic negation.
    Neg(Box<TermSpec>),
    /// Integer power.
    Pow(Box<(TermSpec, u32)>),
    /// `if cond then .. else ..`, only valid inside a weight.
    Ite(Box<(TermSpec, TermSpec, TermSpec)>),
}

/// A parsed problem file before compilation.
#[derive(Debug, Clone, Deserialize)]
pub struct ProblemSpec {
    /// The variables.
    #[serde(default)]
    pub domain: DomainSpec,
    /// The support formula. Domain bounds are conjoined automatically.
    pub support: TermSpec,
    /// The weight term; constant 1 when absent.
    pub weight: Option<TermSpec>,
    /// Query formulas, each normalized against the support.
    #[serde(default)]
    pub queries: Vec<TermSpec>,
}

/// The variables of a compiled problem, index-addressed.
#[derive(Debug, Clone)]
pub struct Domain {
    /// Real variable names; the position is the `RealVar` index.
    pub reals: Vec<String>,
    /// Per-variable bounds, parallel to `reals`.
    pub bounds: Vec<(BigRational, BigRational)>,
    /// Boolean variable names; the position is the `BoolVar` index.
    pub bools: Vec<String>,
}

/// A compiled problem, ready for the engine.
#[derive(Debug, Clone)]
pub struct Problem {
    /// The variables.
    pub domain: Domain,
    /// The support with the domain bounds conjoined, so every real variable
    /// is finitely bounded on every model.
    pub support: Formula,
    /// The weight function.
    pub weight: Weight,
    /// The queries, in file order.
    pub queries: Vec<Formula>,
}

struct Compiler {
    reals: BTreeMap<String, usize>,
    bools: BTreeMap<String, usize>,
}

fn rational(x: f64) -> anyhow::Result<BigRational> {
    BigRational::from_float(x)
        .ok_or_else(|| WmiError::MalformedWeight(format!("non-finite constant {}", x)).into())
}

impl Compiler {
    fn real(&self, name: &str) -> anyhow::Result<usize> {
        self.reals
            .get(name)
            .copied()
            .with_context(|| format!("undeclared real variable {}", name))
    }

    fn boolean(&self, name: &str) -> anyhow::Result<usize> {
        self.bools
            .get(name)
            .copied()
            .with_context(|| format!("undeclared Boolean variable {}", name))
    }

    fn polynomial(&self, term: &TermSpec) -> anyhow::Result<Polynomial> {
        match term {
            TermSpec::Var(name) => Ok(Polynomial::var(self.real(name)?)),
            TermSpec::Const(x) => Ok(Polynomial::constant(rational(*x)?)),
            TermSpec::Add(ts) => {
                let mut p = Polynomial::zero();
                for t in ts {
                    p = p.add(&self.polynomial(t)?);
                }
                Ok(p)
            }
            TermSpec::Mul(ts) => {
                let mut p = Polynomial::one();
                for t in ts {
                    p = p.mul(&self.polynomial(t)?);
                }
                Ok(p)
            }
            TermSpec::Sub(pair) => Ok(self.polynomial(&pair.0)?.sub(&self.polynomial(&pair.1)?)),
            TermSpec::Neg(t) => Ok(self.polynomial(t)?.neg()),
            TermSpec::Pow(base) => Ok(self.polynomial(&base.0)?.pow(base.1)),
            other => Err(WmiError::MalformedWeight(format!(
                "expected an arithmetic term, got {:?}",
                other
            ))
            .into()),
        }
    }

    fn atom(&self, lhs: &TermSpec, rhs: &TermSpec, strict: bool) -> anyhow::Result<LinearAtom> {
        LinearAtom::from_polynomials(&self.polynomial(lhs)?, &self.polynomial(rhs)?, strict)
    }

    fn formula(&self, term: &TermSpec) -> anyhow::Result<Formula> {
        match term {
            TermSpec::Bool(name) => Ok(Formula::boolvar(self.boolean(name)?)),
            TermSpec::And(ts) => Ok(Formula::and(
                ts.iter().map(|t| self.formula(t)).collect::<Result<_, _>>()?,
            )),
            TermSpec::Or(ts) => Ok(Formula::or(
                ts.iter().map(|t| self.formula(t)).collect::<Result<_, _>>()?,
            )),
            TermSpec::Not(t) => Ok(Formula::not(self.formula(t)?)),
            TermSpec::Implies(pair) => Ok(Formula::implies(
                self.formula(&pair.0)?,
                self.formula(&pair.1)?,
            )),
            TermSpec::Iff(pair) => {
                Ok(Formula::iff(self.formula(&pair.0)?, self.formula(&pair.1)?))
            }
            TermSpec::Le(pair) => Ok(Formula::linear(self.atom(&pair.0, &pair.1, false)?)),
            TermSpec::Lt(pair) => Ok(Formula::linear(self.atom(&pair.0, &pair.1, true)?)),
            TermSpec::Ge(pair) => Ok(Formula::linear(self.atom(&pair.1, &pair.0, false)?)),
            TermSpec::Gt(pair) => Ok(Formula::linear(self.atom(&pair.1, &pair.0, true)?)),
            other => anyhow::bail!("expected a formula, got an arithmetic term {:?}", other),
        }
    }

    fn weight(&self, term: &TermSpec) -> anyhow::Result<Weight> {
        match term {
            TermSpec::Ite(t) => {
                let cond = self.formula(&t.0).map_err(|e| {
                    WmiError::MalformedWeight(format!("bad branch condition: {:#}", e))
                })?;
                Ok(Weight::ite(cond, self.weight(&t.1)?, self.weight(&t.2)?))
            }
            arithmetic => Ok(Weight::Poly(self.polynomial(arithmetic)?)),
        }
    }
}

/// Compiles a parsed problem. Fails on undeclared names, non-linear atoms,
/// or an ill-typed weight term.
pub fn compile(spec: &ProblemSpec) -> anyhow::Result<Problem> {
    let compiler = Compiler {
        reals: spec
            .domain
            .reals
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect(),
        bools: spec
            .domain
            .bools
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect(),
    };
    anyhow::ensure!(
        compiler.reals.len() == spec.domain.reals.len(),
        "duplicate real variable declaration"
    );
    anyhow::ensure!(
        compiler.bools.len() == spec.domain.bools.len(),
        "duplicate Boolean variable declaration"
    );

    let mut bounds = Vec::new();
    let mut conjuncts = Vec::new();
    for (i, decl) in spec.domain.reals.iter().enumerate() {
        let lower =
            rational(decl.lower).with_context(|| format!("lower bound of {}", decl.name))?;
        let upper =
            rational(decl.upper).with_context(|| format!("upper bound of {}", decl.name))?;
        anyhow::ensure!(
            lower <= upper,
            "empty domain for {}: [{}, {}]",
            decl.name,
            lower,
            upper
        );
        conjuncts.push(Formula::linear(LinearAtom::var_ge(i, lower.clone())));
        conjuncts.push(Formula::linear(LinearAtom::var_le(i, upper.clone())));
        bounds.push((lower, upper));
    }
    conjuncts.push(
        compiler
            .formula(&spec.support)
            .context("compiling the support")?,
    );
    let support = Formula::and(conjuncts);

    let weight = match &spec.weight {
        None => Weight::one(),
        Some(term) => compiler.weight(term).context("compiling the weight")?,
    };
    let queries = spec
        .queries
        .iter()
        .enumerate()
        .map(|(i, t)| {
            compiler
                .formula(t)
                .with_context(|| format!("compiling query {}", i))
        })
        .collect::<Result<_, _>>()?;

    Ok(Problem {
        domain: Domain {
            reals: spec.domain.reals.iter().map(|d| d.name.clone()).collect(),
            bounds,
            bools: spec.domain.bools.clone(),
        },
        support,
        weight,
        queries,
    })
}

/// Parses and compiles a problem from JSON text.
pub fn parse_problem(text: &str) -> anyhow::Result<Problem> {
    let spec: ProblemSpec = serde_json::from_str(text).context("parsing the problem file")?;
    compile(&spec)
}

/// Loads a problem from a file.
pub fn load_problem(path: &Path) -> anyhow::Result<Problem> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_problem(&text).with_context(|| format!("loading {}", path.display()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::enumerate::Mode;
    use crate::wmi;
    use num_rational::BigRational;

    fn q(n: i64) -> BigRational {
        BigRational::from_integer(n.into())
    }

    const PIECEWISE: &str = r#"{
        "domain": {
            "reals": [
                {"name": "x", "lower": 0, "upper": 3},
                {"name": "y", "lower": 0, "upper": 2}
            ]
        },
        "support": {"and": [
            {"implies": [{"le": [{"var": "y"}, {"const": 1}]},
                         {"le": [{"var": "x"}, {"const": 2}]}]},
            {"implies": [{"not": {"le": [{"var": "y"}, {"const": 1}]}},
                         {"ge": [{"var": "x"}, {"const": 1}]}]}
        ]},
        "weight": {"ite": [
            {"le": [{"var": "y"}, {"const": 1}]},
            {"add": [{"var": "x"}, {"var": "y"}]},
            {"mul": [{"const": 2}, {"var": "y"}]}
        ]},
        "queries": [{"le": [{"var": "x"}, {"const": 1}]}]
    }"#;

    #[test]
    fn piecewise_file_round_trip() {
        let problem = parse_problem(PIECEWISE).unwrap();
        assert_eq!(problem.domain.reals, vec!["x", "y"]);
        assert!(problem.domain.bools.is_empty());
        assert_eq!(problem.queries.len(), 1);
        // y <= 1: x + y over x in [0,2] is 3; y > 1: 2y over x in [1,3] is 6
        let res = wmi::compute(&problem.support, &problem.weight, Mode::Pa, None).unwrap();
        assert_eq!(res.volume, q(9));
    }

    #[test]
    fn missing_weight_defaults_to_one() {
        let text = r#"{
            "domain": {"reals": [{"name": "x", "lower": 0, "upper": 3}]},
            "support": {"le": [{"var": "x"}, {"const": 2}]}
        }"#;
        let problem = parse_problem(text).unwrap();
        assert_eq!(problem.weight, crate::weight::Weight::one());
        let res = wmi::compute(&problem.support, &problem.weight, Mode::AllSmt, None).unwrap();
        assert_eq!(res.volume, q(2));
    }

    #[test]
    fn undeclared_variable_is_rejected() {
        let text = r#"{
            "domain": {},
            "support": {"le": [{"var": "x"}, {"const": 1}]}
        }"#;
        assert!(parse_problem(text).is_err());
    }

    #[test]
    fn malformed_weight_is_reported() {
        // a bare Boolean is not an arithmetic leaf
        let text = r#"{
            "domain": {
                "reals": [{"name": "x", "lower": 0, "upper": 1}],
                "bools": ["b"]
            },
            "support": {"le": [{"var": "x"}, {"const": 1}]},
            "weight": {"bool": "b"}
        }"#;
        let err = parse_problem(text).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WmiError>(),
            Some(WmiError::MalformedWeight(_))
        ));
    }

    #[test]
    fn nonlinear_atom_is_rejected() {
        let text = r#"{
            "domain": {"reals": [{"name": "x", "lower": 0, "upper": 1}]},
            "support": {"le": [{"mul": [{"var": "x"}, {"var": "x"}]}, {"const": 1}]}
        }"#;
        assert!(parse_problem(text).is_err());
    }

    #[test]
    fn empty_domain_interval_is_rejected() {
        let text = r#"{
            "domain": {"reals": [{"name": "x", "lower": 2, "upper": 1}]},
            "support": {"le": [{"var": "x"}, {"const": 1}]}
        }"#;
        assert!(parse_problem(text).is_err());
    }

    #[test]
    fn strict_comparisons_parse() {
        let text = r#"{
            "domain": {"reals": [{"name": "x", "lower": 0, "upper": 1}]},
            "support": {"and": [
                {"lt": [{"const": 0}, {"var": "x"}]},
                {"gt": [{"const": 1}, {"var": "x"}]},
                {"ge": [{"var": "x"}, {"const": 0}]}
            ]}
        }"#;
        let problem = parse_problem(text).unwrap();
        let res = wmi::compute(&problem.support, &problem.weight, Mode::Bc, None).unwrap();
        assert_eq!(res.volume, q(1));
    }

    #[test]
    fn powers_parse() {
        let text = r#"{
            "domain": {"reals": [{"name": "x", "lower": 0, "upper": 3}]},
            "support": {"le": [{"var": "x"}, {"const": 3}]},
            "weight": {"pow": [{"var": "x"}, 2]}
        }"#;
        let problem = parse_problem(text).unwrap();
        let res = wmi::compute(&problem.support, &problem.weight, Mode::Pa, None).unwrap();
        assert_eq!(res.volume, q(9));
    }
}
