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

//! Enumeration of the satisfiable truth assignments of a formula over its
//! atom set, one convex region at a time.
//!
//! The Boolean skeleton of the formula is Tseitin-encoded (with
//! biconditional definitions, so auxiliary variables are functions of the
//! atom variables and never duplicate models) and handed to a `varisat`
//! solver playing the satisfiability-oracle role: repeated solving under
//! incrementally added blocking clauses. Theory consistency of the
//! candidate assignments is checked by Fourier-Motzkin feasibility on the
//! induced polytope.

use crate::error::WmiError;
use crate::formula::{Atom, BoolVar, Formula};
use crate::integrate::{check_deadline, feasible, Polytope};
use fixedbitset::FixedBitSet;
use num_bigint::BigUint;
use num_traits::One;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Instant;
use tracing::trace;
use varisat::Solver;
use varisat_formula::{CnfFormula, ExtendFormula, Lit, Var};

/// How total assignments are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Naive AllSMT: one region per logically distinct total assignment.
    AllSmt,
    /// Predicate abstraction: implicants are minimized so that Boolean case
    /// splits that do not change the geometry share one integration.
    Pa,
    /// Boolean compilation: the skeleton is enumerated up front, each
    /// Boolean assignment's theory conjunction is then solved once.
    Bc,
}

/// The atoms of a formula, indexed by solver variable.
#[derive(Debug)]
pub struct AtomTable {
    atoms: Vec<Atom>,
    index: BTreeMap<Atom, usize>,
}

impl AtomTable {
    fn build(formula: &Formula) -> AtomTable {
        let atoms: Vec<Atom> = formula.atoms().into_iter().collect();
        let index = atoms
            .iter()
            .enumerate()
            .map(|(i, a)| (a.clone(), i))
            .collect();
        AtomTable { atoms, index }
    }

    /// Number of atoms.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// True when the formula had no atom at all.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// The atom at a given index.
    pub fn atom(&self, i: usize) -> &Atom {
        &self.atoms[i]
    }

    /// The index of an atom, if present.
    pub fn index_of(&self, atom: &Atom) -> Option<usize> {
        self.index.get(atom).copied()
    }
}

/// A truth assignment over an atom table, possibly partial.
#[derive(Clone, PartialEq, Eq)]
pub struct Assignment {
    assigned: FixedBitSet,
    values: FixedBitSet,
}

impl Assignment {
    fn new(n: usize) -> Assignment {
        Assignment {
            assigned: FixedBitSet::with_capacity(n),
            values: FixedBitSet::with_capacity(n),
        }
    }

    fn set(&mut self, i: usize, value: bool) {
        self.assigned.insert(i);
        self.values.set(i, value);
    }

    fn clear(&mut self, i: usize) {
        self.assigned.set(i, false);
        self.values.set(i, false);
    }

    /// The value assigned to atom `i`, `None` when unassigned.
    pub fn value(&self, i: usize) -> Option<bool> {
        if self.assigned[i] {
            Some(self.values[i])
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Assignment {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_map()
            .entries(self.assigned.ones().map(|i| (i, self.values[i])))
            .finish()
    }
}

/// One convex region of the model space.
#[derive(Debug)]
pub struct Region {
    /// Truth values of the atoms over the region (total for ALLSMT/BC,
    /// possibly partial for PA).
    pub assignment: Assignment,
    /// The inequalities carved out by the assigned theory atoms.
    pub polytope: Polytope,
    /// How many Boolean total assignments map to this polytope.
    pub multiplicity: BigUint,
}

/// Converts the skeleton CNF to dimacs in a string, for debugging.
fn to_dimacs_string(f: &CnfFormula) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    varisat_dimacs::write_dimacs(&mut buf, f)?;
    Ok(String::from_utf8(buf)?)
}

/// Returns whether a message with this level would be printed
fn would_log(level: tracing::Level) -> bool {
    level < tracing::level_filters::LevelFilter::current()
}

/// Tseitin encoding with biconditional definitions. `formula` must be
/// constant-free (callers simplify first).
fn encode(
    formula: &Formula,
    table: &AtomTable,
    cnf: &mut CnfFormula,
    next_var: &mut usize,
) -> Lit {
    match formula {
        Formula::True | Formula::False => {
            unreachable!("constants are folded away before encoding")
        }
        Formula::Atom(a) => Lit::from_var(
            Var::from_index(table.index_of(a).expect("atom table covers the formula")),
            true,
        ),
        Formula::Not(f) => !encode(f, table, cnf, next_var),
        Formula::And(fs) => {
            let lits: Vec<Lit> = fs.iter().map(|f| encode(f, table, cnf, next_var)).collect();
            let v = Lit::from_var(Var::from_index(*next_var), true);
            *next_var += 1;
            let mut long = vec![v];
            for &l in &lits {
                cnf.add_clause(&[!v, l]);
                long.push(!l);
            }
            cnf.add_clause(&long);
            v
        }
        Formula::Or(fs) => {
            let lits: Vec<Lit> = fs.iter().map(|f| encode(f, table, cnf, next_var)).collect();
            let v = Lit::from_var(Var::from_index(*next_var), true);
            *next_var += 1;
            let mut long = vec![!v];
            for &l in &lits {
                cnf.add_clause(&[v, !l]);
                long.push(l);
            }
            cnf.add_clause(&long);
            v
        }
    }
}

/// One enumeration pass over a formula: owns the oracle session, the
/// accumulated blocking clauses and, for PA, the negated-formula oracle used
/// for implicant minimization. Dropped (and thus released) on every exit
/// path of the owning `compute` call; the sequence is finite and not
/// restartable.
pub struct EnumerationSession<'a> {
    mode: Mode,
    table: AtomTable,
    /// atom indices of weight labels, never dropped during minimization
    label_atoms: FixedBitSet,
    solver: Solver<'a>,
    neg_solver: Option<Solver<'a>>,
    /// clauses blocking the regions yielded so far (PA disjointness checks)
    blocking: Vec<Vec<Lit>>,
    /// BC only: the compiled list of skeleton assignments left to check
    compiled: Option<VecDeque<Assignment>>,
    deadline: Option<Instant>,
    exhausted: bool,
    oracle_calls: usize,
}

impl<'a> EnumerationSession<'a> {
    /// Builds a session for one formula. `label_vars` are the Boolean
    /// variables minted by the weight labelling; PA keeps them assigned so
    /// every region determines its weight residual.
    pub fn new(
        formula: &Formula,
        label_vars: &BTreeSet<BoolVar>,
        mode: Mode,
        deadline: Option<Instant>,
    ) -> anyhow::Result<EnumerationSession<'static>> {
        let simplified = formula.simplify();
        let table = AtomTable::build(&simplified);
        let mut label_atoms = FixedBitSet::with_capacity(table.len());
        for (i, atom) in table.atoms.iter().enumerate() {
            if let Atom::Bool(b) = atom {
                if label_vars.contains(b) {
                    label_atoms.insert(i);
                }
            }
        }

        let mut cnf = CnfFormula::new();
        cnf.set_var_count(table.len());
        let mut next_var = table.len();
        let mut exhausted = false;
        match &simplified {
            Formula::False => exhausted = true,
            Formula::True => {}
            f => {
                let root = encode(f, &table, &mut cnf, &mut next_var);
                cnf.add_clause(&[root]);
            }
        }
        if would_log(tracing::Level::TRACE) {
            trace!(
                atoms = table.len(),
                aux_vars = next_var - table.len(),
                "skeleton cnf:\n{}",
                to_dimacs_string(&cnf)?
            );
        }
        let mut solver = Solver::new();
        solver.add_formula(&cnf);

        let neg_solver = if mode == Mode::Pa {
            // asserting the negated root turns entailment checks into
            // unsatisfiability checks under assumptions
            let mut ncnf = CnfFormula::new();
            ncnf.set_var_count(table.len());
            let mut next = table.len();
            match &simplified {
                Formula::False => {}
                Formula::True => ncnf.add_clause(&[]),
                f => {
                    let root = encode(f, &table, &mut ncnf, &mut next);
                    ncnf.add_clause(&[!root]);
                }
            }
            let mut s = Solver::new();
            s.add_formula(&ncnf);
            Some(s)
        } else {
            None
        };

        Ok(EnumerationSession {
            mode,
            table,
            label_atoms,
            solver,
            neg_solver,
            blocking: Vec::new(),
            compiled: None,
            deadline,
            exhausted,
            oracle_calls: 0,
        })
    }

    /// The atom table shared by all regions of this session.
    pub fn table(&self) -> &AtomTable {
        &self.table
    }

    /// Oracle invocations so far.
    pub fn oracle_calls(&self) -> usize {
        self.oracle_calls
    }

    /// The next region, or `None` once the search space is exhausted.
    pub fn next_region(&mut self) -> anyhow::Result<Option<Region>> {
        if self.exhausted && self.compiled.is_none() {
            return Ok(None);
        }
        match self.mode {
            Mode::AllSmt => self.next_allsmt(),
            Mode::Pa => self.next_pa(),
            Mode::Bc => self.next_bc(),
        }
    }

    fn solve_current(&mut self) -> anyhow::Result<Option<Assignment>> {
        check_deadline(self.deadline)?;
        self.oracle_calls += 1;
        let sat = self
            .solver
            .solve()
            .map_err(|e| WmiError::Runtime(format!("sat oracle: {}", e)))?;
        if !sat {
            self.exhausted = true;
            return Ok(None);
        }
        let model = self
            .solver
            .model()
            .ok_or_else(|| WmiError::Runtime("sat oracle returned no model".to_owned()))?;
        let mut assignment = Assignment::new(self.table.len());
        for lit in &model {
            let i = lit.var().index();
            if i < self.table.len() {
                assignment.set(i, lit.is_positive());
            }
        }
        Ok(Some(assignment))
    }

    fn polytope_of(&self, assignment: &Assignment) -> Polytope {
        let mut polytope = Vec::new();
        for (i, atom) in self.table.atoms.iter().enumerate() {
            if let Atom::Linear(l) = atom {
                match assignment.value(i) {
                    Some(true) => polytope.push(l.clone()),
                    Some(false) => polytope.push(l.negated()),
                    None => {}
                }
            }
        }
        polytope
    }

    /// The clause excluding exactly the assigned part of `assignment`.
    fn block_clause(&self, assignment: &Assignment) -> Vec<Lit> {
        (0..self.table.len())
            .filter_map(|i| {
                assignment
                    .value(i)
                    .map(|v| Lit::from_var(Var::from_index(i), !v))
            })
            .collect()
    }

    fn assumption_lits(&self, assignment: &Assignment, skip: Option<usize>) -> Vec<Lit> {
        (0..self.table.len())
            .filter(|&i| skip != Some(i))
            .filter_map(|i| {
                assignment
                    .value(i)
                    .map(|v| Lit::from_var(Var::from_index(i), v))
            })
            .collect()
    }

    /// Whether every region blocked so far stays excluded when atom `skip`
    /// is dropped from the implicant: each blocking clause must keep a
    /// witness literal.
    fn still_blocks_without(&self, assignment: &Assignment, skip: usize) -> bool {
        'outer: for clause in &self.blocking {
            for lit in clause {
                let i = lit.var().index();
                if i == skip {
                    continue;
                }
                if assignment.value(i) == Some(lit.is_positive()) {
                    continue 'outer;
                }
            }
            return false;
        }
        true
    }

    fn next_allsmt(&mut self) -> anyhow::Result<Option<Region>> {
        loop {
            let assignment = match self.solve_current()? {
                None => return Ok(None),
                Some(a) => a,
            };
            let clause = self.block_clause(&assignment);
            self.solver.add_clause(&clause);
            let polytope = self.polytope_of(&assignment);
            if !feasible(&polytope) {
                trace!(?assignment, "theory-inconsistent assignment blocked");
                continue;
            }
            return Ok(Some(Region {
                assignment,
                polytope,
                multiplicity: BigUint::one(),
            }));
        }
    }

    fn next_bc(&mut self) -> anyhow::Result<Option<Region>> {
        if self.compiled.is_none() {
            self.compile_skeleton()?;
        }
        while let Some(assignment) = self
            .compiled
            .as_mut()
            .expect("compiled just above")
            .pop_front()
        {
            check_deadline(self.deadline)?;
            let polytope = self.polytope_of(&assignment);
            if !feasible(&polytope) {
                trace!(?assignment, "boolean assignment has an empty polytope");
                continue;
            }
            return Ok(Some(Region {
                assignment,
                polytope,
                multiplicity: BigUint::one(),
            }));
        }
        Ok(None)
    }

    /// Enumerates the whole skeleton without theory reasoning.
    fn compile_skeleton(&mut self) -> anyhow::Result<()> {
        let mut out = VecDeque::new();
        while let Some(assignment) = self.solve_current()? {
            let clause = self.block_clause(&assignment);
            self.solver.add_clause(&clause);
            out.push_back(assignment);
        }
        trace!(
            boolean_assignments = out.len(),
            oracle_calls = self.oracle_calls,
            "skeleton compiled"
        );
        self.compiled = Some(out);
        Ok(())
    }

    fn next_pa(&mut self) -> anyhow::Result<Option<Region>> {
        loop {
            let assignment = match self.solve_current()? {
                None => return Ok(None),
                Some(a) => a,
            };
            let polytope = self.polytope_of(&assignment);
            if !feasible(&polytope) {
                // theory conflict: this combination of theory literals can
                // never be part of a model, independently of the Booleans
                let clause: Vec<Lit> = (0..self.table.len())
                    .filter(|&i| self.table.atom(i).is_theory())
                    .filter_map(|i| {
                        assignment
                            .value(i)
                            .map(|v| Lit::from_var(Var::from_index(i), !v))
                    })
                    .collect();
                self.solver.add_clause(&clause);
                trace!(?assignment, "theory conflict clause added");
                continue;
            }

            // greedy implicant minimization: drop a literal when the rest
            // still propositionally entails the formula and all previously
            // yielded regions stay excluded
            let mut partial = assignment;
            let mut dropped_bools = 0u32;
            for i in 0..self.table.len() {
                if self.label_atoms.contains(i) {
                    continue;
                }
                if partial.value(i).is_none() {
                    continue;
                }
                if !self.still_blocks_without(&partial, i) {
                    continue;
                }
                check_deadline(self.deadline)?;
                let assumptions = self.assumption_lits(&partial, Some(i));
                let neg = self
                    .neg_solver
                    .as_mut()
                    .expect("pa session owns a negated-formula oracle");
                neg.assume(&assumptions);
                self.oracle_calls += 1;
                let counterexample = neg
                    .solve()
                    .map_err(|e| WmiError::Runtime(format!("sat oracle: {}", e)))?;
                if !counterexample {
                    partial.clear(i);
                    if !self.table.atom(i).is_theory() {
                        dropped_bools += 1;
                    }
                }
            }

            let clause = self.block_clause(&partial);
            self.solver.add_clause(&clause);
            self.blocking.push(clause);
            let polytope = self.polytope_of(&partial);
            let multiplicity = BigUint::one() << dropped_bools;
            trace!(
                ?partial,
                %multiplicity,
                "minimized implicant"
            );
            return Ok(Some(Region {
                assignment: partial,
                polytope,
                multiplicity,
            }));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::formula::LinearAtom;
    use num_rational::BigRational;

    fn q(n: i64) -> BigRational {
        BigRational::from_integer(n.into())
    }

    fn drain(session: &mut EnumerationSession) -> Vec<Region> {
        let mut out = Vec::new();
        while let Some(r) = session.next_region().unwrap() {
            out.push(r);
        }
        out
    }

    fn session(formula: &Formula, mode: Mode) -> EnumerationSession<'static> {
        EnumerationSession::new(formula, &BTreeSet::new(), mode, None).unwrap()
    }

    #[test]
    fn boolean_disjunction() {
        let f = Formula::or(vec![Formula::boolvar(0), Formula::boolvar(1)]);
        for &mode in &[Mode::AllSmt, Mode::Bc] {
            let regions = drain(&mut session(&f, mode));
            assert_eq!(regions.len(), 3, "{:?}", mode);
            for r in &regions {
                assert_eq!(r.multiplicity, BigUint::one());
                assert!(r.polytope.is_empty());
            }
        }
        // PA merges: covered total assignments still add up to 3
        let regions = drain(&mut session(&f, Mode::Pa));
        assert!(regions.len() <= 2);
        let covered: BigUint = regions.iter().map(|r| r.multiplicity.clone()).sum();
        assert_eq!(covered, BigUint::from(3u32));
    }

    #[test]
    fn contradiction_yields_nothing() {
        let f = Formula::and(vec![
            Formula::linear(LinearAtom::var_le(0, q(0))),
            Formula::linear(LinearAtom::var_ge(0, q(1))),
        ]);
        for &mode in &[Mode::AllSmt, Mode::Pa, Mode::Bc] {
            let regions = drain(&mut session(&f, mode));
            assert!(regions.is_empty(), "{:?}", mode);
        }
    }

    #[test]
    fn false_formula() {
        for &mode in &[Mode::AllSmt, Mode::Pa, Mode::Bc] {
            let regions = drain(&mut session(&Formula::False, mode));
            assert!(regions.is_empty(), "{:?}", mode);
        }
    }

    #[test]
    fn true_formula_is_one_region() {
        for &mode in &[Mode::AllSmt, Mode::Pa, Mode::Bc] {
            let mut session = session(&Formula::True, mode);
            assert!(session.table().is_empty());
            let regions = drain(&mut session);
            assert_eq!(regions.len(), 1, "{:?}", mode);
            assert!(regions[0].polytope.is_empty());
        }
    }

    #[test]
    fn theory_filtering() {
        // x <= 0 or x >= 1, with x also bounded in [0, 2]: the x <= 0 side
        // is the single point x = 0, the other side is [1, 2]
        let f = Formula::and(vec![
            Formula::or(vec![
                Formula::linear(LinearAtom::var_le(0, q(0))),
                Formula::linear(LinearAtom::var_ge(0, q(1))),
            ]),
            Formula::linear(LinearAtom::var_ge(0, q(0))),
            Formula::linear(LinearAtom::var_le(0, q(2))),
        ]);
        let regions = drain(&mut session(&f, Mode::AllSmt));
        // every yielded polytope is feasible
        for r in &regions {
            assert!(crate::integrate::feasible(&r.polytope));
        }
        assert!(!regions.is_empty());
    }

    #[test]
    fn bc_filters_the_compiled_queue() {
        // 3 skeleton assignments of (x <= 0 or x >= 1) with x in [-1, 2];
        // the both-true one is infeasible and must be skipped between pops
        let f = Formula::and(vec![
            Formula::or(vec![
                Formula::linear(LinearAtom::var_le(0, q(0))),
                Formula::linear(LinearAtom::var_ge(0, q(1))),
            ]),
            Formula::linear(LinearAtom::var_ge(0, q(-1))),
            Formula::linear(LinearAtom::var_le(0, q(2))),
        ]);
        let regions = drain(&mut session(&f, Mode::Bc));
        assert_eq!(regions.len(), 2);
        for r in &regions {
            assert!(feasible(&r.polytope));
            assert_eq!(r.multiplicity, BigUint::one());
        }
    }

    #[test]
    fn labels_are_never_dropped() {
        // b0 is a label implied by b1; without protection PA would drop it
        let f = Formula::and(vec![
            Formula::iff(Formula::boolvar(0), Formula::boolvar(1)),
            Formula::boolvar(1),
        ]);
        let labels: BTreeSet<BoolVar> = std::iter::once(0).collect();
        let mut session = EnumerationSession::new(&f, &labels, Mode::Pa, None).unwrap();
        let regions = drain(&mut session);
        for r in &regions {
            let idx = session.table().index_of(&Atom::Bool(0)).unwrap();
            assert_eq!(r.assignment.value(idx), Some(true));
        }
    }

    #[test]
    fn pa_regions_are_disjoint_for_booleans() {
        // (a or b) and (c or not c): 6 total assignments
        let f = Formula::and(vec![
            Formula::or(vec![Formula::boolvar(0), Formula::boolvar(1)]),
            Formula::or(vec![Formula::boolvar(2), Formula::not(Formula::boolvar(2))]),
        ]);
        let regions = drain(&mut session(&f, Mode::Pa));
        let covered: BigUint = regions.iter().map(|r| r.multiplicity.clone()).sum();
        assert_eq!(covered, BigUint::from(6u32));
    }
}
