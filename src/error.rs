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

//! Failure taxonomy of the engine.
//!
//! Errors travel through `anyhow::Result` like everywhere else in the crate;
//! callers that care about the category (timeout vs. hard failure) recover it
//! with `err.downcast_ref::<WmiError>()`.

/// Failures with defined recovery semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WmiError {
    /// Structurally invalid weight function (caller error, not retried).
    MalformedWeight(String),
    /// Oracle or solver failure mid-enumeration. Fatal to the current
    /// `compute` call; a fresh call is safe since no blocking-clause state
    /// survives across calls.
    Runtime(String),
    /// A caller-supplied budget was exceeded. Recoverable at the caller's
    /// discretion.
    Timeout,
    /// An unbounded region with a non-vanishing integrand was encountered,
    /// meaning a variable domain bound is missing upstream.
    UnboundedIntegration,
    /// The support admits no mass, so no normalized probability exists.
    ZeroMassSupport,
}

impl std::fmt::Display for WmiError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            WmiError::MalformedWeight(msg) => write!(f, "malformed weight function: {}", msg),
            WmiError::Runtime(msg) => write!(f, "solver failure: {}", msg),
            WmiError::Timeout => write!(f, "computation budget exceeded"),
            WmiError::UnboundedIntegration => write!(
                f,
                "integration over an unbounded region: a variable domain bound is missing"
            ),
            WmiError::ZeroMassSupport => {
                write!(f, "the support has zero mass, cannot normalize")
            }
        }
    }
}

impl std::error::Error for WmiError {}
