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

#![warn(missing_docs)]

//! Exact weighted model integration over linear real arithmetic with
//! piecewise-polynomial weights.

pub mod enumerate;
pub mod error;
pub mod formula;
pub mod input;
pub mod integrate;
pub mod polynomial;
pub mod weight;
pub mod wmi;

use anyhow::Context;
use chrono::Duration;
use enumerate::Mode;
use error::WmiError;
use std::cell::RefCell;
use std::fs::File;
use std::ops::DerefMut;
use std::path::PathBuf;
use structopt::clap::arg_enum;
use structopt::StructOpt;

arg_enum! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum ModeName {
        AllSmt,
        Pa,
        Bc,
    }
}

impl ModeName {
    fn mode(self) -> Mode {
        match self {
            ModeName::AllSmt => Mode::AllSmt,
            ModeName::Pa => Mode::Pa,
            ModeName::Bc => Mode::Bc,
        }
    }
}

fn parse_duration(txt: &str) -> anyhow::Result<Duration> {
    let n = txt.parse()?;
    Ok(Duration::milliseconds(n))
}

#[derive(Debug)]
/// Writes the result in json to a file.
pub struct ResultWriter {
    file: RefCell<File>,
    path: PathBuf,
}

impl ResultWriter {
    fn write<R: serde::Serialize>(&self, result: &R) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(self.file.borrow_mut().deref_mut(), result)
            .with_context(|| format!("writing result to {}", self.path.display()))
    }
}

impl From<&std::ffi::OsStr> for ResultWriter {
    fn from(path: &std::ffi::OsStr) -> ResultWriter {
        let path: PathBuf = path.into();
        let file = match File::create(&path) {
            Ok(f) => RefCell::new(f),
            Err(e) => {
                tracing::error!(
                    "failed to open {} to write results (--json option): {}",
                    path.display(),
                    e
                );
                std::process::exit(1);
            }
        };
        ResultWriter { path, file }
    }
}

/// Configuration options
#[derive(Debug, StructOpt)]
#[structopt(
    name = "wmint",
    about = "Computes weighted model integrals over linear real arithmetic"
)]
pub struct Opt {
    #[structopt(possible_values = &ModeName::variants(), case_insensitive = true, default_value="pa", short, long)]
    /// How to enumerate truth assignments
    mode: ModeName,

    /// Input problem, a json file
    #[structopt(parse(from_os_str))]
    input: PathBuf,

    /// JSON output to the specified file
    #[structopt(short, long, parse(from_os_str))]
    json: Option<ResultWriter>,

    /// Timeout per computed quantity, in milliseconds. Return code is 42 on
    /// timeout.
    #[structopt(short = "T", long, parse(try_from_str = parse_duration))]
    timeout: Option<Duration>,

    /// Enable debug output
    #[structopt(short, long)]
    debug: bool,
}

/// The json report for one query.
#[derive(Debug, serde::Serialize)]
struct QueryReport {
    query: usize,
    /// exact probability, as a rational
    probability: String,
    probability_approx: f64,
    integrations: usize,
}

/// The json report for one run.
#[derive(Debug, serde::Serialize)]
struct Report {
    mode: String,
    /// exact weighted volume of the support, as a rational
    volume: String,
    volume_approx: f64,
    integrations: usize,
    queries: Vec<QueryReport>,
}

fn setup_tracing(opt: &Opt) -> anyhow::Result<()> {
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::prelude::*;
    let min_level = if opt.debug { Level::TRACE } else { Level::INFO };
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::filter::filter_fn(move |metadata| *metadata.level() <= min_level),
    );
    let subscriber = tracing_subscriber::Registry::default().with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default tracing collector")?;
    Ok(())
}

fn budget(opt: &Opt) -> anyhow::Result<Option<std::time::Duration>> {
    opt.timeout
        .map(|d| d.to_std().context("negative timeout"))
        .transpose()
}

fn exit_on_timeout(err: anyhow::Error) -> anyhow::Error {
    if matches!(err.downcast_ref::<WmiError>(), Some(WmiError::Timeout)) {
        tracing::warn!(timeout = true);
        std::process::exit(42);
    }
    err
}

/// entrypoint of the binary
pub fn run() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    setup_tracing(&opt)?;
    let problem = input::load_problem(&opt.input)?;
    let mode = opt.mode.mode();
    let budget = budget(&opt)?;

    let support_result = wmi::compute(&problem.support, &problem.weight, mode, budget)
        .map_err(exit_on_timeout)
        .with_context(|| format!("computing the volume of {}", opt.input.display()))?;
    let mut report = Report {
        mode: format!("{:?}", mode),
        volume: support_result.volume.to_string(),
        volume_approx: support_result.volume_f64(),
        integrations: support_result.integrations,
        queries: Vec::new(),
    };
    println!("Support volume: {}", support_result);

    for (i, query) in problem.queries.iter().enumerate() {
        let res = wmi::compute_normalized_probability(
            &problem.support,
            &problem.weight,
            query,
            mode,
            budget,
        )
        .map_err(exit_on_timeout)
        .with_context(|| format!("computing query {} of {}", i, opt.input.display()))?;
        println!(
            "Query {}: probability {} ({} integrations)",
            i,
            res.probability_f64(),
            res.numerator.integrations + res.denominator.integrations
        );
        report.queries.push(QueryReport {
            query: i,
            probability: res.probability.to_string(),
            probability_approx: res.probability_f64(),
            integrations: res.numerator.integrations + res.denominator.integrations,
        });
    }

    if let Some(writer) = &opt.json {
        writer.write(&report)?;
    }
    Ok(())
}
