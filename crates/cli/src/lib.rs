//! Lampion CLI
//!
//! Runs the Lampion engine over fixture files captured from real page
//! loads. A fixture bundles a request log, a main-thread task log, and
//! a trace summary; the `lampion` binary loads one, evaluates every
//! metric under the configured throttling, and prints a report.
//!
//! # Example
//!
//! ```ignore
//! use lampion_cli::EvalFixture;
//! use lampion_engine::Engine;
//! use std::path::Path;
//!
//! let fixture = EvalFixture::load(Path::new("page.json"))?;
//! let engine = Engine::with_coefficients(fixture.coefficients);
//! let report = engine.estimate_all(&fixture.into_input());
//! ```

pub mod fixture;

pub use fixture::{EvalFixture, FixtureError};
