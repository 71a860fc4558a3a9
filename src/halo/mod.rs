//! Theoretical angular cross-power spectra from the halo model.
//!
//! ```text
//!   CosmologyParams ──► Cosmology (background, growth, linear P(k))
//!                           │
//!   HaloProfile ──► PreparedProfile ──► HaloModelCalculator ──► Pk2d
//!                                                                │
//!   Tracer ──► Kernel ─────────────────────► Limber integral ◄───┘
//!                                                │
//!                                                ▼
//!                                               C_ℓ
//! ```
//!
//! Units follow the usual halo-model conventions without little h: Mpc,
//! Mpc⁻¹ and M_sun.

pub mod calculator;
pub mod cosmology;
pub mod halos;
pub mod limber;
pub mod numerics;
pub mod profiles;
pub mod tracers;

pub use calculator::{HaloModelCalculator, Pk2d};
pub use cosmology::{Cosmology, CosmologyError, CosmologyParams};
pub use limber::{LimberHaloModel, TracerProfile};
pub use profiles::{GnfwParams, HaloProfile};
pub use tracers::Tracer;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum HaloModelError {
    #[error(transparent)]
    Cosmology(#[from] CosmologyError),

    #[error("bad grid: {0}")]
    BadGrid(&'static str),

    #[error("invalid tracer: {0}")]
    InvalidTracer(String),

    #[error("the two tracer kernels do not overlap")]
    EmptyOverlap,
}
