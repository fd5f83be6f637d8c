//! Backend selection module.
//!
//! This module holds the process-wide preference that decides whether matrix
//! multiplication may be offloaded to the accelerator, and the minimum
//! operand size at which offloading is worth its transfer overhead.
//!
//! # Supported Backends
//!
//! - `Auto` — Offload when an accelerator is present and the operands are
//!   at least [`offload_threshold`] in every dimension (default).
//! - `Cpu` — Never offload.
//! - `Wgpu` — Offload whenever an accelerator is present, regardless of size.
//!
//! An accelerator is only ever present when the crate is built with the
//! `wgpu` feature. Without it every preference resolves to the host path.
//!
//! Both settings live in atomics, so switching is cheap and lock-free.

use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Default value of [`offload_threshold`].
pub const DEFAULT_OFFLOAD_THRESHOLD: usize = 64;

/// Enumeration of backend preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Backend {
    /// Offload large multiplies when an accelerator is available (default).
    #[default]
    Auto = 0,
    /// Host path only.
    Cpu,
    /// Offload every multiply when an accelerator is available.
    Wgpu,
}

impl TryFrom<u8> for Backend {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Auto),
            1 => Ok(Self::Cpu),
            2 => Ok(Self::Wgpu),
            _ => Err(()),
        }
    }
}

static GLOBAL_BACKEND: AtomicU8 = AtomicU8::new(Backend::Auto as u8);

static OFFLOAD_THRESHOLD: AtomicUsize = AtomicUsize::new(DEFAULT_OFFLOAD_THRESHOLD);

/// Sets the backend preference for all subsequent multiplies.
///
/// # Example
///
/// ```
/// use tiny_cnn::backend::{set_backend, get_backend, Backend};
/// set_backend(Backend::Cpu);
/// assert_eq!(get_backend(), Backend::Cpu);
/// # set_backend(Backend::Auto);
/// ```
pub fn set_backend(b: Backend) {
    log::debug!("backend preference set to {b:?}");
    GLOBAL_BACKEND.store(b as u8, Ordering::Release);
}

/// Returns the current backend preference.
///
/// If the stored value is invalid, defaults to [`Backend::Auto`].
pub fn get_backend() -> Backend {
    Backend::try_from(GLOBAL_BACKEND.load(Ordering::Acquire)).unwrap_or_default()
}

/// Sets the minimum operand dimension for `Auto` offloading.
///
/// Values below 1 are clamped to 1; a zero-sized operand is never offloaded.
pub fn set_offload_threshold(min_dim: usize) {
    OFFLOAD_THRESHOLD.store(min_dim.max(1), Ordering::Release);
}

/// Returns the minimum operand dimension for `Auto` offloading.
pub fn offload_threshold() -> usize {
    OFFLOAD_THRESHOLD.load(Ordering::Acquire)
}
