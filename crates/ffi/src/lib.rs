//! C ABI for pore network generation and permeability simulation.
//!
//! Handles are opaque boxed pointers. Every fallible call returns a `PnmErrorCode`
//! and records a message readable through `pnm_get_last_error` on the calling thread.
//! Panics never unwind across the boundary.

mod error;
mod helpers;
pub mod network;
pub mod simulation;

pub use error::{pnm_get_last_error, pnm_get_last_error_code, PnmErrorCode};

use pore_network_core::ComputeContext;

/// Release the shared GPU device. Later simulations run on the CPU.
///
/// Safe to call more than once, and before any other call.
#[no_mangle]
pub extern "C" fn pnm_shutdown() {
    if let Ok(context) = ComputeContext::shared() {
        context.shutdown();
    }
}
