//! Zyg renderer bindings.
//!
//! Loads the renderer shared library at runtime and implements
//! [`zyg_core::Renderer`] over its C ABI. Every call's return code is
//! checked; failures surface as [`zyg_core::RendererError`].
#![allow(unsafe_code)]
// FFI wrappers necessarily use unsafe externs and raw pointers.

mod error;
mod renderer;
mod sys;

pub use error::ZygError;
pub use renderer::{LIBRARY_DIR_ENV, ZygRenderer, library_path};
