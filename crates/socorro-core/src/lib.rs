//! Core types, rules and storage traits for the Socorro case-management
//! service.
//!
//! No HTTP or database code lives here. The rules deciding whether a
//! transition is legal are pure functions that every backend calls.

// Native `async fn` / `impl Future` in traits; see `store`.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod case;
pub mod catalog;
pub mod citizen;
pub mod error;
pub mod lookup;
pub mod profile;
pub mod stock;
pub mod store;

pub use error::{Error, FieldError, Result, ValidationErrors};
