//! Payroll rules with no I/O. Handlers in `api` load rows, call into here,
//! and persist what comes back.

pub mod documents;
pub mod lifecycle;
pub mod reconcile;
pub mod rollup;
pub mod workdays;
