//! Implementation modules behind the `Store` facade.
//!
//! Every function takes an already-locked connection; transaction scope is
//! decided by the facade (or by `txn` for read-compute-write paths).

pub(crate) mod acks;
pub(crate) mod profiling;
pub(crate) mod runs;
pub(crate) mod status;
pub(crate) mod txn;
