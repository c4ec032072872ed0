//! Chain query implementations.

pub mod account;
