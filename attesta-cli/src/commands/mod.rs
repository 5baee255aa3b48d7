//! CLI command implementations.

pub mod authenticate;
pub mod inspect;
pub mod register;
