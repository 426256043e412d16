//! commerce-types: domain model, business rules and repository ports

pub mod domain;
pub mod ports;
