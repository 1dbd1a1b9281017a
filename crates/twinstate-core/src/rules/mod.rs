pub mod revision;
pub mod validation;
