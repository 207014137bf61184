//! Domain model module declarations.

pub mod log;
pub mod media_information;
pub mod session;
