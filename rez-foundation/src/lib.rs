//! Foundational types shared by every stage of the Rez front end.

pub mod errors;
pub mod ident;
