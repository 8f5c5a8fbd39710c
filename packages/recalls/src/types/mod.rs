//! Core data types: the recall record, its lifecycle, reference entities,
//! and the search-index projection.

pub mod projection;
pub mod recall;
pub mod reference;
pub mod state;
