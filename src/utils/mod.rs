//! Small shared helpers.

pub mod fuzzy;
