//! Terminal output for the demo binary.

pub mod display;
