//! Custom resources of the `scaling.volumania.io` group.
//!
//! These are wire types: every field is kept in the shape the API server
//! stores it. Conversion into typed policy happens in the autoscaler.

pub mod autoscaler;
pub mod manual_resize;
