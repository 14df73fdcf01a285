//!
//! # CRD Definition
//!
//! Static description of a resource type: api group, version and names
//!
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Crd {
    pub group: &'static str,
    pub version: &'static str,
    pub names: CrdNames,
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CrdNames {
    pub kind: &'static str,
    pub plural: &'static str,
    pub singular: &'static str,
}

pub const GROUP: &str = "scaling.volumania.io";
pub const V1: &str = "v1";
