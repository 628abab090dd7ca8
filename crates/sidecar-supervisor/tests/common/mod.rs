#![allow(unused_imports, dead_code)]

pub(crate) mod worker_harness;

pub use worker_harness::*;
