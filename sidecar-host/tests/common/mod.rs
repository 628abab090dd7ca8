#![allow(unused_imports, dead_code)]

pub(crate) mod host_process;

pub use host_process::*;
