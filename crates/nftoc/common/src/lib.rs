#![allow(clippy::must_use_candidate)]

pub mod args;
