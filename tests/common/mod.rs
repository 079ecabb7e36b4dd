#![allow(dead_code)]

pub mod mock_manager;
pub mod strategies;

pub use mock_manager::*;
