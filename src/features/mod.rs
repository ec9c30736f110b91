pub mod error;
pub mod pages;
