pub mod builder;

mod errors;
mod populate;
