pub mod dense;
pub mod output;
