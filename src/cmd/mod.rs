pub mod migrate;
pub mod score;
pub mod simulate;
pub mod validate;
