pub mod text;
pub mod token_estimator;
