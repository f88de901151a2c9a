pub mod intent;
pub mod path;
pub mod predictor;
pub mod steering;
