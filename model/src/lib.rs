mod error;
mod linear_model;
pub mod traits;

pub use error::ModelError;
pub use linear_model::{LinearModel, LinearModelSettings};

pub struct LearningStepInfo {
    pub loss: f32,
    pub average_q_val: f32,
}
