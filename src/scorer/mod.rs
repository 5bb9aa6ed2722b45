pub mod composite;

pub use composite::{compute_score, Factor, LinearWeights, PointsWeights, ScoringModel};
