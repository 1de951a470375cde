pub mod scoring;
pub mod selector;
pub mod stats;

pub use scoring::ScoreModel;
pub use selector::WeightedSelector;
pub use stats::Summary;
