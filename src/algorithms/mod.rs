pub mod mbrl;
pub mod qmix;

pub use mbrl::BmpoConfig;
pub use qmix::{QmixConfig, QmixTrainer};
