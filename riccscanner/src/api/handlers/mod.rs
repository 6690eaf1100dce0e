pub(crate) mod health;
pub(crate) mod solve;

pub use health::health_check;
pub use solve::solve;
