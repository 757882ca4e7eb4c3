pub mod feature;
pub mod market_data;

pub use feature::*;
pub use market_data::*;
