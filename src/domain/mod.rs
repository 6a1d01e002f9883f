pub mod decision;
pub mod price;

pub use decision::*;
pub use price::*;
