pub mod param;
pub mod conv;
pub mod dense;

pub use param::Param;
pub use conv::Conv2d;
pub use dense::Dense;
