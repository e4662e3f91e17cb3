pub mod mo;
pub mod po;
