pub mod decode;
pub mod features;
pub mod source;
pub mod spectrum;
