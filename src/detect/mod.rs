pub mod beat;
pub mod decision;
pub mod detector;
pub mod history;
pub mod instruments;
pub mod sections;
pub mod silence;
