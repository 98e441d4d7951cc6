pub mod answers;
pub mod encode;
pub mod fetch;
pub mod names;
pub mod papers;
pub mod section;
pub mod store;
pub mod subareas;
