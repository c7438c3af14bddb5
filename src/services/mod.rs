pub mod capture;
pub mod crop;
pub mod entity;
pub mod image_store;
pub mod lifecycle;
pub mod tracker;
