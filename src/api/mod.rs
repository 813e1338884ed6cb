pub mod targets;

pub use targets::UploadTarget;
