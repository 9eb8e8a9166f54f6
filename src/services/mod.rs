pub mod blob_storage;
pub mod enrollment;
pub mod face_tagging;
pub mod media_store;
pub mod metadata;
pub mod slideshow;
pub mod upload_orchestrator;
