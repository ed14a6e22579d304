pub mod embedding;
pub mod extract;
pub mod linalg;
pub mod loader;
