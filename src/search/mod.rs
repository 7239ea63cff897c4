pub mod bm25;
pub mod hybrid;
pub mod semantic;
pub mod vector;
