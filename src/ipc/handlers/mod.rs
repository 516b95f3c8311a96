pub mod core;
pub mod exams;
pub mod students;
pub mod subjects;
pub mod upload;
