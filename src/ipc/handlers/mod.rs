pub mod core;
pub mod csv_exchange;
pub mod forms;
pub mod grades;
pub mod release;
pub mod students;
