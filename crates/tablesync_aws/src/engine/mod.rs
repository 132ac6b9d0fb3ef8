pub mod batch_write;
pub mod run;
pub mod scan;
pub mod schema_clone;
