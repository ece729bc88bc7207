pub mod error;
pub mod staging;
pub mod test_case;
pub mod vector_record;
