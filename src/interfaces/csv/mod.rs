pub mod response_writer;
pub mod turn_reader;
