pub mod card_reader;
pub mod report_writer;
pub mod request_reader;
