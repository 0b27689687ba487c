pub mod checksum;
pub mod raw_writer;
