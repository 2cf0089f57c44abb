pub mod record;

pub use record::RecordRepository;
