mod data;

pub use data::default_reference_data;
