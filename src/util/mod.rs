pub mod testing;
pub mod uid;
