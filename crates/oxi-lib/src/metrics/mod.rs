pub mod spo2;
