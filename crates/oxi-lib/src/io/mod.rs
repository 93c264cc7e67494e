pub mod bus;
pub mod max30102;
pub mod sim;
pub mod text;
