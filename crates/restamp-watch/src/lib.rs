pub mod controller;

pub use controller::Customizer;
