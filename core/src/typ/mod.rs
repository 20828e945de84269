mod type_system;


pub use type_system::*;
