pub mod impl_traits;
pub mod structs;
pub mod traits;
