pub mod lifetime;
pub mod sequential_lifetimes;
