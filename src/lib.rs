pub mod geometry;
pub mod io;
pub mod mapping;
pub mod system;
pub mod tracking;
