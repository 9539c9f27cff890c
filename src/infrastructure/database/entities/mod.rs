//! Database entities module

pub mod location;
pub mod spot;

pub use location::Entity as Location;
pub use spot::Entity as Spot;
