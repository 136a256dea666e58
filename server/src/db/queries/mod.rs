pub mod categories;
pub mod channels;
pub mod servers;
pub mod users;
