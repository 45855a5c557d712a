pub mod header;
pub mod io;
pub mod layout;
