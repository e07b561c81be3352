//! MySQL/MariaDB driver implementation

mod connection;
mod driver;
mod transfer;

pub use connection::MySqlConnection;
pub use driver::MySqlDriver;
