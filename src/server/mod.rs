//! TCP front end: accepts sockets and drives one connection engine per client.

pub mod listener;
pub mod routes;
pub mod session;
