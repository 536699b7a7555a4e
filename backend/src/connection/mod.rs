mod manager;
mod transport;

pub use manager::{ConnectionManager, ConnectionState};
pub use transport::{Connector, MultipartSocket, ZmqConnector};
