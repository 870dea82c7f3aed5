use tokio::sync::mpsc;

use crate::protocol::ServerMessage;

// Handed to the socket task when a connection opens; the engine keeps the
// sending half.
#[derive(Debug)]
pub struct ConnectionIo {
    pub connection_id: String,
    pub outbound_rx: mpsc::Receiver<ServerMessage>,
}
