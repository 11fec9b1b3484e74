use std::{
    io::{self, Read, Write},
    net::{SocketAddr, TcpStream},
};

/// A client connection accepted by the [`Server`](crate::Server).
pub struct Connection(TcpStream);

impl Connection {
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.0.peer_addr().ok()
    }

    pub fn try_clone(&self) -> io::Result<Self> {
        self.0.try_clone().map(Connection)
    }

    /// Checks, without blocking, whether the peer has hung up.
    ///
    /// Only meant for connections nobody reads from anymore: whatever the peer
    /// sent is read and thrown away, so pending bytes can't hide a hang-up. Any
    /// error while reading counts as a closed connection.
    pub fn peer_closed(&self) -> bool {
        if self.0.set_nonblocking(true).is_err() {
            return true;
        }

        let mut buf = [0_u8; 512];
        let closed = loop {
            match (&self.0).read(&mut buf) {
                Ok(0) => break true,
                Ok(_) => continue,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break false,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break true,
            }
        };

        self.0.set_nonblocking(false).is_err() || closed
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl From<TcpStream> for Connection {
    fn from(conn: TcpStream) -> Self {
        Connection(conn)
    }
}

impl From<(TcpStream, SocketAddr)> for Connection {
    fn from((conn, _addr): (TcpStream, SocketAddr)) -> Self {
        Connection(conn)
    }
}
