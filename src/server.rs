use std::{
    io,
    net::{SocketAddr, TcpListener, ToSocketAddrs},
    thread,
};

#[cfg(feature = "threadpool")]
use threadpool::ThreadPool;
use tracing::{debug, warn};

use crate::{connection::Connection, serve, App};

/// Accepts connections and runs each one on its own worker.
///
/// Workers are plain threads spawned per connection. Event streams keep their
/// worker busy for as long as the browser tab stays open, so the number of
/// workers is not capped unless a pool is asked for.
pub struct Server<'a> {
    workers: Workers,
    local_addr: Option<SocketAddr>,
    incoming: Box<dyn Iterator<Item = Connection> + Send + 'a>,
}

enum Workers {
    PerConnection,
    #[cfg(feature = "threadpool")]
    Pool(ThreadPool),
}

impl Workers {
    fn spawn<F: FnOnce() + Send + 'static>(&self, job: F) {
        match self {
            Workers::PerConnection => {
                if let Err(err) = thread::Builder::new().name("connection".into()).spawn(job) {
                    warn!(%err, "failed to spawn connection worker");
                }
            }
            #[cfg(feature = "threadpool")]
            Workers::Pool(pool) => pool.execute(job),
        }
    }
}

impl<'a> Server<'a> {
    pub fn serve<Handle>(self, app: Handle) -> io::Result<()>
    where
        Handle: App,
        Handle: Send + Clone + 'static,
    {
        for conn in self.incoming {
            let app = app.clone();
            self.workers.spawn(move || {
                let peer = conn.peer_addr();
                if let Err(err) = serve(conn, app) {
                    debug!(?peer, %err, "connection closed with error");
                }
            });
        }

        Ok(())
    }

    /// Address the listener is bound to, when there is one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn builder() -> ServerBuilder {
        Default::default()
    }

    pub fn bind<A: ToSocketAddrs>(addr: A) -> Server<'static> {
        Self::builder().bind(addr)
    }

    pub fn try_bind<A: ToSocketAddrs>(addr: A) -> io::Result<Server<'static>> {
        Self::builder().try_bind(addr)
    }
}

#[derive(Default)]
pub struct ServerBuilder {
    #[cfg(feature = "threadpool")]
    max_threads: Option<usize>,
}

impl ServerBuilder {
    /// Runs connections on a pool of at most `max_threads` workers.
    ///
    /// Each open event stream holds one worker, so the pool must be larger than
    /// the number of browser tabs expected to listen for reloads.
    #[cfg(feature = "threadpool")]
    pub fn max_threads(self, max_threads: usize) -> Self {
        Self {
            max_threads: Some(max_threads),
        }
    }

    pub fn from_connections<'a, T>(self, conns: T) -> Server<'a>
    where
        T: IntoIterator<Item = Connection>,
        T::IntoIter: Send + 'a,
    {
        Server {
            workers: self.workers(),
            local_addr: None,
            incoming: Box::new(conns.into_iter()),
        }
    }

    /// Panics when the address can't be bound; see [`try_bind`](Self::try_bind).
    pub fn bind<A: ToSocketAddrs>(self, addr: A) -> Server<'static> {
        match self.try_bind(addr) {
            Ok(server) => server,
            Err(err) => panic!("failed to bind listener: {err}"),
        }
    }

    pub fn try_bind<A: ToSocketAddrs>(self, addr: A) -> io::Result<Server<'static>> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr().ok();
        let mut server = self.from_connections(TcpAcceptor { listener });
        server.local_addr = local_addr;
        Ok(server)
    }

    #[cfg(feature = "threadpool")]
    fn workers(&self) -> Workers {
        match self.max_threads {
            Some(max_threads) => Workers::Pool(ThreadPool::new(max_threads)),
            None => Workers::PerConnection,
        }
    }

    #[cfg(not(feature = "threadpool"))]
    fn workers(&self) -> Workers {
        Workers::PerConnection
    }
}

struct TcpAcceptor {
    listener: TcpListener,
}

impl Iterator for TcpAcceptor {
    type Item = Connection;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.listener.accept() {
                Ok(conn) => return Some(conn.into()),
                Err(err) => warn!(%err, "failed to accept connection"),
            }
        }
    }
}
