use std::sync::Arc;

use crate::connection::Connection;

/// Takes over a connection once the response head has been written.
///
/// The handler runs on the connection's worker thread and owns the socket until
/// it returns; the connection is closed afterwards.
pub trait UpgradeHandler: Sync + Send {
    fn handle(&self, stream: Connection);
}

impl<F: Fn(Connection) + Sync + Send> UpgradeHandler for F {
    fn handle(&self, stream: Connection) {
        self(stream)
    }
}

#[derive(Clone)]
pub(crate) struct UpgradeExtension {
    pub(crate) handler: Arc<dyn UpgradeHandler + 'static>,
}

pub trait Upgrade {
    fn upgrade(self, handle: impl UpgradeHandler + 'static) -> Self;
}

impl Upgrade for http::response::Builder {
    fn upgrade(self, handle: impl UpgradeHandler + 'static) -> Self {
        self.extension(UpgradeExtension {
            handler: Arc::new(handle),
        })
    }
}

impl<T> Upgrade for http::Response<T> {
    fn upgrade(mut self, handle: impl UpgradeHandler + 'static) -> Self {
        self.extensions_mut().insert(UpgradeExtension {
            handler: Arc::new(handle),
        });
        self
    }
}
