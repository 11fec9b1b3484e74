use std::sync::Arc;

use http::{Method, Request, Response, StatusCode};

use crate::{
    config::Config, reload::ReloadNotifier, response::error_page, static_files::StaticFiles,
    App, Body,
};

/// Routes the reload endpoint to the [`ReloadNotifier`] and everything else to
/// the [`StaticFiles`] responder.
#[derive(Clone)]
pub struct DevServer {
    files: Arc<StaticFiles>,
    reload: Arc<ReloadNotifier>,
    reload_path: Arc<str>,
}

impl DevServer {
    pub fn new(config: &Config) -> Self {
        Self {
            files: Arc::new(StaticFiles::new(&config.root)),
            reload: Arc::new(ReloadNotifier::new(
                &config.trigger,
                config.poll_interval(),
            )),
            reload_path: config.reload_path.as_str().into(),
        }
    }
}

impl App for DevServer {
    type Error = http::Error;

    fn handle(&self, req: Request<()>) -> Result<Response<Body>, Self::Error> {
        match req.method() {
            &Method::GET if req.uri().path() == &*self.reload_path => self.reload.respond(&req),
            &Method::GET | &Method::HEAD => self.files.respond(&req),
            method => error_page(
                StatusCode::NOT_IMPLEMENTED,
                &format!("Unsupported method ('{method}')"),
            ),
        }
    }
}
