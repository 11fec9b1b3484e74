#![doc = include_str!("../README.md")]

pub mod body;
pub mod config;
mod connection;
pub mod dispatch;
pub mod reload;
mod request;
mod response;
pub mod server;
pub mod static_files;
pub mod upgrade;

use std::{
    error::Error,
    io::{self, BufReader, BufWriter, Write},
};

pub use body::Body;
pub use config::Config;
pub use connection::Connection;
pub use dispatch::DevServer;
use headers::{HeaderMapExt, HeaderValue};
pub use http::{header, Method, Request, Response, StatusCode, Uri, Version};
pub use request::ParseError;
use response::Outcome;
pub use server::Server;

type IncomingRequest = Request<()>;

/// Maps [`Request`]s to [`Response`]s.
///
/// Usually you don't need to manually implement this trait, as its `Fn` implementation might suffice
/// most of the needs.
///
/// ```no_run
/// # use std::convert::Infallible;
/// # use reloadserve::{Body, Request, Response, Server, StatusCode};
/// fn app(req: Request<()>) -> Result<Response<Body>, Infallible> {
///     Ok(Response::builder().status(StatusCode::OK).body(Body::empty()).unwrap())
/// }
///
/// fn main() -> std::io::Result<()> {
///     Server::bind("0.0.0.0:4444").serve(app)
/// }
/// ```
pub trait App {
    type Error: Into<Box<dyn Error + Send + Sync>>;

    fn handle(&self, request: IncomingRequest) -> Result<Response<Body>, Self::Error>;
}

impl<F, Err> App for F
where
    F: Fn(IncomingRequest) -> Result<Response<Body>, Err>,
    F: Sync + Send,
    F: Clone,
    Err: Into<Box<dyn Error + Send + Sync>>,
{
    type Error = Err;

    fn handle(&self, request: IncomingRequest) -> Result<Response<Body>, Self::Error> {
        self(request)
    }
}

pub(crate) fn serve<C: Into<Connection>, A: App>(stream: C, app: A) -> io::Result<()> {
    let conn = stream.into();
    let mut reader = BufReader::new(conn.try_clone()?);
    let mut writer = BufWriter::new(conn);

    loop {
        match request::parse_request(&mut reader) {
            Ok(req) => {
                let asks_for_close = req
                    .headers()
                    .typed_get::<headers::Connection>()
                    .filter(|conn| conn.contains("close"))
                    .is_some();

                let asks_for_keep_alive = req
                    .headers()
                    .typed_get::<headers::Connection>()
                    .filter(|conn| conn.contains("keep-alive"))
                    .is_some();

                let version = req.version();
                let head_only = req.method() == Method::HEAD;

                let demands_close = match version {
                    Version::HTTP_09 => true,
                    Version::HTTP_10 => !asks_for_keep_alive,
                    _ => asks_for_close,
                };

                let mut res = app
                    .handle(req)
                    .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

                *res.version_mut() = version;

                if demands_close && !res.headers().contains_key(header::CONNECTION) {
                    res.headers_mut()
                        .insert(header::CONNECTION, HeaderValue::from_static("close"));
                }

                match response::write_response(res, &mut writer, head_only)? {
                    Outcome::KeepAlive if demands_close => break,
                    Outcome::KeepAlive => writer.flush()?,
                    Outcome::Upgrade(upgrade) => {
                        drop(reader);
                        upgrade.handler.handle(writer.into_inner()?);
                        return Ok(());
                    }
                }
            }
            Err(ParseError::ConnectionClosed) => break,
            Err(err @ ParseError::Io(_)) => return Err(io::Error::new(io::ErrorKind::Other, err)),
            Err(err) => {
                let res = Response::builder()
                    .status(StatusCode::BAD_REQUEST)
                    .header(header::CONNECTION, "close")
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from(format!("{err}\n")))
                    .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
                response::write_response(res, &mut writer, false)?;
                writer.flush()?;
                return Err(io::Error::new(io::ErrorKind::InvalidData, err));
            }
        }
    }

    writer.flush()
}
