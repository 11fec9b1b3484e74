use std::{
    io::{self, Write},
    time::SystemTime,
};

use headers::{HeaderMapExt, HeaderValue};
use http::{header, Response, StatusCode, Version};

use crate::{body::Body, upgrade::UpgradeExtension};

pub(crate) const SERVER_NAME: &str = concat!("reloadserve/", env!("CARGO_PKG_VERSION"));

pub(crate) enum Outcome {
    KeepAlive,
    Upgrade(UpgradeExtension),
}

/// Writes the response head and, unless `head_only`, its body.
///
/// Responses carrying an upgrade only get their head written: the body belongs to
/// whoever takes the connection over.
pub(crate) fn write_response(
    res: Response<Body>,
    stream: &mut impl Write,
    head_only: bool,
) -> io::Result<Outcome> {
    let (mut parts, body) = res.into_parts();

    if !parts.headers.contains_key(header::SERVER) {
        parts
            .headers
            .insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
    }

    if !parts.headers.contains_key(header::DATE) {
        parts
            .headers
            .typed_insert(headers::Date::from(SystemTime::now()));
    }

    if let Some(upgrade) = parts.extensions.remove::<UpgradeExtension>() {
        write_head(parts.version, parts.status, &parts.headers, stream)?;
        return Ok(Outcome::Upgrade(upgrade));
    }

    let bodyless = parts.status.is_informational()
        || parts.status == StatusCode::NO_CONTENT
        || parts.status == StatusCode::NOT_MODIFIED;

    if !bodyless {
        parts
            .headers
            .typed_insert(headers::ContentLength(body.len()));
    }

    write_head(parts.version, parts.status, &parts.headers, stream)?;

    if !head_only && !bodyless {
        io::copy(&mut body.into_reader(), stream)?;
    }

    Ok(Outcome::KeepAlive)
}

/// A small HTML page describing an error status.
pub(crate) fn error_page(status: StatusCode, message: &str) -> http::Result<Response<Body>> {
    let code = status.as_u16();
    let reason = status.canonical_reason().unwrap_or_default();

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from(format!(
            "<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{code} {reason}</title>\n</head>\n<body>\n<h1>{code} {reason}</h1>\n\
             <p>{message}.</p>\n</body>\n</html>\n"
        )))
}

fn write_head(
    version: Version,
    status: StatusCode,
    headers: &http::HeaderMap,
    stream: &mut impl Write,
) -> io::Result<()> {
    stream.write_all(format!("{version:?} {status}\r\n").as_bytes())?;

    for (name, val) in headers.iter() {
        stream.write_all(&[format!("{name}: ").as_bytes(), val.as_bytes(), b"\r\n"].concat())?;
    }

    stream.write_all(b"\r\n")
}

/// Writes an open-ended body, one flushed piece at a time.
///
/// HTTP/1.1 bodies are framed with chunked transfer coding. HTTP/1.0 bodies are
/// written raw and end when the connection closes.
pub(crate) struct StreamWriter<W: Write> {
    inner: W,
    chunked: bool,
}

impl<W: Write> StreamWriter<W> {
    pub(crate) fn for_version(inner: W, version: Version) -> Self {
        Self {
            inner,
            chunked: version == Version::HTTP_11,
        }
    }

    pub(crate) fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> Write for StreamWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.chunked {
            self.inner
                .write_all(format!("{:x}\r\n", buf.len()).as_bytes())?;
            self.inner.write_all(buf)?;
            self.inner.write_all(b"\r\n")?;
        } else {
            self.inner.write_all(buf)?;
        }

        self.inner.flush()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
