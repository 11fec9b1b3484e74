use std::io::{self, BufRead, Read};

use headers::HeaderMapExt;
use http::{Method, Request, Version};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("io error")]
    Io(#[from] io::Error),
    #[error("invalid request")]
    Invalid(#[from] httparse::Error),
    #[error("incomplete request")]
    IncompleteRequest,
    #[error("unsupported http version: {0}")]
    UnsupportedHttpVersion(u8),
    #[error("invalid Transfer-Encoding header")]
    InvalidTransferEncoding,
    #[error("invalid header")]
    InvalidHeader(#[from] headers::Error),
    #[error("invalid chunk size")]
    InvalidChunkSize,
    #[error("failed to parse http request")]
    Unknown,
}

/// Reads one request head from the stream.
///
/// Nothing served here accepts a payload, so any request body is read and thrown
/// away to keep the stream aligned on the next request.
pub(crate) fn parse_request(stream: &mut impl BufRead) -> Result<Request<()>, ParseError> {
    let mut buf = Vec::with_capacity(800);

    loop {
        if stream.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        match buf.as_slice() {
            [b'\r', b'\n'] | [b'\n'] => buf.clear(),
            [.., b'\r', b'\n', b'\r', b'\n'] => break,
            [.., b'\n', b'\n'] => break,
            _ => continue,
        }
    }

    if buf.is_empty() {
        return Err(ParseError::ConnectionClosed);
    }

    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut headers);

    if req.parse(&buf)?.is_partial() {
        return Err(ParseError::IncompleteRequest);
    }

    let method = req
        .method
        .map(|method| method.as_bytes())
        .ok_or(ParseError::IncompleteRequest)?;

    let path = req.path.ok_or(ParseError::IncompleteRequest)?;

    let version = match req.version.ok_or(ParseError::IncompleteRequest)? {
        0 => Version::HTTP_10,
        1 => Version::HTTP_11,
        version => return Err(ParseError::UnsupportedHttpVersion(version)),
    };

    let request = Request::builder()
        .method(Method::from_bytes(method).map_err(|_| ParseError::IncompleteRequest)?)
        .uri(path)
        .version(version);

    let request = req
        .headers
        .iter()
        .map(|header| (header.name, header.value))
        .fold(request, |req, (name, value)| req.header(name, value));

    let headers = request.headers_ref().ok_or(ParseError::Unknown)?;

    if let Some(encoding) = headers.typed_try_get::<headers::TransferEncoding>()? {
        if !encoding.is_chunked() {
            // https://datatracker.ietf.org/doc/html/rfc2616#section-3.6
            return Err(ParseError::InvalidTransferEncoding);
        }
        drain_chunks(stream)?;
    } else if let Some(len) = headers.typed_try_get::<headers::ContentLength>()? {
        io::copy(&mut stream.by_ref().take(len.0), &mut io::sink())?;
    }

    request.body(()).map_err(|_| ParseError::Unknown)
}

fn drain_chunks(stream: &mut impl BufRead) -> Result<(), ParseError> {
    let mut buf = Vec::new();

    loop {
        buf.clear();

        if stream.read_until(b'\n', &mut buf)? == 0 {
            return Err(ParseError::IncompleteRequest);
        }

        match httparse::parse_chunk_size(&buf) {
            Ok(httparse::Status::Complete((_pos, 0))) => break,
            Ok(httparse::Status::Complete((_pos, size))) => {
                io::copy(&mut stream.by_ref().take(size), &mut io::sink())?;
                buf.clear();
                stream.read_until(b'\n', &mut buf)?;
            }
            Ok(httparse::Status::Partial) => return Err(ParseError::IncompleteRequest),
            Err(_) => return Err(ParseError::InvalidChunkSize),
        }
    }

    // Trailers, up to the empty line closing the body.
    loop {
        buf.clear();
        if stream.read_until(b'\n', &mut buf)? == 0 || matches!(buf.as_slice(), b"\r\n" | b"\n") {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::{BufRead, Cursor};

    use indoc::indoc;

    use super::*;

    #[test]
    fn parse_request_without_body() {
        let req = "GET /lolwut HTTP/1.1\r\nHost: lol.com\r\n\r\n";
        let mut req = Cursor::new(req);

        let req = parse_request(&mut req).unwrap();

        assert_eq!(Version::HTTP_11, req.version());
        assert_eq!(Method::GET, req.method());
        assert_eq!("/lolwut", req.uri().path());
        assert_eq!(
            Some("lol.com"),
            req.headers()
                .get(http::header::HOST)
                .and_then(|v| v.to_str().ok())
        );
    }

    #[test]
    fn parse_request_with_bare_newlines() {
        let mut req = Cursor::new(indoc! {"
            HEAD /main.dart.js HTTP/1.0
            Accept: */*

        "});

        let req = parse_request(&mut req).unwrap();

        assert_eq!(Version::HTTP_10, req.version());
        assert_eq!(Method::HEAD, req.method());
        assert_eq!("/main.dart.js", req.uri().path());
    }

    #[test]
    fn parse_request_keeps_query_out_of_the_path() {
        let mut req = Cursor::new("GET /index.html?v=3 HTTP/1.1\r\n\r\n");

        let req = parse_request(&mut req).unwrap();

        assert_eq!("/index.html", req.uri().path());
        assert_eq!(Some("v=3"), req.uri().query());
    }

    #[test]
    fn parse_request_drains_content_length_body() {
        let mut req = Cursor::new(
            "POST /lol HTTP/1.1\r\nContent-Length: 6\r\n\r\nlolwutGET /next HTTP/1.1\r\n\r\n",
        );

        let first = parse_request(&mut req).unwrap();
        assert_eq!(Method::POST, first.method());

        let second = parse_request(&mut req).unwrap();
        assert_eq!("/next", second.uri().path());
    }

    #[test]
    fn parse_request_drains_chunked_body() {
        let mut req = Cursor::new(
            "POST /lol HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3;extension\r\nlol\r\n3\r\nwut\r\n0\r\n\r\nGET /next HTTP/1.1\r\n\r\n",
        );

        parse_request(&mut req).unwrap();
        let second = parse_request(&mut req).unwrap();
        assert_eq!("/next", second.uri().path());
        assert!(req.fill_buf().unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_transfer_encoding() {
        let mut req = Cursor::new("POST /lol HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n");

        assert!(matches!(
            parse_request(&mut req),
            Err(ParseError::InvalidTransferEncoding)
        ));
    }

    #[test]
    fn reports_closed_connection_on_eof() {
        let mut req = Cursor::new("");

        assert!(matches!(
            parse_request(&mut req),
            Err(ParseError::ConnectionClosed)
        ));
    }

    #[test]
    fn fails_to_parse_incomplete_request() {
        let mut req = Cursor::new("POST /lol");

        assert!(matches!(
            parse_request(&mut req),
            Err(ParseError::IncompleteRequest)
        ));
    }

    #[test]
    fn fails_to_parse_garbage() {
        let mut req = Cursor::new("\x01\x02 nope\r\n\r\n");

        assert!(matches!(parse_request(&mut req), Err(ParseError::Invalid(_))));
    }
}
