//! Serves the files of a directory tree.
//!
//! Request paths are mapped onto the served root after percent-decoding, with
//! empty, `.` and `..` segments dropped, so a request can never name anything
//! outside the root. Directories are served through their index document, or
//! listed when they have none.

use std::{
    fs::{self, File},
    path::{Component, Path, PathBuf},
};

use headers::HeaderMapExt;
use http::{header, Request, Response, StatusCode, Uri};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;

use crate::{response::error_page, Body};

/// Documents looked up, in order, when a directory is requested.
pub const INDEX_DOCUMENTS: [&str; 2] = ["index.html", "index.htm"];

const LINK: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a request path onto the filesystem, below the served root.
    pub fn resolve(&self, request_path: &str) -> PathBuf {
        percent_decode_str(request_path)
            .decode_utf8_lossy()
            .split('/')
            .filter(|segment| is_plain_segment(segment))
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    pub fn respond(&self, req: &Request<()>) -> http::Result<Response<Body>> {
        let request_path = req.uri().path();
        let path = self.resolve(request_path);

        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(_) => return not_found(),
        };

        if meta.is_dir() {
            if !request_path.ends_with('/') {
                return redirect_to_directory(req.uri());
            }

            return match INDEX_DOCUMENTS
                .iter()
                .map(|index| path.join(index))
                .find(|index| index.is_file())
            {
                Some(index) => serve_file(req, &index),
                None => list_directory(request_path, &path),
            };
        }

        if request_path.ends_with('/') {
            return not_found();
        }

        serve_file(req, &path)
    }
}

fn is_plain_segment(segment: &str) -> bool {
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn serve_file(req: &Request<()>, path: &Path) -> http::Result<Response<Body>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            debug!(path = %path.display(), %err, "cannot open file");
            return not_found();
        }
    };

    let modified = file.metadata().and_then(|meta| meta.modified()).ok();

    if let Some(modified) = modified {
        let not_modified = !req.headers().contains_key(header::IF_NONE_MATCH)
            && req
                .headers()
                .typed_get::<headers::IfModifiedSince>()
                .is_some_and(|since| !since.is_modified(modified));

        if not_modified {
            let mut res = Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .body(Body::empty())?;
            res.headers_mut()
                .typed_insert(headers::LastModified::from(modified));
            return Ok(res);
        }
    }

    let body = match Body::try_from(file) {
        Ok(body) => body,
        Err(_) => return not_found(),
    };

    let content_type = mime_guess::from_path(path).first_or_octet_stream();

    let mut res = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .body(body)?;

    if let Some(modified) = modified {
        res.headers_mut()
            .typed_insert(headers::LastModified::from(modified));
    }

    Ok(res)
}

fn redirect_to_directory(uri: &Uri) -> http::Result<Response<Body>> {
    let location = match uri.query() {
        Some(query) => format!("{}/?{query}", uri.path()),
        None => format!("{}/", uri.path()),
    };

    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(header::LOCATION, location)
        .body(Body::empty())
}

fn list_directory(request_path: &str, dir: &Path) -> http::Result<Response<Body>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(path = %dir.display(), %err, "cannot list directory");
            return not_found();
        }
    };

    let mut names = entries
        .filter_map(Result::ok)
        .map(|entry| {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() {
                name.push('/');
            }
            name
        })
        .collect::<Vec<_>>();

    names.sort_by_key(|name| name.to_lowercase());

    let title = format!(
        "Directory listing for {}",
        escape_html(&percent_decode_str(request_path).decode_utf8_lossy())
    );

    let mut html = format!(
        "<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<hr>\n<ul>\n"
    );

    for name in &names {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            utf8_percent_encode(name, LINK),
            escape_html(name)
        ));
    }

    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from(html))
}

fn not_found() -> http::Result<Response<Body>> {
    error_page(StatusCode::NOT_FOUND, "File not found")
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}
