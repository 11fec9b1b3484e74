//! Browser reloads over Server-Sent Events.
//!
//! A build tool touches the trigger marker when it finishes. Every open event
//! stream polls the marker's modification time on its own worker thread and
//! pushes a [`RELOAD_FRAME`] each time it moves forward.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    thread,
    time::{Duration, SystemTime},
};

use headers::HeaderMapExt;
use http::{header, Request, Response, StatusCode, Version};
use tracing::debug;

use crate::{response::StreamWriter, upgrade::Upgrade, Body, Connection};

pub const RELOAD_FRAME: &[u8] = b"data: reload\n\n";

/// Modification time of the marker, `None` when it can't be read.
pub fn marker_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Remembers the last marker modification time seen by one stream.
///
/// A missing marker counts as older than any existing one, so its first
/// appearance is a change.
#[derive(Debug, Clone)]
pub struct MarkerWatch {
    trigger: PathBuf,
    last_seen: Option<SystemTime>,
}

impl MarkerWatch {
    pub fn new(trigger: impl Into<PathBuf>) -> Self {
        let trigger = trigger.into();
        let last_seen = marker_mtime(&trigger);
        Self { trigger, last_seen }
    }

    pub fn last_seen(&self) -> Option<SystemTime> {
        self.last_seen
    }

    /// Whether the marker moved forward since the last call.
    ///
    /// However many times it was touched in between, this reports one change.
    /// A marker that disappeared, or came back older, is not a change.
    pub fn changed(&mut self) -> bool {
        match marker_mtime(&self.trigger) {
            Some(mtime) if self.last_seen.map_or(true, |seen| mtime > seen) => {
                self.last_seen = Some(mtime);
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReloadNotifier {
    trigger: PathBuf,
    interval: Duration,
}

impl ReloadNotifier {
    pub fn new(trigger: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            trigger: trigger.into(),
            interval,
        }
    }

    pub fn trigger(&self) -> &Path {
        &self.trigger
    }

    /// Opens an event stream.
    ///
    /// The marker baseline is taken before the response head goes out; the
    /// connection is then handed to [`stream`](Self::stream) on the same worker.
    pub fn respond(&self, req: &Request<()>) -> http::Result<Response<Body>> {
        let notifier = self.clone();
        let version = req.version();
        let watch = MarkerWatch::new(&self.trigger);

        let mut res = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .upgrade(move |conn: Connection| notifier.stream(conn, version, watch.clone()))
            .body(Body::empty())?;

        res.headers_mut()
            .typed_insert(headers::CacheControl::new().with_no_cache());
        res.headers_mut()
            .typed_insert(headers::Connection::keep_alive());
        res.headers_mut()
            .typed_insert(headers::AccessControlAllowOrigin::ANY);

        if version == Version::HTTP_11 {
            res.headers_mut()
                .typed_insert(headers::TransferEncoding::chunked());
        }

        Ok(res)
    }

    /// Polls the marker and writes a frame for every change, until the peer goes
    /// away or a write fails.
    pub fn stream(&self, conn: Connection, version: Version, mut watch: MarkerWatch) {
        let peer = conn.peer_addr();
        let mut events = StreamWriter::for_version(conn, version);

        loop {
            thread::sleep(self.interval);

            if events.get_ref().peer_closed() {
                debug!(?peer, "reload stream closed by peer");
                return;
            }

            if watch.changed() {
                // The peer is gone, nothing left to tell.
                if events.write_all(RELOAD_FRAME).is_err() {
                    return;
                }
                debug!(?peer, "reload sent");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs::File,
        io::{ErrorKind, Read},
        net::{TcpListener, TcpStream},
        sync::mpsc,
        time::{Duration, SystemTime},
    };

    use tempfile::TempDir;

    use super::*;

    fn touch(path: &Path, secs: u64) {
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
        File::options()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    fn marker() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reload_trigger");
        (dir, path)
    }

    #[test]
    fn absent_marker_starts_from_zero() {
        let (_dir, path) = marker();
        let mut watch = MarkerWatch::new(&path);

        assert_eq!(watch.last_seen(), None);
        assert!(!watch.changed());

        touch(&path, 1_000);
        assert!(watch.changed());
        assert!(!watch.changed());
    }

    #[test]
    fn existing_marker_is_the_baseline() {
        let (_dir, path) = marker();
        touch(&path, 1_000);

        let mut watch = MarkerWatch::new(&path);
        assert!(!watch.changed());

        touch(&path, 1_001);
        assert!(watch.changed());
        assert_eq!(
            watch.last_seen(),
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_001))
        );
    }

    #[test]
    fn touches_between_polls_coalesce() {
        let (_dir, path) = marker();
        touch(&path, 1_000);
        let mut watch = MarkerWatch::new(&path);

        touch(&path, 1_001);
        touch(&path, 1_002);

        assert!(watch.changed());
        assert!(!watch.changed());
    }

    #[test]
    fn removed_or_older_marker_is_not_a_change() {
        let (_dir, path) = marker();
        touch(&path, 1_000);
        let mut watch = MarkerWatch::new(&path);

        fs::remove_file(&path).unwrap();
        assert!(!watch.changed());

        touch(&path, 999);
        assert!(!watch.changed());

        touch(&path, 1_001);
        assert!(watch.changed());
    }

    #[test]
    fn watches_keep_independent_baselines() {
        let (_dir, path) = marker();
        touch(&path, 1_000);
        let mut early = MarkerWatch::new(&path);

        touch(&path, 1_001);
        let mut late = MarkerWatch::new(&path);

        assert!(early.changed());
        assert!(!late.changed());

        touch(&path, 1_002);
        assert!(early.changed());
        assert!(late.changed());
    }

    #[test]
    fn respond_sets_event_stream_headers() {
        let notifier = ReloadNotifier::new("/tmp/nope", Duration::from_millis(500));
        let req = Request::builder().uri("/livereload").body(()).unwrap();

        let res = notifier.respond(&req).unwrap();
        let headers = res.headers();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONNECTION], "keep-alive");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::TRANSFER_ENCODING], "chunked");
    }

    #[test]
    fn respond_to_http_10_is_not_chunked() {
        let notifier = ReloadNotifier::new("/tmp/nope", Duration::from_millis(500));
        let req = Request::builder()
            .uri("/livereload")
            .version(Version::HTTP_10)
            .body(())
            .unwrap();

        let res = notifier.respond(&req).unwrap();

        assert!(!res.headers().contains_key(header::TRANSFER_ENCODING));
    }

    fn open_stream(notifier: ReloadNotifier) -> (TcpStream, mpsc::Receiver<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let conn = Connection::from(listener.accept().unwrap());

        let watch = MarkerWatch::new(notifier.trigger());
        let (done, finished) = mpsc::channel();
        thread::spawn(move || {
            notifier.stream(conn, Version::HTTP_11, watch);
            done.send(()).ok();
        });

        (client, finished)
    }

    #[test]
    fn stream_writes_one_frame_per_change() {
        let (_dir, path) = marker();
        let notifier = ReloadNotifier::new(&path, Duration::from_millis(20));
        let (mut client, _finished) = open_stream(notifier);
        client
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();

        let mut buf = [0_u8; 64];
        let err = client.read(&mut buf).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut));

        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        touch(&path, 1_000);

        let frame = b"e\r\ndata: reload\n\n\r\n";
        let mut received = vec![0_u8; frame.len()];
        client.read_exact(&mut received).unwrap();
        assert_eq!(received, frame);

        client
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let err = client.read(&mut buf).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut));
    }

    #[test]
    fn stream_ends_when_peer_hangs_up() {
        let (_dir, path) = marker();
        let notifier = ReloadNotifier::new(&path, Duration::from_millis(20));
        let (client, finished) = open_stream(notifier);

        drop(client);

        assert!(finished.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn stream_ends_when_peer_talks_then_hangs_up() {
        let (_dir, path) = marker();
        let notifier = ReloadNotifier::new(&path, Duration::from_millis(20));
        let (mut client, finished) = open_stream(notifier);

        client.write_all(b"x").unwrap();
        drop(client);

        assert!(finished.recv_timeout(Duration::from_secs(2)).is_ok());
    }
}
