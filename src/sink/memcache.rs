use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::SinkError;

use super::Sink;

struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

/// Blocking memcached client for a single backend
///
/// Speaks the text protocol `set <key> 0 0 <bytes>` and expects `STORED`.
/// After an I/O failure or a protocol error reply the connection is dropped
/// and re-established on the next `put`.
pub struct MemcacheSink {
    addr: String,
    timeout: Option<Duration>,
    conn: Option<Connection>,
}

impl MemcacheSink {
    /// Connect to `addr`; `timeout` bounds connect, read and write when set
    pub fn connect(addr: &str, timeout: Option<Duration>) -> Result<Self, SinkError> {
        let conn = open_connection(addr, timeout).map_err(|source| SinkError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        tracing::debug!(addr, "connected to memcached");
        Ok(Self {
            addr: addr.to_string(),
            timeout,
            conn: Some(conn),
        })
    }

    fn connection(&mut self) -> Result<&mut Connection, SinkError> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let conn = open_connection(&self.addr, self.timeout).map_err(|source| {
                    SinkError::Connect {
                        addr: self.addr.clone(),
                        source,
                    }
                })?;
                tracing::debug!(addr = %self.addr, "reconnected to memcached");
                conn
            }
        };
        Ok(self.conn.insert(conn))
    }

    fn io_error(&mut self, source: io::Error) -> SinkError {
        self.conn = None;
        SinkError::Io {
            addr: self.addr.clone(),
            source,
        }
    }
}

impl Sink for MemcacheSink {
    fn put(&mut self, key: &str, payload: &[u8]) -> Result<(), SinkError> {
        let conn = self.connection()?;
        let reply = match store(conn, key, payload) {
            Ok(reply) => reply,
            Err(e) => return Err(self.io_error(e)),
        };

        if reply == "STORED" {
            return Ok(());
        }
        // After ERROR or CLIENT_ERROR the server may still answer the data
        // line, so the stream can no longer be trusted
        if !matches!(reply.as_str(), "NOT_STORED" | "EXISTS" | "NOT_FOUND") {
            tracing::debug!(addr = %self.addr, reply = %reply, "dropping connection after error reply");
            self.conn = None;
        }
        Err(SinkError::Rejected {
            addr: self.addr.clone(),
            reply,
        })
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}

fn open_connection(addr: &str, timeout: Option<Duration>) -> io::Result<Connection> {
    let stream = match timeout {
        Some(timeout) => {
            let mut last_err = None;
            let mut connected = None;
            for sock_addr in addr.to_socket_addrs()? {
                match TcpStream::connect_timeout(&sock_addr, timeout) {
                    Ok(stream) => {
                        connected = Some(stream);
                        break;
                    }
                    Err(e) => last_err = Some(e),
                }
            }
            match connected {
                Some(stream) => stream,
                None => {
                    return Err(last_err.unwrap_or_else(|| {
                        io::Error::new(ErrorKind::InvalidInput, "address resolved to nothing")
                    }))
                }
            }
        }
        None => TcpStream::connect(addr)?,
    };

    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(addr, error = %e, "failed to set TCP_NODELAY");
    }

    Ok(Connection {
        reader: BufReader::new(stream.try_clone()?),
        writer: BufWriter::new(stream),
    })
}

fn store(conn: &mut Connection, key: &str, payload: &[u8]) -> io::Result<String> {
    write!(conn.writer, "set {} 0 0 {}\r\n", key, payload.len())?;
    conn.writer.write_all(payload)?;
    conn.writer.write_all(b"\r\n")?;
    conn.writer.flush()?;

    let mut reply = String::new();
    if conn.reader.read_line(&mut reply)? == 0 {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            "connection closed before reply",
        ));
    }
    Ok(reply.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    type Server = thread::JoinHandle<Vec<(String, Vec<u8>)>>;

    /// Accepts one connection per session, answers one set command per
    /// reply and then hangs up
    fn fake_memcached_sessions(sessions: Vec<Vec<&'static str>>) -> (String, Server) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for replies in sessions {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut writer = stream;
                for reply in replies {
                    let mut header = String::new();
                    reader.read_line(&mut header).unwrap();
                    let parts: Vec<&str> = header.split_whitespace().collect();
                    assert_eq!(parts[0], "set");
                    let len: usize = parts[4].parse().unwrap();
                    let mut data = vec![0u8; len + 2];
                    reader.read_exact(&mut data).unwrap();
                    data.truncate(len);
                    seen.push((parts[1].to_string(), data));
                    writer.write_all(reply.as_bytes()).unwrap();
                }
            }
            seen
        });
        (addr, handle)
    }

    fn fake_memcached(replies: Vec<&'static str>) -> (String, Server) {
        fake_memcached_sessions(vec![replies])
    }

    #[test]
    fn test_set_stored() {
        let (addr, server) = fake_memcached(vec!["STORED\r\n"]);
        let mut sink = MemcacheSink::connect(&addr, Some(Duration::from_secs(5))).unwrap();
        sink.put("idfa:abc", b"\x01\x02\r\n").unwrap();

        let seen = server.join().unwrap();
        assert_eq!(seen, vec![("idfa:abc".to_string(), b"\x01\x02\r\n".to_vec())]);
    }

    #[test]
    fn test_set_rejected() {
        let (addr, server) = fake_memcached(vec!["SERVER_ERROR out of memory\r\n"]);
        let mut sink = MemcacheSink::connect(&addr, Some(Duration::from_secs(5))).unwrap();
        let err = sink.put("gaid:abc", b"x").unwrap_err();
        assert!(matches!(err, SinkError::Rejected { ref reply, .. } if reply == "SERVER_ERROR out of memory"));
        server.join().unwrap();
    }

    #[test]
    fn test_closed_connection_is_io_error() {
        let (addr, server) = fake_memcached(vec![]);
        let mut sink = MemcacheSink::connect(&addr, Some(Duration::from_secs(5))).unwrap();
        server.join().unwrap();

        let err = sink.put("adid:abc", b"x").unwrap_err();
        assert!(matches!(err, SinkError::Io { .. } | SinkError::Connect { .. }));
    }

    #[test]
    fn test_reconnects_after_io_error() {
        // First connection is closed without a reply, the second one stores
        let (addr, server) = fake_memcached_sessions(vec![vec![], vec!["STORED\r\n"]]);
        let mut sink = MemcacheSink::connect(&addr, Some(Duration::from_secs(5))).unwrap();

        let err = sink.put("idfa:first", b"x").unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
        sink.put("idfa:second", b"y").unwrap();

        let seen = server.join().unwrap();
        assert_eq!(seen, vec![("idfa:second".to_string(), b"y".to_vec())]);
    }

    #[test]
    fn test_client_error_drops_connection() {
        // memcached follows CLIENT_ERROR with ERROR for the unread data line
        let (addr, server) = fake_memcached_sessions(vec![
            vec!["CLIENT_ERROR bad data chunk\r\nERROR\r\n"],
            vec!["STORED\r\n"],
        ]);
        let mut sink = MemcacheSink::connect(&addr, Some(Duration::from_secs(5))).unwrap();

        let err = sink.put("gaid:bad", b"x").unwrap_err();
        assert!(matches!(err, SinkError::Rejected { ref reply, .. } if reply == "CLIENT_ERROR bad data chunk"));
        // The stale ERROR line must not be read as the reply to this set
        sink.put("gaid:good", b"y").unwrap();

        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].0, "gaid:good");
    }

    #[test]
    fn test_not_stored_keeps_connection() {
        let (addr, server) = fake_memcached(vec!["NOT_STORED\r\n", "STORED\r\n"]);
        let mut sink = MemcacheSink::connect(&addr, Some(Duration::from_secs(5))).unwrap();

        assert!(matches!(sink.put("dvid:a", b"x"), Err(SinkError::Rejected { .. })));
        sink.put("dvid:b", b"y").unwrap();
        assert_eq!(server.join().unwrap().len(), 2);
    }
}
