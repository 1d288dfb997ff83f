use std::io;

/// SQLite primary result codes for a busy or locked database.
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

const TRANSIENT_SIGNATURES: &[&str] = &[
    "connection",
    "timeout",
    "timed out",
    "network",
    "reset",
    "readerror",
    "non-blocking socket",
    "temporarily unavailable",
    "database is locked",
];

/// Whether a store failure is worth retrying.
///
/// Walks the error chain looking for pool/io failures and busy/locked SQLite
/// codes, then falls back to matching well-known message signatures.
pub fn is_transient(err: &anyhow::Error) -> bool {
    for cause in err.chain() {
        if let Some(sqlx_err) = cause.downcast_ref::<sqlx::Error>() {
            match sqlx_err {
                sqlx::Error::Io(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed => return true,
                sqlx::Error::Database(db_err) => {
                    let primary = db_err
                        .code()
                        .map(|code| (code.parse::<i64>().unwrap_or(-1) & 0xff).to_string());
                    if matches!(primary.as_deref(), Some(SQLITE_BUSY | SQLITE_LOCKED)) {
                        return true;
                    }
                }
                _ => {}
            }
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if is_transient_io(io_err.kind()) {
                return true;
            }
        }
    }

    let message = format!("{err:#}").to_lowercase();
    TRANSIENT_SIGNATURES
        .iter()
        .any(|signature| message.contains(signature))
}

fn is_transient_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}
