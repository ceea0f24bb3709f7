use sqlx::postgres::PgDatabaseError;

#[derive(Debug)]
pub enum ProbeError {
    /// Anything the driver reports: refused or unreachable host, rejected
    /// credentials, acquisition timeout, query failure.
    Database(sqlx::Error),
    ShutdownTimedOut,
    Output(std::io::Error),
}

impl ProbeError {
    /// Machine-readable error code, when the failure carries one.
    pub fn code(&self) -> Option<String> {
        match self {
            ProbeError::Database(sqlx::Error::Database(err)) => err.code().map(|c| c.into_owned()),
            ProbeError::Database(sqlx::Error::Io(err)) => Some(format!("{:?}", err.kind())),
            ProbeError::Database(sqlx::Error::PoolTimedOut) => Some("POOL_TIMED_OUT".to_string()),
            ProbeError::Database(sqlx::Error::PoolClosed) => Some("POOL_CLOSED".to_string()),
            ProbeError::Database(sqlx::Error::Tls(_)) => Some("TLS".to_string()),
            ProbeError::ShutdownTimedOut => Some("SHUTDOWN_TIMED_OUT".to_string()),
            ProbeError::Output(err) => Some(format!("{:?}", err.kind())),
            _ => None,
        }
    }

    /// Server-supplied detail text for PostgreSQL errors.
    pub fn detail(&self) -> Option<String> {
        match self {
            ProbeError::Database(sqlx::Error::Database(err)) => err
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.detail())
                .map(str::to_string),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::Database(err) => write!(f, "Database Error: {err}"),
            ProbeError::ShutdownTimedOut => write!(f, "Pool shutdown timed out"),
            ProbeError::Output(err) => write!(f, "Output Error: {err}"),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Database(err) => Some(err),
            ProbeError::Output(err) => Some(err),
            ProbeError::ShutdownTimedOut => None,
        }
    }
}

impl From<sqlx::Error> for ProbeError {
    fn from(err: sqlx::Error) -> Self {
        ProbeError::Database(err)
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError::Output(err)
    }
}
