pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Embedding error: {message}")]
	Embedding { message: String },
	#[error("Store error: {message}")]
	Store { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Store { message: err.to_string() }
	}
}

impl From<detective_storage::Error> for Error {
	fn from(err: detective_storage::Error) -> Self {
		match err {
			detective_storage::Error::Sqlx(inner) => Self::Store { message: inner.to_string() },
			detective_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
		}
	}
}
