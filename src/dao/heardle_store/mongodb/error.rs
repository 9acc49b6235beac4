use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures of the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Required environment variable is missing.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI")]
    InvalidUri {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The driver refused the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered a ping while connecting.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings sent before giving up.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// A periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An index could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection being indexed.
        collection: &'static str,
        /// Indexed fields.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A read or write failed.
    #[error("MongoDB {operation} on `{collection}` failed")]
    Query {
        /// Collection queried.
        collection: &'static str,
        /// Operation that failed.
        operation: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Concurrent writers kept replacing the document between our read and write.
    #[error("document `{id}` in `{collection}` changed concurrently {attempts} time(s)")]
    WriteConflict {
        /// Collection holding the document.
        collection: &'static str,
        /// Document id.
        id: String,
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// A stored document cannot be mapped onto a domain entity.
    #[error("document `{id}` in `{collection}` is invalid: {reason}")]
    InvalidDocument {
        /// Collection holding the document.
        collection: &'static str,
        /// Document id.
        id: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl MongoDaoError {
    pub(super) fn query(
        collection: &'static str,
        operation: &'static str,
    ) -> impl FnOnce(MongoError) -> Self {
        move |source| MongoDaoError::Query {
            collection,
            operation,
            source,
        }
    }
}
