//! Lazily-initialised `mongodb::Client` handle.
//!
//! `pymongo.MongoClient` in the original is lazy by construction — the TCP
//! connection isn't opened until the first operation. The Rust driver
//! connects eagerly enough on construction that we preserve the same
//! property explicitly with a `OnceCell`, matching spec §5's "MUST be
//! lazily initialised on first use" (so a forked/prefork server never pays
//! for a connection it won't use).

use mongodb::{
    Client,
    Database,
};
use tokio::sync::OnceCell;

use errors::KernelError;

pub struct MongoHandle {
    uri: String,
    dbname: String,
    client: OnceCell<Client>,
}

impl MongoHandle {
    pub fn new(uri: impl Into<String>, dbname: impl Into<String>) -> Self {
        Self { uri: uri.into(), dbname: dbname.into(), client: OnceCell::new() }
    }

    async fn client(&self) -> Result<&Client, KernelError> {
        self.client
            .get_or_try_init(|| async {
                Client::with_uri_str(&self.uri)
                    .await
                    .map_err(|err| KernelError::Terminal(format!("cannot connect to mongodb: {err}")))
            })
            .await
    }

    pub async fn database(&self) -> Result<Database, KernelError> {
        Ok(self.client().await?.database(&self.dbname))
    }
}
