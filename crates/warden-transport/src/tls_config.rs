//! Root certificate stores.

use std::io::Cursor;
use std::path::Path;

use rustls::RootCertStore;

use crate::error::FetchError;

/// Load a PEM bundle of trust anchors.
pub fn load_root_store(path: &Path) -> Result<RootCertStore, FetchError> {
    let data = std::fs::read(path).map_err(|e| {
        FetchError::Config(format!("failed to read root certificates {}: {e}", path.display()))
    })?;
    parse_root_store(&data)
        .map_err(|e| FetchError::Config(format!("{}: {e}", path.display())))
}

/// Parse PEM trust anchors held in memory.
pub fn parse_root_store(pem: &[u8]) -> Result<RootCertStore, String> {
    let certs = rustls_pemfile::certs(&mut Cursor::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("failed to parse certificates: {e}"))?;
    if certs.is_empty() {
        return Err("no certificates found".into());
    }

    let mut store = RootCertStore::empty();
    for cert in certs {
        store
            .add(cert)
            .map_err(|e| format!("failed to add root certificate: {e}"))?;
    }
    Ok(store)
}

/// The bundled Mozilla root set.
pub fn system_root_store() -> RootCertStore {
    let mut store = RootCertStore::empty();
    store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    store
}
