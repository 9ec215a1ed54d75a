// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! On-disk trust material, one directory per remote domain.
//!
//! Layout under the trust root:
//!
//! ```text
//! <root>/<domain>/ca.crt       CA certificate of the remote domain
//! <root>/<domain>/client.key   private key (PKCS#8 PEM)
//! <root>/<domain>/client.csr   certificate signing request
//! <root>/<domain>/client.crt   CA-signed client certificate
//! <root>/<domain>/client.pem   key in the container format the transport loads
//! ```
//!
//! The directory is owned by the local service; nothing else writes into it.

use std::path::{Path, PathBuf};

/// Root of the local trust namespace; hands out per-domain material.
#[derive(Debug, Clone)]
pub struct TrustStore {
    root: PathBuf,
}

impl TrustStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the material for one remote domain.
    pub fn domain_dir(&self, domain: &str) -> PathBuf {
        self.root.join(domain)
    }

    /// Path set for a remote domain. Purely descriptive: nothing is created.
    pub fn material(&self, domain: &str, passphrase: &str) -> TrustMaterial {
        let dir = self.domain_dir(domain);
        TrustMaterial {
            domain: domain.to_string(),
            ca_cert: dir.join("ca.crt"),
            client_key: dir.join("client.key"),
            client_csr: dir.join("client.csr"),
            client_cert: dir.join("client.crt"),
            client_pem: dir.join("client.pem"),
            directory: dir,
            passphrase: passphrase.to_string(),
        }
    }
}

/// Certificate/key material for mutually authenticating with one remote
/// domain. Immutable once bootstrapped unless explicitly regenerated.
#[derive(Debug, Clone)]
pub struct TrustMaterial {
    pub domain: String,
    pub directory: PathBuf,
    pub ca_cert: PathBuf,
    pub client_key: PathBuf,
    pub client_csr: PathBuf,
    pub client_cert: PathBuf,
    pub client_pem: PathBuf,
    pub passphrase: String,
}

impl TrustMaterial {
    /// Trust derived from the host's own server material: server and client
    /// certificates are co-located and differ only by role marker in the
    /// file name. Naming convention, not a cryptographic relationship.
    pub fn from_server_role(
        domain: &str,
        ca_cert: &str,
        server_cert: &str,
        server_key: &str,
    ) -> Self {
        let client_cert = substitute_role(server_cert);
        let client_key = substitute_role(server_key);
        let directory = Path::new(&client_cert)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            domain: domain.to_string(),
            directory,
            ca_cert: PathBuf::from(ca_cert),
            client_pem: PathBuf::from(substitute_role(server_key).replace(".key", ".pem")),
            client_csr: PathBuf::new(),
            client_cert: PathBuf::from(client_cert),
            client_key: PathBuf::from(client_key),
            passphrase: String::new(),
        }
    }

    /// True when the three files a secured channel needs are all present.
    pub fn is_complete(&self) -> bool {
        self.ca_cert.exists() && self.client_cert.exists() && self.client_key.exists()
    }
}

fn substitute_role(path: &str) -> String {
    path.replace("server", "client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_paths_follow_domain_layout() {
        let store = TrustStore::new("/var/lib/aegis/tls");
        let material = store.material("b.example", "1111");
        assert_eq!(
            material.directory,
            PathBuf::from("/var/lib/aegis/tls/b.example")
        );
        assert_eq!(
            material.ca_cert,
            PathBuf::from("/var/lib/aegis/tls/b.example/ca.crt")
        );
        assert_eq!(
            material.client_pem,
            PathBuf::from("/var/lib/aegis/tls/b.example/client.pem")
        );
    }

    #[test]
    fn test_server_role_substitution() {
        let material = TrustMaterial::from_server_role(
            "a.example",
            "/tls/a.example/ca.crt",
            "/tls/a.example/server.crt",
            "/tls/a.example/server.key",
        );
        assert_eq!(
            material.client_cert,
            PathBuf::from("/tls/a.example/client.crt")
        );
        assert_eq!(
            material.client_key,
            PathBuf::from("/tls/a.example/client.key")
        );
        // the CA path carries no role marker and is untouched
        assert_eq!(material.ca_cert, PathBuf::from("/tls/a.example/ca.crt"));
    }

    #[test]
    fn test_is_complete_requires_all_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = TrustStore::new(dir.path());
        let material = store.material("b.example", "1111");
        assert!(!material.is_complete());

        std::fs::create_dir_all(&material.directory).unwrap();
        std::fs::write(&material.ca_cert, "ca").unwrap();
        std::fs::write(&material.client_cert, "crt").unwrap();
        assert!(!material.is_complete());

        std::fs::write(&material.client_key, "key").unwrap();
        assert!(material.is_complete());
    }
}
