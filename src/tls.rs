use rustls_pki_types::CertificateDer;

/// Connection security details captured alongside a response received over
/// TLS. Stored with the entry so a later hit can answer the same questions
/// the live connection would have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMetadata {
    /// Negotiated cipher suite name, e.g. `TLS13_AES_128_GCM_SHA256`.
    pub cipher_suite: String,
    /// Certificate chain presented by the origin, leaf first.
    pub peer_certificates: Vec<CertificateDer<'static>>,
    /// Certificate chain this client presented, if any.
    pub local_certificates: Vec<CertificateDer<'static>>,
    pub peer_principal: Option<String>,
    pub local_principal: Option<String>,
}

impl TlsMetadata {
    pub fn new(cipher_suite: impl Into<String>) -> Self {
        Self {
            cipher_suite: cipher_suite.into(),
            peer_certificates: Vec::new(),
            local_certificates: Vec::new(),
            peer_principal: None,
            local_principal: None,
        }
    }
}
