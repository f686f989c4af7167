//! Signing certificate download and cache.
//!
//! SNS rotates its signing certificates and does not promise a single key
//! for all messages, so certificates are fetched from the URL each message
//! names and kept in a bounded LRU cache keyed by the exact URL string.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error, info};
use x509_cert::der::{Decode, Encode};
use x509_cert::Certificate;

use crate::payload::WireUrl;
use crate::transport::{FetchError, Transport};

/// Default number of certificates kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Errors from obtaining a signing certificate.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("unable to fetch signing certificate: {0}")]
    Fetch(#[from] FetchError),

    /// The PEM file did not hold exactly one certificate
    #[error("malformed certificate file: expected exactly one certificate, found {found}")]
    MalformedCertificate { found: usize },

    #[error("unreadable PEM data: {0}")]
    Pem(#[source] std::io::Error),

    #[error("certificate is not valid DER: {0}")]
    Der(#[from] x509_cert::der::Error),
}

/// A parsed X.509 signing certificate.
#[derive(Debug, Clone)]
pub struct SigningCertificate {
    certificate: Certificate,
    fingerprint: String,
}

impl SigningCertificate {
    /// Parse a PEM file that must contain exactly one certificate.
    pub fn from_pem(pem: &[u8]) -> Result<Self, CertificateError> {
        let mut reader = pem;
        let ders = rustls_pemfile::certs(&mut reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(CertificateError::Pem)?;

        let [der] = ders.as_slice() else {
            return Err(CertificateError::MalformedCertificate { found: ders.len() });
        };

        let der: &[u8] = der.as_ref();
        let certificate = Certificate::from_der(der)?;
        let fingerprint = hex::encode(Sha256::digest(der));

        Ok(Self {
            certificate,
            fingerprint,
        })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Hex SHA-256 of the certificate DER.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// DER encoding of the certificate's SubjectPublicKeyInfo.
    pub fn public_key_der(&self) -> Result<Vec<u8>, CertificateError> {
        Ok(self
            .certificate
            .tbs_certificate
            .subject_public_key_info
            .to_der()?)
    }
}

/// Process-wide certificate cache.
///
/// Constructed once and shared behind an `Arc`. Two concurrent misses for
/// the same URL may both fetch; the later insert wins.
pub struct CertificateCache {
    transport: Arc<dyn Transport>,
    entries: Mutex<LruCache<String, Arc<SigningCertificate>>>,
}

impl CertificateCache {
    /// Create an empty cache. A capacity of zero is treated as one.
    pub fn new(transport: Arc<dyn Transport>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            transport,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the certificate at `url`, downloading it on a cache miss.
    pub async fn get_certificate(
        &self,
        url: &WireUrl,
    ) -> Result<Arc<SigningCertificate>, CertificateError> {
        let key = url.as_str();

        let cached = self.entries.lock().get(key).cloned();
        if let Some(cached) = cached {
            debug!(cert_url = %key, "sns_certificate_cache_hit");
            return Ok(cached);
        }

        info!(cert_url = %key, "sns_certificate_cache_miss");

        let pem = self.transport.get(url.url()).await.map_err(|e| {
            error!(cert_url = %key, error = %e, "sns_certificate_fetch_failed");
            CertificateError::from(e)
        })?;

        let certificate = match SigningCertificate::from_pem(pem.as_bytes()) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                error!(cert_url = %key, error = %e, "sns_certificate_invalid");
                return Err(e);
            }
        };

        info!(
            cert_url = %key,
            fingerprint = %certificate.fingerprint(),
            "sns_certificate_fetched"
        );

        let evicted = self
            .entries
            .lock()
            .push(key.to_string(), Arc::clone(&certificate));
        if let Some((evicted, _)) = evicted {
            if evicted != key {
                debug!(cert_url = %evicted, "sns_certificate_evicted");
            }
        }

        Ok(certificate)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached certificate.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Payload;
    use crate::testing::{
        StubTransport, EC_CERT_PEM, NOTIFICATION, SIGNING_CERT_PEM, SIGNING_CERT_URL, TWO_CERTS_PEM,
    };

    fn cert_url() -> WireUrl {
        Payload::from_slice(NOTIFICATION.as_bytes())
            .unwrap()
            .envelope()
            .signing_cert_url
            .clone()
    }

    #[test]
    fn test_from_pem_single_certificate() {
        let cert = SigningCertificate::from_pem(SIGNING_CERT_PEM.as_bytes()).unwrap();
        assert_eq!(cert.fingerprint().len(), 64);
        assert!(!cert.public_key_der().unwrap().is_empty());
    }

    #[test]
    fn test_from_pem_not_a_certificate() {
        let err = SigningCertificate::from_pem(b"Not A Certificate").unwrap_err();
        assert!(matches!(
            err,
            CertificateError::MalformedCertificate { found: 0 }
        ));
    }

    #[test]
    fn test_from_pem_two_certificates() {
        let err = SigningCertificate::from_pem(TWO_CERTS_PEM.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            CertificateError::MalformedCertificate { found: 2 }
        ));
    }

    #[test]
    fn test_from_pem_ec_certificate_parses() {
        // Key type is checked by the verifier, not here
        assert!(SigningCertificate::from_pem(EC_CERT_PEM.as_bytes()).is_ok());
    }

    #[tokio::test]
    async fn test_second_lookup_is_cached() {
        let transport =
            Arc::new(StubTransport::new().with_body(SIGNING_CERT_URL, SIGNING_CERT_PEM));
        let cache = CertificateCache::new(transport.clone(), DEFAULT_CACHE_CAPACITY);

        let first = cache.get_certificate(&cert_url()).await.unwrap();
        let second = cache.get_certificate(&cert_url()).await.unwrap();

        assert_eq!(transport.call_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_file_is_not_cached() {
        let transport =
            Arc::new(StubTransport::new().with_body(SIGNING_CERT_URL, TWO_CERTS_PEM));
        let cache = CertificateCache::new(transport.clone(), DEFAULT_CACHE_CAPACITY);

        let err = cache.get_certificate(&cert_url()).await.unwrap_err();
        assert!(matches!(
            err,
            CertificateError::MalformedCertificate { found: 2 }
        ));
        assert!(cache.is_empty());

        // Not cached, so the next lookup fetches again
        let _ = cache.get_certificate(&cert_url()).await;
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_bad_status_propagates() {
        let transport = Arc::new(StubTransport::new().with_status(SIGNING_CERT_URL, 404));
        let cache = CertificateCache::new(transport, DEFAULT_CACHE_CAPACITY);

        let err = cache.get_certificate(&cert_url()).await.unwrap_err();
        assert!(matches!(
            err,
            CertificateError::Fetch(FetchError::Status { status: 404, .. })
        ));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let transport =
            Arc::new(StubTransport::new().with_body(SIGNING_CERT_URL, SIGNING_CERT_PEM));
        let cache = CertificateCache::new(transport.clone(), DEFAULT_CACHE_CAPACITY);

        cache.get_certificate(&cert_url()).await.unwrap();
        cache.clear();
        cache.get_certificate(&cert_url()).await.unwrap();

        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let other_url = "https://sns.eu-west-1.amazonaws.com/SimpleNotificationService-other.pem";
        let transport = Arc::new(
            StubTransport::new()
                .with_body(SIGNING_CERT_URL, SIGNING_CERT_PEM)
                .with_body(other_url, SIGNING_CERT_PEM),
        );
        let cache = CertificateCache::new(transport.clone(), 1);

        let other = {
            let mut json: serde_json::Value = serde_json::from_str(NOTIFICATION).unwrap();
            json["SigningCertURL"] = serde_json::json!(other_url);
            Payload::from_slice(&serde_json::to_vec(&json).unwrap())
                .unwrap()
                .envelope()
                .signing_cert_url
                .clone()
        };

        cache.get_certificate(&cert_url()).await.unwrap();
        cache.get_certificate(&other).await.unwrap();
        cache.get_certificate(&cert_url()).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_cache() {
        let transport =
            Arc::new(StubTransport::new().with_body(SIGNING_CERT_URL, SIGNING_CERT_PEM));
        let cache = Arc::new(CertificateCache::new(transport.clone(), DEFAULT_CACHE_CAPACITY));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    let cert = cache.get_certificate(&cert_url()).await.unwrap();
                    cert.fingerprint().to_string()
                })
            })
            .collect();

        let expected = SigningCertificate::from_pem(SIGNING_CERT_PEM.as_bytes())
            .unwrap()
            .fingerprint()
            .to_string();
        for task in tasks {
            assert_eq!(task.await.unwrap(), expected);
        }

        assert_eq!(cache.len(), 1);
        assert!((1..=8).contains(&transport.call_count()));
    }
}
