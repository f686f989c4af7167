//! SNS message signature verification.
//!
//! SNS signs the canonical string of each message with the private key of
//! the certificate at `SigningCertURL`, using RSA PKCS#1 v1.5 with SHA-1
//! (`SignatureVersion` "1") or SHA-256 (`SignatureVersion` "2").
//!
//! An invalid signature is an expected outcome and yields `Ok(false)`. Only
//! failures to obtain a usable key are errors.

use std::sync::Arc;

use async_trait::async_trait;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cert::{CertificateCache, CertificateError, SigningCertificate};
use crate::payload::{Payload, SignatureVersion};

/// Errors that prevent a verification verdict.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Certificate(#[from] CertificateError),

    /// Only RSA-signed payloads are supported
    #[error("signing certificate does not carry an RSA public key")]
    UnsupportedKey,
}

/// Decides whether a parsed payload was signed by SNS.
#[async_trait]
pub trait NotificationVerifier: Send + Sync {
    async fn verify(&self, payload: &Payload) -> Result<bool, VerifyError>;
}

/// Verifier backed by the shared certificate cache.
#[derive(Clone)]
pub struct SignatureVerifier {
    certificates: Arc<CertificateCache>,
}

impl SignatureVerifier {
    pub fn new(certificates: Arc<CertificateCache>) -> Self {
        Self { certificates }
    }

    pub fn certificates(&self) -> &Arc<CertificateCache> {
        &self.certificates
    }
}

#[async_trait]
impl NotificationVerifier for SignatureVerifier {
    async fn verify(&self, payload: &Payload) -> Result<bool, VerifyError> {
        let url = &payload.envelope().signing_cert_url;
        let certificate = self.certificates.get_certificate(url).await?;
        verify_with_certificate(&certificate, payload)
    }
}

/// Check `payload`'s signature against an already obtained certificate.
pub fn verify_with_certificate(
    certificate: &SigningCertificate,
    payload: &Payload,
) -> Result<bool, VerifyError> {
    let key = rsa_public_key(certificate)?;
    let envelope = payload.envelope();
    let canonical = payload.canonical_string();

    let outcome = match envelope.signature_version {
        SignatureVersion::V1 => key.verify(
            Pkcs1v15Sign::new::<Sha1>(),
            &Sha1::digest(canonical.as_bytes()),
            &envelope.signature,
        ),
        SignatureVersion::V2 => key.verify(
            Pkcs1v15Sign::new::<Sha256>(),
            &Sha256::digest(canonical.as_bytes()),
            &envelope.signature,
        ),
    };

    match outcome {
        Ok(()) => {
            debug!(
                message_id = %envelope.message_id,
                message_type = %payload.message_type(),
                signature_version = envelope.signature_version.as_str(),
                "sns_signature_valid"
            );
            Ok(true)
        }
        Err(e) => {
            warn!(
                message_id = %envelope.message_id,
                message_type = %payload.message_type(),
                signature_version = envelope.signature_version.as_str(),
                fingerprint = %certificate.fingerprint(),
                error = %e,
                "sns_signature_invalid"
            );
            Ok(false)
        }
    }
}

fn rsa_public_key(certificate: &SigningCertificate) -> Result<RsaPublicKey, VerifyError> {
    let spki = certificate.public_key_der()?;
    RsaPublicKey::from_public_key_der(&spki).map_err(|e| {
        warn!(
            fingerprint = %certificate.fingerprint(),
            error = %e,
            "sns_certificate_key_unsupported"
        );
        VerifyError::UnsupportedKey
    })
}
