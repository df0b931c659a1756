//! Self-signed certificate fixture.

use rcgen::{CertificateParams, DnType, KeyPair};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use time::OffsetDateTime;

/// A certificate and its private key, in DER and PEM.
pub struct SelfSigned {
    pub cert_der: CertificateDer<'static>,
    pub key_der: PrivatePkcs8KeyDer<'static>,
    pub cert_pem: String,
    pub key_pem: String,
}

impl SelfSigned {
    pub fn key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(self.key_der.clone_key())
    }
}

/// EC P-256 certificate for `host`, valid for 24 hours from now.
pub fn generate(host: &str) -> SelfSigned {
    let key_pair = KeyPair::generate().expect("Failed to generate key pair");

    let mut params =
        CertificateParams::new(vec![host.to_string()]).expect("Failed to build cert params");
    params.distinguished_name.push(DnType::CommonName, host);
    params.not_before = OffsetDateTime::now_utc();
    params.not_after = params.not_before + time::Duration::hours(24);

    let cert = params
        .self_signed(&key_pair)
        .expect("Failed to self-sign certificate");

    SelfSigned {
        cert_der: cert.der().clone(),
        key_der: PrivatePkcs8KeyDer::from(key_pair.serialize_der()),
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    }
}
