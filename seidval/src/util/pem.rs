//! PEM encoding and decoding of certificates
//!
//! Certificate text may arrive with or without the `-----BEGIN CERTIFICATE-----` armor. The armor
//! is added when absent before decoding.

use base64ct::{Base64, Encoding};
use der::{Decode, Encode};
use x509_cert::Certificate;

use crate::util::error::{Error, Result};

/// PEM label used for certificates
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

const BEGIN_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";
const END_CERTIFICATE: &str = "-----END CERTIFICATE-----";

/// add_armor returns certificate text in canonical PEM form. Existing armor is replaced and the
/// base64 body is rewrapped at 64 characters, so single-line bodies are tolerated.
pub fn add_armor(text: &str) -> Result<String> {
    let mut body = String::new();
    for line in text.lines().map(str::trim) {
        if line.starts_with("-----BEGIN") {
            if line != BEGIN_CERTIFICATE {
                return Err(Error::Decode(format!("unexpected PEM header: {line}")));
            }
        } else if !line.starts_with("-----END") {
            body.extend(line.chars().filter(|c| !c.is_whitespace()));
        }
    }
    if body.is_empty() {
        return Err(Error::Decode("no certificate content".to_string()));
    }

    let mut armored = String::with_capacity(body.len() + 64);
    armored.push_str(BEGIN_CERTIFICATE);
    armored.push('\n');
    for chunk in body.as_bytes().chunks(64) {
        armored.push_str(&String::from_utf8_lossy(chunk));
        armored.push('\n');
    }
    armored.push_str(END_CERTIFICATE);
    armored.push('\n');
    Ok(armored)
}

/// decode_pem_certificate decodes PEM or bare base64 certificate text into DER bytes.
pub fn decode_pem_certificate(text: &str) -> Result<Vec<u8>> {
    let armored = add_armor(text)?;
    let (label, der_bytes) = pem_rfc7468::decode_vec(armored.as_bytes())
        .map_err(|e| Error::Decode(format!("invalid PEM: {e}")))?;
    if label != CERTIFICATE_LABEL {
        return Err(Error::Decode(format!("unexpected PEM label: {label}")));
    }
    Ok(der_bytes)
}

/// decode_certificate decodes PEM or bare base64 certificate text into a [`Certificate`].
pub fn decode_certificate(text: &str) -> Result<Certificate> {
    let der_bytes = decode_pem_certificate(text)?;
    Certificate::from_der(&der_bytes).map_err(|e| Error::Decode(format!("invalid DER: {e}")))
}

/// encode_certificate returns three lines of text: the BEGIN line, the base64 encoding of the
/// certificate on a single line and the END line.
pub fn encode_certificate(cert: &Certificate) -> Result<String> {
    let der_bytes = cert.to_der()?;
    Ok(format!(
        "{BEGIN_CERTIFICATE}\n{}\n{END_CERTIFICATE}",
        Base64::encode_string(&der_bytes)
    ))
}
