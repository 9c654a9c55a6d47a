//! Signature verification for certificates and CRLs using libraries from the
//! [Rust Crypto](https://github.com/RustCrypto) project.
//!
//! RSA PKCS #1 v1.5 with SHA-1, SHA-256, SHA-384 and SHA-512 is supported, along with ECDSA over
//! P-256 with SHA-256 and P-384 with SHA-384.

use const_oid::db::rfc5912::{
    ECDSA_WITH_SHA_256, ECDSA_WITH_SHA_384, SHA_1_WITH_RSA_ENCRYPTION, SHA_256_WITH_RSA_ENCRYPTION,
    SHA_384_WITH_RSA_ENCRYPTION, SHA_512_WITH_RSA_ENCRYPTION,
};
use der::Encode;
use log::debug;
use rsa::pkcs1v15::{Signature as RsaSignature, VerifyingKey as RsaVerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::util::error::{Error, Result, ValidationFailure};

fn failed() -> Error {
    Error::Validation(ValidationFailure::SignatureVerificationFailure)
}

fn verify_rsa<D>(public_key: RsaPublicKey, message: &[u8], signature: &RsaSignature) -> Result<()>
where
    D: sha2::Digest + const_oid::AssociatedOid,
{
    RsaVerifyingKey::<D>::new(public_key)
        .verify(message, signature)
        .map_err(|_| failed())
}

/// verify_signature_message verifies `signature` over `message` using the public key in `spki`
/// and the algorithm identified by `signature_alg`.
///
/// Any failure, including use of an unsupported algorithm, yields
/// [`ValidationFailure::SignatureVerificationFailure`].
pub fn verify_signature_message(
    message: &[u8],
    signature_alg: &AlgorithmIdentifierOwned,
    signature: &[u8],
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<()> {
    let oid = signature_alg.oid;
    if oid == SHA_256_WITH_RSA_ENCRYPTION
        || oid == SHA_384_WITH_RSA_ENCRYPTION
        || oid == SHA_512_WITH_RSA_ENCRYPTION
        || oid == SHA_1_WITH_RSA_ENCRYPTION
    {
        let public_key = RsaPublicKey::from_public_key_der(&spki.to_der()?).map_err(|e| {
            debug!("Failed to parse RSA public key: {e}");
            failed()
        })?;
        let signature = RsaSignature::try_from(signature).map_err(|_| failed())?;
        return match oid {
            SHA_256_WITH_RSA_ENCRYPTION => verify_rsa::<Sha256>(public_key, message, &signature),
            SHA_384_WITH_RSA_ENCRYPTION => verify_rsa::<Sha384>(public_key, message, &signature),
            SHA_512_WITH_RSA_ENCRYPTION => verify_rsa::<Sha512>(public_key, message, &signature),
            _ => verify_rsa::<Sha1>(public_key, message, &signature),
        };
    }

    let key_bytes = spki.subject_public_key.raw_bytes();
    match oid {
        ECDSA_WITH_SHA_256 => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(key_bytes).map_err(|_| failed())?;
            let signature = p256::ecdsa::Signature::from_der(signature).map_err(|_| failed())?;
            key.verify(message, &signature).map_err(|_| failed())
        }
        ECDSA_WITH_SHA_384 => {
            let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(key_bytes).map_err(|_| failed())?;
            let signature = p384::ecdsa::Signature::from_der(signature).map_err(|_| failed())?;
            key.verify(message, &signature).map_err(|_| failed())
        }
        _ => {
            debug!("Unsupported signature algorithm: {oid}");
            Err(failed())
        }
    }
}
