//! HMAC payload signatures.

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;

use hermod_core::models::webhook::SignatureAlgorithm;

/// Sign the raw request body, producing the `<algo>=<hex>` header value
/// subscribers verify against their shared secret.
pub fn sign_payload(algorithm: SignatureAlgorithm, secret: &str, body: &[u8]) -> String {
    let digest = match algorithm {
        SignatureAlgorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
                .expect("HMAC accepts keys of any length");
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        }
        SignatureAlgorithm::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
                .expect("HMAC accepts keys of any length");
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        }
        SignatureAlgorithm::Md5 => {
            let mut mac = Hmac::<Md5>::new_from_slice(secret.as_bytes())
                .expect("HMAC accepts keys of any length");
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        }
    };

    format!("{}={digest}", algorithm.as_str())
}
