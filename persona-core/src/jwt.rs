//! JSON Web Token codec
//!
//! Tokens are three base64url segments, `header.payload.signature`. The
//! header carries only the algorithm identifier; the signature covers the
//! literal `header.payload` text.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

use crate::keys::{PublicKey, SecretKey};
use crate::{Error, Result};

/// Algorithm identifiers a verifier will accept in a token header.
pub const ALGORITHM_IDS: [&str; 5] = ["RS64", "RS128", "RS256", "DS128", "DS256"];

/// Encode bytes as base64url with padding stripped.
pub fn encode_segment(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a base64url segment. Padding may be present or already stripped.
pub fn decode_segment(segment: &str) -> Result<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))?)
}

/// A parsed (not necessarily verified) token.
#[derive(Debug, Clone)]
pub struct Token {
    raw: String,
    header_segment: String,
    payload_segment: String,
    alg: String,
    payload: Value,
    signature: Vec<u8>,
}

impl Token {
    /// Parse an encoded token into its segments.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::MalformedToken(format!(
                "expected 3 segments, got {}",
                parts.len()
            )));
        }

        let header_bytes = decode_segment(parts[0])?;
        let header: Value = serde_json::from_slice(&header_bytes)
            .map_err(|_| Error::MalformedToken("header is not JSON".into()))?;
        let alg = header
            .get("alg")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedToken("header has no alg".into()))?
            .to_string();

        let payload_bytes = decode_segment(parts[1])?;
        let payload: Value = serde_json::from_slice(&payload_bytes)
            .map_err(|_| Error::MalformedToken("payload is not JSON".into()))?;
        if !payload.is_object() {
            return Err(Error::MalformedToken("payload is not a JSON object".into()));
        }

        let signature = decode_segment(parts[2])?;

        Ok(Self {
            raw: raw.to_string(),
            header_segment: parts[0].to_string(),
            payload_segment: parts[1].to_string(),
            alg,
            payload,
            signature,
        })
    }

    /// Serialize a payload and sign it with the given key.
    pub fn sign(payload: &Value, key: &SecretKey) -> Result<Self> {
        let alg = key.algorithm_id();
        let header = serde_json::json!({ "alg": alg });
        let header_segment = encode_segment(serde_json::to_string(&header)?.as_bytes());
        let payload_segment = encode_segment(serde_json::to_string(payload)?.as_bytes());

        let message = format!("{}.{}", header_segment, payload_segment);
        let signature = key.sign(message.as_bytes())?;
        let raw = format!("{}.{}", message, encode_segment(&signature));

        Ok(Self {
            raw,
            header_segment,
            payload_segment,
            alg,
            payload: payload.clone(),
            signature,
        })
    }

    /// Verify the token signature against a public key.
    ///
    /// The header algorithm must be a known identifier and must agree with
    /// the algorithm of the key being verified against.
    pub fn verify(&self, key: &PublicKey) -> Result<()> {
        if !ALGORITHM_IDS.contains(&self.alg.as_str()) {
            return Err(Error::UnknownAlgorithm(self.alg.clone()));
        }
        if self.alg != key.algorithm_id() {
            return Err(Error::SignatureInvalid);
        }

        let message = format!("{}.{}", self.header_segment, self.payload_segment);
        key.verify(message.as_bytes(), &self.signature)
    }

    /// The decoded payload claims.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// The header algorithm identifier.
    pub fn alg(&self) -> &str {
        &self.alg
    }

    /// The encoded token.
    pub fn encoded(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base64url_roundtrip_all_lengths() {
        // Cover every input length mod 3
        for len in 0..9 {
            let bytes: Vec<u8> = (0..len as u8).collect();
            let encoded = encode_segment(&bytes);
            assert!(!encoded.contains('='));
            assert_eq!(decode_segment(&encoded).unwrap(), bytes);
        }
    }

    #[test]
    fn decode_tolerates_padding() {
        let encoded = encode_segment(b"ab");
        let padded = format!("{}==", encoded);
        assert_eq!(decode_segment(&padded).unwrap(), b"ab");
    }

    #[test]
    fn decode_rejects_standard_alphabet() {
        // '+' and '/' belong to the non-URL-safe alphabet
        assert!(decode_segment("a+b/").is_err());
    }

    #[test]
    fn parse_rejects_wrong_segment_count() {
        assert!(matches!(
            Token::parse("onlyonesegment"),
            Err(Error::MalformedToken(_))
        ));
        assert!(matches!(
            Token::parse("a.b.c.d"),
            Err(Error::MalformedToken(_))
        ));
    }

    #[test]
    fn parse_rejects_non_json_header() {
        let header = encode_segment(b"not json");
        let payload = encode_segment(br#"{"exp":1}"#);
        let raw = format!("{}.{}.{}", header, payload, encode_segment(b"sig"));
        assert!(matches!(Token::parse(&raw), Err(Error::MalformedToken(_))));
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let secret = SecretKey::generate_dsa(128).unwrap();
        let token = Token::sign(&json!({"exp": 1_500_000}), &secret).unwrap();

        let parsed = Token::parse(token.encoded()).unwrap();
        assert_eq!(parsed.alg(), "DS128");
        parsed.verify(&secret.public_key()).unwrap();
        assert_eq!(parsed.payload()["exp"], 1_500_000);
    }

    #[test]
    fn verify_rejects_payload_tamper() {
        let secret = SecretKey::generate_dsa(128).unwrap();
        let token = Token::sign(&json!({"aud": "https://rp.example"}), &secret).unwrap();

        let parts: Vec<&str> = token.encoded().split('.').collect();
        let forged_payload = encode_segment(br#"{"aud":"https://evil.example"}"#);
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        let parsed = Token::parse(&forged).unwrap();
        assert!(matches!(
            parsed.verify(&secret.public_key()),
            Err(Error::SignatureInvalid)
        ));
    }

    #[test]
    fn verify_rejects_unknown_algorithm() {
        let secret = SecretKey::generate_dsa(128).unwrap();
        let token = Token::sign(&json!({"exp": 1}), &secret).unwrap();

        // Rewrite the header with an unrecognized alg
        let parts: Vec<&str> = token.encoded().split('.').collect();
        let header = encode_segment(br#"{"alg":"HS256"}"#);
        let forged = format!("{}.{}.{}", header, parts[1], parts[2]);

        let parsed = Token::parse(&forged).unwrap();
        assert!(matches!(
            parsed.verify(&secret.public_key()),
            Err(Error::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn verify_rejects_algorithm_key_disagreement() {
        let ds_secret = SecretKey::generate_dsa(128).unwrap();
        let token = Token::sign(&json!({"exp": 1}), &ds_secret).unwrap();

        // A DS128 header verified against a DS256 key must not be accepted
        let other = SecretKey::generate_dsa(256).unwrap();
        let parsed = Token::parse(token.encoded()).unwrap();
        assert!(parsed.verify(&other.public_key()).is_err());
    }
}
