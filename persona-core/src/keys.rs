//! Cryptographic key types
//!
//! Algorithm-tagged public/secret keys with the JSON forms the protocol
//! exchanges: RSA parameters travel as decimal strings, DSA parameters as
//! hex strings. Both families are required by deployed identity providers.

use num_bigint_dig::{BigInt, BigUint, RandBigInt, RandPrime};
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Hash function fixed by the keysize tables below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashAlg {
    Sha1,
    Sha256,
}

impl HashAlg {
    fn digest(self, message: &[u8]) -> Vec<u8> {
        match self {
            HashAlg::Sha1 => Sha1::digest(message).to_vec(),
            HashAlg::Sha256 => Sha256::digest(message).to_vec(),
        }
    }

    fn digest_info_prefix(self) -> &'static [u8] {
        match self {
            HashAlg::Sha1 => &SHA1_DIGEST_INFO,
            HashAlg::Sha256 => &SHA256_DIGEST_INFO,
        }
    }
}

// DER DigestInfo prefixes for EMSA-PKCS1-v1_5
const SHA1_DIGEST_INFO: [u8; 15] = [
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
];
const SHA256_DIGEST_INFO: [u8; 19] = [
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01,
    0x05, 0x00, 0x04, 0x20,
];

// Keysize tag -> modulus bits and hash. A modulus within 1 bit of the
// tabulated length is accepted at that keysize.
const RSA_KEYSIZES: [(u32, usize, HashAlg); 3] = [
    (64, 512, HashAlg::Sha1),
    (128, 1024, HashAlg::Sha256),
    (256, 2048, HashAlg::Sha256),
];

fn rsa_keysize(n: &BigUint) -> Result<(u32, HashAlg)> {
    let bits = n.bits();
    for (tag, expected, hash) in RSA_KEYSIZES {
        if bits.abs_diff(expected) <= 1 {
            return Ok((tag, hash));
        }
    }
    Err(Error::InvalidKey(format!(
        "unsupported RSA modulus size: {} bits",
        bits
    )))
}

/// A fixed DSA domain-parameter set. Only these two sets are accepted;
/// deployed identity providers interoperate on them verbatim.
struct DsaParamSet {
    keysize: u32,
    hash: HashAlg,
    p: &'static str,
    q: &'static str,
    g: &'static str,
}

impl DsaParamSet {
    fn integers(&self) -> (BigUint, BigUint, BigUint) {
        let parse = |s: &str| {
            BigUint::parse_bytes(s.as_bytes(), 16).expect("builtin DSA parameters are valid hex")
        };
        (parse(self.p), parse(self.q), parse(self.g))
    }
}

// The "128" set is 1024-bit p / 160-bit q and keeps SHA-1 for
// compatibility with its deployed label.
const DSA_PARAM_SETS: [DsaParamSet; 2] = [
    DsaParamSet {
        keysize: 128,
        hash: HashAlg::Sha1,
        p: concat!(
            "ff600483db6abfc5b45eab78594b3533d550d9f1bf2a992a7a8daa6dc34f8045",
            "ad4e6e0c429d334eeeaaefd7e23d4810be00e4cc1492cba325ba81ff2d5a5b30",
            "5a8d17eb3bf4a06a349d392e00d329744a5179380344e82a18c47933438f891e",
            "22aeef812d69c8f75e326cb70ea000c3f776dfdbd604638c2ef717fc26d02e17"
        ),
        q: "e21e04f911d1ed7991008ecaab3bf775984309c3",
        g: concat!(
            "c52a4a0ff3b7e61fdf1867ce84138369a6154f4afa92966e3c827e25cfa6cf50",
            "8b90e5de419e1337e07a2e9e2a3cd5dea704d175f8ebf6af397d69e110b96afb",
            "17c7a03259329e4829b0d03bbc7896b15b4ade53e130858cc34d96269aa89041",
            "f409136c7242a38895c9d5bccad4f389af1d7a4bd1398bd072dffa896233397a"
        ),
    },
    DsaParamSet {
        keysize: 256,
        hash: HashAlg::Sha256,
        p: concat!(
            "d6c4e5045697756c7a312d02c2289c25d40f9954261f7b5876214b6df109c738",
            "b76226b199bb7e33f8fc7ac1dcc316e1e7c78973951bfc6ff2e00cc987cd76fc",
            "fb0b8c0096b0b460fffac960ca4136c28f4bfb580de47cf7e7934c3985e3b3d9",
            "43b77f06ef2af3ac3494fc3c6fc49810a63853862a02bb1c824a01b7fc688e40",
            "28527a58ad58c9d512922660db5d505bc263af293bc93bcd6d885a157579d7f5",
            "2952236dd9d06a4fc3bc2247d21f1a70f5848eb0176513537c983f5a36737f01",
            "f82b44546e8e7f0fabc457e3de1d9c5dba96965b10a2a0580b0ad0f88179e100",
            "66107fb74314a07e6745863bc797b7002ebec0b000a98eb697414709ac17b401"
        ),
        q: "b1e370f6472c8754ccd75e99666ec8ef1fd748b748bbbc08503d82ce8055ab3b",
        g: concat!(
            "9a8269ab2e3b733a5242179d8f8ddb17ff93297d9eab00376db211a22b19c854",
            "dfa80166df2132cbc51fb224b0904abb22da2c7b7850f782124cb575b116f41e",
            "a7c4fc75b1d77525204cd7c23a15999004c23cdeb72359ee74e886a1dde7855a",
            "e05fe847447d0a68059002c3819a75dc7dcbb30e39efac36e07e2c404b7ca98b",
            "263b25fa314ba93c0625718bd489cea6d04ba4b0b7f156eeb4c56c44b50e4fb5",
            "bce9d7ae0d55b379225feb0214a04bed72f33e0664d290e7c840df3e2abb5e48",
            "189fa4e90646f1867db289c6560476799f7be8420a6dc01d078de437f280fff2",
            "d7ddf1248d56e1a54b933a41629d6c252983c58795105802d30d7bcd819cf6ef"
        ),
    },
];

fn dsa_param_set(p: &BigUint, q: &BigUint, g: &BigUint) -> Result<&'static DsaParamSet> {
    for set in &DSA_PARAM_SETS {
        if p.to_str_radix(16) == set.p && q.to_str_radix(16) == set.q && g.to_str_radix(16) == set.g
        {
            return Ok(set);
        }
    }
    Err(Error::InvalidKey(
        "DSA parameters do not match a supported parameter set".into(),
    ))
}

/// An RSA public key (PKCS#1 v1.5 signatures).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    n: BigUint,
    e: BigUint,
    keysize: u32,
    hash: HashAlg,
}

impl RsaPublicKey {
    pub fn new(n: BigUint, e: BigUint) -> Result<Self> {
        let (keysize, hash) = rsa_keysize(&n)?;
        Ok(Self { n, e, keysize, hash })
    }
}

/// A DSA public key over one of the fixed parameter sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsaPublicKey {
    p: BigUint,
    q: BigUint,
    g: BigUint,
    y: BigUint,
    keysize: u32,
    hash: HashAlg,
}

impl DsaPublicKey {
    pub fn new(p: BigUint, q: BigUint, g: BigUint, y: BigUint) -> Result<Self> {
        let set = dsa_param_set(&p, &q, &g)?;
        if y.is_zero() || y >= p {
            return Err(Error::InvalidKey("DSA y out of range".into()));
        }
        Ok(Self {
            p,
            q,
            g,
            y,
            keysize: set.keysize,
            hash: set.hash,
        })
    }
}

/// An RSA secret key.
#[derive(Debug, Clone)]
pub struct RsaSecretKey {
    n: BigUint,
    e: BigUint,
    d: BigUint,
    keysize: u32,
    hash: HashAlg,
}

impl RsaSecretKey {
    pub fn new(n: BigUint, e: BigUint, d: BigUint) -> Result<Self> {
        let (keysize, hash) = rsa_keysize(&n)?;
        Ok(Self { n, e, d, keysize, hash })
    }
}

/// A DSA secret key over one of the fixed parameter sets.
#[derive(Debug, Clone)]
pub struct DsaSecretKey {
    p: BigUint,
    q: BigUint,
    g: BigUint,
    x: BigUint,
    keysize: u32,
    hash: HashAlg,
}

impl DsaSecretKey {
    pub fn new(p: BigUint, q: BigUint, g: BigUint, x: BigUint) -> Result<Self> {
        let set = dsa_param_set(&p, &q, &g)?;
        if x.is_zero() || x >= q {
            return Err(Error::InvalidKey("DSA x out of range".into()));
        }
        Ok(Self {
            p,
            q,
            g,
            x,
            keysize: set.keysize,
            hash: set.hash,
        })
    }
}

/// A public key that can verify signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Dsa(DsaPublicKey),
}

impl PublicKey {
    /// The identifier carried in token headers, e.g. `RS256` or `DS128`.
    pub fn algorithm_id(&self) -> String {
        match self {
            PublicKey::Rsa(k) => format!("RS{}", k.keysize),
            PublicKey::Dsa(k) => format!("DS{}", k.keysize),
        }
    }

    pub fn keysize(&self) -> u32 {
        match self {
            PublicKey::Rsa(k) => k.keysize,
            PublicKey::Dsa(k) => k.keysize,
        }
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        match self {
            PublicKey::Rsa(k) => rsa_verify_raw(&k.n, &k.e, k.hash, message, signature),
            PublicKey::Dsa(k) => {
                dsa_verify_raw(&k.p, &k.q, &k.g, &k.y, k.hash, message, signature)
            }
        }
    }
}

/// A secret key that can sign. Never serialized to external actors.
#[derive(Debug, Clone)]
pub enum SecretKey {
    Rsa(RsaSecretKey),
    Dsa(DsaSecretKey),
}

impl SecretKey {
    pub fn algorithm_id(&self) -> String {
        match self {
            SecretKey::Rsa(k) => format!("RS{}", k.keysize),
            SecretKey::Dsa(k) => format!("DS{}", k.keysize),
        }
    }

    pub fn keysize(&self) -> u32 {
        match self {
            SecretKey::Rsa(k) => k.keysize,
            SecretKey::Dsa(k) => k.keysize,
        }
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match self {
            SecretKey::Rsa(k) => rsa_sign_raw(&k.n, &k.d, k.hash, message),
            SecretKey::Dsa(k) => dsa_sign_raw(&k.p, &k.q, &k.g, &k.x, k.hash, message),
        }
    }

    /// Derive the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            SecretKey::Rsa(k) => PublicKey::Rsa(RsaPublicKey {
                n: k.n.clone(),
                e: k.e.clone(),
                keysize: k.keysize,
                hash: k.hash,
            }),
            SecretKey::Dsa(k) => PublicKey::Dsa(DsaPublicKey {
                p: k.p.clone(),
                q: k.q.clone(),
                g: k.g.clone(),
                y: k.g.modpow(&k.x, &k.p),
                keysize: k.keysize,
                hash: k.hash,
            }),
        }
    }

    /// Generate a fresh RSA keypair at the given keysize tag.
    pub fn generate_rsa(keysize: u32) -> Result<Self> {
        let (_, bits, hash) = RSA_KEYSIZES
            .into_iter()
            .find(|(tag, _, _)| *tag == keysize)
            .ok_or_else(|| Error::InvalidKey(format!("unsupported RSA keysize: {}", keysize)))?;

        let mut rng = OsRng;
        let e = BigUint::from(65537u32);
        loop {
            let p = rng.gen_prime(bits / 2);
            let q = rng.gen_prime(bits - bits / 2);
            if p == q {
                continue;
            }
            let n = &p * &q;
            if n.bits() != bits {
                continue;
            }
            let phi = (&p - BigUint::one()) * (&q - BigUint::one());
            let d = match mod_inverse(&e, &phi) {
                Some(d) => d,
                None => continue,
            };
            return Ok(SecretKey::Rsa(RsaSecretKey {
                n,
                e,
                d,
                keysize,
                hash,
            }));
        }
    }

    /// Generate a fresh DSA keypair over the fixed parameter set for the
    /// given keysize tag.
    pub fn generate_dsa(keysize: u32) -> Result<Self> {
        let set = DSA_PARAM_SETS
            .iter()
            .find(|s| s.keysize == keysize)
            .ok_or_else(|| Error::InvalidKey(format!("unsupported DSA keysize: {}", keysize)))?;
        let (p, q, g) = set.integers();

        let mut rng = OsRng;
        let x = random_mod_q(&mut rng, &q);
        Ok(SecretKey::Dsa(DsaSecretKey {
            p,
            q,
            g,
            x,
            keysize: set.keysize,
            hash: set.hash,
        }))
    }
}

// -------- serialization --------
//
// RSA fields are decimal strings, DSA fields are hex strings. The asymmetry
// matches deployed identity providers and must be preserved.

#[derive(Serialize)]
struct RawRsaPublic {
    algorithm: &'static str,
    n: String,
    e: String,
}

#[derive(Serialize)]
struct RawDsaPublic {
    algorithm: &'static str,
    p: String,
    q: String,
    g: String,
    y: String,
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            PublicKey::Rsa(k) => RawRsaPublic {
                algorithm: "RS",
                n: k.n.to_str_radix(10),
                e: k.e.to_str_radix(10),
            }
            .serialize(serializer),
            PublicKey::Dsa(k) => RawDsaPublic {
                algorithm: "DS",
                p: k.p.to_str_radix(16),
                q: k.q.to_str_radix(16),
                g: k.g.to_str_radix(16),
                y: k.y.to_str_radix(16),
            }
            .serialize(serializer),
        }
    }
}

#[derive(Serialize)]
struct RawRsaSecret {
    algorithm: &'static str,
    n: String,
    e: String,
    d: String,
}

#[derive(Serialize)]
struct RawDsaSecret {
    algorithm: &'static str,
    p: String,
    q: String,
    g: String,
    x: String,
}

impl Serialize for SecretKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            SecretKey::Rsa(k) => RawRsaSecret {
                algorithm: "RS",
                n: k.n.to_str_radix(10),
                e: k.e.to_str_radix(10),
                d: k.d.to_str_radix(10),
            }
            .serialize(serializer),
            SecretKey::Dsa(k) => RawDsaSecret {
                algorithm: "DS",
                p: k.p.to_str_radix(16),
                q: k.q.to_str_radix(16),
                g: k.g.to_str_radix(16),
                x: k.x.to_str_radix(16),
            }
            .serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
struct RawKey {
    algorithm: String,
    n: Option<String>,
    e: Option<String>,
    d: Option<String>,
    p: Option<String>,
    q: Option<String>,
    g: Option<String>,
    y: Option<String>,
    x: Option<String>,
}

fn require_int<E: serde::de::Error>(
    field: &Option<String>,
    name: &str,
    radix: u32,
) -> std::result::Result<BigUint, E> {
    let s = field
        .as_deref()
        .ok_or_else(|| E::custom(format!("missing key field: {}", name)))?;
    BigUint::parse_bytes(s.as_bytes(), radix)
        .ok_or_else(|| E::custom(format!("invalid integer in key field: {}", name)))
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawKey::deserialize(deserializer)?;
        match raw.algorithm.as_str() {
            "RS" => {
                let n = require_int(&raw.n, "n", 10)?;
                let e = require_int(&raw.e, "e", 10)?;
                RsaPublicKey::new(n, e)
                    .map(PublicKey::Rsa)
                    .map_err(serde::de::Error::custom)
            }
            "DS" => {
                let p = require_int(&raw.p, "p", 16)?;
                let q = require_int(&raw.q, "q", 16)?;
                let g = require_int(&raw.g, "g", 16)?;
                let y = require_int(&raw.y, "y", 16)?;
                DsaPublicKey::new(p, q, g, y)
                    .map(PublicKey::Dsa)
                    .map_err(serde::de::Error::custom)
            }
            other => Err(serde::de::Error::custom(format!(
                "unsupported algorithm: {}",
                other
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawKey::deserialize(deserializer)?;
        match raw.algorithm.as_str() {
            "RS" => {
                let n = require_int(&raw.n, "n", 10)?;
                let e = require_int(&raw.e, "e", 10)?;
                let d = require_int(&raw.d, "d", 10)?;
                RsaSecretKey::new(n, e, d)
                    .map(SecretKey::Rsa)
                    .map_err(serde::de::Error::custom)
            }
            "DS" => {
                let p = require_int(&raw.p, "p", 16)?;
                let q = require_int(&raw.q, "q", 16)?;
                let g = require_int(&raw.g, "g", 16)?;
                let x = require_int(&raw.x, "x", 16)?;
                DsaSecretKey::new(p, q, g, x)
                    .map(SecretKey::Dsa)
                    .map_err(serde::de::Error::custom)
            }
            other => Err(serde::de::Error::custom(format!(
                "unsupported algorithm: {}",
                other
            ))),
        }
    }
}

// -------- RSA PKCS#1 v1.5 --------

fn left_pad(bytes: Vec<u8>, width: usize) -> Vec<u8> {
    if bytes.len() >= width {
        return bytes;
    }
    let mut out = vec![0u8; width - bytes.len()];
    out.extend_from_slice(&bytes);
    out
}

fn emsa_pkcs1_v15(hash: HashAlg, message: &[u8], em_len: usize) -> Result<Vec<u8>> {
    let digest = hash.digest(message);
    let prefix = hash.digest_info_prefix();
    let t_len = prefix.len() + digest.len();
    if em_len < t_len + 11 {
        return Err(Error::InvalidKey("RSA modulus too small for digest".into()));
    }
    let mut em = Vec::with_capacity(em_len);
    em.push(0x00);
    em.push(0x01);
    em.resize(em_len - t_len - 1, 0xff);
    em.push(0x00);
    em.extend_from_slice(prefix);
    em.extend_from_slice(&digest);
    Ok(em)
}

fn rsa_sign_raw(n: &BigUint, d: &BigUint, hash: HashAlg, message: &[u8]) -> Result<Vec<u8>> {
    let k = (n.bits() + 7) / 8;
    let em = emsa_pkcs1_v15(hash, message, k)?;
    let m = BigUint::from_bytes_be(&em);
    let s = m.modpow(d, n);
    Ok(left_pad(s.to_bytes_be(), k))
}

fn rsa_verify_raw(
    n: &BigUint,
    e: &BigUint,
    hash: HashAlg,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let k = (n.bits() + 7) / 8;
    if signature.len() != k {
        return Err(Error::SignatureInvalid);
    }
    let s = BigUint::from_bytes_be(signature);
    if &s >= n {
        return Err(Error::SignatureInvalid);
    }
    let em = left_pad(s.modpow(e, n).to_bytes_be(), k);
    if em == emsa_pkcs1_v15(hash, message, k)? {
        Ok(())
    } else {
        Err(Error::SignatureInvalid)
    }
}

// -------- DSA --------

/// Sample uniformly from [1, q-1] with 64 bits of oversampling so the
/// reduction bias is negligible.
fn random_mod_q<R: Rng + ?Sized>(rng: &mut R, q: &BigUint) -> BigUint {
    let c = rng.gen_biguint(q.bits() + 64);
    let q_minus_one = q - BigUint::one();
    c % &q_minus_one + BigUint::one()
}

fn dsa_sign_raw(
    p: &BigUint,
    q: &BigUint,
    g: &BigUint,
    x: &BigUint,
    hash: HashAlg,
    message: &[u8],
) -> Result<Vec<u8>> {
    let hm = BigUint::from_bytes_be(&hash.digest(message));
    let mut rng = OsRng;
    loop {
        let k = random_mod_q(&mut rng, q);
        let r = g.modpow(&k, p) % q;
        if r.is_zero() {
            continue;
        }
        let k_inv = match mod_inverse(&k, q) {
            Some(v) => v,
            None => continue,
        };
        let s = (k_inv * (&hm + x * &r)) % q;
        if s.is_zero() {
            continue;
        }
        return encode_dsa_signature(&r, &s, q);
    }
}

fn encode_dsa_signature(r: &BigUint, s: &BigUint, q: &BigUint) -> Result<Vec<u8>> {
    let width = q.bits() / 4;
    let r_hex = left_pad_hex(&r.to_str_radix(16), width)?;
    let s_hex = left_pad_hex(&s.to_str_radix(16), width)?;
    hex::decode(format!("{}{}", r_hex, s_hex)).map_err(|_| Error::SignatureInvalid)
}

fn left_pad_hex(digits: &str, width: usize) -> Result<String> {
    if digits.len() > width {
        return Err(Error::SignatureInvalid);
    }
    Ok(format!("{}{}", "0".repeat(width - digits.len()), digits))
}

fn dsa_verify_raw(
    p: &BigUint,
    q: &BigUint,
    g: &BigUint,
    y: &BigUint,
    hash: HashAlg,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let width = q.bits() / 4;
    let sig_hex = hex::encode(signature);
    if sig_hex.len() > 2 * width {
        return Err(Error::SignatureInvalid);
    }
    let sig_hex = format!("{}{}", "0".repeat(2 * width - sig_hex.len()), sig_hex);
    let (r_hex, s_hex) = sig_hex.split_at(width);

    let r = BigUint::parse_bytes(r_hex.as_bytes(), 16).ok_or(Error::SignatureInvalid)?;
    let s = BigUint::parse_bytes(s_hex.as_bytes(), 16).ok_or(Error::SignatureInvalid)?;
    if &r > q || &s > q {
        return Err(Error::SignatureInvalid);
    }

    let w = mod_inverse(&s, q).ok_or(Error::SignatureInvalid)?;
    let hm = BigUint::from_bytes_be(&hash.digest(message));
    let u1 = (&hm * &w) % q;
    let u2 = (&r * &w) % q;
    let v = ((g.modpow(&u1, p) * y.modpow(&u2, p)) % p) % q;
    if v == r {
        Ok(())
    } else {
        Err(Error::SignatureInvalid)
    }
}

/// Modular inverse via the extended Euclidean algorithm.
fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let m_int = BigInt::from(m.clone());
    let (mut r0, mut r1) = (m_int.clone(), BigInt::from(a.clone()));
    let (mut t0, mut t1) = (BigInt::zero(), BigInt::one());
    while !r1.is_zero() {
        let quotient = &r0 / &r1;
        let r_next = &r0 - &quotient * &r1;
        r0 = std::mem::replace(&mut r1, r_next);
        let t_next = &t0 - &quotient * &t1;
        t0 = std::mem::replace(&mut t1, t_next);
    }
    if !r0.is_one() {
        return None;
    }
    let mut t = t0 % &m_int;
    if t < BigInt::zero() {
        t += &m_int;
    }
    t.to_biguint()
}
