//! Audience matching
//!
//! A relying party may state its audience as a full origin
//! (`https://host:port/path`), as `host:port`, or as a bare host. The
//! assertion's `aud` claim is always parsed as a full origin with the
//! scheme-default port filled in. Only the fields the relying party
//! actually specified are compared.

use url::Url;

use crate::error::AudienceField;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct AudienceParts {
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
}

fn has_scheme(audience: &str) -> bool {
    let lower = audience.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Parse a full origin, filling in the scheme-default port.
fn parse_origin(origin: &str) -> Result<AudienceParts> {
    let url =
        Url::parse(origin).map_err(|_| Error::MalformedToken("malformed audience".into()))?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::MalformedToken("malformed audience".into()))?
        .to_string();
    Ok(AudienceParts {
        scheme: Some(url.scheme().to_string()),
        port: url.port_or_known_default(),
        host: Some(host),
    })
}

/// Parse whichever of the three audience forms the relying party used.
fn parse_rp_audience(audience: &str) -> Result<AudienceParts> {
    if has_scheme(audience) {
        return parse_origin(audience);
    }

    if let Some((host, port)) = audience.rsplit_once(':') {
        let port: u16 = port
            .parse()
            .map_err(|_| Error::MalformedToken("malformed audience".into()))?;
        if host.is_empty() {
            return Err(Error::MalformedToken("malformed audience".into()));
        }
        return Ok(AudienceParts {
            scheme: None,
            host: Some(host.to_ascii_lowercase()),
            port: Some(port),
        });
    }

    if audience.is_empty() {
        return Err(Error::MalformedToken("malformed audience".into()));
    }
    Ok(AudienceParts {
        scheme: None,
        host: Some(audience.to_ascii_lowercase()),
        port: None,
    })
}

/// Compare the relying party's stated audience against the assertion's
/// `aud` claim. Every field the relying party specified must match.
pub fn match_audience(rp_audience: &str, assertion_aud: &str) -> Result<()> {
    let want = parse_origin(assertion_aud)?;
    let got = parse_rp_audience(rp_audience)?;

    if got.scheme.is_some() && got.scheme != want.scheme {
        return Err(Error::AudienceMismatch(AudienceField::Scheme));
    }
    if got.host.is_some() && got.host != want.host {
        return Err(Error::AudienceMismatch(AudienceField::Domain));
    }
    if got.port.is_some() && got.port != want.port {
        return Err(Error::AudienceMismatch(AudienceField::Port));
    }
    Ok(())
}
