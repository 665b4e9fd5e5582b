//! # Digest Authentication
//!
//! HTTP Digest (RFC 2617) client side, as required by the device gateway.
//! Supports `MD5` and `MD5-sess`, with `qop=auth` or no qop.
//!
//! The last challenge is cached so follow-up requests authenticate up front
//! with an incrementing nonce count instead of taking a 401 every time.

use anyhow::{anyhow, bail, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Md5,
    Md5Sess,
}

/// Parsed `WWW-Authenticate: Digest ...` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub algorithm: Algorithm,
    /// `true` when the server offers `qop=auth`
    pub qop_auth: bool,
}

impl DigestChallenge {
    /// Parse a `WWW-Authenticate` header value
    pub fn parse(header: &str) -> Result<Self> {
        let header = header.trim();
        let params = header
            .get(..7)
            .filter(|scheme| scheme.eq_ignore_ascii_case("digest "))
            .map(|_| &header[7..])
            .ok_or_else(|| anyhow!("not a Digest challenge: {header}"))?;

        let params = parse_params(params);
        let realm = params
            .get("realm")
            .cloned()
            .ok_or_else(|| anyhow!("Digest challenge without realm"))?;
        let nonce = params
            .get("nonce")
            .cloned()
            .ok_or_else(|| anyhow!("Digest challenge without nonce"))?;

        let algorithm = match params.get("algorithm").map(|a| a.to_ascii_uppercase()) {
            None => Algorithm::Md5,
            Some(a) if a == "MD5" => Algorithm::Md5,
            Some(a) if a == "MD5-SESS" => Algorithm::Md5Sess,
            Some(other) => bail!("unsupported Digest algorithm {other}"),
        };

        let qop_auth = match params.get("qop") {
            None => false,
            Some(qop) => {
                let offers_auth = qop.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth"));
                if !offers_auth {
                    bail!("unsupported Digest qop {qop}");
                }
                true
            }
        };

        Ok(Self {
            realm,
            nonce,
            opaque: params.get("opaque").cloned(),
            algorithm,
            qop_auth,
        })
    }

    /// Build the `Authorization` header value for one request
    pub fn authorization(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        nonce_count: u32,
        cnonce: &str,
    ) -> String {
        let nc = format!("{nonce_count:08x}");

        let mut ha1 = md5_hex(&format!("{username}:{}:{password}", self.realm));
        if self.algorithm == Algorithm::Md5Sess {
            ha1 = md5_hex(&format!("{ha1}:{}:{cnonce}", self.nonce));
        }
        let ha2 = md5_hex(&format!("{method}:{uri}"));

        let response = if self.qop_auth {
            md5_hex(&format!("{ha1}:{}:{nc}:{cnonce}:auth:{ha2}", self.nonce))
        } else {
            md5_hex(&format!("{ha1}:{}:{ha2}", self.nonce))
        };

        let algorithm = match self.algorithm {
            Algorithm::Md5 => "MD5",
            Algorithm::Md5Sess => "MD5-sess",
        };

        let mut header = format!(
            r#"Digest username="{username}", realm="{}", nonce="{}", uri="{uri}", algorithm={algorithm}, response="{response}""#,
            self.realm, self.nonce
        );
        if self.qop_auth {
            header.push_str(&format!(r#", qop=auth, nc={nc}, cnonce="{cnonce}""#));
        }
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(r#", opaque="{opaque}""#));
        }
        header
    }
}

/// Cached challenge plus the nonce count already used with it
#[derive(Debug, Clone)]
pub struct DigestSession {
    challenge: DigestChallenge,
    nonce_count: u32,
}

impl DigestSession {
    pub fn new(challenge: DigestChallenge) -> Self {
        Self {
            challenge,
            nonce_count: 0,
        }
    }

    /// Authorization header for the next request on this session
    pub fn next_authorization(&mut self, username: &str, password: &str, method: &str, uri: &str) -> String {
        self.nonce_count = self.nonce_count.wrapping_add(1);
        let cnonce = uuid::Uuid::new_v4().simple().to_string();
        self.challenge
            .authorization(username, password, method, uri, self.nonce_count, &cnonce[..16])
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Split `key=value, key="quoted, value"` pairs
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let key = rest[..eq].trim().trim_start_matches(',').trim().to_ascii_lowercase();
        rest = rest[eq + 1..].trim_start();

        let value;
        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            value = quoted[..end].to_string();
            rest = quoted.get(end + 1..).unwrap_or("");
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            value = rest[..end].trim().to_string();
            rest = &rest[end..];
        }
        rest = rest.trim_start().trim_start_matches(',').trim_start();

        if !key.is_empty() {
            params.insert(key, value);
        }
    }

    params
}
