//! Context values carried by a challenge

use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Issuance time of a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CreatedAt(DateTime<Utc>);

impl CreatedAt {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self(time)
    }

    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for CreatedAt {
    fn from(time: DateTime<Utc>) -> Self {
        Self(time)
    }
}

/// RFC 3339 with nanosecond precision, e.g. `2000-01-02T03:04:05.000000006Z`
impl fmt::Display for CreatedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }
}

impl FromStr for CreatedAt {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|time| Self(time.with_timezone(&Utc)))
            .map_err(|e| Error::parse("createdAt", e))
    }
}

/// Lifetime of a challenge after issuance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ttl(Duration);

impl Ttl {
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

/// Human-readable form, e.g. `1h 30m`
impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", humantime::format_duration(self.0))
    }
}

impl FromStr for Ttl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        humantime::parse_duration(s.trim())
            .map(Self)
            .map_err(|e| Error::parse("ttl", e))
    }
}

/// Identifier of whatever the challenge guards
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource(Url);

impl From<Url> for Resource {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl FromStr for Resource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Url::parse(s.trim())
            .map(Self)
            .map_err(|e| Error::parse("resource", e))
    }
}

/// Opaque bytes bound into the pre-image
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        hex::decode(s.trim())
            .map(Self)
            .map_err(|e| Error::parse("payload", e))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}
