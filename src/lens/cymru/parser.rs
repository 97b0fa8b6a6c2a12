//! Pipe-delimited TXT answer parsing
//!
//! Answer layouts (fixed by the upstream service):
//!
//! | Query | Layout |
//! |---|---|
//! | origin | `ASN \| BGP Prefix \| CC \| Registry \| Allocated` |
//! | ASN | `ASN \| CC \| Registry \| Allocated \| AS Name` |
//! | peer | `Peer ASNs \| BGP Prefix \| CC \| Registry \| Allocated` |

use super::types::LookupError;

/// Strip quotes, split on `|` and trim every field.
///
/// Fails with [`LookupError::MalformedAnswer`] when fewer than `expected`
/// fields are present, so callers can index up to `expected - 1` safely.
pub fn split_answer(raw: &str, expected: usize) -> Result<Vec<String>, LookupError> {
    let unquoted = raw.replace('"', "");
    let fields: Vec<String> = if unquoted.trim().is_empty() {
        vec![]
    } else {
        unquoted.split('|').map(|f| f.trim().to_string()).collect()
    };

    if fields.len() < expected {
        return Err(LookupError::MalformedAnswer {
            expected,
            found: fields.len(),
            answer: raw.to_string(),
        });
    }
    Ok(fields)
}

/// Parsed origin answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginAnswer {
    pub asn: String,
    pub bgp_prefix: String,
    pub country_code: String,
    pub rir: String,
    pub allocation_date: String,
}

impl OriginAnswer {
    pub const FIELDS: usize = 5;

    pub fn parse(raw: &str) -> Result<Self, LookupError> {
        let mut fields = split_answer(raw, Self::FIELDS)?.into_iter();
        let mut next = || fields.next().unwrap_or_default();
        Ok(Self {
            asn: next(),
            bgp_prefix: next(),
            country_code: next(),
            rir: next(),
            allocation_date: next(),
        })
    }
}

/// AS description taken from an ASN answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsnAnswer {
    pub description: String,
}

impl AsnAnswer {
    const DESCRIPTION_INDEX: usize = 4;

    pub fn parse(raw: &str) -> Result<Self, LookupError> {
        let mut fields = split_answer(raw, Self::DESCRIPTION_INDEX + 1)?;
        Ok(Self {
            description: fields.swap_remove(Self::DESCRIPTION_INDEX),
        })
    }
}

/// Peer AS list taken from a peer answer, space separated as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAnswer {
    pub peers: String,
}

impl PeerAnswer {
    pub fn parse(raw: &str) -> Result<Self, LookupError> {
        let mut fields = split_answer(raw, 1)?;
        Ok(Self {
            peers: fields.swap_remove(0),
        })
    }
}
