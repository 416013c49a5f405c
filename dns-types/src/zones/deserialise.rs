//! A line-oriented master-file parser. Supports the subset of RFC 1035
//! zone-file syntax this project's fixtures need: `$ORIGIN`, `;`
//! comments, blank-owner/blank-ttl repetition of the previous RR's
//! values, and the `A`/`NS`/`CNAME`/`SOA` record types. Not supported:
//! `$INCLUDE`, parenthesised multi-line rdata, TXT character-string
//! escaping, non-`IN` classes.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::protocol::types::*;
use crate::zones::types::OwnedRecord;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Error {
    UnexpectedEof { line: usize },
    MissingOwner { line: usize },
    MissingTtl { line: usize },
    UnknownType { line: usize, rtype: String },
    UnsupportedClass { line: usize, rclass: String },
    IncludeNotSupported { line: usize },
    BadRdata { line: usize, rtype: RecordType, reason: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnexpectedEof { line } => write!(f, "line {line}: unexpected end of record"),
            Error::MissingOwner { line } => {
                write!(f, "line {line}: owner omitted with no previous RR")
            }
            Error::MissingTtl { line } => write!(f, "line {line}: ttl omitted with no previous RR"),
            Error::UnknownType { line, rtype } => write!(f, "line {line}: unknown record type {rtype}"),
            Error::UnsupportedClass { line, rclass } => {
                write!(f, "line {line}: unsupported record class {rclass}, only IN is supported")
            }
            Error::IncludeNotSupported { line } => write!(f, "line {line}: $INCLUDE is not supported"),
            Error::BadRdata { line, rtype, reason } => {
                write!(f, "line {line}: invalid rdata for {rtype}: {reason}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// The result of parsing a whole zone file: every RR in file order,
/// plus whichever owner carried the first SOA (the apex, used by
/// zone-loading code to scope authority for the records it parses —
/// this module just reports the records, the zone store decides
/// authority from them).
pub struct ParsedZone {
    pub records: Vec<OwnedRecord>,
}

/// # Errors
///
/// If any line cannot be parsed, references an unsupported class or
/// type, or omits an owner/ttl with no preceding RR to inherit from.
pub fn parse(data: &str) -> Result<ParsedZone, Error> {
    let mut origin = DomainName::root();
    let mut previous_owner: Option<DomainName> = None;
    let mut previous_ttl: Option<u32> = None;
    let mut records = Vec::new();

    for (index, raw_line) in data.lines().enumerate() {
        let line_no = index + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("$ORIGIN") {
            let name = rest.trim();
            origin = resolve_name(name, &origin);
            continue;
        }
        if line.starts_with("$INCLUDE") {
            return Err(Error::IncludeNotSupported { line: line_no });
        }

        let leading_space = raw_line.starts_with(' ') || raw_line.starts_with('\t');
        let mut tokens = line.split_whitespace().peekable();

        let owner = if leading_space {
            previous_owner.clone().ok_or(Error::MissingOwner { line: line_no })?
        } else {
            let token = tokens.next().ok_or(Error::UnexpectedEof { line: line_no })?;
            resolve_name(token, &origin)
        };

        let mut ttl = previous_ttl;
        let mut rclass = RecordClass::IN;
        loop {
            match tokens.peek().copied() {
                Some(token) if token.chars().all(|c| c.is_ascii_digit()) => {
                    ttl = Some(token.parse().map_err(|_| Error::BadRdata {
                        line: line_no,
                        rtype: RecordType::Other(0),
                        reason: format!("invalid ttl {token}"),
                    })?);
                    tokens.next();
                }
                Some(token) if token.eq_ignore_ascii_case("IN") => {
                    rclass = RecordClass::IN;
                    tokens.next();
                }
                Some(token) if is_class_token(token) => {
                    return Err(Error::UnsupportedClass {
                        line: line_no,
                        rclass: token.to_string(),
                    });
                }
                _ => break,
            }
        }

        let ttl = ttl.ok_or(Error::MissingTtl { line: line_no })?;

        let rtype_token = tokens.next().ok_or(Error::UnexpectedEof { line: line_no })?;
        let rtype = RecordType::from_str(rtype_token).map_err(|()| Error::UnknownType {
            line: line_no,
            rtype: rtype_token.to_string(),
        })?;

        let rdata = parse_rdata(line_no, rtype, &origin, tokens)?;

        previous_owner = Some(owner.clone());
        previous_ttl = Some(ttl);

        records.push(OwnedRecord {
            name: owner,
            ttl,
            rclass,
            rdata,
        });
    }

    Ok(ParsedZone { records })
}

fn is_class_token(token: &str) -> bool {
    matches!(token.to_ascii_uppercase().as_str(), "CH" | "HS" | "CS")
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(index) => &line[..index],
        None => line,
    }
}

/// Resolve a token that may be a fully-qualified name (trailing dot),
/// `@` for the current origin, or relative to it.
fn resolve_name(token: &str, origin: &DomainName) -> DomainName {
    if token == "@" {
        return origin.clone();
    }
    if token.ends_with('.') {
        return DomainName::new(token);
    }
    if origin.is_root() {
        DomainName::new(token)
    } else {
        DomainName::new(&format!("{token}.{}", origin.as_str()))
    }
}

fn parse_rdata<'a>(
    line: usize,
    rtype: RecordType,
    origin: &DomainName,
    mut tokens: impl Iterator<Item = &'a str>,
) -> Result<RecordData, Error> {
    let bad = |reason: String| Error::BadRdata { line, rtype, reason };

    match rtype {
        RecordType::A => {
            let token = tokens.next().ok_or_else(|| bad("missing address".into()))?;
            let address: Ipv4Addr = token
                .parse()
                .map_err(|_| bad(format!("invalid IPv4 address {token}")))?;
            Ok(RecordData::A { address })
        }
        RecordType::NS => {
            let token = tokens.next().ok_or_else(|| bad("missing nsdname".into()))?;
            Ok(RecordData::NS {
                nsdname: resolve_name(token, origin),
            })
        }
        RecordType::CNAME => {
            let token = tokens.next().ok_or_else(|| bad("missing cname".into()))?;
            Ok(RecordData::CNAME {
                cname: resolve_name(token, origin),
            })
        }
        RecordType::SOA => {
            let mname = tokens
                .next()
                .map(|t| resolve_name(t, origin))
                .ok_or_else(|| bad("missing mname".into()))?;
            let rname = tokens
                .next()
                .map(|t| resolve_name(t, origin))
                .ok_or_else(|| bad("missing rname".into()))?;
            let serial = next_u32(&mut tokens, &bad)?;
            let refresh = next_u32(&mut tokens, &bad)?;
            let retry = next_u32(&mut tokens, &bad)?;
            let expire = next_u32(&mut tokens, &bad)?;
            let minimum = next_u32(&mut tokens, &bad)?;
            Ok(RecordData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            })
        }
        RecordType::Other(n) => Err(bad(format!("record type {n} is not supported in zone files"))),
    }
}

fn next_u32<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    bad: &impl Fn(String) -> Error,
) -> Result<u32, Error> {
    let token = tokens.next().ok_or_else(|| bad("missing field".into()))?;
    token.parse().map_err(|_| bad(format!("invalid number {token}")))
}
