//! Pre-image formatting
//!
//! A [`Layout`] turns a challenge and a candidate nonce into the exact bytes
//! that get hashed. Layouts must be pure and deterministic: solver and
//! verifier render independently and have to agree byte for byte.
//!
//! [`TemplateLayout`] is the built-in implementation. Placeholders are written
//! in braces and literal braces are doubled:
//!
//! ```
//! use hashcash_pow::TemplateLayout;
//!
//! let layout: TemplateLayout = "{leadingZeroBitCount}:{payload}:{nonce}".parse().unwrap();
//! assert_eq!(layout.to_string(), "{leadingZeroBitCount}:{payload}:{nonce}");
//! ```

use crate::challenge::Challenge;
use crate::core::Nonce;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Formatter failures, at parse time or at render time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("syntax error at byte {position}: {message}")]
    Syntax {
        position: usize,
        message: &'static str,
    },

    #[error("empty placeholder at byte {position}")]
    EmptyPlaceholder { position: usize },

    #[error("unknown placeholder `{0}`")]
    UnknownPlaceholder(String),

    #[error("challenge has no {0}")]
    MissingField(&'static str),

    #[error("{0}")]
    Render(String),
}

/// Everything a layout may draw on for one attempt
#[derive(Debug, Clone, Copy)]
pub struct ChallengeHashData<'a> {
    pub challenge: &'a Challenge,
    pub nonce: &'a Nonce,
}

/// Deterministic pre-image formatter
pub trait Layout: fmt::Debug + Send + Sync {
    /// Render the bytes to hash
    fn render(&self, data: &ChallengeHashData<'_>) -> Result<Vec<u8>, LayoutError>;

    /// Canonical human-readable form of this layout
    fn source(&self) -> &str;
}

/// A challenge field a template can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    LeadingZeroBitCount,
    TargetBitIndex,
    CreatedAt,
    Ttl,
    Resource,
    Payload,
    Hash,
    Layout,
    Nonce,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::LeadingZeroBitCount,
        Field::TargetBitIndex,
        Field::CreatedAt,
        Field::Ttl,
        Field::Resource,
        Field::Payload,
        Field::Hash,
        Field::Layout,
        Field::Nonce,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::LeadingZeroBitCount => "leadingZeroBitCount",
            Field::TargetBitIndex => "targetBitIndex",
            Field::CreatedAt => "createdAt",
            Field::Ttl => "ttl",
            Field::Resource => "resource",
            Field::Payload => "payload",
            Field::Hash => "hash",
            Field::Layout => "layout",
            Field::Nonce => "nonce",
        }
    }

    fn write(self, data: &ChallengeHashData<'_>, out: &mut Vec<u8>) -> Result<(), LayoutError> {
        let challenge = data.challenge;
        let text = match self {
            Field::LeadingZeroBitCount => challenge.leading_zero_bit_count().to_string(),
            Field::TargetBitIndex => challenge
                .target_bit_index()
                .map_err(|e| LayoutError::Render(e.to_string()))?
                .to_string(),
            Field::CreatedAt => challenge
                .created_at()
                .ok_or(LayoutError::MissingField("createdAt"))?
                .to_string(),
            Field::Ttl => challenge
                .ttl()
                .ok_or(LayoutError::MissingField("ttl"))?
                .to_string(),
            Field::Resource => challenge
                .resource()
                .ok_or(LayoutError::MissingField("resource"))?
                .to_string(),
            Field::Payload => {
                out.extend_from_slice(challenge.payload().as_bytes());
                return Ok(());
            }
            Field::Hash => challenge.hash().name().to_string(),
            Field::Layout => challenge.layout().source().to_string(),
            Field::Nonce => data.nonce.to_string(),
        };
        out.extend_from_slice(text.as_bytes());
        Ok(())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, LayoutError> {
        Field::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| LayoutError::UnknownPlaceholder(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// Brace-placeholder template layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLayout {
    source: String,
    segments: Vec<Segment>,
}

impl TemplateLayout {
    pub fn new(source: impl Into<String>) -> Result<Self, LayoutError> {
        let source = source.into();
        let segments = parse_segments(&source)?;
        Ok(Self { source, segments })
    }

    /// Fields referenced by the template, in order of appearance
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(field) => Some(*field),
            Segment::Literal(_) => None,
        })
    }
}

fn parse_segments(source: &str) -> Result<Vec<Segment>, LayoutError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = source.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, '{')) => {
                            return Err(LayoutError::Syntax {
                                position,
                                message: "nested `{` in placeholder",
                            })
                        }
                        Some((_, ch)) => name.push(ch),
                        None => {
                            return Err(LayoutError::Syntax {
                                position,
                                message: "unterminated placeholder",
                            })
                        }
                    }
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(LayoutError::EmptyPlaceholder { position });
                }
                let field = name.parse::<Field>()?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(field));
            }
            '}' => {
                return Err(LayoutError::Syntax {
                    position,
                    message: "unmatched `}`",
                })
            }
            c => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

impl Layout for TemplateLayout {
    fn render(&self, data: &ChallengeHashData<'_>) -> Result<Vec<u8>, LayoutError> {
        let mut out = Vec::with_capacity(self.source.len() + data.challenge.payload().len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.extend_from_slice(text.as_bytes()),
                Segment::Field(field) => field.write(data, &mut out)?,
            }
        }
        Ok(out)
    }

    fn source(&self) -> &str {
        &self.source
    }
}

impl FromStr for TemplateLayout {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, LayoutError> {
        Self::new(s)
    }
}

impl fmt::Display for TemplateLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
