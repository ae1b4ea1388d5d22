use std::{fmt, sync::Mutex};

use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use thiserror::Error;

use crate::event::envelope::{
    is_reserved_attribute, validate_extension_name, EnvelopeError, EventEnvelope, ExtensionValue,
};

pub const DEFAULT_KEY_LENGTH: usize = 24;
pub const MAX_KEY_LENGTH: usize = 64;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Extension attribute carrying correlation ids, and the generator of those ids.
pub struct CorrelationKey {
    attribute: String,
    length: usize,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl CorrelationKey {
    /// Creates a key with an entropy-seeded random source. A zero length selects
    /// [`DEFAULT_KEY_LENGTH`].
    pub fn new(attribute: &str, length: usize) -> CorrelationKeyResult<Self> {
        Self::with_rng(attribute, length, StdRng::from_entropy())
    }

    pub fn with_rng<R>(attribute: &str, length: usize, rng: R) -> CorrelationKeyResult<Self>
    where
        R: RngCore + Send + 'static,
    {
        if is_reserved_attribute(attribute) {
            return Err(CorrelationKeyError::ReservedAttribute(attribute.to_string()));
        }
        validate_extension_name(attribute)?;

        let length = if length == 0 {
            DEFAULT_KEY_LENGTH
        } else {
            length
        };
        if length > MAX_KEY_LENGTH {
            return Err(CorrelationKeyError::LengthOutOfRange {
                length,
                max: MAX_KEY_LENGTH,
            });
        }

        Ok(Self {
            attribute: attribute.to_string(),
            length,
            rng: Mutex::new(Box::new(rng)),
        })
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Correlation id carried by the envelope, if any.
    pub fn get(&self, envelope: &EventEnvelope) -> Option<String> {
        envelope
            .extension(&self.attribute)
            .map(|value| value.to_string())
            .filter(|id| !id.is_empty())
    }

    /// Stamps a freshly generated id on the envelope and returns it.
    pub fn set(&self, envelope: &mut EventEnvelope) -> String {
        let id = self.generate();
        self.insert(envelope, &id);
        id
    }

    /// Stamps `id` on the envelope, replacing any previous value.
    pub fn insert(&self, envelope: &mut EventEnvelope, id: &str) {
        // The attribute name was validated on construction.
        envelope
            .extensions
            .insert(self.attribute.clone(), ExtensionValue::from(id));
    }

    pub fn generate(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        (0..self.length)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

impl fmt::Debug for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationKey")
            .field("attribute", &self.attribute)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorrelationKeyError {
    #[error("Correlation attribute {0:?} collides with a reserved attribute")]
    ReservedAttribute(String),

    #[error("Invalid correlation attribute: {0}")]
    InvalidAttribute(#[from] EnvelopeError),

    #[error("Correlation key length {length} exceeds the maximum of {max}")]
    LengthOutOfRange { length: usize, max: usize },
}

pub type CorrelationKeyResult<T> = Result<T, CorrelationKeyError>;
