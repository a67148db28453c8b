//! Register catalog: configuration entries resolved into runtime descriptors.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{RegisterDefinition, ValueType, WordOrder};
use crate::source::{RegistrationError, ValueSource};
use crate::transform::{Transform, TransformError};

/// Errors building the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Register '{name}': {source}")]
    Transform {
        name: String,
        #[source]
        source: TransformError,
    },
    #[error("Register '{name}': {reason}")]
    Layout { name: String, reason: String },
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// A poll's bytes could not be turned into a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("{value_type} registers cannot be {bytes} bytes wide")]
    Width { value_type: &'static str, bytes: usize },
}

/// A register ready to be polled and published.
///
/// Built once at startup and never mutated; shared with the value source
/// behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RegisterDescriptor {
    pub name: String,
    pub address: u16,
    pub length: u16,
    pub value_type: ValueType,
    pub word_order: WordOrder,
    pub signed: bool,
    pub transform: Transform,
}

impl RegisterDescriptor {
    /// Resolve one configuration entry.
    pub fn from_definition(definition: &RegisterDefinition) -> Result<Self, CatalogError> {
        let transform =
            Transform::compile(&definition.transform).map_err(|source| CatalogError::Transform {
                name: definition.name.clone(),
                source,
            })?;

        let bytes = usize::from(definition.length) * 2;
        if !supported_width(definition.value_type, bytes) {
            return Err(CatalogError::Layout {
                name: definition.name.clone(),
                reason: format!(
                    "{} registers must be {} words long, not {}",
                    definition.value_type.as_str(),
                    match definition.value_type {
                        ValueType::Integer => "1, 2 or 4",
                        ValueType::Float => "2 or 4",
                    },
                    definition.length
                ),
            });
        }

        Ok(Self {
            name: definition.name.clone(),
            address: definition.address,
            length: definition.length,
            value_type: definition.value_type,
            word_order: definition.word_order,
            signed: definition.signed,
            transform,
        })
    }

    /// Number of bytes a poll of this register yields.
    pub fn byte_len(&self) -> usize {
        usize::from(self.length) * 2
    }

    /// Decode a poll's raw bytes (16-bit words, big-endian within each word).
    pub fn decode(&self, raw: &[u8]) -> Result<f64, DecodeError> {
        let expected = self.byte_len();
        if raw.len() != expected {
            return Err(DecodeError::Length {
                expected,
                actual: raw.len(),
            });
        }

        let mut bytes = raw.to_vec();
        if self.word_order == WordOrder::Little {
            let words: Vec<[u8; 2]> = raw.chunks_exact(2).rev().map(|w| [w[0], w[1]]).collect();
            bytes = words.concat();
        }

        let width_error = || DecodeError::Width {
            value_type: self.value_type.as_str(),
            bytes: expected,
        };

        let value = match (self.value_type, bytes.as_slice()) {
            (ValueType::Integer, &[a, b]) => {
                let word = u16::from_be_bytes([a, b]);
                if self.signed {
                    f64::from(word as i16)
                } else {
                    f64::from(word)
                }
            }
            (ValueType::Integer, &[a, b, c, d]) => {
                let dword = u32::from_be_bytes([a, b, c, d]);
                if self.signed {
                    f64::from(dword as i32)
                } else {
                    f64::from(dword)
                }
            }
            (ValueType::Integer, b) if b.len() == 8 => {
                let mut qword = [0u8; 8];
                qword.copy_from_slice(b);
                if self.signed {
                    i64::from_be_bytes(qword) as f64
                } else {
                    u64::from_be_bytes(qword) as f64
                }
            }
            (ValueType::Float, &[a, b, c, d]) => f64::from(f32::from_be_bytes([a, b, c, d])),
            (ValueType::Float, b) if b.len() == 8 => {
                let mut qword = [0u8; 8];
                qword.copy_from_slice(b);
                f64::from_be_bytes(qword)
            }
            _ => return Err(width_error()),
        };

        Ok(value)
    }

    /// Render a transformed value as the published payload.
    ///
    /// Integral results of integer registers print without a fraction
    /// (`1`); everything else prints as the shortest round-trip decimal
    /// with a fractional part or exponent (`25.0`, `0.1`).
    pub fn format_value(&self, value: f64) -> String {
        const EXACT_INT: f64 = 9_007_199_254_740_992.0; // 2^53

        if self.value_type == ValueType::Integer && value.fract() == 0.0 && value.abs() < EXACT_INT
        {
            format!("{}", value as i64)
        } else {
            format!("{:?}", value)
        }
    }
}

fn supported_width(value_type: ValueType, bytes: usize) -> bool {
    match value_type {
        ValueType::Integer => matches!(bytes, 2 | 4 | 8),
        ValueType::Float => matches!(bytes, 4 | 8),
    }
}

/// All registers of the bridge, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    registers: Vec<Arc<RegisterDescriptor>>,
}

impl Catalog {
    /// Resolve every definition without touching any collaborator.
    ///
    /// Fails on the first bad entry; nothing is returned for the others.
    pub fn compile(definitions: &[RegisterDefinition]) -> Result<Self, CatalogError> {
        let registers = definitions
            .iter()
            .map(|definition| RegisterDescriptor::from_definition(definition).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { registers })
    }

    /// Compile every definition, then register each descriptor for polling.
    ///
    /// A transform or layout error is reported before anything is registered.
    pub fn build<V: ValueSource>(
        definitions: &[RegisterDefinition],
        source: &mut V,
    ) -> Result<Self, CatalogError> {
        let catalog = Self::compile(definitions)?;
        catalog.register_with(source)?;
        info!(registers = catalog.len(), "Register catalog built");
        Ok(catalog)
    }

    /// Register every descriptor with a value source, in order.
    pub fn register_with<V: ValueSource>(&self, source: &mut V) -> Result<(), RegistrationError> {
        for register in &self.registers {
            source.register_poll(register.clone())?;
            debug!(
                register = %register.name,
                address = register.address,
                length = register.length,
                value_type = register.value_type.as_str(),
                transform = %register.transform,
                "Registered"
            );
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.registers.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}
