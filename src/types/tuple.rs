use bincode::config;
use serde::{Deserialize, Serialize};

use crate::types::{RecordId, error::DatabaseError, value::Value};

/// A row as the storage format sees it: a list of values plus, once stored,
/// the record id of the slot holding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuple {
    pub record_id: Option<RecordId>,
    pub values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            record_id: None,
            values,
        }
    }

    pub fn with_record_id(record_id: RecordId, values: Vec<Value>) -> Self {
        Self {
            record_id: Some(record_id),
            values,
        }
    }

    pub fn get_value(&self, column_index: usize) -> Option<&Value> {
        self.values.get(column_index)
    }

    /// Encodes the values only; the record id is positional and never stored.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DatabaseError> {
        bincode::serde::encode_to_vec(&self.values, config::standard()).map_err(|e| {
            DatabaseError::SerializationError {
                details: e.to_string(),
            }
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatabaseError> {
        if bytes.is_empty() {
            return Err(DatabaseError::SerializationError {
                details: "Empty bytes".to_string(),
            });
        }
        let (values, consumed): (Vec<Value>, usize) =
            bincode::serde::decode_from_slice(bytes, config::standard()).map_err(|e| {
                DatabaseError::SerializationError {
                    details: e.to_string(),
                }
            })?;
        if consumed != bytes.len() {
            return Err(DatabaseError::SerializationError {
                details: format!(
                    "Trailing bytes after tuple: consumed {} of {}",
                    consumed,
                    bytes.len()
                ),
            });
        }
        Ok(Tuple::new(values))
    }
}
