//! Configuration validation utilities for the beer order service.
//!
//! This module provides a small framework for validating TOML configuration
//! tables. Pluggable implementations (storage backends, collaborators)
//! describe their expected fields as a [`Schema`] and validate the raw TOML
//! they are constructed from before use.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// Error that occurs when a required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// Error that occurs when a field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// Error that occurs when field type is incorrect.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Represents the type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	/// A string value.
	String,
	/// An integer value with optional minimum and maximum bounds.
	Integer {
		/// Minimum allowed value (inclusive).
		min: Option<i64>,
		/// Maximum allowed value (inclusive).
		max: Option<i64>,
	},
	/// A boolean value (true/false).
	Boolean,
}

/// Represents a field in a configuration schema.
#[derive(Debug)]
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
}

impl Field {
	/// Creates a new field with the given name and type.
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
		}
	}
}

/// A configuration schema: required and optional fields for one TOML table.
#[derive(Debug)]
pub struct Schema {
	required: Vec<Field>,
	optional: Vec<Field>,
}

impl Schema {
	/// Creates a new schema from required and optional field lists.
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	///
	/// Required fields must be present and well-typed; optional fields are
	/// only type-checked when present. Unknown fields are ignored.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		for field in &self.required {
			match config.get(&field.name) {
				Some(value) => check_type(field, value)?,
				None => return Err(ValidationError::MissingField(field.name.clone())),
			}
		}

		for field in &self.optional {
			if let Some(value) = config.get(&field.name) {
				check_type(field, value)?;
			}
		}

		Ok(())
	}
}

fn type_name(value: &toml::Value) -> &'static str {
	match value {
		toml::Value::String(_) => "string",
		toml::Value::Integer(_) => "integer",
		toml::Value::Float(_) => "float",
		toml::Value::Boolean(_) => "boolean",
		toml::Value::Datetime(_) => "datetime",
		toml::Value::Array(_) => "array",
		toml::Value::Table(_) => "table",
	}
}

fn check_type(field: &Field, value: &toml::Value) -> Result<(), ValidationError> {
	match &field.field_type {
		FieldType::String => {
			if !value.is_str() {
				return Err(ValidationError::TypeMismatch {
					field: field.name.clone(),
					expected: "string".to_string(),
					actual: type_name(value).to_string(),
				});
			}
		}
		FieldType::Integer { min, max } => {
			let actual = value
				.as_integer()
				.ok_or_else(|| ValidationError::TypeMismatch {
					field: field.name.clone(),
					expected: "integer".to_string(),
					actual: type_name(value).to_string(),
				})?;
			if let Some(min) = min {
				if actual < *min {
					return Err(ValidationError::InvalidValue {
						field: field.name.clone(),
						message: format!("must be >= {}", min),
					});
				}
			}
			if let Some(max) = max {
				if actual > *max {
					return Err(ValidationError::InvalidValue {
						field: field.name.clone(),
						message: format!("must be <= {}", max),
					});
				}
			}
		}
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(ValidationError::TypeMismatch {
					field: field.name.clone(),
					expected: "boolean".to_string(),
					actual: type_name(value).to_string(),
				});
			}
		}
	}
	Ok(())
}

/// Trait implemented by pluggable components to validate their own config.
pub trait ConfigSchema: Send + Sync {
	/// Validates the raw TOML table the component was configured with.
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(input: &str) -> toml::Value {
		toml::from_str(input).unwrap()
	}

	#[test]
	fn missing_required_field() {
		let schema = Schema::new(vec![Field::new("storage_path", FieldType::String)], vec![]);
		let result = schema.validate(&parse("other = 1"));
		assert!(matches!(result, Err(ValidationError::MissingField(_))));
	}

	#[test]
	fn integer_bounds() {
		let schema = Schema::new(
			vec![Field::new(
				"capacity",
				FieldType::Integer {
					min: Some(1),
					max: Some(1024),
				},
			)],
			vec![],
		);
		assert!(schema.validate(&parse("capacity = 64")).is_ok());
		assert!(schema.validate(&parse("capacity = 0")).is_err());
		assert!(schema.validate(&parse("capacity = \"lots\"")).is_err());
	}

	#[test]
	fn optional_field_only_checked_when_present() {
		let schema = Schema::new(vec![], vec![Field::new("verbose", FieldType::Boolean)]);
		assert!(schema.validate(&parse("unrelated = 1")).is_ok());
		assert!(schema.validate(&parse("verbose = 3")).is_err());
	}
}
