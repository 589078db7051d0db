use std::fmt;
use thiserror::Error;

/// The two endpoints an enrollment edge can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Student,
    Course,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Student => write!(f, "Student"),
            Entity::Course => write!(f, "Course"),
        }
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{0} not found.")]
    NotFound(Entity),

    #[error("Student is already registered for this course.")]
    AlreadyRegistered,

    #[error("Student has reached the maximum course registration limit ({limit} courses).")]
    LimitReached { limit: usize },

    #[error("Course has reached its maximum student capacity ({max_students} students).")]
    CapacityReached { max_students: u32 },

    #[error("Enrollment (student {student_id}, course {course_id}) already exists")]
    DuplicateKey { student_id: i64, course_id: i64 },

    #[error("Caller {caller} is not allowed to act for student {student_id}")]
    Forbidden { caller: i64, student_id: i64 },

    #[error("Validation error on {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Conflict on {field}: {value} is already taken")]
    Conflict { field: String, value: String },

    #[error("Storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Notification error: {message}")]
    Notification { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A registration rule said no. Nothing was written.
    Business,
    Authorization,
    Validation,
    Infrastructure,
    Configuration,
}

impl RegistryError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        RegistryError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        RegistryError::Storage {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RegistryError::NotFound(_)
            | RegistryError::AlreadyRegistered
            | RegistryError::LimitReached { .. }
            | RegistryError::CapacityReached { .. }
            | RegistryError::DuplicateKey { .. }
            | RegistryError::Conflict { .. } => ErrorCategory::Business,
            RegistryError::Forbidden { .. } => ErrorCategory::Authorization,
            RegistryError::Validation { .. } => ErrorCategory::Validation,
            RegistryError::Sqlite(_)
            | RegistryError::Storage { .. }
            | RegistryError::Notification { .. }
            | RegistryError::Io(_)
            | RegistryError::Serialization(_) => ErrorCategory::Infrastructure,
            RegistryError::Config { .. } => ErrorCategory::Configuration,
        }
    }

    /// Status code the HTTP boundary answers with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            RegistryError::NotFound(_) => 404,
            RegistryError::AlreadyRegistered
            | RegistryError::LimitReached { .. }
            | RegistryError::CapacityReached { .. }
            | RegistryError::DuplicateKey { .. }
            | RegistryError::Conflict { .. } => 409,
            RegistryError::Forbidden { .. } => 403,
            RegistryError::Validation { .. } => 422,
            _ => 500,
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        self.category() == ErrorCategory::Infrastructure
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RegistryError::Sqlite(_) | RegistryError::Storage { .. } => {
                "The registration store is unavailable. Please try again later.".to_string()
            }
            RegistryError::Io(e) => format!("File access failed: {}", e),
            RegistryError::Serialization(_) => "Could not encode the response.".to_string(),
            RegistryError::Config { message } => format!("Invalid configuration: {}", message),
            RegistryError::Forbidden { .. } => {
                "You can only change your own course registrations.".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_map_to_conflict_or_not_found() {
        assert_eq!(RegistryError::NotFound(Entity::Student).http_status(), 404);
        assert_eq!(RegistryError::NotFound(Entity::Course).http_status(), 404);
        assert_eq!(RegistryError::AlreadyRegistered.http_status(), 409);
        assert_eq!(RegistryError::LimitReached { limit: 3 }.http_status(), 409);
        assert_eq!(
            RegistryError::CapacityReached { max_students: 3 }.http_status(),
            409
        );
        assert_eq!(RegistryError::storage("disk full").http_status(), 500);
    }

    #[test]
    fn test_not_found_message_names_the_entity() {
        assert_eq!(
            RegistryError::NotFound(Entity::Student).to_string(),
            "Student not found."
        );
        assert_eq!(
            RegistryError::NotFound(Entity::Course).to_string(),
            "Course not found."
        );
    }

    #[test]
    fn test_storage_errors_hide_internals_from_users() {
        let err = RegistryError::storage("database is locked");
        assert!(err.is_infrastructure());
        assert!(!err.user_friendly_message().contains("locked"));
    }
}
