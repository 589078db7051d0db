use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type StudentId = i64;
pub type CourseId = i64;

/// Upper bound on how many courses one student may hold at a time.
pub const MAX_COURSES_PER_STUDENT: usize = 3;

pub const DEFAULT_MAX_STUDENTS: u32 = 3;
pub const MAX_STUDENTS_RANGE: (u32, u32) = (1, 100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub credential_hash: String,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub max_students: u32,
    pub professor_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub credential_hash: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCourse {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub max_students: Option<u32>,
    pub professor_id: Option<i64>,
}

/// Limits the ledger re-checks inside the atomic admit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatRequest {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub student_limit: usize,
}

/// Result of the ledger's atomic admit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Edge written. `course_count` is the course's enrollment count after the insert.
    Admitted { course_count: usize, max_students: u32 },
    StudentLimitReached,
    CourseCapacityReached { max_students: u32 },
}

/// Student as returned after a registration: with a fresh course list.
#[derive(Debug, Clone, Serialize)]
pub struct StudentView {
    #[serde(flatten)]
    pub student: Student,
    pub courses: Vec<Course>,
}

/// Course as returned after a registration: with a fresh roster.
#[derive(Debug, Clone, Serialize)]
pub struct CourseView {
    #[serde(flatten)]
    pub course: Course,
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentReceipt {
    pub student: StudentView,
    pub course: CourseView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    CourseFull {
        course_id: CourseId,
        course_name: String,
        enrolled_students: usize,
    },
    StudentRegistered {
        student_id: StudentId,
        name: String,
        email: String,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::CourseFull { .. } => "course_full",
            DomainEvent::StudentRegistered { .. } => "student_registered",
        }
    }
}

/// Identity the boundary resolved from the request credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub StudentId);
