use crate::domain::model::{
    Admission, Course, CourseId, DomainEvent, NewCourse, NewStudent, SeatRequest, Student,
    StudentId,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn find_student(&self, id: StudentId) -> Result<Option<Student>>;
    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>>;
    async fn insert_student(&self, student: NewStudent) -> Result<Student>;
    /// Removes the student and, by cascade, every enrollment edge it owns.
    async fn delete_student(&self, id: StudentId) -> Result<bool>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn find_course(&self, id: CourseId) -> Result<Option<Course>>;
    async fn find_course_by_code(&self, code: &str) -> Result<Option<Course>>;
    async fn insert_course(&self, course: NewCourse) -> Result<Course>;
    /// Removes the course together with every enrollment edge pointing at it,
    /// in one transaction. Returns the students whose edges went, or `None`
    /// when there was no such course.
    async fn delete_course(&self, id: CourseId) -> Result<Option<Vec<StudentId>>>;
}

/// The authoritative student/course relation.
///
/// Every count here is read from committed state. Nothing in this trait is
/// allowed to answer from a cache.
#[async_trait]
pub trait EnrollmentLedger: Send + Sync {
    async fn count_for_student(&self, student_id: StudentId) -> Result<usize>;
    async fn count_for_course(&self, course_id: CourseId) -> Result<usize>;
    async fn exists(&self, student_id: StudentId, course_id: CourseId) -> Result<bool>;

    /// Atomically re-checks the student limit, pair uniqueness and course
    /// capacity, then writes the edge and reports the course's new count.
    ///
    /// An existing pair fails with `RegistryError::DuplicateKey`.
    async fn admit(&self, request: SeatRequest) -> Result<Admission>;

    async fn remove(&self, student_id: StudentId, course_id: CourseId) -> Result<bool>;
    async fn courses_for_student(&self, student_id: StudentId) -> Result<Vec<Course>>;
    async fn students_for_course(&self, course_id: CourseId) -> Result<Vec<Student>>;
}

/// Everything the services need from persistence.
pub trait Registry: StudentRepository + CourseRepository + EnrollmentLedger {}

impl<T> Registry for T where T: StudentRepository + CourseRepository + EnrollmentLedger {}

/// Student id -> course list, bounded by a TTL.
pub trait CourseListCache: Send + Sync {
    fn get(&self, student_id: StudentId) -> Option<Vec<Course>>;
    fn put(&self, student_id: StudentId, courses: Vec<Course>);
    fn invalidate(&self, student_id: StudentId);
    fn ttl(&self) -> Duration;
}

impl<T: CourseListCache + ?Sized> CourseListCache for Arc<T> {
    fn get(&self, student_id: StudentId) -> Option<Vec<Course>> {
        (**self).get(student_id)
    }

    fn put(&self, student_id: StudentId, courses: Vec<Course>) {
        (**self).put(student_id, courses)
    }

    fn invalidate(&self, student_id: StudentId) {
        (**self).invalidate(student_id)
    }

    fn ttl(&self) -> Duration {
        (**self).ttl()
    }
}

/// Best-effort delivery of domain events. Callers log failures and move on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: DomainEvent) -> Result<()>;
}

#[async_trait]
impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    async fn notify(&self, event: DomainEvent) -> Result<()> {
        (**self).notify(event).await
    }
}
