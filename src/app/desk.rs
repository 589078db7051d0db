use crate::domain::model::{Caller, CourseId, CourseView, StudentId, StudentView};
use crate::domain::ports::{CourseListCache, NotificationSink, Registry};
use crate::domain::services::RegistrationService;
use crate::utils::error::{RegistryError, Result};
use serde::Serialize;
use serde_json::{json, Value};

/// What the transport layer sends back: a status code and a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct DeskResponse {
    pub status: u16,
    pub body: Value,
}

impl DeskResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn message(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "message": message }),
        }
    }

    fn from_error(err: &RegistryError) -> Self {
        Self::message(err.http_status(), &err.user_friendly_message())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn message_text(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

#[derive(Serialize)]
struct EnrolledBody<'a> {
    message: &'static str,
    student: &'a StudentView,
    course: &'a CourseView,
}

/// Boundary in front of the registration service.
///
/// The caller is whoever the identity provider authenticated; a caller may
/// only enroll or unregister themself.
pub struct RegistrationDesk<R, C, N> {
    service: RegistrationService<R, C, N>,
}

impl<R, C, N> RegistrationDesk<R, C, N>
where
    R: Registry,
    C: CourseListCache,
    N: NotificationSink,
{
    pub fn new(service: RegistrationService<R, C, N>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &RegistrationService<R, C, N> {
        &self.service
    }

    fn authorize(caller: Caller, student_id: StudentId) -> Result<()> {
        if caller.0 != student_id {
            tracing::warn!(caller = caller.0, student_id, "Rejected request for another student");
            return Err(RegistryError::Forbidden {
                caller: caller.0,
                student_id,
            });
        }
        Ok(())
    }

    pub async fn enroll(
        &self,
        caller: Caller,
        student_id: StudentId,
        course_id: CourseId,
    ) -> DeskResponse {
        if let Err(e) = Self::authorize(caller, student_id) {
            return DeskResponse::from_error(&e);
        }

        let receipt = match self.service.enroll(student_id, course_id).await {
            Ok(receipt) => receipt,
            Err(e) => return DeskResponse::from_error(&e),
        };

        let body = EnrolledBody {
            message: "Student successfully registered for the course.",
            student: &receipt.student,
            course: &receipt.course,
        };
        match serde_json::to_value(&body) {
            Ok(value) => DeskResponse::ok(value),
            Err(e) => DeskResponse::from_error(&RegistryError::from(e)),
        }
    }

    pub async fn unregister(
        &self,
        caller: Caller,
        student_id: StudentId,
        course_id: CourseId,
    ) -> DeskResponse {
        if let Err(e) = Self::authorize(caller, student_id) {
            return DeskResponse::from_error(&e);
        }

        match self.service.unregister(student_id, course_id).await {
            Ok(true) => DeskResponse::message(200, "Successfully unregistered from course."),
            Ok(false) => DeskResponse::message(
                400,
                "Failed to unregister from course (student or course not found, or not registered).",
            ),
            Err(e) => DeskResponse::from_error(&e),
        }
    }

    /// The caller's own course list, served through the cache.
    pub async fn my_courses(&self, caller: Caller) -> DeskResponse {
        let courses = match self.service.student_courses(caller.0).await {
            Ok(courses) => courses,
            Err(e) => return DeskResponse::from_error(&e),
        };
        match serde_json::to_value(&courses) {
            Ok(value) => DeskResponse::ok(value),
            Err(e) => DeskResponse::from_error(&RegistryError::from(e)),
        }
    }
}
