use crate::domain::model::{
    Admission, Course, CourseId, CourseView, DomainEvent, EnrollmentReceipt, SeatRequest,
    StudentId, StudentView, MAX_COURSES_PER_STUDENT,
};
use crate::domain::ports::{CourseListCache, NotificationSink, Registry};
use crate::utils::error::{Entity, RegistryError, Result};

/// Enrolls students into courses and withdraws them again.
///
/// Rule checks always read the ledger. The cache only serves
/// [`RegistrationService::student_courses`] and is invalidated on every
/// successful write before the call returns.
pub struct RegistrationService<R, C, N> {
    registry: R,
    cache: C,
    sink: N,
}

impl<R, C, N> RegistrationService<R, C, N>
where
    R: Registry,
    C: CourseListCache,
    N: NotificationSink,
{
    pub fn new(registry: R, cache: C, sink: N) -> Self {
        Self {
            registry,
            cache,
            sink,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Checks run in a fixed order and the first failure wins:
    /// student exists, course exists, student below the limit, not already
    /// registered, course below capacity. The ledger repeats the last three
    /// atomically with the insert.
    pub async fn enroll(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<EnrollmentReceipt> {
        self.try_enroll(student_id, course_id)
            .await
            .inspect_err(|e| {
                if e.is_infrastructure() {
                    tracing::error!(
                        student_id,
                        course_id,
                        error = %e,
                        "Failed to register student for course"
                    );
                } else {
                    tracing::debug!(student_id, course_id, reason = %e, "Registration refused");
                }
            })
    }

    async fn try_enroll(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<EnrollmentReceipt> {
        let student = self
            .registry
            .find_student(student_id)
            .await?
            .ok_or(RegistryError::NotFound(Entity::Student))?;
        let course = self
            .registry
            .find_course(course_id)
            .await?
            .ok_or(RegistryError::NotFound(Entity::Course))?;

        if self.registry.count_for_student(student_id).await? >= MAX_COURSES_PER_STUDENT {
            return Err(RegistryError::LimitReached {
                limit: MAX_COURSES_PER_STUDENT,
            });
        }
        if self.registry.exists(student_id, course_id).await? {
            return Err(RegistryError::AlreadyRegistered);
        }
        if self.registry.count_for_course(course_id).await? >= course.max_students as usize {
            return Err(RegistryError::CapacityReached {
                max_students: course.max_students,
            });
        }

        let admission = self
            .registry
            .admit(SeatRequest {
                student_id,
                course_id,
                student_limit: MAX_COURSES_PER_STUDENT,
            })
            .await;

        // Anything that slipped past the checks above lost a race; the
        // answer is the same one the checks would have given.
        let (course_count, max_students) = match admission {
            Ok(Admission::Admitted {
                course_count,
                max_students,
            }) => (course_count, max_students),
            Ok(Admission::StudentLimitReached) => {
                return Err(RegistryError::LimitReached {
                    limit: MAX_COURSES_PER_STUDENT,
                })
            }
            Ok(Admission::CourseCapacityReached { max_students }) => {
                return Err(RegistryError::CapacityReached { max_students })
            }
            Err(RegistryError::DuplicateKey { .. }) => return Err(RegistryError::AlreadyRegistered),
            Err(e) => return Err(e),
        };

        self.cache.invalidate(student_id);
        tracing::info!(student_id, course_id, "Student registered for course");

        if course_count >= max_students as usize {
            self.emit(DomainEvent::CourseFull {
                course_id,
                course_name: course.name.clone(),
                enrolled_students: course_count,
            })
            .await;
        }

        let courses = self.registry.courses_for_student(student_id).await?;
        let students = self.registry.students_for_course(course_id).await?;
        Ok(EnrollmentReceipt {
            student: StudentView { student, courses },
            course: CourseView {
                course: Course {
                    max_students,
                    ..course
                },
                students,
            },
        })
    }

    /// Returns `false` when the student, the course or the enrollment is
    /// missing. Only storage failures come back as errors.
    pub async fn unregister(&self, student_id: StudentId, course_id: CourseId) -> Result<bool> {
        self.try_unregister(student_id, course_id)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    student_id,
                    course_id,
                    error = %e,
                    "Failed to unregister student from course"
                )
            })
    }

    async fn try_unregister(&self, student_id: StudentId, course_id: CourseId) -> Result<bool> {
        if self.registry.find_student(student_id).await?.is_none()
            || self.registry.find_course(course_id).await?.is_none()
        {
            return Ok(false);
        }
        if !self.registry.exists(student_id, course_id).await? {
            return Ok(false);
        }

        let removed = self.registry.remove(student_id, course_id).await?;
        if removed {
            self.cache.invalidate(student_id);
            tracing::info!(student_id, course_id, "Student unregistered from course");
        }
        Ok(removed)
    }

    /// Read-through listing of a student's courses.
    pub async fn student_courses(&self, student_id: StudentId) -> Result<Vec<Course>> {
        if let Some(courses) = self.cache.get(student_id) {
            return Ok(courses);
        }

        tracing::debug!("Cache miss for key: student_courses_{}", student_id);
        let courses = self.registry.courses_for_student(student_id).await?;
        self.cache.put(student_id, courses.clone());
        Ok(courses)
    }

    async fn emit(&self, event: DomainEvent) {
        let name = event.name();
        if let Err(e) = self.sink.notify(event).await {
            tracing::warn!(event = name, error = %e, "Dropped notification");
        }
    }
}
