use crate::domain::model::{
    Course, CourseId, DomainEvent, NewCourse, NewStudent, Student, StudentId,
    DEFAULT_MAX_STUDENTS, MAX_STUDENTS_RANGE,
};
use crate::domain::ports::{CourseListCache, NotificationSink, Registry};
use crate::utils::error::{Entity, RegistryError, Result};
use crate::utils::validation::{
    validate_email, validate_max_length, validate_non_empty_string, validate_phone,
    validate_range,
};

/// Creates, looks up and removes the endpoints of enrollment edges.
pub struct CatalogService<R, C, N> {
    registry: R,
    cache: C,
    sink: N,
}

impl<R, C, N> CatalogService<R, C, N>
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

    pub async fn create_student(&self, input: NewStudent) -> Result<Student> {
        let input = normalize_student(input)?;
        if self
            .registry
            .find_student_by_email(&input.email)
            .await?
            .is_some()
        {
            return Err(RegistryError::Conflict {
                field: "email".to_string(),
                value: input.email,
            });
        }

        let student = self.registry.insert_student(input).await?;
        tracing::info!(student_id = student.id, "Student account created");

        let event = DomainEvent::StudentRegistered {
            student_id: student.id,
            name: student.name.clone(),
            email: student.email.clone(),
        };
        if let Err(e) = self.sink.notify(event).await {
            tracing::warn!(student_id = student.id, error = %e, "Dropped welcome notification");
        }
        Ok(student)
    }

    pub async fn create_course(&self, input: NewCourse) -> Result<Course> {
        let input = normalize_course(input)?;
        let course = self.registry.insert_course(input).await?;
        tracing::info!(
            course_id = course.id,
            code = %course.code,
            max_students = course.max_students,
            "Course created"
        );
        Ok(course)
    }

    pub async fn find_student(&self, id: StudentId) -> Result<Student> {
        self.registry
            .find_student(id)
            .await?
            .ok_or(RegistryError::NotFound(Entity::Student))
    }

    pub async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>> {
        self.registry
            .find_student_by_email(&email.trim().to_lowercase())
            .await
    }

    pub async fn find_course(&self, id: CourseId) -> Result<Course> {
        self.registry
            .find_course(id)
            .await?
            .ok_or(RegistryError::NotFound(Entity::Course))
    }

    pub async fn find_course_by_code(&self, code: &str) -> Result<Option<Course>> {
        self.registry.find_course_by_code(code.trim()).await
    }

    pub async fn course_roster(&self, course_id: CourseId) -> Result<Vec<Student>> {
        self.find_course(course_id).await?;
        self.registry.students_for_course(course_id).await
    }

    pub async fn delete_student(&self, id: StudentId) -> Result<bool> {
        let deleted = self.registry.delete_student(id).await?;
        self.cache.invalidate(id);
        if deleted {
            tracing::info!(student_id = id, "Student deleted with their enrollments");
        }
        Ok(deleted)
    }

    /// Every student enrolled in the course loses their cached list.
    pub async fn delete_course(&self, id: CourseId) -> Result<bool> {
        let Some(dropped) = self.registry.delete_course(id).await? else {
            return Ok(false);
        };
        for student_id in &dropped {
            self.cache.invalidate(*student_id);
        }
        tracing::info!(
            course_id = id,
            dropped_enrollments = dropped.len(),
            "Course deleted with its enrollments"
        );
        Ok(true)
    }
}

fn normalize_student(input: NewStudent) -> Result<NewStudent> {
    let name = input.name.trim().to_string();
    validate_non_empty_string("name", &name)?;
    validate_max_length("name", &name, 255)?;

    let email = input.email.trim().to_lowercase();
    validate_email("email", &email)?;

    validate_non_empty_string("credential_hash", &input.credential_hash)?;

    let phone_number = match input.phone_number {
        Some(phone) if !phone.trim().is_empty() => {
            let phone = phone.trim().to_string();
            validate_phone("phone_number", &phone)?;
            Some(phone)
        }
        _ => None,
    };

    Ok(NewStudent {
        name,
        email,
        credential_hash: input.credential_hash,
        phone_number,
    })
}

fn normalize_course(input: NewCourse) -> Result<NewCourse> {
    let name = input.name.trim().to_string();
    validate_non_empty_string("name", &name)?;
    validate_max_length("name", &name, 255)?;

    let code = input.code.trim().to_string();
    validate_non_empty_string("code", &code)?;
    validate_max_length("code", &code, 20)?;

    let max_students = input.max_students.unwrap_or(DEFAULT_MAX_STUDENTS);
    let (min, max) = MAX_STUDENTS_RANGE;
    validate_range("max_students", max_students, min, max)?;

    Ok(NewCourse {
        name,
        code,
        description: input.description.filter(|d| !d.trim().is_empty()),
        max_students: Some(max_students),
        professor_id: input.professor_id,
    })
}
