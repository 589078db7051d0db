use crate::domain::model::{
    Admission, Course, CourseId, NewCourse, NewStudent, SeatRequest, Student, StudentId,
    DEFAULT_MAX_STUDENTS,
};
use crate::domain::ports::{CourseRepository, EnrollmentLedger, StudentRepository};
use crate::utils::error::{Entity, RegistryError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    credential_hash TEXT NOT NULL,
    phone_number TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS courses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    code TEXT NOT NULL UNIQUE,
    description TEXT,
    max_students INTEGER NOT NULL DEFAULT 3 CHECK (max_students BETWEEN 1 AND 100),
    professor_id INTEGER,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS course_student (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    UNIQUE (course_id, student_id)
);

CREATE INDEX IF NOT EXISTS idx_course_student_student ON course_student(student_id);
";

const STUDENT_COLUMNS: &str = "s.id, s.name, s.email, s.credential_hash, s.phone_number, s.created_at";
const COURSE_COLUMNS: &str = "c.id, c.name, c.code, c.description, c.max_students, c.professor_id";

/// SQLite-backed students, courses and enrollment ledger.
///
/// One connection per store, serialized behind a mutex; blocking calls run on
/// the tokio blocking pool. Stores opened on the same file from other
/// processes coordinate through SQLite's write lock.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
        Self::initialize(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys=ON;", [])?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("Registry schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| RegistryError::storage(format!("{}: connection lock poisoned", op)))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| RegistryError::storage(format!("{}: blocking task failed: {}", op, e)))?
    }
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        credential_hash: row.get(3)?,
        phone_number: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn course_from_row(row: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        description: row.get(3)?,
        max_students: row.get(4)?,
        professor_id: row.get(5)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn count_for_student(conn: &Connection, student_id: StudentId) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM course_student WHERE student_id = ?1",
        [student_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn count_for_course(conn: &Connection, course_id: CourseId) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM course_student WHERE course_id = ?1",
        [course_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn pair_exists(conn: &Connection, student_id: StudentId, course_id: CourseId) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM course_student WHERE student_id = ?1 AND course_id = ?2",
            [student_id, course_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn admit_in_tx(conn: &mut Connection, request: SeatRequest) -> Result<Admission> {
    let SeatRequest {
        student_id,
        course_id,
        student_limit,
    } = request;

    // IMMEDIATE takes the write lock now, so nobody can slip an insert in
    // between the counts below and our own insert.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let student_found = tx
        .query_row("SELECT 1 FROM students WHERE id = ?1", [student_id], |_| Ok(()))
        .optional()?;
    if student_found.is_none() {
        return Err(RegistryError::NotFound(Entity::Student));
    }

    let max_students: u32 = tx
        .query_row(
            "SELECT max_students FROM courses WHERE id = ?1",
            [course_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(RegistryError::NotFound(Entity::Course))?;

    if count_for_student(&tx, student_id)? >= student_limit {
        return Ok(Admission::StudentLimitReached);
    }
    if pair_exists(&tx, student_id, course_id)? {
        return Err(RegistryError::DuplicateKey {
            student_id,
            course_id,
        });
    }
    if count_for_course(&tx, course_id)? >= max_students as usize {
        return Ok(Admission::CourseCapacityReached { max_students });
    }

    let inserted = tx.execute(
        "INSERT INTO course_student (course_id, student_id, created_at) VALUES (?1, ?2, ?3)",
        params![course_id, student_id, Utc::now()],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(RegistryError::DuplicateKey {
                student_id,
                course_id,
            })
        }
        Err(e) => return Err(e.into()),
    }

    let course_count = count_for_course(&tx, course_id)?;
    tx.commit()?;

    Ok(Admission::Admitted {
        course_count,
        max_students,
    })
}

#[async_trait]
impl StudentRepository for SqliteStore {
    async fn find_student(&self, id: StudentId) -> Result<Option<Student>> {
        self.with_conn("find_student", move |conn| {
            let sql = format!("SELECT {} FROM students s WHERE s.id = ?1", STUDENT_COLUMNS);
            Ok(conn.query_row(&sql, [id], student_from_row).optional()?)
        })
        .await
    }

    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>> {
        let email = email.to_string();
        self.with_conn("find_student_by_email", move |conn| {
            let sql = format!("SELECT {} FROM students s WHERE s.email = ?1", STUDENT_COLUMNS);
            Ok(conn.query_row(&sql, [email], student_from_row).optional()?)
        })
        .await
    }

    async fn insert_student(&self, student: NewStudent) -> Result<Student> {
        self.with_conn("insert_student", move |conn| {
            let created_at = Utc::now();
            let inserted = conn.execute(
                "INSERT INTO students (name, email, credential_hash, phone_number, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    student.name,
                    student.email,
                    student.credential_hash,
                    student.phone_number,
                    created_at
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(RegistryError::Conflict {
                        field: "email".to_string(),
                        value: student.email,
                    })
                }
                Err(e) => return Err(e.into()),
            }

            Ok(Student {
                id: conn.last_insert_rowid(),
                name: student.name,
                email: student.email,
                credential_hash: student.credential_hash,
                phone_number: student.phone_number,
                created_at,
            })
        })
        .await
    }

    async fn delete_student(&self, id: StudentId) -> Result<bool> {
        self.with_conn("delete_student", move |conn| {
            Ok(conn.execute("DELETE FROM students WHERE id = ?1", [id])? > 0)
        })
        .await
    }
}

#[async_trait]
impl CourseRepository for SqliteStore {
    async fn find_course(&self, id: CourseId) -> Result<Option<Course>> {
        self.with_conn("find_course", move |conn| {
            let sql = format!("SELECT {} FROM courses c WHERE c.id = ?1", COURSE_COLUMNS);
            Ok(conn.query_row(&sql, [id], course_from_row).optional()?)
        })
        .await
    }

    async fn find_course_by_code(&self, code: &str) -> Result<Option<Course>> {
        let code = code.to_string();
        self.with_conn("find_course_by_code", move |conn| {
            let sql = format!("SELECT {} FROM courses c WHERE c.code = ?1", COURSE_COLUMNS);
            Ok(conn.query_row(&sql, [code], course_from_row).optional()?)
        })
        .await
    }

    async fn insert_course(&self, course: NewCourse) -> Result<Course> {
        self.with_conn("insert_course", move |conn| {
            let max_students = course.max_students.unwrap_or(DEFAULT_MAX_STUDENTS);
            let inserted = conn.execute(
                "INSERT INTO courses (name, code, description, max_students, professor_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    course.name,
                    course.code,
                    course.description,
                    max_students,
                    course.professor_id,
                    Utc::now()
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(RegistryError::Conflict {
                        field: "code".to_string(),
                        value: course.code,
                    })
                }
                Err(e) => return Err(e.into()),
            }

            Ok(Course {
                id: conn.last_insert_rowid(),
                name: course.name,
                code: course.code,
                description: course.description,
                max_students,
                professor_id: course.professor_id,
            })
        })
        .await
    }

    async fn delete_course(&self, id: CourseId) -> Result<Option<Vec<StudentId>>> {
        self.with_conn("delete_course", move |conn| {
            // Same write lock for the roster and the delete: nobody can enroll
            // in between and end up missing from the returned ids.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let dropped = {
                let mut stmt = tx.prepare(
                    "DELETE FROM course_student WHERE course_id = ?1 RETURNING student_id",
                )?;
                let ids = stmt
                    .query_map([id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<StudentId>>>()?;
                ids
            };
            if tx.execute("DELETE FROM courses WHERE id = ?1", [id])? == 0 {
                return Ok(None);
            }
            tx.commit()?;
            Ok(Some(dropped))
        })
        .await
    }
}

#[async_trait]
impl EnrollmentLedger for SqliteStore {
    async fn count_for_student(&self, student_id: StudentId) -> Result<usize> {
        self.with_conn("count_for_student", move |conn| {
            count_for_student(conn, student_id)
        })
        .await
    }

    async fn count_for_course(&self, course_id: CourseId) -> Result<usize> {
        self.with_conn("count_for_course", move |conn| {
            count_for_course(conn, course_id)
        })
        .await
    }

    async fn exists(&self, student_id: StudentId, course_id: CourseId) -> Result<bool> {
        self.with_conn("exists", move |conn| pair_exists(conn, student_id, course_id))
            .await
    }

    async fn admit(&self, request: SeatRequest) -> Result<Admission> {
        self.with_conn("admit", move |conn| admit_in_tx(conn, request))
            .await
    }

    async fn remove(&self, student_id: StudentId, course_id: CourseId) -> Result<bool> {
        self.with_conn("remove", move |conn| {
            let removed = conn.execute(
                "DELETE FROM course_student WHERE student_id = ?1 AND course_id = ?2",
                [student_id, course_id],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn courses_for_student(&self, student_id: StudentId) -> Result<Vec<Course>> {
        self.with_conn("courses_for_student", move |conn| {
            let sql = format!(
                "SELECT {} FROM courses c
                 JOIN course_student cs ON cs.course_id = c.id
                 WHERE cs.student_id = ?1
                 ORDER BY cs.id",
                COURSE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let courses = stmt
                .query_map([student_id], course_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(courses)
        })
        .await
    }

    async fn students_for_course(&self, course_id: CourseId) -> Result<Vec<Student>> {
        self.with_conn("students_for_course", move |conn| {
            let sql = format!(
                "SELECT {} FROM students s
                 JOIN course_student cs ON cs.student_id = s.id
                 WHERE cs.course_id = ?1
                 ORDER BY cs.id",
                STUDENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let students = stmt
                .query_map([course_id], student_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(students)
        })
        .await
    }
}
