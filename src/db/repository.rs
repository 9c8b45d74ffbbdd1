use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use tokio::sync::watch;
use tracing::debug;

use crate::error::StoreError;
use crate::models::{Course, Instructor};

const SELECT_COURSES: &str = r#"
    SELECT
        course_id, title, description_short,
        instructor_name, instructor_expertise_level,
        duration_weeks, price_usd, is_premium, tags, rating, is_enrolled
    FROM courses
"#;

#[derive(Debug, FromRow)]
struct CourseRow {
    course_id: String,
    title: String,
    description_short: String,
    instructor_name: String,
    instructor_expertise_level: String,
    duration_weeks: i64,
    price_usd: f64,
    is_premium: bool,
    tags: String,
    rating: f64,
    is_enrolled: bool,
}

impl TryFrom<CourseRow> for Course {
    type Error = StoreError;

    fn try_from(row: CourseRow) -> Result<Self, Self::Error> {
        let duration_weeks = u32::try_from(row.duration_weeks).map_err(|_| StoreError::Corrupt {
            course_id: row.course_id.clone(),
            reason: format!("duration_weeks out of range: {}", row.duration_weeks),
        })?;
        let tags: Vec<String> =
            serde_json::from_str(&row.tags).map_err(|e| StoreError::Corrupt {
                course_id: row.course_id.clone(),
                reason: format!("unreadable tags: {}", e),
            })?;

        Ok(Course {
            course_id: row.course_id,
            title: row.title,
            description_short: row.description_short,
            instructor: Instructor {
                name: row.instructor_name,
                expertise_level: row.instructor_expertise_level,
            },
            duration_weeks,
            price_usd: row.price_usd,
            is_premium: row.is_premium,
            tags,
            rating: row.rating,
            is_enrolled: row.is_enrolled,
        })
    }
}

/// Local course table plus a change counter that every committed write bumps.
///
/// The `get_*` and `search` streams re-run their query whenever the counter
/// moves, so each of them always ends up delivering the latest committed
/// state (intermediate states may be skipped when writes land back to back).
#[derive(Clone)]
pub struct CourseStore {
    db: SqlitePool,
    changes: Arc<watch::Sender<u64>>,
}

impl CourseStore {
    /// Wraps an already migrated pool.
    pub fn new(db: SqlitePool) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            db,
            changes: Arc::new(changes),
        }
    }

    /// Opens (creating if needed) the database at `database_url` and runs migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// A private in-memory database. The pool is pinned to one connection
    /// that never expires, since each SQLite connection would otherwise see
    /// its own empty database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    pub async fn fetch_all(&self) -> Result<Vec<Course>, StoreError> {
        let rows = sqlx::query_as::<_, CourseRow>(&format!("{SELECT_COURSES} ORDER BY title ASC"))
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(Course::try_from).collect()
    }

    /// Courses whose title or any tag contains `query`, ignoring case, ordered
    /// by title. An empty query returns everything.
    pub async fn fetch_matching(&self, query: &str) -> Result<Vec<Course>, StoreError> {
        let courses = self.fetch_all().await?;
        if query.is_empty() {
            return Ok(courses);
        }
        Ok(courses.into_iter().filter(|c| c.matches(query)).collect())
    }

    /// Point-in-time read of a single course.
    pub async fn get_by_id_once(&self, course_id: &str) -> Result<Option<Course>, StoreError> {
        let row = sqlx::query_as::<_, CourseRow>(&format!("{SELECT_COURSES} WHERE course_id = ?1"))
            .bind(course_id)
            .fetch_optional(&self.db)
            .await?;

        row.map(Course::try_from).transpose()
    }

    /// All courses ordered by title; re-emits after every committed write.
    pub fn get_all(&self) -> BoxStream<'static, Result<Vec<Course>, StoreError>> {
        self.watch_query(|store| async move { store.fetch_all().await })
    }

    /// The course with `course_id`, or `None`; re-emits when that record changes.
    pub fn get_by_id(&self, course_id: &str) -> BoxStream<'static, Result<Option<Course>, StoreError>> {
        let course_id = course_id.to_string();
        let mut last: Option<Option<Course>> = None;

        self.watch_query(move |store| {
            let course_id = course_id.clone();
            async move { store.get_by_id_once(&course_id).await }
        })
        .filter(move |item| {
            let emit = match item {
                Ok(current) => {
                    let changed = last.as_ref() != Some(current);
                    last = Some(current.clone());
                    changed
                }
                Err(_) => true,
            };
            futures::future::ready(emit)
        })
        .boxed()
    }

    /// Courses matching `query` ordered by title; re-emits after every committed write.
    pub fn search(&self, query: &str) -> BoxStream<'static, Result<Vec<Course>, StoreError>> {
        let query = query.to_string();
        self.watch_query(move |store| {
            let query = query.clone();
            async move { store.fetch_matching(&query).await }
        })
    }

    fn watch_query<T, F, Fut>(&self, query: F) -> BoxStream<'static, Result<T, StoreError>>
    where
        T: Send + 'static,
        F: Fn(CourseStore) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
    {
        let store = self.clone();
        let mut changes = self.changes.subscribe();

        stream! {
            loop {
                // Mark the current version seen before querying so a write
                // committed mid-query triggers another round.
                let _ = changes.borrow_and_update();
                yield query(store.clone()).await;
                if changes.changed().await.is_err() {
                    break;
                }
            }
        }
        .boxed()
    }

    /// Inserts `course` or fully replaces the stored record with the same id.
    pub async fn put(&self, course: &Course) -> Result<(), StoreError> {
        insert_or_replace(&self.db, course).await?;
        self.notify();
        Ok(())
    }

    /// Batch [`put`](Self::put). Applied in one transaction; on error nothing
    /// from this call is kept.
    pub async fn put_many(&self, courses: &[Course]) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;
        for course in courses {
            insert_or_replace(&mut *tx, course).await?;
        }
        tx.commit().await?;

        self.notify();
        Ok(())
    }

    /// Merges remote records into the store. A record that already exists
    /// takes every field from `courses` except `is_enrolled`, which keeps its
    /// stored value; a new record is inserted as given.
    ///
    /// Each row is merged by a single `ON CONFLICT` statement, so a
    /// concurrent `set_enrollment` on the same id cannot be lost between the
    /// read of the old flag and the write of the new row.
    pub async fn upsert_preserving_local_fields(&self, courses: &[Course]) -> Result<usize, StoreError> {
        let mut tx = self.db.begin().await?;
        for course in courses {
            let tags = serde_json::to_string(&course.tags)?;
            sqlx::query(
                r#"
                INSERT INTO courses
                    (course_id, title, description_short,
                    instructor_name, instructor_expertise_level,
                    duration_weeks, price_usd, is_premium, tags, rating, is_enrolled)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(course_id) DO UPDATE SET
                    title = excluded.title,
                    description_short = excluded.description_short,
                    instructor_name = excluded.instructor_name,
                    instructor_expertise_level = excluded.instructor_expertise_level,
                    duration_weeks = excluded.duration_weeks,
                    price_usd = excluded.price_usd,
                    is_premium = excluded.is_premium,
                    tags = excluded.tags,
                    rating = excluded.rating
                "#,
            )
            .bind(&course.course_id)
            .bind(&course.title)
            .bind(&course.description_short)
            .bind(&course.instructor.name)
            .bind(&course.instructor.expertise_level)
            .bind(i64::from(course.duration_weeks))
            .bind(course.price_usd)
            .bind(course.is_premium)
            .bind(tags)
            .bind(course.rating)
            .bind(course.is_enrolled)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!("merged {} courses", courses.len());
        self.notify();
        Ok(courses.len())
    }

    /// Sets only the enrollment flag. Unknown ids are ignored.
    pub async fn set_enrollment(&self, course_id: &str, enrolled: bool) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE courses SET is_enrolled = ?1 WHERE course_id = ?2")
            .bind(enrolled)
            .bind(course_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() > 0 {
            self.notify();
        } else {
            debug!("set_enrollment on unknown course {}", course_id);
        }
        Ok(())
    }

    /// Deletes every course.
    pub async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM courses").execute(&self.db).await?;
        self.notify();
        Ok(())
    }
}

async fn insert_or_replace<'e, E>(executor: E, course: &Course) -> Result<(), StoreError>
where
    E: SqliteExecutor<'e>,
{
    let tags = serde_json::to_string(&course.tags)?;
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO courses
            (course_id, title, description_short,
            instructor_name, instructor_expertise_level,
            duration_weeks, price_usd, is_premium, tags, rating, is_enrolled)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&course.course_id)
    .bind(&course.title)
    .bind(&course.description_short)
    .bind(&course.instructor.name)
    .bind(&course.instructor.expertise_level)
    .bind(i64::from(course.duration_weeks))
    .bind(course.price_usd)
    .bind(course.is_premium)
    .bind(tags)
    .bind(course.rating)
    .bind(course.is_enrolled)
    .execute(executor)
    .await?;
    Ok(())
}
