use super::models::*;
use super::sqlite::Database;
use crate::slug::slugify;
use rusqlite::{params, OptionalExtension, Result};
use tracing::debug;

impl Database {
    // ── Topic / Instructor ───────────────────────────────────────

    /// Lookup-or-create by slug. Returns (id, created). Re-importing the
    /// same name never makes a second row; on a hit the display name is
    /// refreshed in case its casing changed on disk.
    pub fn upsert_topic(&self, name: &str) -> Result<(i64, bool)> {
        self.upsert_named("topic", name)
    }

    pub fn upsert_instructor(&self, name: &str) -> Result<(i64, bool)> {
        self.upsert_named("instructor", name)
    }

    fn upsert_named(&self, table: &str, name: &str) -> Result<(i64, bool)> {
        let slug = slugify(name);
        let existing: Option<i64> = self
            .connection()
            .query_row(
                &format!("SELECT id FROM {} WHERE slug = ?1", table),
                params![slug],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                self.connection().execute(
                    &format!("UPDATE {} SET name = ?1 WHERE id = ?2", table),
                    params![name, id],
                )?;
                Ok((id, false))
            }
            None => {
                self.connection().execute(
                    &format!("INSERT INTO {} (name, slug) VALUES (?1, ?2)", table),
                    params![name, slug],
                )?;
                Ok((self.connection().last_insert_rowid(), true))
            }
        }
    }

    // ── Course ───────────────────────────────────────────────────

    /// Lookup-or-create a course by slug, re-associating its topic and
    /// instructor and forcing it back to `Active`. Touching a soft-deleted
    /// course during import is exactly what reactivates it.
    pub fn upsert_course(
        &self,
        name: &str,
        topic_id: i64,
        instructor_id: i64,
    ) -> Result<(i64, bool)> {
        let slug = slugify(name);
        let existing: Option<i64> = self
            .connection()
            .query_row(
                "SELECT id FROM course WHERE slug = ?1",
                params![slug],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                self.connection().execute(
                    "UPDATE course SET name = ?1, topic_id = ?2, instructor_id = ?3, state = ?4 \
                     WHERE id = ?5",
                    params![name, topic_id, instructor_id, CourseState::Active.as_str(), id],
                )?;
                Ok((id, false))
            }
            None => {
                self.connection().execute(
                    "INSERT INTO course (name, slug, topic_id, instructor_id, state) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![name, slug, topic_id, instructor_id, CourseState::Active.as_str()],
                )?;
                Ok((self.connection().last_insert_rowid(), true))
            }
        }
    }

    /// Mark every course `Deleted`. Returns the number of rows touched.
    pub fn soft_delete_all_courses(&self) -> Result<usize> {
        let count = self.connection().execute(
            "UPDATE course SET state = ?1",
            params![CourseState::Deleted.as_str()],
        )?;
        debug!("Soft-deleted {} courses", count);
        Ok(count)
    }

    pub fn find_course_by_slug(&self, slug: &str) -> Result<Option<Course>> {
        self.connection()
            .query_row(
                "SELECT id, name, slug, topic_id, instructor_id, state, avg_rating, ratings_count \
                 FROM course WHERE slug = ?1",
                params![slug],
                |row| {
                    Ok(Course {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        slug: row.get(2)?,
                        topic_id: row.get(3)?,
                        instructor_id: row.get(4)?,
                        state: CourseState::from_str(&row.get::<_, String>(5)?),
                        avg_rating: row.get(6)?,
                        ratings_count: row.get(7)?,
                    })
                },
            )
            .optional()
    }

    // ── Section ──────────────────────────────────────────────────

    /// Append a new section row with the next order index in its course.
    /// Sections are intentionally not deduplicated by name; every call
    /// creates a row.
    pub fn create_section(&self, name: &str, course_id: i64) -> Result<i64> {
        let order_index = self.next_section_order(course_id)?;
        self.connection().execute(
            "INSERT INTO section (name, course_id, order_index) VALUES (?1, ?2, ?3)",
            params![name, course_id, order_index],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn next_section_order(&self, course_id: i64) -> Result<i64> {
        self.connection().query_row(
            "SELECT COALESCE(MAX(order_index) + 1, 0) FROM section WHERE course_id = ?1",
            params![course_id],
            |row| row.get(0),
        )
    }

    pub fn sections_by_course(&self, course_id: i64) -> Result<Vec<Section>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, name, course_id, order_index FROM section \
             WHERE course_id = ?1 ORDER BY order_index, name",
        )?;
        let sections = stmt
            .query_map(params![course_id], |row| {
                Ok(Section {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    course_id: row.get(2)?,
                    order_index: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(sections)
    }

    // ── Lesson ───────────────────────────────────────────────────

    /// The catalog-relative file path is the lesson's natural key.
    pub fn find_lesson_by_path(&self, file_path: &str) -> Result<Option<Lesson>> {
        self.connection()
            .query_row(
                "SELECT id, name, section_id, file_path, file_size, duration_seconds, \
                        thumb_path, order_index \
                 FROM lesson WHERE file_path = ?1",
                params![file_path],
                |row| {
                    Ok(Lesson {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        section_id: row.get(2)?,
                        file_path: row.get(3)?,
                        file_size: row.get(4)?,
                        duration_seconds: row.get(5)?,
                        thumb_path: row.get(6)?,
                        order_index: row.get(7)?,
                    })
                },
            )
            .optional()
    }

    pub fn create_lesson(
        &self,
        name: &str,
        section_id: i64,
        file_path: &str,
        file_size: i64,
    ) -> Result<i64> {
        let order_index = self.next_lesson_order(section_id)?;
        self.connection().execute(
            "INSERT INTO lesson (name, section_id, file_path, file_size, order_index) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, section_id, file_path, file_size, order_index],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn next_lesson_order(&self, section_id: i64) -> Result<i64> {
        self.connection().query_row(
            "SELECT COALESCE(MAX(order_index) + 1, 0) FROM lesson WHERE section_id = ?1",
            params![section_id],
            |row| row.get(0),
        )
    }

    pub fn update_lesson_size(&self, lesson_id: i64, file_size: i64) -> Result<()> {
        self.connection().execute(
            "UPDATE lesson SET file_size = ?1 WHERE id = ?2",
            params![file_size, lesson_id],
        )?;
        Ok(())
    }

    pub fn update_lesson_duration(&self, lesson_id: i64, duration_seconds: f64) -> Result<()> {
        self.connection().execute(
            "UPDATE lesson SET duration_seconds = ?1 WHERE id = ?2",
            params![duration_seconds, lesson_id],
        )?;
        Ok(())
    }

    pub fn update_lesson_thumbnail(&self, lesson_id: i64, thumb_path: &str) -> Result<()> {
        self.connection().execute(
            "UPDATE lesson SET thumb_path = ?1 WHERE id = ?2",
            params![thumb_path, lesson_id],
        )?;
        Ok(())
    }

    // ── Counts ───────────────────────────────────────────────────

    pub fn counts(&self) -> Result<CatalogCounts> {
        let count = |table: &str| -> Result<i64> {
            self.connection()
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
        };
        Ok(CatalogCounts {
            topics: count("topic")?,
            instructors: count("instructor")?,
            courses: count("course")?,
            sections: count("section")?,
            lessons: count("lesson")?,
        })
    }
}
