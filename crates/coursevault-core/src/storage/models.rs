use serde::Serialize;

/// Course visibility. `Deleted` rows survive in the database so ratings
/// and history outlive a vanished source directory; a rebuild marks every
/// course `Deleted` up front and flips it back on touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CourseState {
    Active,
    Deleted,
}

impl CourseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseState::Active => "active",
            CourseState::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "deleted" => CourseState::Deleted,
            _ => CourseState::Active,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct Instructor {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub topic_id: i64,
    pub instructor_id: i64,
    pub state: CourseState,
    pub avg_rating: f64,
    pub ratings_count: i64,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub id: i64,
    pub name: String,
    pub course_id: i64,
    pub order_index: i64,
}

#[derive(Debug, Clone)]
pub struct Lesson {
    pub id: i64,
    pub name: String,
    pub section_id: i64,
    pub file_path: String,
    pub file_size: i64,
    pub duration_seconds: f64,
    pub thumb_path: Option<String>,
    pub order_index: i64,
}

/// Row counts per table, for system-status reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogCounts {
    pub topics: i64,
    pub instructors: i64,
    pub courses: i64,
    pub sections: i64,
    pub lessons: i64,
}
