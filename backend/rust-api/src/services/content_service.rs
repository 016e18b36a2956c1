use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::ContentError;
use crate::models::content::{Course, CourseManifest, Exercise, Lesson};

const COURSE_MANIFEST: &str = "root.json";

/// Read-only course catalogue, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    courses: BTreeMap<String, Course>,
}

impl ContentStore {
    pub fn new(courses: Vec<Course>) -> Self {
        Self {
            courses: courses.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    /// Loads every `<dir>/<course_id>/` directory holding a `root.json`.
    ///
    /// Each other `*.json` file in a course directory is one lesson; lessons
    /// keep file-name order. Any unreadable or undecodable file fails the load.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ContentError> {
        let dir = dir.as_ref();
        let mut courses = Vec::new();

        for course_dir in sorted_entries(dir)? {
            if !course_dir.is_dir() || !course_dir.join(COURSE_MANIFEST).is_file() {
                continue;
            }
            courses.push(load_course(&course_dir)?);
        }

        let lessons: usize = courses.iter().map(|c| c.lessons.len()).sum();
        tracing::info!(
            courses = courses.len(),
            lessons,
            "Loaded content from {}",
            dir.display()
        );
        Ok(Self::new(courses))
    }

    pub fn list_courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }

    pub fn get_course(&self, course_id: &str) -> Result<&Course, ContentError> {
        self.courses
            .get(course_id)
            .ok_or_else(|| ContentError::not_found("course", course_id))
    }

    pub fn get_lesson(&self, course_id: &str, lesson_id: &str) -> Result<&Lesson, ContentError> {
        self.get_course(course_id)?
            .lesson(lesson_id)
            .ok_or_else(|| ContentError::not_found("lesson", lesson_id))
    }

    pub fn get_exercise(
        &self,
        course_id: &str,
        lesson_id: &str,
        exercise_id: &str,
    ) -> Result<&Exercise, ContentError> {
        self.get_lesson(course_id, lesson_id)?
            .exercise(exercise_id)
            .ok_or_else(|| ContentError::not_found("exercise", exercise_id))
    }
}

fn load_course(course_dir: &Path) -> Result<Course, ContentError> {
    let id = course_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let manifest: CourseManifest = read_json(&course_dir.join(COURSE_MANIFEST))?;

    let mut lessons = Vec::new();
    for path in sorted_entries(course_dir)? {
        let is_lesson = path.is_file()
            && path.extension().is_some_and(|ext| ext == "json")
            && path.file_name().is_some_and(|name| name != COURSE_MANIFEST);
        if is_lesson {
            lessons.push(read_json::<Lesson>(&path)?);
        }
    }

    tracing::debug!(course_id = %id, lessons = lessons.len(), "Loaded course");
    Ok(Course {
        id,
        name: manifest.name,
        description: manifest.description,
        lessons,
    })
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, ContentError> {
    let io_error = |source| ContentError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut paths = fs::read_dir(dir)
        .map_err(io_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?;
    paths.sort();
    Ok(paths)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ContentError> {
    let raw = fs::read_to_string(path).map_err(|source| ContentError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ContentError::Parse {
        path: path.display().to_string(),
        source,
    })
}
