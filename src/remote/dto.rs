use serde::Deserialize;

use crate::models::{Course, Instructor};

/// Wire shape of one catalog entry. Unknown fields are ignored; every field
/// listed here is required.
#[derive(Debug, Deserialize)]
pub struct CourseDto {
    pub course_id: String,
    pub title: String,
    pub description_short: String,
    pub instructor: InstructorDto,
    pub duration_weeks: u32,
    pub price_usd: f64,
    pub is_premium: bool,
    pub tags: Vec<String>,
    pub rating: f64,
}

#[derive(Debug, Deserialize)]
pub struct InstructorDto {
    pub name: String,
    pub expertise_level: String,
}

impl From<CourseDto> for Course {
    fn from(dto: CourseDto) -> Self {
        Course {
            course_id: dto.course_id,
            title: dto.title,
            description_short: dto.description_short,
            instructor: Instructor {
                name: dto.instructor.name,
                expertise_level: dto.instructor.expertise_level,
            },
            duration_weeks: dto.duration_weeks,
            price_usd: dto.price_usd,
            is_premium: dto.is_premium,
            tags: dto.tags,
            rating: dto.rating,
            is_enrolled: false,
        }
    }
}
