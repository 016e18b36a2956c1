pub mod answer;
pub mod content;
pub mod points;
pub mod progress;
pub mod user;
